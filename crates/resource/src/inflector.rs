//! Naming conventions shared by reflections and resource types
//!
//! Class names are `::`-separated upper camel case (`Myblog::Comment`),
//! underscored names are `/`-separated snake case (`myblog/comment`).

use heck::{ToSnakeCase, ToUpperCamelCase};

/// Singular form of the last word of `word`
pub fn singularize(word: &str) -> String {
    inflect_last_word(word, 1)
}

/// Plural form of the last word of `word`
pub fn pluralize(word: &str) -> String {
    inflect_last_word(word, 2)
}

fn inflect_last_word(word: &str, count: isize) -> String {
    if word.is_empty() {
        return String::new();
    }

    match word.rfind('_') {
        Some(idx) if idx + 1 < word.len() => {
            let (head, last) = word.split_at(idx + 1);
            format!("{}{}", head, pluralizer::pluralize(last, count, false))
        }
        _ => pluralizer::pluralize(word, count, false),
    }
}

/// Class name for a table-like or association name
///
/// `comments` -> `Comment`, `myblog/comment` -> `Myblog::Comment`,
/// `line_items` -> `LineItem`
pub fn classify(name: &str) -> String {
    let name = name.rsplit('.').next().unwrap_or(name);
    let segments = split_segments(name);
    let last = segments.len().saturating_sub(1);

    segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            let segment = segment.to_snake_case();
            if idx == last {
                singularize(&segment).to_upper_camel_case()
            } else {
                segment.to_upper_camel_case()
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}

/// Snake-cased path form of a class name: `Myblog::LineItem` -> `myblog/line_item`
pub fn underscore(class_name: &str) -> String {
    split_segments(class_name)
        .iter()
        .map(|segment| segment.to_snake_case())
        .collect::<Vec<_>>()
        .join("/")
}

/// Last segment of a namespaced class name
pub fn demodulize(class_name: &str) -> &str {
    class_name.rsplit("::").next().unwrap_or(class_name)
}

/// Element name used in payloads and owner-scoping keys: `Myblog::Comment` -> `comment`
pub fn element_name(class_name: &str) -> String {
    demodulize(class_name).to_snake_case()
}

/// Collection name used in nested paths: `Myblog::Comment` -> `comments`
pub fn collection_name(class_name: &str) -> String {
    pluralize(&element_name(class_name))
}

/// Human readable attribute name: `line_items` -> `Line items`
pub fn human_attribute_name(attribute: &str) -> String {
    let attribute = attribute.strip_suffix("_id").unwrap_or(attribute);
    let spaced = attribute.replace('_', " ");
    let mut chars = spaced.trim().chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn split_segments(name: &str) -> Vec<&str> {
    name.split(|c| c == '/' || c == ':')
        .filter(|segment| !segment.is_empty())
        .collect()
}
