//! Association Metadata - macros, dependent policies and declaration options

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::Attributes;
use crate::error::{ResourceError, ResourceResult};

/// Kind of association declared on a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMacro {
    /// The owner holds the foreign key (`comment belongs_to post`)
    BelongsTo,
    /// The owner has a single related record (`product has_one inventory`)
    HasOne,
    /// The owner has a collection of related records (`post has_many comments`)
    HasMany,
}

impl AssociationMacro {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelongsTo => "belongs_to",
            Self::HasOne => "has_one",
            Self::HasMany => "has_many",
        }
    }

    /// Returns true if this macro resolves to a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }

    /// Option keys accepted when declaring an association of this kind
    pub fn valid_options(self) -> &'static [&'static str] {
        match self {
            Self::BelongsTo => &[
                "class_name",
                "inverse_of",
                "validate",
                "dependent",
                "primary_key",
                "foreign_key",
                "polymorphic",
            ],
            Self::HasOne => &[
                "class_name",
                "inverse_of",
                "validate",
                "dependent",
                "primary_key",
                "foreign_key",
                "through",
                "conditions",
            ],
            Self::HasMany => &[
                "class_name",
                "inverse_of",
                "validate",
                "dependent",
                "primary_key",
                "foreign_key",
                "through",
                "conditions",
                "limit",
            ],
        }
    }

    /// Dependent policies accepted for this kind
    pub fn valid_dependents(self) -> &'static [DependentPolicy] {
        match self {
            Self::BelongsTo => &[DependentPolicy::Destroy, DependentPolicy::Delete],
            Self::HasOne => &[
                DependentPolicy::Destroy,
                DependentPolicy::Delete,
                DependentPolicy::DeleteAll,
                DependentPolicy::Nullify,
                DependentPolicy::RestrictWithException,
                DependentPolicy::RestrictWithError,
            ],
            Self::HasMany => &[
                DependentPolicy::Destroy,
                DependentPolicy::DeleteAll,
                DependentPolicy::Nullify,
                DependentPolicy::RestrictWithException,
                DependentPolicy::RestrictWithError,
            ],
        }
    }
}

impl fmt::Display for AssociationMacro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete association variant, selected once when a reflection is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    BelongsTo,
    BelongsToPolymorphic,
    HasOne,
    HasOneThrough,
    HasMany,
    HasManyThrough,
}

impl AssociationKind {
    pub fn select(macro_kind: AssociationMacro, options: &AssociationOptions) -> Self {
        match macro_kind {
            AssociationMacro::BelongsTo if options.polymorphic => Self::BelongsToPolymorphic,
            AssociationMacro::BelongsTo => Self::BelongsTo,
            AssociationMacro::HasOne if options.through.is_some() => Self::HasOneThrough,
            AssociationMacro::HasOne => Self::HasOne,
            AssociationMacro::HasMany if options.through.is_some() => Self::HasManyThrough,
            AssociationMacro::HasMany => Self::HasMany,
        }
    }

    pub fn is_through(self) -> bool {
        matches!(self, Self::HasOneThrough | Self::HasManyThrough)
    }
}

/// Action taken on associated records when the owner is destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentPolicy {
    /// Destroy each associated record, running its own dependents
    Destroy,
    /// Delete the associated record without hooks (`belongs_to`, `has_one`)
    Delete,
    /// Delete all associated records without hooks
    DeleteAll,
    /// Clear the owner-scoping key on associated records
    Nullify,
    /// Refuse to destroy the owner while associated records exist
    RestrictWithException,
    /// Register an error on the owner and abort the destroy
    RestrictWithError,
}

impl DependentPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Destroy => "destroy",
            Self::Delete => "delete",
            Self::DeleteAll => "delete_all",
            Self::Nullify => "nullify",
            Self::RestrictWithException => "restrict_with_exception",
            Self::RestrictWithError => "restrict_with_error",
        }
    }
}

impl fmt::Display for DependentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "destroy" => Ok(Self::Destroy),
            "delete" => Ok(Self::Delete),
            "delete_all" => Ok(Self::DeleteAll),
            "nullify" => Ok(Self::Nullify),
            "restrict_with_exception" => Ok(Self::RestrictWithException),
            "restrict_with_error" => Ok(Self::RestrictWithError),
            other => Err(other.to_string()),
        }
    }
}

/// State of the `inverse_of` option
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InverseOf {
    /// Not given: the inverse may be inferred
    #[default]
    Unset,
    /// `inverse_of: false`: never set a back-reference
    Disabled,
    /// Explicit inverse association name
    Named(String),
}

/// Options given when declaring an association
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssociationOptions {
    pub class_name: Option<String>,
    pub foreign_key: Option<String>,
    pub primary_key: Option<String>,
    /// Raw `dependent` value; checked against the macro when the reflection is created
    pub dependent: Option<String>,
    pub validate: Option<bool>,
    pub inverse_of: InverseOf,
    pub polymorphic: bool,
    pub through: Option<String>,
    pub conditions: Option<Attributes>,
    pub limit: Option<usize>,
    unknown: Vec<String>,
}

impl AssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON object such as `{"class_name": "Client"}`
    ///
    /// Unknown keys are kept and reported when the reflection is created, so
    /// the error can name the association and macro.
    pub fn from_value(value: Value) -> ResourceResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::new()),
            other => {
                return Err(ResourceError::Configuration(format!(
                    "association options must be a JSON object, got {}",
                    other
                )))
            }
        };

        let mut options = Self::new();
        for (key, value) in map {
            match key.as_str() {
                "class_name" => options.class_name = Some(expect_string(&key, value)?),
                "foreign_key" => options.foreign_key = Some(expect_string(&key, value)?),
                "primary_key" => options.primary_key = Some(expect_string(&key, value)?),
                "dependent" => options.dependent = Some(expect_string(&key, value)?),
                "through" => options.through = Some(expect_string(&key, value)?),
                "validate" => options.validate = Some(expect_bool(&key, value)?),
                "polymorphic" => options.polymorphic = expect_bool(&key, value)?,
                "inverse_of" => {
                    options.inverse_of = match value {
                        Value::Bool(false) => InverseOf::Disabled,
                        Value::Null => InverseOf::Unset,
                        other => InverseOf::Named(expect_string(&key, other)?),
                    }
                }
                "conditions" => options.conditions = Some(Attributes::from_value(value)?),
                "limit" => {
                    let limit = value.as_u64().ok_or_else(|| {
                        ResourceError::Configuration(format!("option 'limit' must be a positive integer, got {}", value))
                    })?;
                    options.limit = Some(limit as usize);
                }
                _ => options.unknown.push(key),
            }
        }

        Ok(options)
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    pub fn dependent(mut self, policy: DependentPolicy) -> Self {
        self.dependent = Some(policy.as_str().to_string());
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn inverse_of(mut self, inverse: impl Into<String>) -> Self {
        self.inverse_of = InverseOf::Named(inverse.into());
        self
    }

    pub fn without_inverse(mut self) -> Self {
        self.inverse_of = InverseOf::Disabled;
        self
    }

    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    pub fn through(mut self, through: impl Into<String>) -> Self {
        self.through = Some(through.into());
        self
    }

    pub fn conditions(mut self, conditions: Attributes) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Names of every key that was given, recognized or not
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        if self.class_name.is_some() {
            keys.push("class_name");
        }
        if self.foreign_key.is_some() {
            keys.push("foreign_key");
        }
        if self.primary_key.is_some() {
            keys.push("primary_key");
        }
        if self.dependent.is_some() {
            keys.push("dependent");
        }
        if self.validate.is_some() {
            keys.push("validate");
        }
        if self.inverse_of != InverseOf::Unset {
            keys.push("inverse_of");
        }
        if self.polymorphic {
            keys.push("polymorphic");
        }
        if self.through.is_some() {
            keys.push("through");
        }
        if self.conditions.is_some() {
            keys.push("conditions");
        }
        if self.limit.is_some() {
            keys.push("limit");
        }
        keys.extend(self.unknown.iter().map(String::as_str));
        keys
    }

    /// Whether an option was given; used by inverse eligibility checks
    pub fn has(&self, key: &str) -> bool {
        self.keys().contains(&key)
    }

    /// Reject keys the macro does not recognize and parse the dependent policy
    pub(crate) fn assert_valid_keys(
        &self,
        macro_kind: AssociationMacro,
        name: &str,
    ) -> ResourceResult<Option<DependentPolicy>> {
        let valid = macro_kind.valid_options();
        if let Some(key) = self.keys().into_iter().find(|key| !valid.contains(key)) {
            return Err(ResourceError::UnknownOption {
                macro_name: macro_kind.to_string(),
                association: name.to_string(),
                key: key.to_string(),
                valid: valid.join(", "),
            });
        }

        let Some(ref raw) = self.dependent else {
            return Ok(None);
        };

        let allowed = macro_kind.valid_dependents();
        match raw.parse::<DependentPolicy>() {
            Ok(policy) if allowed.contains(&policy) => Ok(Some(policy)),
            _ => Err(ResourceError::InvalidDependent {
                macro_name: macro_kind.to_string(),
                association: name.to_string(),
                value: raw.clone(),
                valid: allowed
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

impl TryFrom<Value> for AssociationOptions {
    type Error = ResourceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Anything an association can be declared with: typed options or a JSON object
pub trait IntoAssociationOptions {
    fn into_options(self) -> ResourceResult<AssociationOptions>;
}

impl IntoAssociationOptions for AssociationOptions {
    fn into_options(self) -> ResourceResult<AssociationOptions> {
        Ok(self)
    }
}

impl IntoAssociationOptions for Value {
    fn into_options(self) -> ResourceResult<AssociationOptions> {
        AssociationOptions::from_value(self)
    }
}

fn expect_string(key: &str, value: Value) -> ResourceResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ResourceError::Configuration(format!(
            "option '{}' must be a string, got {}",
            key, other
        ))),
    }
}

fn expect_bool(key: &str, value: Value) -> ResourceResult<bool> {
    value.as_bool().ok_or_else(|| {
        ResourceError::Configuration(format!("option '{}' must be a boolean, got {}", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_macro_properties() {
        assert!(AssociationMacro::HasMany.is_collection());
        assert!(!AssociationMacro::HasOne.is_collection());
        assert!(AssociationMacro::BelongsTo.valid_options().contains(&"polymorphic"));
        assert!(!AssociationMacro::BelongsTo.valid_options().contains(&"through"));
        assert_eq!(AssociationMacro::BelongsTo.to_string(), "belongs_to");
    }

    #[test]
    fn test_kind_selection() {
        let plain = AssociationOptions::new();
        let poly = AssociationOptions::new().polymorphic();
        let through = AssociationOptions::new().through("taggings");

        assert_eq!(AssociationKind::select(AssociationMacro::BelongsTo, &plain), AssociationKind::BelongsTo);
        assert_eq!(
            AssociationKind::select(AssociationMacro::BelongsTo, &poly),
            AssociationKind::BelongsToPolymorphic
        );
        assert_eq!(
            AssociationKind::select(AssociationMacro::HasMany, &through),
            AssociationKind::HasManyThrough
        );
        assert!(AssociationKind::HasOneThrough.is_through());
    }

    #[test]
    fn test_options_from_value() {
        let options = AssociationOptions::from_value(json!({
            "class_name": "myblog/comment",
            "inverse_of": false,
            "dependent": "destroy",
            "limit": 5
        }))
        .unwrap();

        assert_eq!(options.class_name.as_deref(), Some("myblog/comment"));
        assert_eq!(options.inverse_of, InverseOf::Disabled);
        assert_eq!(options.limit, Some(5));
        assert!(options.has("dependent"));
        assert!(!options.has("foreign_key"));
    }

    #[test]
    fn test_unknown_key_is_reported_with_its_name() {
        let options = AssociationOptions::from_value(json!({"soo_invalid": true})).unwrap();
        let err = options
            .assert_valid_keys(AssociationMacro::HasMany, "customers")
            .unwrap_err();

        match err {
            ResourceError::UnknownOption { key, association, .. } => {
                assert_eq!(key, "soo_invalid");
                assert_eq!(association, "customers");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_key_not_valid_for_macro() {
        let options = AssociationOptions::new().through("taggings");
        assert!(options.assert_valid_keys(AssociationMacro::BelongsTo, "post").is_err());
        assert!(options.assert_valid_keys(AssociationMacro::HasMany, "tags").is_ok());
    }

    #[test]
    fn test_dependent_validation() {
        let destroy = AssociationOptions::new().dependent(DependentPolicy::Destroy);
        assert_eq!(
            destroy.assert_valid_keys(AssociationMacro::HasMany, "comments").unwrap(),
            Some(DependentPolicy::Destroy)
        );

        let restrict = AssociationOptions::new().dependent(DependentPolicy::RestrictWithError);
        assert!(matches!(
            restrict.assert_valid_keys(AssociationMacro::BelongsTo, "post"),
            Err(ResourceError::InvalidDependent { .. })
        ));

        let bogus = AssociationOptions::from_value(json!({"dependent": "obliterate"})).unwrap();
        assert!(matches!(
            bogus.assert_valid_keys(AssociationMacro::HasMany, "comments"),
            Err(ResourceError::InvalidDependent { .. })
        ));
    }
}
