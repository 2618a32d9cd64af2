//! Record lifecycle and its interaction with cached associations

mod common;

use std::sync::Arc;

use common::Fixture;
use elif_resource::{
    AssociationOptions, Attributes, ErrorScope, RemoteOperation, ResourceClass, ResourceError,
};
use serde_json::json;

fn blog() -> (Fixture, Arc<ResourceClass>, Arc<ResourceClass>) {
    let fixture = Fixture::new();
    let post = fixture.define("Post");
    let comment = fixture.define("Comment");
    post.has_many("comments", AssociationOptions::new()).unwrap();
    comment.belongs_to("post", AssociationOptions::new()).unwrap();

    fixture.seed(
        "Post",
        vec![json!({"id": 1, "title": "First"}), json!({"id": 2, "title": "Second"})],
    );
    fixture.seed(
        "Comment",
        vec![
            json!({"id": 1, "post_id": 1, "body": "a"}),
            json!({"id": 2, "post_id": 1, "body": "b"}),
        ],
    );
    (fixture, post, comment)
}

#[test]
fn test_save_assigns_id() {
    let (fixture, _, comment) = blog();
    let record = comment.new_resource(json!({"body": "hello"})).unwrap();
    assert!(record.is_new_record());

    assert!(record.save().unwrap());
    assert!(record.is_persisted());
    assert_eq!(record.id(), Some(json!(3)));
    assert_eq!(fixture.remote.records("Comment").len(), 3);
}

#[test]
fn test_invalid_save_records_errors() {
    let (fixture, _, comment) = blog();
    fixture.remote.require("Comment", "body");

    let record = comment.new_resource(json!({"body": null})).unwrap();
    assert!(!record.save().unwrap());
    assert!(record.is_new_record());
    assert_eq!(record.errors().on(&ErrorScope::Attribute("body".to_string())).len(), 1);

    let err = record.save_strict().unwrap_err();
    assert!(matches!(err, ResourceError::RecordInvalid(_)));

    // Skipping validation lets the record through
    assert!(record.save_with(false).unwrap());
    assert!(record.errors().is_empty());
}

#[test]
fn test_create_on_class() {
    let (fixture, post, _) = blog();
    let record = post.create(json!({"title": "Third"})).unwrap();
    assert!(record.is_persisted());
    assert_eq!(fixture.remote.calls(RemoteOperation::Save), 1);
}

#[test]
fn test_find_missing_record() {
    let (_, post, _) = blog();
    let err = post.find(42).unwrap_err();
    assert!(matches!(err, ResourceError::NotFound { ref id, .. } if id == "42"));
}

#[test]
fn test_find_all_with_filters() {
    let (_, _, comment) = blog();
    let filters = Attributes::from_value(json!({"body": "b"})).unwrap();
    let found = comment.find_all(&filters).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].is_persisted());
}

#[test]
fn test_reload_clears_cached_associations() {
    let (fixture, post, _) = blog();
    let record = post.find(1).unwrap();
    record.read_many("comments").unwrap();
    record.set_attribute("title", json!("Changed"));

    record.reload().unwrap();
    assert_eq!(record.attribute("title"), Some(json!("First")));
    assert!(record.cached_associations().is_empty());

    record.read_many("comments").unwrap();
    assert_eq!(fixture.remote.calls(RemoteOperation::FindAll), 2);
}

#[test]
fn test_reload_requires_an_id() {
    let (_, post, _) = blog();
    let record = post.build(Attributes::new());
    assert!(matches!(record.reload(), Err(ResourceError::RecordNotSaved(_))));
}

#[test]
fn test_association_cache_kept_for_new_records() {
    let (_fixture, post, _) = blog();
    let record = post.build(Attributes::new());
    record.read_many("comments").unwrap();

    record.clear_association_cache();
    assert_eq!(record.cached_associations(), vec!["comments"]);
}

#[test]
fn test_load_attributes_resets_touched_associations() {
    let (fixture, post, comment) = blog();
    let record = post.instantiate(
        Attributes::from_value(json!({"id": 1, "comments": [{"id": 5}]})).unwrap(),
        true,
    );
    assert_eq!(record.read_many("comments").unwrap().len(), 1);

    record
        .load_attributes(json!({"comments": [{"id": 6}, {"id": 7}]}))
        .unwrap();
    assert_eq!(record.read_many("comments").unwrap().len(), 2);

    let member = comment.find(1).unwrap();
    member.read_one("post").unwrap();
    member.load_attributes(json!({"post_id": 2})).unwrap();
    let owner = member.read_one("post").unwrap().unwrap();
    assert_eq!(owner.attribute("title"), Some(json!("Second")));
    assert_eq!(fixture.remote.calls(RemoteOperation::FindAll), 0);
}

#[test]
fn test_delete_and_destroyed_records() {
    let (fixture, _, comment) = blog();
    let record = comment.find(1).unwrap();

    record.delete().unwrap();
    assert!(record.is_destroyed());
    assert!(!record.is_new_record());
    assert_eq!(fixture.remote.calls(RemoteOperation::Delete), 1);

    assert!(record.destroy().unwrap());
    assert_eq!(fixture.remote.calls(RemoteOperation::Destroy), 0);
    assert!(matches!(record.save(), Err(ResourceError::RecordNotSaved(_))));
}

#[test]
fn test_subtype_inherits_associations() {
    let (fixture, post, comment) = blog();
    let featured = fixture
        .schema
        .define("FeaturedPost")
        .extends(&post)
        .remote(Arc::clone(&fixture.remote))
        .register()
        .unwrap();
    assert!(featured.reflect_on_association("comments").is_some());

    let record = featured.instantiate(Attributes::from_value(json!({"id": 9})).unwrap(), true);
    let member = comment.find(2).unwrap();
    member.write("post", record.clone()).unwrap();
    assert_eq!(member.attribute("post_id"), Some(json!(9)));
    assert!(member.read_one("post").unwrap().unwrap().ptr_eq(&record));
}

#[test]
fn test_reentrant_access_is_reported() {
    let (_, post, _) = blog();
    let record = post.find(1).unwrap();
    let inner = record.clone();

    let err = record
        .with_association("comments", move |_| inner.read_many("comments"))
        .unwrap_err();
    assert!(matches!(err, ResourceError::AssociationBusy(ref name) if name == "comments"));
}
