//! Dependent policies run when an owner is destroyed

mod common;

use std::sync::Arc;

use common::Fixture;
use elif_resource::{
    AssociationOptions, Attributes, DependentPolicy, ErrorScope, RemoteOperation, ResourceClass, ResourceError,
};
use serde_json::{json, Value};

struct Thread {
    fixture: Fixture,
    post: Arc<ResourceClass>,
    comment: Arc<ResourceClass>,
}

/// Posts with comments, comments with replies (destroyed with their comment)
fn thread(policy: DependentPolicy) -> Thread {
    let fixture = Fixture::new();
    let post = fixture.define("Post");
    let comment = fixture.define("Comment");
    let reply = fixture.define("Reply");

    post.has_many("comments", AssociationOptions::new().dependent(policy))
        .unwrap();
    comment.belongs_to("post", AssociationOptions::new()).unwrap();
    comment
        .has_many("replies", AssociationOptions::new().dependent(DependentPolicy::Destroy))
        .unwrap();
    reply.belongs_to("comment", AssociationOptions::new()).unwrap();

    fixture.seed(
        "Post",
        vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})],
    );
    fixture.seed(
        "Comment",
        vec![
            json!({"id": 1, "post_id": 1}),
            json!({"id": 2, "post_id": 1}),
            json!({"id": 3, "post_id": 2}),
        ],
    );
    fixture.seed(
        "Reply",
        vec![json!({"id": 1, "comment_id": 1}), json!({"id": 2, "comment_id": 3})],
    );

    Thread { fixture, post, comment }
}

fn ids(records: Vec<Attributes>) -> Vec<Value> {
    records.into_iter().filter_map(|r| r.get("id").cloned()).collect()
}

#[test]
fn test_destroy_runs_member_dependents() {
    let thread = thread(DependentPolicy::Destroy);
    let post = thread.post.find(1).unwrap();
    let comments = post.read_many("comments").unwrap();

    assert!(post.destroy().unwrap());
    assert!(post.is_destroyed());

    let remote = &thread.fixture.remote;
    assert_eq!(remote.calls(RemoteOperation::Destroy), 4);
    assert_eq!(ids(remote.records("Comment")), vec![json!(3)]);
    assert_eq!(ids(remote.records("Reply")), vec![json!(2)]);
    assert_eq!(ids(remote.records("Post")), vec![json!(2), json!(3)]);

    for comment in &comments {
        assert!(comment.is_destroyed());
        assert_eq!(comment.destroyed_by_association().unwrap().name(), "comments");
    }
}

#[test]
fn test_delete_all_skips_member_dependents() {
    let thread = thread(DependentPolicy::DeleteAll);
    let post = thread.post.find(1).unwrap();

    assert!(post.destroy().unwrap());

    let remote = &thread.fixture.remote;
    assert_eq!(remote.calls(RemoteOperation::Delete), 2);
    assert_eq!(remote.calls(RemoteOperation::Destroy), 1);
    assert_eq!(remote.records("Reply").len(), 2);
    assert_eq!(ids(remote.records("Comment")), vec![json!(3)]);
}

#[test]
fn test_nullify_clears_owner_key() {
    let thread = thread(DependentPolicy::Nullify);
    let post = thread.post.find(1).unwrap();

    assert!(post.destroy().unwrap());

    let remote = &thread.fixture.remote;
    assert_eq!(remote.calls(RemoteOperation::Save), 2);
    let comments = remote.records("Comment");
    assert_eq!(comments.len(), 3);
    let orphaned = comments
        .iter()
        .filter(|c| c.get("post_id") == Some(&Value::Null))
        .count();
    assert_eq!(orphaned, 2);
}

#[test]
fn test_restrict_with_exception_blocks_destroy() {
    let thread = thread(DependentPolicy::RestrictWithException);
    let post = thread.post.find(1).unwrap();

    let err = post.destroy().unwrap_err();
    assert!(matches!(err, ResourceError::DeleteRestriction(ref name) if name == "comments"));
    assert!(post.is_persisted());

    let remote = &thread.fixture.remote;
    assert_eq!(remote.calls(RemoteOperation::Destroy), 0);
    assert_eq!(remote.calls(RemoteOperation::Delete), 0);
    assert_eq!(remote.records("Comment").len(), 3);
}

#[test]
fn test_restrict_with_error_registers_one_error() {
    let thread = thread(DependentPolicy::RestrictWithError);
    let post = thread.post.find(1).unwrap();

    assert!(!post.destroy().unwrap());
    assert!(post.is_persisted());
    {
        let errors = post.errors();
        assert_eq!(errors.len(), 1);
        let entry = errors.on(&ErrorScope::Base)[0];
        assert_eq!(entry.code, "restrict_dependent_destroy.many");
        assert_eq!(entry.context.get("record").map(String::as_str), Some("comments"));
    }

    let remote = &thread.fixture.remote;
    assert_eq!(remote.calls(RemoteOperation::Destroy), 0);
    assert_eq!(remote.records("Post").len(), 3);

    let fresh = thread.post.find(1).unwrap();
    assert!(matches!(
        fresh.destroy_strict().unwrap_err(),
        ResourceError::RecordNotDestroyed(_)
    ));
}

#[test]
fn test_restrictions_pass_without_members() {
    let thread = thread(DependentPolicy::RestrictWithError);
    let post = thread.post.find(3).unwrap();

    assert!(post.destroy().unwrap());
    assert!(post.errors().is_empty());
    assert_eq!(thread.fixture.remote.calls(RemoteOperation::Destroy), 1);
}

#[test]
fn test_restriction_runs_before_other_dependents() {
    let fixture = Fixture::new();
    let post = fixture.define("Post");
    fixture.define("Comment");
    post.has_one("summary", json!({"class_name": "Comment", "dependent": "delete"}))
        .unwrap();
    post.has_many("comments", json!({"dependent": "restrict_with_exception"}))
        .unwrap();
    fixture.seed("Post", vec![json!({"id": 1})]);
    fixture.seed("Comment", vec![json!({"id": 1, "post_id": 1})]);

    let record = post.find(1).unwrap();
    assert!(record.destroy().is_err());
    assert_eq!(fixture.remote.calls(RemoteOperation::FindSingleton), 0);
    assert_eq!(fixture.remote.calls(RemoteOperation::Delete), 0);
    assert_eq!(fixture.remote.records("Comment").len(), 1);
}

#[test]
fn test_mutual_destroy_dependents_terminate() {
    let thread = thread(DependentPolicy::Destroy);
    thread
        .comment
        .belongs_to("post", AssociationOptions::new().dependent(DependentPolicy::Destroy))
        .unwrap();
    let post = thread.post.find(1).unwrap();

    assert!(post.destroy().unwrap());
    let remote = &thread.fixture.remote;
    assert_eq!(remote.calls(RemoteOperation::Destroy), 4);
    assert_eq!(ids(remote.records("Post")), vec![json!(2), json!(3)]);
}

#[test]
fn test_failed_member_destroy_stops_owner() {
    let thread = thread(DependentPolicy::Destroy);
    let post = thread.post.find(2).unwrap();

    thread.fixture.remote.fail_next(RemoteOperation::Destroy, "unavailable");
    let err = post.destroy().unwrap_err();
    assert!(matches!(err, ResourceError::Remote(_)));
    assert!(!post.is_destroyed());
    assert_eq!(thread.fixture.remote.records("Post").len(), 3);
}

#[test]
fn test_belongs_to_destroy_runs_after_owner() {
    let fixture = Fixture::new();
    fixture.define("Post");
    let comment = fixture.define("Comment");
    comment
        .belongs_to("post", AssociationOptions::new().dependent(DependentPolicy::Destroy))
        .unwrap();
    fixture.seed("Post", vec![json!({"id": 1})]);
    fixture.seed("Comment", vec![json!({"id": 1, "post_id": 1})]);

    let record = comment.find(1).unwrap();
    assert!(record.destroy().unwrap());

    let destroyed: Vec<String> = fixture
        .remote
        .journal()
        .into_iter()
        .filter(|call| call.operation == RemoteOperation::Destroy)
        .map(|call| call.class_name)
        .collect();
    assert_eq!(destroyed, vec!["Comment", "Post"]);
    assert!(fixture.remote.records("Post").is_empty());
}

#[test]
fn test_belongs_to_delete() {
    let fixture = Fixture::new();
    fixture.define("Post");
    let comment = fixture.define("Comment");
    comment
        .belongs_to("post", json!({"dependent": "delete"}))
        .unwrap();
    fixture.seed("Post", vec![json!({"id": 1})]);
    fixture.seed("Comment", vec![json!({"id": 1, "post_id": 1})]);

    comment.find(1).unwrap().destroy().unwrap();
    assert_eq!(fixture.remote.calls(RemoteOperation::Delete), 1);
    assert!(fixture.remote.records("Post").is_empty());
}

fn store(policy: &str) -> (Fixture, Arc<ResourceClass>) {
    let fixture = Fixture::new();
    let product = fixture.define("Product");
    fixture.define("Inventory");
    product
        .has_one("inventory", json!({"dependent": policy}))
        .unwrap();
    fixture.seed("Product", vec![json!({"id": 12})]);
    fixture.seed("Inventory", vec![json!({"id": 1, "product_id": 12})]);
    (fixture, product)
}

#[test]
fn test_has_one_destroy() {
    let (fixture, product) = store("destroy");
    assert!(product.find(12).unwrap().destroy().unwrap());
    assert!(fixture.remote.records("Inventory").is_empty());
    assert_eq!(fixture.remote.calls(RemoteOperation::Destroy), 2);
}

#[test]
fn test_has_one_nullify() {
    let (fixture, product) = store("nullify");
    assert!(product.find(12).unwrap().destroy().unwrap());

    let inventory = fixture.remote.records("Inventory");
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].get("product_id"), Some(&Value::Null));
}

#[test]
fn test_has_one_restrict_with_error() {
    let (fixture, product) = store("restrict_with_error");
    let record = product.find(12).unwrap();

    assert!(!record.destroy().unwrap());
    assert_eq!(record.errors().len(), 1);
    assert_eq!(
        record.errors().iter().next().unwrap().code,
        "restrict_dependent_destroy.one"
    );
    assert_eq!(fixture.remote.records("Product").len(), 1);
}

#[test]
fn test_has_one_restrict_with_exception() {
    let (fixture, product) = store("restrict_with_exception");
    let err = product.find(12).unwrap().destroy().unwrap_err();
    assert!(matches!(err, ResourceError::DeleteRestriction(_)));
    assert_eq!(fixture.remote.calls(RemoteOperation::Destroy), 0);
}
