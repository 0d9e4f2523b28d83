//! The mapping registry driving real calls: collection setup, polymorphic
//! documents in a shared collection, edges, cursors and document bodies.

mod common;

use arangolayer::prelude::*;
use common::{MockArango, client, error_body};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

const USER: TypeTag = TypeTag::new("User");
const GROUP: TypeTag = TypeTag::new("Group");
const PROFILE: TypeTag = TypeTag::new("IProfile");
const ROLE: TypeTag = TypeTag::new("Role");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
enum Profile {
    User { id: String, name: String },
    Group { id: String, title: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
    email: String,
}

impl Entity for User {
    fn type_tag() -> TypeTag {
        USER
    }

    fn key(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

fn registry() -> ModelRegistry {
    let mut builder = ModelBuilder::new();
    builder.register::<User>();
    builder
        .set_collection(USER, "profiles")
        .set_key_property(USER, "id")
        .set_discriminator(USER, "Kind", "User")
        .set_collection(GROUP, "profiles")
        .set_key_property(GROUP, "id")
        .set_discriminator(GROUP, "Kind", "Group")
        .add_alias(USER, PROFILE)
        .add_alias(GROUP, PROFILE)
        .set_collection(ROLE, "roles")
        .add_relation(USER, ROLE, None, &[], &[])
        .add_relation(GROUP, USER, Some("memberOf"), &["title"], &[]);

    builder.build("p_", "q_").unwrap()
}

#[tokio::test]
async fn ensure_collections_creates_documents_and_edges() {
    let server = MockArango::start().await;
    let collection_api = MockArango::api("_api/collection");

    for (name, kind) in [("p_profiles", 2), ("p_roles", 2), ("p_profiles_roles", 3)] {
        Mock::given(method("POST"))
            .and(path(collection_api.clone()))
            .and(body_partial_json(json!({"name": name, "type": kind})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": name, "type": kind})))
            .expect(1)
            .mount(&server.server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path(collection_api))
        .and(body_partial_json(json!({"name": "p_memberOf", "type": 3})))
        .respond_with(ResponseTemplate::new(409).set_body_json(error_body(1207, 409, "duplicate name")))
        .expect(1)
        .mount(&server.server)
        .await;

    let client = client(&[&server.uri()], ConnectionOptions::new().retry(RetryPolicy::disabled())).await;

    let created = client.ensure_collections(&registry()).await.unwrap();

    assert_eq!(created, vec!["p_profiles", "p_roles", "p_profiles_roles"]);
}

#[tokio::test]
async fn alias_cursor_returns_every_concrete_variant() {
    let registry = registry();
    let server = MockArango::start().await;

    Mock::given(method("POST"))
        .and(path(MockArango::api("_api/cursor")))
        .and(body_partial_json(json!({"bindVars": {"@profiles": "p_profiles"}, "batchSize": 2})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "error": false,
            "code": 201,
            "result": [
                {"_key": "u1", "id": "u1", "Kind": "User", "name": "alice"},
                {"_key": "g1", "id": "g1", "Kind": "Group", "title": "admins"}
            ],
            "hasMore": true,
            "id": "4711"
        })))
        .expect(1)
        .mount(&server.server)
        .await;
    Mock::given(method("PUT"))
        .and(path(MockArango::api("_api/cursor/4711")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "code": 200,
            "result": [{"_key": "u2", "id": "u2", "Kind": "User", "name": "bob"}],
            "hasMore": false,
            "id": "4711"
        })))
        .expect(1)
        .mount(&server.server)
        .await;

    let client = client(&[&server.uri()], ConnectionOptions::default()).await;
    let collections = registry.alias_collections(PROFILE);
    assert_eq!(collections, vec!["p_profiles"]);

    let query = CursorQuery::new("FOR p IN @@profiles RETURN p")
        .bind("@profiles", collections[0])
        .unwrap()
        .batch_size(2);
    let documents: Vec<Value> = client
        .cursor::<Value>(query)
        .await
        .unwrap()
        .into_stream()
        .try_collect()
        .await
        .unwrap();

    let users: Vec<&Value> = documents
        .iter()
        .filter(|d| registry.discriminator(USER).unwrap().matches(d))
        .collect();
    assert_eq!(users.len(), 2);
    assert_eq!(registry.discriminators(PROFILE).len(), 2);

    let profiles: Vec<Profile> = documents
        .into_iter()
        .map(|d| serde_json::from_value(d).unwrap())
        .collect();
    assert_eq!(
        profiles,
        vec![
            Profile::User { id: "u1".into(), name: "alice".into() },
            Profile::Group { id: "g1".into(), title: "admins".into() },
            Profile::User { id: "u2".into(), name: "bob".into() },
        ]
    );
}

#[tokio::test]
async fn stored_documents_round_trip() {
    let registry = registry();
    let server = MockArango::start().await;
    let user = User {
        id: "u1".into(),
        name: "alice".into(),
        email: "alice@example.com".into(),
    };

    let mut stored = user.to_json().unwrap();
    registry.discriminator(USER).unwrap().apply(&mut stored);

    let mut echoed = stored.clone();
    echoed["_key"] = json!("u1");
    echoed["_id"] = json!("p_profiles/u1");
    echoed["_rev"] = json!("_hV2oH9y---");

    Mock::given(method("POST"))
        .and(path(MockArango::api("_api/document/p_profiles")))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({"id": "u1", "Kind": "User", "email": "alice@example.com"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_key": "u1",
            "_id": "p_profiles/u1",
            "_rev": "_hV2oH9y---",
            "new": echoed
        })))
        .expect(1)
        .mount(&server.server)
        .await;

    let client = client(&[&server.uri()], ConnectionOptions::default()).await;
    let collection = registry.collection_of::<User>().unwrap();
    let request = Request::builder(Method::Post, format!("_api/document/{collection}"))
        .query("returnNew", true)
        .json_body(&stored)
        .unwrap()
        .build();

    let response: Value = client.send(&request).await.unwrap().json().unwrap();

    assert_eq!(response["_id"], json!(registry.document_id(USER, &user.key().unwrap()).unwrap()));
    assert_eq!(User::from_json(response["new"].clone()).unwrap(), user);
}

#[tokio::test]
async fn edges_are_written_to_the_relation_collection() {
    let registry = registry();
    let server = MockArango::start().await;
    let relation = registry.relation(GROUP, USER).unwrap();
    let edge = relation.edge_document("g1", "u1", Some(&json!({"title": "admins"})), None);

    Mock::given(method("POST"))
        .and(path(MockArango::api("_api/document/p_memberOf")))
        .and(header("x-arango-trx-id", "trx-1"))
        .and(body_partial_json(json!({
            "_from": "p_profiles/g1",
            "_to": "p_profiles/u1",
            "title": "admins"
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"_key": "e1"})))
        .expect(1)
        .mount(&server.server)
        .await;

    let client = client(&[&server.uri()], ConnectionOptions::default()).await;
    let request = Request::builder(Method::Post, format!("_api/document/{}", relation.edge_collection()))
        .transaction("trx-1")
        .json_body(&edge)
        .unwrap()
        .build();

    let response = client.send(&request).await.unwrap();

    assert!(response.is_success());
    assert_eq!(response.debug_info().transaction_id.as_deref(), Some("trx-1"));
}
