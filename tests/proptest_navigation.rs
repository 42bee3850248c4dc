//! Property-based tests using proptest
//!
//! These tests check URL composition, navigation determinism and schema
//! validation over randomized inputs.

use campus::api::http::Transport;
use campus::schema::{validate_request, validate_response, SchemaRegistry};
use campus::{BoundResource, ClientBuilder, ClientConfig, Credential, Error, StaticCredentials, Verb};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const BASE: &str = "http://campus.test";

const TREE: &str = r#"
users:
  operations: [POST]
  request: UserNew
  children:
    "{username}":
      pattern: "[a-zA-Z0-9._-]{1,64}"
      operations: [GET]
      schema: User
"#;

const SCHEMAS: &str = r#"
User:
  fields:
    name: { type: string, required: true }
    email: { type: string, required: true }
    role: { type: string, required: true }
    karma: { type: integer }
UserNew:
  fields:
    name: { type: string, required: true }
    email: { type: string, required: true }
"#;

fn config() -> ClientConfig {
    ClientConfig::new(BASE, Credential::Bearer("t".to_string())).unwrap()
}

fn root() -> BoundResource {
    ClientBuilder::new(config())
        .tree_source(TREE)
        .schema_source(SCHEMAS)
        .build()
        .unwrap()
}

fn transport() -> Transport {
    let config = config();
    Transport::new(
        &config,
        Arc::new(StaticCredentials::new(config.credentials.clone())),
        Arc::new(SchemaRegistry::default()),
    )
    .unwrap()
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::load(SCHEMAS).unwrap()
}

/// Generate user ids accepted by the `{username}` pattern
fn arb_username() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-][a-zA-Z0-9._-]{0,63}"
}

/// Generate a complete, valid user body
fn arb_user() -> impl Strategy<Value = Map<String, Value>> {
    ("[a-z]{1,12}", "[a-z]{1,8}@[a-z]{2,8}\\.com", prop_oneof!["admin", "student", "staff"])
        .prop_map(|(name, email, role)| {
            let mut map = Map::new();
            map.insert("name".to_string(), json!(name));
            map.insert("email".to_string(), json!(email));
            map.insert("role".to_string(), json!(role));
            map
        })
}

/// Generate arbitrary JSON leaf values
fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,20}".prop_map(Value::from),
    ]
}

proptest! {
    /// The same navigation always produces the same request and URL
    #[test]
    fn navigation_is_deterministic(username in arb_username()) {
        let root = root();
        let first = root.at(&format!("users/{}", username)).unwrap().prepare(Verb::Get, None).unwrap();
        let second = root.child("users").unwrap().child(&username).unwrap().prepare(Verb::Get, None).unwrap();
        prop_assert_eq!(&first, &second);

        let url = transport().url(&first.segments).unwrap();
        prop_assert_eq!(url.as_str(), format!("{}/v1/users/{}", BASE, username));
    }

    /// A bound value is always exactly one path segment
    #[test]
    fn bound_value_stays_one_segment(value in "[ -~]{1,32}") {
        prop_assume!(value != "." && value != "..");

        let segments = vec!["users".to_string(), value];
        let url = transport().url(&segments).unwrap();
        prop_assert_eq!(url.path_segments().map(|s| s.count()), Some(3));
        prop_assert!(url.query().is_none());
        prop_assert!(url.fragment().is_none());
    }

    /// Values outside the parameter pattern never bind
    #[test]
    fn invalid_usernames_rejected(username in "[a-z]{0,8}[!@#$%^&*()+= ][a-z]{0,8}") {
        let err = root().child("users").unwrap().child(&username).unwrap_err();
        let is_invalid_parameter = matches!(err, Error::InvalidParameter { .. });
        prop_assert!(is_invalid_parameter);
    }

    /// Unknown response fields never cause a mismatch
    #[test]
    fn extra_response_fields_tolerated(
        user in arb_user(),
        extras in prop::collection::btree_map("x_[a-z]{1,10}", arb_leaf(), 0..8),
    ) {
        let mut body = user;
        body.extend(extras);
        prop_assert!(validate_response(&registry(), "User", &Value::Object(body)).is_ok());
    }

    /// Dropping a required field reports exactly that field
    #[test]
    fn missing_required_field_named(
        user in arb_user(),
        missing in prop_oneof!["name", "email", "role"],
    ) {
        let mut body = user;
        body.remove(&missing);
        let mismatch = validate_response(&registry(), "User", &Value::Object(body)).unwrap_err();
        prop_assert_eq!(mismatch.field_path, missing);
    }

    /// Request bodies with unknown fields are rejected and the field named
    #[test]
    fn unknown_request_fields_rejected(
        name in "[a-z]{1,12}",
        extra in "x_[a-z]{1,10}",
    ) {
        let body = json!({"name": name, "email": "a@b.com", extra.clone(): 1});
        let mismatch = validate_request(&registry(), "UserNew", &body).unwrap_err();
        prop_assert_eq!(mismatch.field_path, extra);
    }
}
