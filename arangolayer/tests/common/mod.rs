//! Shared mock-server plumbing for the end-to-end tests.

#![allow(dead_code)]

use arangolayer::{prelude::*, reqwest::ReqwestBackend};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const DATABASE: &str = "app";

/// A host that refuses connections.
pub const DEAD_HOST: &str = "http://127.0.0.1:1";

/// A mock ArangoDB coordinator.
pub struct MockArango {
    pub server: MockServer,
}

impl MockArango {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn api(path: &str) -> String {
        format!("/_db/{DATABASE}/{path}")
    }

    pub async fn mock_version(&self, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(Self::api("_api/version")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": "arango",
                "version": "3.11.4",
                "license": "community"
            })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Answers every version call with not-leader, naming `leader`.
    pub async fn mock_not_leader(&self, leader: &str) {
        Mock::given(method("GET"))
            .and(path(Self::api("_api/version")))
            .respond_with(
                ResponseTemplate::new(503)
                    .insert_header("x-arango-endpoint", leader)
                    .set_body_json(error_body(1496, 503, "not a leader")),
            )
            .expect(1)
            .mount(&self.server)
            .await;
    }
}

pub fn error_body(error_num: i64, code: u16, message: &str) -> Value {
    json!({
        "error": true,
        "errorNum": error_num,
        "code": code,
        "errorMessage": message
    })
}

pub fn connection_string(endpoints: &[&str]) -> String {
    format!(
        "Endpoints={};Database={DATABASE};UserName=root;Password=secret;ActiveFailover={}",
        endpoints.join(","),
        endpoints.len() > 1
    )
}

pub async fn client(endpoints: &[&str], options: ConnectionOptions) -> ArangoClient<ReqwestBackend> {
    arangolayer::connect(&connection_string(endpoints), options)
        .await
        .expect("client should build")
}
