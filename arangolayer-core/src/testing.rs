//! Scripted backend used by the unit tests of this crate.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::{
    backend::{HttpBackend, HttpCall, TransportError},
    config::ConnectionConfig,
    envelope::RawResponse,
};

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Respond {
        status: u16,
        body: Value,
        headers: Vec<(String, String)>,
    },
    Fail(String),
    Hang,
}

impl Step {
    pub(crate) fn ok(body: Value) -> Self {
        Step::Respond {
            status: 200,
            body,
            headers: vec![],
        }
    }

    pub(crate) fn status(status: u16, body: Value) -> Self {
        Step::Respond {
            status,
            body,
            headers: vec![],
        }
    }

    pub(crate) fn not_leader(leader: Option<&str>) -> Self {
        Step::Respond {
            status: 503,
            body: serde_json::json!({
                "error": true,
                "errorNum": 1496,
                "code": 503,
                "errorMessage": "not a leader"
            }),
            headers: leader
                .map(|l| vec![("x-arango-endpoint".to_string(), l.to_string())])
                .unwrap_or_default(),
        }
    }

    pub(crate) fn refused() -> Self {
        Step::Fail("connection refused".into())
    }
}

/// Answers calls per host from a queue of steps; the last step of a queue
/// repeats forever.
#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<HttpCall>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, host: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(host.to_string(), steps.into());
        self
    }

    pub(crate) fn calls(&self) -> Vec<HttpCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn hosts_called(&self) -> Vec<String> {
        let scripts = self.scripts.lock().unwrap();
        self.calls()
            .iter()
            .map(|c| {
                scripts
                    .keys()
                    .find(|h| c.uri.starts_with(h.as_str()))
                    .cloned()
                    .unwrap_or_else(|| c.uri.clone())
            })
            .collect()
    }

    fn next_step(&self, uri: &str) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .iter_mut()
            .find(|(host, _)| uri.starts_with(host.as_str()))
            .map(|(_, q)| q);

        match queue {
            Some(q) if q.len() > 1 => q.pop_front().unwrap(),
            Some(q) => q.front().cloned().unwrap_or_else(Step::refused),
            None => Step::refused(),
        }
    }
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn send(&self, call: HttpCall) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(call.clone());

        match self.next_step(&call.uri) {
            Step::Respond {
                status,
                body,
                headers,
            } => Ok(RawResponse {
                status,
                headers: headers.into_iter().collect::<BTreeMap<_, _>>(),
                body: Bytes::from(body.to_string()),
            }),
            Step::Fail(message) => Err(TransportError::new(message)),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::new("hung"))
            }
        }
    }
}

pub(crate) fn config(endpoints: &[&str], failover: bool) -> ConnectionConfig {
    endpoints
        .iter()
        .fold(ConnectionConfig::builder(), |b, e| b.endpoint(*e))
        .database("profiles")
        .username("root")
        .password("secret")
        .active_failover(failover)
        .build()
        .unwrap()
}
