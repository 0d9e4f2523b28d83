//! Endpoint addresses and the rotating endpoint pool.
//!
//! The pool keeps the candidate servers in rotation order and caches the
//! "sticky" host every request goes to until it fails or the cluster names a
//! different leader. All mutations happen under one lock so that concurrent
//! callers racing a failover cannot evict the same host twice or reorder the
//! queue.

use std::{collections::VecDeque, fmt};

use mea::mutex::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ArangoError, ArangoResult};

/// A normalized server base URL, always terminated by `/`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointAddress(String);

impl EndpointAddress {
    /// Parses and normalizes an endpoint.
    ///
    /// ArangoDB reports endpoints as `tcp://` or `ssl://`, which map to
    /// `http://` and `https://`. Query strings and fragments are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Configuration`] if the value is not an absolute
    /// http(s) URL with a host.
    pub fn parse(raw: &str) -> ArangoResult<Self> {
        let trimmed = raw.trim();
        let rewritten = if let Some(rest) = trimmed.strip_prefix("tcp://") {
            format!("http://{rest}")
        } else if let Some(rest) = trimmed.strip_prefix("ssl://") {
            format!("https://{rest}")
        } else {
            trimmed.to_string()
        };

        let mut url = Url::parse(&rewritten)
            .map_err(|e| ArangoError::Configuration(format!("Invalid endpoint '{raw}': {e}")))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ArangoError::Configuration(format!(
                "Invalid endpoint '{raw}': expected an http(s) URL with a host"
            )));
        }

        url.set_query(None);
        url.set_fragment(None);

        let mut normalized = url.to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }

        Ok(Self(normalized))
    }

    /// The normalized URL, including the trailing `/`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointAddress({})", self.0)
    }
}

/// A point-in-time copy of the pool state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Candidates in rotation order.
    pub queue: Vec<EndpointAddress>,
    /// The cached target, if any.
    pub sticky: Option<EndpointAddress>,
}

struct PoolState {
    queue: VecDeque<EndpointAddress>,
    sticky: Option<EndpointAddress>,
}

/// Ordered, rotating set of candidate servers.
///
/// Every public method is one atomic check-mutate-return unit; the lock is
/// never held across I/O.
pub struct EndpointPool {
    state: Mutex<PoolState>,
    members: Vec<EndpointAddress>,
}

impl fmt::Debug for EndpointPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointPool")
            .field("members", &self.members)
            .finish_non_exhaustive()
    }
}

impl EndpointPool {
    /// Creates a pool; the first endpoint becomes the first sticky host.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Configuration`] if `endpoints` is empty.
    pub fn new(endpoints: Vec<EndpointAddress>) -> ArangoResult<Self> {
        if endpoints.is_empty() {
            return Err(ArangoError::Configuration(
                "An endpoint pool needs at least one endpoint".into(),
            ));
        }

        Ok(Self {
            members: endpoints.clone(),
            state: Mutex::new(PoolState {
                queue: endpoints.into(),
                sticky: None,
            }),
        })
    }

    /// Number of endpoints in rotation.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; an empty pool cannot be built.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `endpoint` is one of the configured endpoints.
    ///
    /// A leader named by a redirect may be outside the pool; it is never
    /// added to the rotation.
    pub fn contains(&self, endpoint: &EndpointAddress) -> bool {
        self.members.contains(endpoint)
    }

    /// Returns the sticky host, caching the head of the queue if none is set.
    pub async fn next(&self) -> EndpointAddress {
        let mut state = self.state.lock().await;

        if let Some(sticky) = &state.sticky {
            return sticky.clone();
        }

        // The queue is never empty: `new` rejects empty pools and rotation
        // only moves entries.
        let head = state.queue[0].clone();
        state.sticky = Some(head.clone());
        head
    }

    /// Records a connection failure against `failed`.
    ///
    /// If `failed` is still the sticky host it is moved to the back of the
    /// queue and the sticky cache is cleared. A caller that lost the race to
    /// another caller reporting the same host changes nothing.
    ///
    /// Returns whether the pool state changed.
    pub async fn rotate(&self, failed: &EndpointAddress) -> bool {
        let mut state = self.state.lock().await;

        if state.sticky.as_ref() != Some(failed) {
            debug!(endpoint = %failed, "endpoint already rotated out");
            return false;
        }

        state.sticky = None;

        if let Some(position) = state.queue.iter().position(|e| e == failed) {
            if let Some(evicted) = state.queue.remove(position) {
                state.queue.push_back(evicted);
            }
        }

        warn!(
            endpoint = %failed,
            next = %state.queue[0],
            "endpoint unreachable, rotated to the back of the pool"
        );

        true
    }

    /// Makes `leader` the sticky host for all subsequent calls.
    ///
    /// The rotation queue is left as it is.
    pub async fn redirect(&self, leader: EndpointAddress) {
        let mut state = self.state.lock().await;

        if state.sticky.as_ref() != Some(&leader) {
            warn!(leader = %leader, previous = ?state.sticky, "following leader redirect");
        }

        state.sticky = Some(leader);
    }

    /// Copies the rotation order and the sticky host.
    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;

        PoolSnapshot {
            queue: state.queue.iter().cloned().collect(),
            sticky: state.sticky.clone(),
        }
    }
}
