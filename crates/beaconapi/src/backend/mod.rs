//! Backend trait and implementations for sending API requests.
//!
//! [`http::HttpBackend`] talks to a real endpoint. [`MockBackend`] is an
//! in-memory REST service for tests:
//!
//! ```
//! use beaconapi::backend::{Backend, MockBackend};
//! use beaconapi::{ApiRequest, Method};
//! use std::time::Duration;
//!
//! let mock = MockBackend::new();
//! let response = mock
//!     .send(&ApiRequest {
//!         method: Method::Post,
//!         path: "/teams".to_string(),
//!         body: Some(serde_json::json!({"name": "Platform"})),
//!         timeout: Duration::from_secs(1),
//!     })
//!     .unwrap();
//! assert_eq!(response.status, 201);
//! ```

pub mod http;

use crate::error::Result;
use crate::types::{ApiRequest, ApiResponse, Method};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Backend trait for sending requests.
///
/// A backend returns whatever status the server produced; mapping statuses
/// to errors is the client's job.
pub trait Backend: Send + Sync {
    /// Send one request and return the raw response.
    ///
    /// # Errors
    ///
    /// Only transport failures (network, timeout) are errors.
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Server-side normalization applied to every stored object of a collection.
pub type StoreHook = Arc<dyn Fn(&mut Map<String, Value>) + Send + Sync>;

/// In-memory REST service.
///
/// Collections are created on first use; ids are minted from a single
/// counter starting at 1. Clones share the same store.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    collections: HashMap<String, BTreeMap<i64, Map<String, Value>>>,
    next_id: i64,
    hooks: HashMap<String, StoreHook>,
    injected: VecDeque<ApiResponse>,
    requests: Vec<(Method, String)>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transform every object stored in `collection`, like a server that
    /// drops write-only fields or normalizes values.
    pub fn on_store(
        &self,
        collection: impl Into<String>,
        hook: impl Fn(&mut Map<String, Value>) + Send + Sync + 'static,
    ) {
        self.lock().hooks.insert(collection.into(), Arc::new(hook));
    }

    /// Answer the next request with `response` instead of handling it.
    pub fn inject(&self, response: ApiResponse) {
        self.lock().injected.push_back(response);
    }

    /// Seed an object and return its id.
    pub fn insert(&self, collection: &str, object: Value) -> i64 {
        let mut state = self.lock();
        let object = match object {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        state.store(collection, None, object).0
    }

    /// Current stored form of an object.
    pub fn get(&self, collection: &str, id: i64) -> Option<Value> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|c| c.get(&id))
            .map(|o| Value::Object(o.clone()))
    }

    /// Delete an object behind the client's back.
    pub fn remove(&self, collection: &str, id: i64) -> bool {
        self.lock()
            .collections
            .get_mut(collection)
            .is_some_and(|c| c.remove(&id).is_some())
    }

    /// Number of objects in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.lock().collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// Every request received so far, as (method, path).
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.lock().requests.clone()
    }
}

impl MockState {
    /// Store `object` under `id` (or a fresh id), returning the id and the stored form.
    fn store(
        &mut self,
        collection: &str,
        id: Option<i64>,
        mut object: Map<String, Value>,
    ) -> (i64, Map<String, Value>) {
        let id = id.unwrap_or_else(|| {
            self.next_id += 1;
            self.next_id
        });
        object.insert("id".to_string(), json!(id));
        if let Some(hook) = self.hooks.get(collection) {
            hook(&mut object);
        }
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, object.clone());
        (id, object)
    }

    fn contains(&self, collection: &str, id: i64) -> bool {
        self.collections
            .get(collection)
            .is_some_and(|c| c.contains_key(&id))
    }

    fn handle(&mut self, request: &ApiRequest) -> ApiResponse {
        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
        let (collection, id) = match segments.as_slice() {
            [collection] => (*collection, None),
            [collection, id] => match id.parse::<i64>() {
                Ok(id) => (*collection, Some(id)),
                Err(_) => return not_found(&request.path),
            },
            _ => return not_found(&request.path),
        };

        match (request.method, id) {
            (Method::Post, None) => match body_object(request) {
                Some(object) => {
                    let (_, stored) = self.store(collection, None, object);
                    ApiResponse::new(201, Value::Object(stored).to_string())
                }
                None => bad_request("body must be a JSON object"),
            },
            (Method::Get, Some(id)) => match self.collections.get(collection).and_then(|c| c.get(&id)) {
                Some(object) => ApiResponse::new(200, Value::Object(object.clone()).to_string()),
                None => not_found(&request.path),
            },
            (Method::Put, Some(id)) => {
                if !self.contains(collection, id) {
                    return not_found(&request.path);
                }
                match body_object(request) {
                    Some(object) => {
                        let (_, stored) = self.store(collection, Some(id), object);
                        ApiResponse::new(200, Value::Object(stored).to_string())
                    }
                    None => bad_request("body must be a JSON object"),
                }
            }
            (Method::Delete, Some(id)) => {
                let removed = self
                    .collections
                    .get_mut(collection)
                    .is_some_and(|c| c.remove(&id).is_some());
                if removed {
                    ApiResponse::new(204, "")
                } else {
                    not_found(&request.path)
                }
            }
            _ => ApiResponse::new(405, json!({"message": "method not allowed"}).to_string()),
        }
    }
}

fn body_object(request: &ApiRequest) -> Option<Map<String, Value>> {
    match &request.body {
        Some(Value::Object(map)) => Some(map.clone()),
        _ => None,
    }
}

fn not_found(path: &str) -> ApiResponse {
    ApiResponse::new(404, json!({"message": format!("{path} not found")}).to_string())
}

fn bad_request(message: &str) -> ApiResponse {
    ApiResponse::new(400, json!({"message": message}).to_string())
}

impl Backend for MockBackend {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut state = self.lock();
        state.requests.push((request.method, request.path.clone()));
        if let Some(response) = state.injected.pop_front() {
            return Ok(response);
        }
        Ok(state.handle(request))
    }
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockBackend")
            .field("collections", &state.collections.len())
            .field("requests", &state.requests.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(method: Method, path: &str, body: Option<Value>) -> ApiRequest {
        ApiRequest {
            method,
            path: path.to_string(),
            body,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_mock_crud() {
        let mock = MockBackend::new();

        let created = mock
            .send(&request(Method::Post, "/teams", Some(json!({"name": "a"}))))
            .unwrap();
        assert_eq!(created.status, 201);
        let body: Value = serde_json::from_str(&created.body).unwrap();
        assert_eq!(body["id"], json!(1));

        let read = mock.send(&request(Method::Get, "/teams/1", None)).unwrap();
        assert_eq!(read.status, 200);

        let updated = mock
            .send(&request(Method::Put, "/teams/1", Some(json!({"name": "b"}))))
            .unwrap();
        assert_eq!(updated.status, 200);
        assert_eq!(mock.get("teams", 1).unwrap()["name"], json!("b"));

        assert_eq!(mock.send(&request(Method::Delete, "/teams/1", None)).unwrap().status, 204);
        assert_eq!(mock.send(&request(Method::Get, "/teams/1", None)).unwrap().status, 404);
        assert_eq!(mock.send(&request(Method::Delete, "/teams/1", None)).unwrap().status, 404);
        assert_eq!(mock.requests().len(), 6);
    }

    #[test]
    fn test_mock_update_missing() {
        let mock = MockBackend::new();
        let response = mock
            .send(&request(Method::Put, "/teams/9", Some(json!({}))))
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(mock.count("teams"), 0);
    }

    #[test]
    fn test_mock_store_hook() {
        let mock = MockBackend::new();
        mock.on_store("webhooks", |o| {
            o.remove("secret");
        });
        let id = mock.insert("webhooks", json!({"url": "https://x", "secret": "s"}));
        let stored = mock.get("webhooks", id).unwrap();
        assert!(stored.get("secret").is_none());
        assert_eq!(stored["url"], json!("https://x"));
    }

    #[test]
    fn test_mock_inject() {
        let mock = MockBackend::new();
        mock.inject(ApiResponse::new(503, "down"));
        assert_eq!(mock.send(&request(Method::Get, "/teams/1", None)).unwrap().status, 503);
        assert_eq!(mock.send(&request(Method::Get, "/teams/1", None)).unwrap().status, 404);
    }

    #[test]
    fn test_mock_remove() {
        let mock = MockBackend::new();
        let id = mock.insert("teams", json!({"name": "a"}));
        assert!(mock.remove("teams", id));
        assert!(!mock.remove("teams", id));
    }
}
