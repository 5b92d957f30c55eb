//! Request data handed to service operations.

use std::collections::HashMap;

use axum::extract::Query;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// An inbound request as seen by an operation.
///
/// Query strings and bodies are decoded on demand; decoding failures are
/// classified as `400 Bad Request`.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub path_params: HashMap<String, String>,
    pub body: Bytes,
}

impl ApiRequest {
    /// Decode the query string into `T`.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Query::<T>::try_from_uri(&self.uri)
            .map(|Query(value)| value)
            .map_err(|err| HttpError::bad_request(err.body_text()))
    }

    /// Decode the body as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| HttpError::bad_request(format!("invalid JSON body: {err}")))
    }

    /// A path parameter by name.
    pub fn param(&self, name: &str) -> Result<&str, HttpError> {
        self.path_params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| HttpError::bad_request(format!("missing path parameter: {name}")))
    }
}
