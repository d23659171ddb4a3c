//! Response payloads for the HTTP surface

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{STATUS_OK, STATUS_SUCCESS};

/// Successful connect on either plane
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectResponse {
    pub token: String,
    pub status: String,
}

impl ConnectResponse {
    pub fn new(token: String) -> Self {
        Self {
            token,
            status: STATUS_OK.to_string(),
        }
    }
}

/// Successful disconnect on either plane
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisconnectResponse {
    pub status: String,
}

impl Default for DisconnectResponse {
    fn default() -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
        }
    }
}

/// Query result in the full shape: rows or failure text, plus `OK`/`FAIL`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FullQueryResponse {
    pub result: Value,
    pub status: String,
}

/// Query result in the short shape: `1` on success, the errno on failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortQueryResponse {
    pub result: i64,
}

/// Body accepted by `POST /log`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogRequest {
    #[serde(default)]
    pub message: Value,
}
