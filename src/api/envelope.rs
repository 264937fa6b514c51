use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::status_message;
use crate::error::RelayError;

/// Status codes a route passes through to its caller unchanged.
pub const SUCCESS_CODES: [u16; 3] = [200, 201, 202];

/// Uniform result shape of every upstream call and every route response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status_code: u16,
    pub detail: String,
    pub data: Option<Value>,
}

impl Envelope {
    /// Build an envelope; `detail` falls back to the status message table.
    pub fn new(status_code: u16, detail: Option<String>, data: Option<Value>) -> Self {
        let detail = detail
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| status_message(status_code).to_string());
        Self {
            status_code,
            detail,
            data,
        }
    }

    pub fn ok(data: Value) -> Self {
        Self::new(200, None, Some(data))
    }

    pub fn status(status_code: u16) -> Self {
        Self::new(status_code, None, None)
    }

    pub fn error(status_code: u16, detail: impl Into<String>) -> Self {
        Self::new(status_code, Some(detail.into()), None)
    }

    pub fn is_success(&self) -> bool {
        SUCCESS_CODES.contains(&self.status_code)
    }

    /// Turn a non-success envelope into a boundary error with the same code and detail.
    pub fn into_result(self) -> Result<Self, RelayError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RelayError::Upstream {
                status: self.status_code,
                detail: self.detail,
            })
        }
    }

    /// Look up a nested value in `data` by object keys.
    pub fn data_at(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .try_fold(self.data.as_ref()?, |value, key| value.get(key))
    }
}
