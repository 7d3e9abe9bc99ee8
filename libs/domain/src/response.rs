//! The `{status_code, message, data}` envelope used by every HTTP surface
//! (SPEC_FULL.md §6). CORS `*` is applied at the router layer, not here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status_code: u32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status_code: 0,
            message: "OK".to_string(),
            data: Some(data),
        }
    }

    pub fn ok_with(status_code: u32, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(status_code: u32, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            data: None,
        }
    }
}
