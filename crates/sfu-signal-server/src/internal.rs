use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sfu_signal_channel::RequestError;

use crate::error::Result;

/// Nested entity ids sent as `internal` with every worker request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Internal {
    pub router_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_producer_id: Option<String>,
}

impl Internal {
    pub fn router(router_id: impl Into<String>) -> Self {
        Self {
            router_id: router_id.into(),
            ..Self::default()
        }
    }

    pub fn with_transport(&self, transport_id: impl Into<String>) -> Self {
        Self {
            transport_id: Some(transport_id.into()),
            ..self.clone()
        }
    }

    pub fn with_producer(&self, producer_id: impl Into<String>) -> Self {
        Self {
            producer_id: Some(producer_id.into()),
            ..self.clone()
        }
    }

    pub fn with_consumer(&self, consumer_id: impl Into<String>) -> Self {
        Self {
            consumer_id: Some(consumer_id.into()),
            ..self.clone()
        }
    }

    pub fn with_data_producer(&self, data_producer_id: impl Into<String>) -> Self {
        Self {
            data_producer_id: Some(data_producer_id.into()),
            ..self.clone()
        }
    }
}

/// Decode the `data` of an accepted worker response.
pub(crate) fn parse_response<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| RequestError::InvalidResponse(e).into())
}

/// Entity registries hold no invariants across a panic, so poisoning is
/// ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
