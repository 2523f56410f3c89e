//! Error types for the bridge core
//!
//! `HassError` covers the hub client. `BridgeError` classifies where in the
//! reconciliation engine a failure happened; only `Discovery` is fatal.

use thiserror::Error;

/// Errors raised by a Home Assistant client
#[derive(Error, Debug)]
pub enum HassError {
    #[error("Home Assistant request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity {id} is not in domain '{expected}'")]
    DomainMismatch { id: String, expected: String },

    #[error("Home Assistant unavailable: {0}")]
    Unavailable(String),
}

/// Failure taxonomy of the reconciliation engine
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Startup snapshot could not be fetched
    #[error("Entity discovery failed: {0}")]
    Discovery(#[source] HassError),

    /// One poll tick could not fetch the snapshot
    #[error("State poll failed: {0}")]
    Poll(#[source] HassError),

    /// Pre-read or service call of a gesture failed
    #[error("Gesture on {entity_id} failed: {source}")]
    Gesture {
        entity_id: String,
        #[source]
        source: HassError,
    },
}

impl BridgeError {
    pub fn gesture(entity_id: impl Into<String>, source: HassError) -> Self {
        Self::Gesture {
            entity_id: entity_id.into(),
            source,
        }
    }
}
