//! Home Assistant client abstraction
//!
//! The reconciliation core only talks to the hub through [`HassClient`].
//! [`RestHassClient`] is the production implementation over the REST API.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::entity::RemoteEntity;
use crate::error::HassError;

pub mod rest;

#[cfg(test)]
pub(crate) mod mock;

pub use rest::RestHassClient;

/// Service invoked on the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Toggle,
    TurnOn,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Toggle => "toggle",
            ServiceAction::TurnOn => "turn_on",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single remote command (`<domain>.<action>` on one entity)
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub domain: String,
    pub action: ServiceAction,
    pub entity_id: String,
    pub brightness_pct: Option<u8>,
    /// Transition duration in seconds
    pub transition: Option<f32>,
}

impl ServiceCall {
    /// Toggle an entity in its own domain
    pub fn toggle(entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        Self {
            domain: crate::entity::domain_of(&entity_id).to_string(),
            action: ServiceAction::Toggle,
            entity_id,
            brightness_pct: None,
            transition: None,
        }
    }

    /// Turn a light on at the given brightness percentage
    pub fn turn_on_brightness(entity_id: impl Into<String>, brightness_pct: u8, transition: f32) -> Self {
        let entity_id = entity_id.into();
        Self {
            domain: crate::entity::domain_of(&entity_id).to_string(),
            action: ServiceAction::TurnOn,
            entity_id,
            brightness_pct: Some(brightness_pct.min(100)),
            transition: Some(transition),
        }
    }

    /// JSON body sent as service data
    pub fn payload(&self) -> Value {
        let mut body = json!({ "entity_id": self.entity_id });
        if let Some(pct) = self.brightness_pct {
            body["brightness_pct"] = json!(pct);
        }
        if let Some(transition) = self.transition {
            body["transition"] = json!(transition);
        }
        body
    }
}

/// Hub operations consumed by the reconciliation core
///
/// Methods take `&self`; implementations must be shareable across the poll
/// loop and concurrently running gesture tasks.
#[async_trait]
pub trait HassClient: Send + Sync {
    /// One-shot snapshot used at startup
    ///
    /// Default: same as a regular snapshot fetch.
    async fn discover(&self) -> Result<Vec<RemoteEntity>, HassError> {
        self.fetch_snapshot().await
    }

    /// Full state of every entity
    async fn fetch_snapshot(&self) -> Result<Vec<RemoteEntity>, HassError>;

    /// Authoritative state of one entity, checked against the expected domain
    async fn fetch_one(&self, domain: &str, entity_id: &str) -> Result<RemoteEntity, HassError>;

    /// Invoke a service on the hub
    async fn invoke_service(&self, call: &ServiceCall) -> Result<(), HassError>;
}
