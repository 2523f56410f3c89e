//! Home Assistant REST API client
//!
//! Uses the long-lived access token as a bearer token:
//! - `GET  /api/states`                        full snapshot
//! - `GET  /api/states/{entity_id}`            one entity
//! - `POST /api/services/{domain}/{service}`   service call

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};

use super::{HassClient, ServiceCall};
use crate::entity::{domain_of, RemoteEntity};
use crate::error::HassError;

/// REST client for a single Home Assistant instance
pub struct RestHassClient {
    http: Client,
    base_url: String,
    token: String,
}

impl RestHassClient {
    /// Create a client for `base_url` (e.g. `http://192.168.1.20:8123`)
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, HassError> {
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    /// Create from the `hass` section of the config
    pub fn from_config(config: &crate::config::HassConfig) -> Result<Self, HassError> {
        Self::new(
            config.base_url(),
            config.token.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HassClient for RestHassClient {
    async fn fetch_snapshot(&self) -> Result<Vec<RemoteEntity>, HassError> {
        let states: Vec<RemoteEntity> = self
            .http
            .get(format!("{}/api/states", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        trace!("Fetched {} entity states", states.len());
        Ok(states)
    }

    async fn fetch_one(&self, domain: &str, entity_id: &str) -> Result<RemoteEntity, HassError> {
        if domain_of(entity_id) != domain {
            return Err(HassError::DomainMismatch {
                id: entity_id.to_string(),
                expected: domain.to_string(),
            });
        }

        let response = self
            .http
            .get(format!("{}/api/states/{}", self.base_url, entity_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(HassError::NotFound(entity_id.to_string()));
        }

        let entity: RemoteEntity = response.error_for_status()?.json().await?;
        trace!(entity = entity_id, state = %entity.state, "Fetched entity state");
        Ok(entity)
    }

    async fn invoke_service(&self, call: &ServiceCall) -> Result<(), HassError> {
        debug!(
            domain = %call.domain,
            service = %call.action,
            entity = %call.entity_id,
            "Calling Home Assistant service"
        );

        self.http
            .post(format!(
                "{}/api/services/{}/{}",
                self.base_url, call.domain, call.action
            ))
            .bearer_auth(&self.token)
            .json(&call.payload())
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
