//! In-memory hub used by the unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::{HassClient, ServiceAction, ServiceCall};
use crate::entity::{domain_of, RemoteEntity};
use crate::error::HassError;

/// Fake hub: keeps entity states, records service calls, can be told to fail
#[derive(Default)]
pub(crate) struct MockHassClient {
    states: Mutex<BTreeMap<String, RemoteEntity>>,
    calls: Mutex<Vec<ServiceCall>>,
    snapshot_delay: Mutex<Option<Duration>>,
    pub fail_snapshot: AtomicBool,
    pub fail_fetch_one: AtomicBool,
    pub fail_service: AtomicBool,
    pub snapshot_fetches: AtomicUsize,
    /// Apply toggles to the stored state, like the real hub would
    pub apply_calls: AtomicBool,
}

impl MockHassClient {
    pub fn with_entities(entities: Vec<RemoteEntity>) -> Self {
        let client = Self::default();
        for entity in entities {
            client.put(entity);
        }
        client
    }

    pub fn put(&self, entity: RemoteEntity) {
        self.states.lock().insert(entity.entity_id.clone(), entity);
    }

    pub fn remove(&self, entity_id: &str) {
        self.states.lock().remove(entity_id);
    }

    pub fn set_state(&self, entity_id: &str, state: &str) {
        let mut states = self.states.lock();
        let entry = states
            .entry(entity_id.to_string())
            .or_insert_with(|| RemoteEntity::new(entity_id, state));
        entry.state = state.to_string();
    }

    pub fn state_of(&self, entity_id: &str) -> Option<String> {
        self.states.lock().get(entity_id).map(|e| e.state.clone())
    }

    pub fn set_snapshot_delay(&self, delay: Duration) {
        *self.snapshot_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HassClient for MockHassClient {
    async fn fetch_snapshot(&self) -> Result<Vec<RemoteEntity>, HassError> {
        self.snapshot_fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.snapshot_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_snapshot.load(Ordering::SeqCst) {
            return Err(HassError::Unavailable("snapshot failure".to_string()));
        }
        Ok(self.states.lock().values().cloned().collect())
    }

    async fn fetch_one(&self, domain: &str, entity_id: &str) -> Result<RemoteEntity, HassError> {
        if self.fail_fetch_one.load(Ordering::SeqCst) {
            return Err(HassError::Unavailable("fetch failure".to_string()));
        }
        if domain_of(entity_id) != domain {
            return Err(HassError::DomainMismatch {
                id: entity_id.to_string(),
                expected: domain.to_string(),
            });
        }
        self.states
            .lock()
            .get(entity_id)
            .cloned()
            .ok_or_else(|| HassError::NotFound(entity_id.to_string()))
    }

    async fn invoke_service(&self, call: &ServiceCall) -> Result<(), HassError> {
        self.calls.lock().push(call.clone());
        if self.fail_service.load(Ordering::SeqCst) {
            return Err(HassError::Unavailable("service failure".to_string()));
        }

        if self.apply_calls.load(Ordering::SeqCst) {
            let mut states = self.states.lock();
            if let Some(entity) = states.get_mut(&call.entity_id) {
                let next = match call.action {
                    ServiceAction::Toggle if entity.is_on() => "off",
                    ServiceAction::Toggle => "on",
                    ServiceAction::TurnOn if call.brightness_pct == Some(0) => "off",
                    ServiceAction::TurnOn => "on",
                };
                entity.state = next.to_string();
            }
        }
        Ok(())
    }
}
