//! In-memory group membership source, used in tests and local dry runs.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use nodereg_group::{GroupMembershipSource, Instance, InstanceTags};

#[derive(Debug, Default)]
struct State {
    instances: Vec<Instance>,
    pending: HashSet<String>,
    tags: HashMap<String, HashMap<String, String>>,
    failure: Option<String>,
}

/// A group whose membership is held in memory.
#[derive(Clone, Debug, Default)]
pub struct MockGroup {
    state: Arc<RwLock<State>>,
}

impl MockGroup {
    /// Creates a mock group containing the given instances, in order.
    #[must_use]
    pub fn new(instances: Vec<Instance>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                instances,
                ..State::default()
            })),
        }
    }

    /// Appends an instance to the group.
    pub fn add_instance(&self, instance: Instance) {
        self.write().instances.push(instance);
    }

    /// Removes an instance from the group.
    pub fn remove_instance(&self, instance_id: &str) {
        let mut state = self.write();
        state
            .instances
            .retain(|instance| instance.instance_id != instance_id);
        state.pending.remove(instance_id);
    }

    /// Keeps an instance in the group but out of service, as while it is
    /// still launching.
    pub fn set_pending(&self, instance_id: &str) {
        self.write().pending.insert(instance_id.to_string());
    }

    /// Puts a pending instance in service.
    pub fn set_in_service(&self, instance_id: &str) {
        self.write().pending.remove(instance_id);
    }

    /// Sets a tag on an instance.
    pub fn set_tag(&self, instance_id: &str, key: &str, value: &str) {
        self.write()
            .tags
            .entry(instance_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Makes every subsequent lookup fail with the given message.
    pub fn fail_with(&self, message: &str) {
        self.write().failure = Some(message.to_string());
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl GroupMembershipSource for MockGroup {
    type Error = Error;

    async fn in_service_instances(&self, own_instance_id: &str) -> Result<Vec<Instance>, Error> {
        let state = self.read();

        if let Some(message) = &state.failure {
            return Err(Error::Unavailable(message.clone()));
        }

        if !state
            .instances
            .iter()
            .any(|instance| instance.instance_id == own_instance_id)
        {
            return Err(Error::InstanceNotInGroup(own_instance_id.to_string()));
        }

        Ok(state
            .instances
            .iter()
            .filter(|instance| !state.pending.contains(&instance.instance_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InstanceTags for MockGroup {
    type Error = Error;

    async fn instance_tags(&self, instance_id: &str) -> Result<HashMap<String, String>, Error> {
        let state = self.read();

        if let Some(message) = &state.failure {
            return Err(Error::Unavailable(message.clone()));
        }

        Ok(state.tags.get(instance_id).cloned().unwrap_or_default())
    }
}
