//! Abstract interface for resolving the instances of a scaling group.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Debug;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An instance that belongs to the node's scaling group.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Instance {
    /// The unique identifier of the instance.
    pub instance_id: String,

    /// The private network address of the instance.
    pub private_ip: Ipv4Addr,
}

impl Instance {
    /// Creates a new instance descriptor.
    pub fn new(instance_id: impl Into<String>, private_ip: Ipv4Addr) -> Self {
        Self {
            instance_id: instance_id.into(),
            private_ip,
        }
    }
}

/// Trait for sources that know which instances currently belong to a group.
#[async_trait]
pub trait GroupMembershipSource
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for this source.
    type Error: Debug + Error + Send + Sync + 'static;

    /// Returns the in-service instances of the group that `own_instance_id`
    /// belongs to, in the order the group reports them.
    async fn in_service_instances(&self, own_instance_id: &str)
    -> Result<Vec<Instance>, Self::Error>;
}

/// Trait for looking up the tags attached to an instance.
#[async_trait]
pub trait InstanceTags
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for this lookup.
    type Error: Debug + Error + Send + Sync + 'static;

    /// Returns the tags of the given instance keyed by tag name.
    async fn instance_tags(&self, instance_id: &str) -> Result<HashMap<String, String>, Self::Error>;
}
