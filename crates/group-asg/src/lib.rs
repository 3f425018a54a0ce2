//! Resolves scaling-group membership and instance tags from the AWS APIs.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

use std::collections::HashMap;
use std::net::Ipv4Addr;

pub use error::{Error, Result};

use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_autoscaling::types::LifecycleState;
use aws_sdk_ec2::types::Filter;
use nodereg_group::{GroupMembershipSource, Instance, InstanceTags};
use tracing::{debug, info};

/// Group membership source backed by an EC2 Auto Scaling group.
#[derive(Clone, Debug)]
pub struct AutoScalingGroupSource {
    autoscaling: aws_sdk_autoscaling::Client,
    ec2: aws_sdk_ec2::Client,
}

impl AutoScalingGroupSource {
    /// Creates a source for the given region using credentials from the
    /// environment.
    pub async fn new(region: String) -> Self {
        let config = aws_config::from_env()
            .region(Region::new(region))
            .load()
            .await;

        Self::from_config(&config)
    }

    /// Creates a source from an already loaded SDK configuration.
    #[must_use]
    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            autoscaling: aws_sdk_autoscaling::Client::new(config),
            ec2: aws_sdk_ec2::Client::new(config),
        }
    }

    async fn group_name_of(&self, instance_id: &str) -> Result<String> {
        let resp = self
            .autoscaling
            .describe_auto_scaling_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| Error::AutoScaling(e.into()))?;

        resp.auto_scaling_instances()
            .first()
            .map(|details| details.auto_scaling_group_name().to_string())
            .ok_or_else(|| Error::InstanceNotInGroup(instance_id.to_string()))
    }

    async fn in_service_instance_ids(&self, group_name: &str) -> Result<Vec<String>> {
        let resp = self
            .autoscaling
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(group_name)
            .send()
            .await
            .map_err(|e| Error::AutoScaling(e.into()))?;

        let group = resp
            .auto_scaling_groups()
            .first()
            .ok_or_else(|| Error::GroupNotFound(group_name.to_string()))?;

        Ok(group
            .instances()
            .iter()
            .filter(|instance| is_in_service(instance.lifecycle_state()))
            .map(|instance| instance.instance_id().to_string())
            .collect())
    }

    async fn private_addresses(&self, instance_ids: &[String]) -> Result<HashMap<String, Ipv4Addr>> {
        let resp = self
            .ec2
            .describe_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(|e| Error::EC2(e.into()))?;

        let mut addresses = HashMap::new();
        for instance in resp
            .reservations()
            .iter()
            .flat_map(aws_sdk_ec2::types::Reservation::instances)
        {
            let instance_id = instance.instance_id().ok_or(Error::MissingDetails)?;
            let private_ip: Ipv4Addr = instance
                .private_ip_address()
                .ok_or(Error::MissingDetails)?
                .parse()?;
            addresses.insert(instance_id.to_string(), private_ip);
        }

        Ok(addresses)
    }
}

#[async_trait]
impl GroupMembershipSource for AutoScalingGroupSource {
    type Error = Error;

    async fn in_service_instances(&self, own_instance_id: &str) -> Result<Vec<Instance>> {
        let group_name = self.group_name_of(own_instance_id).await?;
        info!("instance is part of auto scaling group {}", group_name);

        let instance_ids = self.in_service_instance_ids(&group_name).await?;
        debug!("in-service instances: {:?}", instance_ids);

        if instance_ids.is_empty() {
            return Ok(Vec::new());
        }

        let addresses = self.private_addresses(&instance_ids).await?;

        order_by_group(&instance_ids, &addresses)
    }
}

#[async_trait]
impl InstanceTags for AutoScalingGroupSource {
    type Error = Error;

    async fn instance_tags(&self, instance_id: &str) -> Result<HashMap<String, String>> {
        let resp = self
            .ec2
            .describe_tags()
            .filters(
                Filter::builder()
                    .name("resource-id")
                    .values(instance_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Error::EC2(e.into()))?;

        Ok(resp
            .tags()
            .iter()
            .filter_map(|tag| {
                tag.key()
                    .map(|key| (key.to_string(), tag.value().unwrap_or_default().to_string()))
            })
            .collect())
    }
}

const fn is_in_service(state: &LifecycleState) -> bool {
    matches!(state, LifecycleState::InService)
}

/// Pairs each group member with its address, keeping the group's order.
fn order_by_group(
    instance_ids: &[String],
    addresses: &HashMap<String, Ipv4Addr>,
) -> Result<Vec<Instance>> {
    instance_ids
        .iter()
        .map(|instance_id| {
            addresses
                .get(instance_id)
                .map(|private_ip| Instance::new(instance_id.clone(), *private_ip))
                .ok_or(Error::MissingDetails)
        })
        .collect()
}
