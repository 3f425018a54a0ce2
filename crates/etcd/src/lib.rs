//! Bootstraps a node into an etcd cluster: decides whether the node founds a
//! new cluster or joins a running one, reconciles the live roster against the
//! expected membership and hands the decision to the cluster agent.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod api;
mod bootstrap;
mod error;
#[cfg(test)]
mod mock;

/// Drop-in rendering and service manager reloads.
pub mod artifact;

/// HTTP client for the etcd administrative API.
pub mod client;

/// Members and expected membership.
pub mod member;

/// Health probing of candidate members.
pub mod probe;

/// Membership reconciliation.
pub mod reconciler;

pub use api::ClusterApi;
pub use artifact::{DropInWriter, ServiceManager, Systemd};
pub use bootstrap::{EtcdBootstrap, EtcdBootstrapOptions};
pub use client::{DEFAULT_REQUEST_TIMEOUT, EtcdClient};
pub use error::{Error, Result};
pub use member::{Member, MemberId, MemberUrls, UrlScheme};
pub use reconciler::{BootstrapState, ReconciliationOutcome, Reconciler};
