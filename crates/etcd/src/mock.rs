//! In-memory cluster used by unit tests.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::ClusterApi;
use crate::member::{Member, MemberId};
use crate::{Error, Result};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Add {
        client_url: String,
        name: String,
        peer_urls: Vec<String>,
    },
    Remove {
        client_url: String,
        id: MemberId,
    },
}

#[derive(Clone, Copy, Debug)]
enum Health {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Default)]
struct State {
    health: HashMap<String, Health>,
    delays: HashMap<String, Duration>,
    roster: Vec<Member>,
    calls: Vec<Call>,
    probed: Vec<String>,
    next_id: u64,
    fail_adds: bool,
    fail_removals: bool,
    fail_roster: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_healthy(&self, client_url: &str) {
        self.lock()
            .health
            .insert(client_url.to_string(), Health::Healthy);
    }

    pub fn set_unhealthy(&self, client_url: &str) {
        self.lock()
            .health
            .insert(client_url.to_string(), Health::Unhealthy);
    }

    pub fn set_delay(&self, client_url: &str, delay: Duration) {
        self.lock().delays.insert(client_url.to_string(), delay);
    }

    pub fn set_roster(&self, roster: Vec<Member>) {
        self.lock().roster = roster;
    }

    pub fn fail_adds(&self) {
        self.lock().fail_adds = true;
    }

    pub fn fail_removals(&self) {
        self.lock().fail_removals = true;
    }

    pub fn fail_roster(&self) {
        self.lock().fail_roster = true;
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn probed(&self) -> Vec<String> {
        self.lock().probed.clone()
    }

    fn refused(client_url: &str) -> Error {
        Error::Io(
            "connection refused",
            io::Error::new(io::ErrorKind::ConnectionRefused, client_url.to_string()),
        )
    }

    fn rejected(method: &'static str, client_url: &str, status: StatusCode) -> Error {
        Error::Status {
            method,
            url: client_url.to_string(),
            status,
        }
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn health(&self, client_url: &str) -> Result<bool> {
        let delay = {
            let mut state = self.lock();
            state.probed.push(client_url.to_string());
            state.delays.get(client_url).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.lock().health.get(client_url) {
            Some(Health::Healthy) => Ok(true),
            Some(Health::Unhealthy) => Ok(false),
            None => Err(Self::refused(client_url)),
        }
    }

    async fn list_members(&self, client_url: &str) -> Result<Vec<Member>> {
        let state = self.lock();

        if state.fail_roster {
            return Err(Self::rejected("GET", client_url, StatusCode::INTERNAL_SERVER_ERROR));
        }

        Ok(state.roster.clone())
    }

    async fn add_member(&self, client_url: &str, name: &str, peer_urls: &[String]) -> Result<()> {
        let mut state = self.lock();

        if state.fail_adds {
            return Err(Self::rejected("POST", client_url, StatusCode::CONFLICT));
        }

        state.calls.push(Call::Add {
            client_url: client_url.to_string(),
            name: name.to_string(),
            peer_urls: peer_urls.to_vec(),
        });
        state.next_id += 1;
        let id = MemberId::new(format!("added-{}", state.next_id));
        state.roster.push(Member {
            id: Some(id),
            name: name.to_string(),
            client_url: String::new(),
            peer_urls: peer_urls.to_vec(),
        });

        Ok(())
    }

    async fn remove_member(&self, client_url: &str, id: &MemberId) -> Result<()> {
        let mut state = self.lock();

        if state.fail_removals {
            return Err(Self::rejected("DELETE", client_url, StatusCode::NOT_FOUND));
        }

        state.calls.push(Call::Remove {
            client_url: client_url.to_string(),
            id: id.clone(),
        });
        state.roster.retain(|member| member.id.as_ref() != Some(id));

        Ok(())
    }
}
