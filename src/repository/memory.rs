//! In-memory `Repository` fake, used by use-case and controller tests.
//! Supports injecting a canned error to exercise the fatal-fetch and
//! swallowed-update-failure paths.

use super::Repository;
use crate::domain::{InterfaceStatus, NetworkInterface};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryRepository {
    rows: Mutex<Vec<NetworkInterface>>,
    fail_fetch: Mutex<bool>,
    fail_update: Mutex<bool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new(rows: Vec<NetworkInterface>) -> Self {
        Self {
            rows: Mutex::new(rows),
            fail_fetch: Mutex::new(false),
            fail_update: Mutex::new(false),
        }
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock().expect("lock poisoned") = fail;
    }

    pub fn set_fail_update(&self, fail: bool) {
        *self.fail_update.lock().expect("lock poisoned") = fail;
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<(i64, InterfaceStatus)> {
        self.rows
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|r| (r.id, r.status))
            .collect()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_all_node_interfaces(&self, node: &str) -> Result<Vec<NetworkInterface>> {
        if *self.fail_fetch.lock().expect("lock poisoned") {
            return Err(AgentError::system(
                "fetching node interfaces",
                anyhow::anyhow!("simulated repository failure"),
            ));
        }
        Ok(self
            .rows
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|r| r.attached_node_name == node)
            .take(10)
            .cloned()
            .collect())
    }

    async fn get_active_interfaces(&self, node: &str) -> Result<Vec<NetworkInterface>> {
        self.get_all_node_interfaces(node).await
    }

    async fn update_interface_status(&self, id: i64, status: InterfaceStatus) -> Result<()> {
        if *self.fail_update.lock().expect("lock poisoned") {
            return Err(AgentError::system(
                "updating interface status",
                anyhow::anyhow!("simulated repository failure"),
            ));
        }
        let mut rows = self.rows.lock().expect("lock poisoned");
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.status = status;
        }
        Ok(())
    }
}
