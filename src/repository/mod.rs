//! Read/update access to the `multi_interface` table.
//!
//! No direct precedent for a DB layer; grounded in the general "trait + real
//! impl + in-memory fake" shape used throughout larger async services.

pub mod memory;
pub mod postgres;

use crate::domain::{InterfaceStatus, NetworkInterface};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Rows where `attached_node_name = node AND deleted_at IS NULL`,
    /// limited to 10 per §6.
    async fn get_all_node_interfaces(&self, node: &str) -> Result<Vec<NetworkInterface>>;

    /// Same projection as `get_all_node_interfaces`, used for orphan
    /// detection.
    async fn get_active_interfaces(&self, node: &str) -> Result<Vec<NetworkInterface>>;

    /// Sets `netplan_success` to 1 (Configured) or 0 (otherwise) and bumps
    /// `modified_at`.
    async fn update_interface_status(&self, id: i64, status: InterfaceStatus) -> Result<()>;
}

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;
