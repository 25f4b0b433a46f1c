//! The uniform capability set both OS adapters implement: `Configure`,
//! `Validate`, `Rollback`, `GetConfigDir`. Downstream code (the use-cases) is
//! polymorphic over this trait and never branches on OS type itself once a
//! `Configurer` is handed to it.

pub mod ifcfg;
pub mod netplan;

use crate::domain::{InterfaceName, NetworkInterface};
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait Configurer: Send + Sync {
    fn config_dir(&self) -> &str;

    /// Locates the existing on-disk config file for `name`, if any.
    async fn find_config_file(&self, name: &InterfaceName) -> Result<Option<PathBuf>>;

    /// Renders and activates configuration for `row` under the stable slot
    /// `name`. On failure the caller is expected to invoke `rollback`.
    async fn configure(&self, name: &InterfaceName, row: &NetworkInterface) -> Result<()>;

    /// Confirms the slot is realized in the kernel and reachable.
    async fn validate(&self, name: &InterfaceName) -> Result<()>;

    /// Deletes the slot's config file and re-applies, returning the system
    /// to its state before `configure` was attempted.
    async fn rollback(&self, name: &InterfaceName) -> Result<()>;
}

pub use ifcfg::IfcfgConfigurer;
pub use netplan::NetplanConfigurer;
