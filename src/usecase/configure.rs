//! The reconcile-create-or-repair use-case.
//!
//! Per-interface work is dispatched over a bounded worker pool. The other
//! leaf abstractions in this crate hold borrowed, non-`'static` trait-object
//! references, so the pool is built with `futures::stream::buffer_unordered`
//! rather than `tokio::spawn`: it gets genuine concurrent progress on the
//! I/O-bound `.await` points inside each worker without requiring every
//! dependency to become `Arc<dyn Trait>` just to satisfy `spawn`'s `'static`
//! bound.

use crate::configurer::Configurer;
use crate::domain::{InterfaceStatus, NetworkInterface};
use crate::drift::DriftDetector;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::health::Counters;
use crate::naming::InterfaceNamingService;
use crate::os_detect::OsType;
use crate::repository::Repository;
use crate::rollback::Rollbacker;
use futures::stream::{self, StreamExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigureOutcome {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ConfigureOutcome {
    #[must_use]
    pub fn has_work(&self) -> bool {
        self.processed + self.failed > 0
    }
}

/// What happened to a single row this tick. `NoOp` (already up to date)
/// contributes to neither `processed` nor `failed` in the tick outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Configured,
    NoOp,
    Failed,
}

pub struct ConfigureNetworkUseCase<'a> {
    repository: &'a dyn Repository,
    fs: &'a dyn FileSystem,
    configurer: &'a dyn Configurer,
    naming: &'a InterfaceNamingService<'a>,
    os: OsType,
    counters: &'a Counters,
    max_concurrent_tasks: usize,
}

impl<'a> ConfigureNetworkUseCase<'a> {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: &'a dyn Repository,
        fs: &'a dyn FileSystem,
        configurer: &'a dyn Configurer,
        naming: &'a InterfaceNamingService<'a>,
        os: OsType,
        counters: &'a Counters,
        max_concurrent_tasks: usize,
    ) -> Self {
        Self {
            repository,
            fs,
            configurer,
            naming,
            os,
            counters,
            max_concurrent_tasks: max_concurrent_tasks.max(1),
        }
    }

    /// Runs one tick for `node`. Repository fetch failures are fatal and
    /// propagate; everything a single row can fail on is counted instead.
    pub async fn run(&self, node: &str) -> Result<ConfigureOutcome> {
        let rows = self.repository.get_all_node_interfaces(node).await?;
        let total = rows.len();

        let results: Vec<RowOutcome> = stream::iter(rows)
            .map(|row| self.process_row(row))
            .buffer_unordered(self.max_concurrent_tasks)
            .collect()
            .await;

        let processed = results.iter().filter(|o| **o == RowOutcome::Configured).count();
        let failed = results.iter().filter(|o| **o == RowOutcome::Failed).count();

        Ok(ConfigureOutcome {
            processed,
            failed,
            total,
        })
    }

    /// Processes a single row end to end. Never returns `Err`: every failure
    /// mode here is row-scoped, caught, and folded into `RowOutcome::Failed`.
    async fn process_row(&self, row: NetworkInterface) -> RowOutcome {
        match self.try_process_row(&row).await {
            Ok(true) => {
                self.counters.record_processed();
                RowOutcome::Configured
            }
            Ok(false) => RowOutcome::NoOp,
            Err(e) => {
                log::warn!(
                    "interface {} (mac {}) failed this tick: {e}",
                    row.id,
                    row.mac_address
                );
                self.counters.record_failed();
                self.persist_status(row.id, InterfaceStatus::Failed).await;
                RowOutcome::Failed
            }
        }
    }

    /// Returns `Ok(true)` when the row was (re)configured this tick, `Ok(false)`
    /// when it was already up to date and left untouched.
    async fn try_process_row(&self, row: &NetworkInterface) -> Result<bool> {
        row.validate()?;

        let name = self.naming.allocate_for(&row.mac_address).await?;

        let existing_path = self.configurer.find_config_file(&name).await?;
        let contents = match &existing_path {
            Some(path) => self.fs.read_to_string(path).await.ok(),
            None => None,
        };

        let drift = DriftDetector::detect(contents.as_deref(), row, self.os);
        let should_process =
            existing_path.is_none() || drift.is_drifted || row.status == InterfaceStatus::Pending;

        if !should_process {
            return Ok(false);
        }

        if let Some(kind) = drift.kind {
            log::info!("drift detected for {name} ({row:?}): {kind:?}");
        }

        let rollbacker = Rollbacker::new(self.configurer);

        if let Err(e) = self.configurer.configure(&name, row).await {
            let _ = rollbacker.rollback(&name, &e.to_string()).await;
            return Err(e);
        }

        if let Err(e) = self.configurer.validate(&name).await {
            let _ = rollbacker.rollback(&name, &e.to_string()).await;
            return Err(e);
        }

        self.persist_status(row.id, InterfaceStatus::Configured).await;
        Ok(true)
    }

    async fn persist_status(&self, id: i64, status: InterfaceStatus) {
        if let Err(e) = self.repository.update_interface_status(id, status).await {
            log::warn!("failed to persist status for interface {id}: {e}");
        }
    }
}
