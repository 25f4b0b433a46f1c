//! Rollbacker: paired 1:1 with a `Configurer`, invoked by the use-cases
//! whenever a configure/validate step fails mid-row, or an orphan is found.
//! Kept as a thin named seam rather than folded into the use-cases directly,
//! since both `ConfigureNetworkUseCase` and `DeleteNetworkUseCase` call it
//! for unrelated reasons (repair vs. cleanup) and logging each the same way
//! is worth a single call site.

use crate::configurer::Configurer;
use crate::domain::InterfaceName;
use crate::error::Result;

pub struct Rollbacker<'a> {
    configurer: &'a dyn Configurer,
}

impl<'a> Rollbacker<'a> {
    #[must_use]
    pub fn new(configurer: &'a dyn Configurer) -> Self {
        Self { configurer }
    }

    pub async fn rollback(&self, name: &InterfaceName, reason: &str) -> Result<()> {
        log::warn!("rolling back {name}: {reason}");
        self.configurer.rollback(name).await
    }
}
