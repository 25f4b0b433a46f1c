//! The two per-tick use-cases the `PollingController` drives. Each is
//! constructed fresh per tick from borrowed references to the leaf
//! abstractions, rather than held across ticks, since none of them carry
//! state of their own beyond the atomic counters returned to the caller.

pub mod configure;
pub mod delete;

pub use configure::{ConfigureNetworkUseCase, ConfigureOutcome};
pub use delete::{DeleteNetworkUseCase, DeleteOutcome};
