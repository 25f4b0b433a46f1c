pub mod clock;
pub mod command;
pub mod config;
pub mod configurer;
pub mod domain;
pub mod drift;
pub mod error;
pub mod fs;
pub mod health;
pub mod naming;
pub mod os_detect;
pub mod polling;
pub mod repository;
pub mod rollback;
pub mod usecase;
