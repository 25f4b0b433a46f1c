//! Process bootstrap: loads configuration, wires the leaf abstractions and
//! the OS-specific configurer, then drives the reconcile loop until a
//! shutdown signal arrives.

use multinic_agent::clock::SystemClock;
use multinic_agent::command::{CommandExecutor, ContainerMode, RealCommandExecutor};
use multinic_agent::config::{AgentConfig, PollingStrategyKind};
use multinic_agent::configurer::{Configurer, IfcfgConfigurer, NetplanConfigurer};
use multinic_agent::fs::{FileSystem, RealFileSystem};
use multinic_agent::health::{Counters, HealthReporter};
use multinic_agent::naming::{InterfaceNamingService, PnetInterfaceLister};
use multinic_agent::os_detect::{OsDetector, OsType};
use multinic_agent::polling::{Adaptive, ExponentialBackoff, PollingController, Strategy, TickSignal};
use multinic_agent::repository::{PgRepository, Repository};
use multinic_agent::usecase::{ConfigureNetworkUseCase, DeleteNetworkUseCase};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = AgentConfig::load()?;
    log::info!("multinic-agent starting up");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let fs = RealFileSystem;
    let in_container = matches!(config.container_mode, ContainerMode::Forced)
        || (matches!(config.container_mode, ContainerMode::Auto)
            && std::path::Path::new("/host").exists());
    let commands = RealCommandExecutor::new(config.container_mode);
    let interfaces = PnetInterfaceLister;
    let clock = SystemClock;

    let os_detector = OsDetector::new(&fs, in_container);
    let os = os_detector.detect().await?;
    log::info!("detected OS: {os:?}");

    let repository = PgRepository::connect(&config.database_url).await?;
    let naming = InterfaceNamingService::new(&commands, &interfaces);
    let counters = Counters::new();
    let started_at = Instant::now();
    let health = HealthReporter::new(&counters, started_at, os);

    let node = InterfaceNamingService::hostname()?;
    log::info!("reconciling interfaces for node {node}");

    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    match config.polling_strategy {
        PollingStrategyKind::Backoff => {
            let strategy = ExponentialBackoff::new(
                config.poll_base_interval,
                config.poll_max_interval,
                config.poll_multiplier,
            );
            run_loop(
                strategy,
                &repository,
                &fs,
                &commands,
                &naming,
                &clock,
                os,
                &config,
                &counters,
                &health,
                &node,
                &shutdown,
            )
            .await;
        }
        PollingStrategyKind::Adaptive => {
            let strategy = Adaptive::new(
                config.adaptive_min_interval,
                config.poll_max_interval,
                config.adaptive_idle_interval,
            );
            run_loop(
                strategy,
                &repository,
                &fs,
                &commands,
                &naming,
                &clock,
                os,
                &config,
                &counters,
                &health,
                &node,
                &shutdown,
            )
            .await;
        }
    }

    log::info!("multinic-agent shutting down");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_loop<S: Strategy>(
    strategy: S,
    repository: &PgRepository,
    fs: &RealFileSystem,
    commands: &RealCommandExecutor,
    naming: &InterfaceNamingService<'_>,
    clock: &SystemClock,
    os: OsType,
    config: &AgentConfig,
    counters: &Counters,
    health: &HealthReporter<'_>,
    node: &str,
    shutdown: &CancellationToken,
) {
    let mut controller = PollingController::new(strategy);

    controller
        .run(shutdown, || async {
            let configurer: Box<dyn Configurer + '_> = match os {
                OsType::Ubuntu => {
                    Box::new(NetplanConfigurer::new(fs, commands, clock, &config.backup_dir))
                }
                OsType::Rhel => Box::new(IfcfgConfigurer::new(fs, commands, &config.backup_dir)),
            };

            run_tick(
                repository,
                fs,
                configurer.as_ref(),
                naming,
                os,
                config.max_concurrent_tasks,
                counters,
                node,
            )
            .await
        })
        .await;

    let _ = health.snapshot(|| Ok(()));
}

#[allow(clippy::too_many_arguments)]
async fn run_tick(
    repository: &dyn Repository,
    fs: &dyn FileSystem,
    configurer: &dyn Configurer,
    naming: &InterfaceNamingService<'_>,
    os: OsType,
    max_concurrent_tasks: usize,
    counters: &Counters,
    node: &str,
) -> TickSignal {
    let configure_usecase =
        ConfigureNetworkUseCase::new(repository, fs, configurer, naming, os, counters, max_concurrent_tasks);
    let configure_outcome = match configure_usecase.run(node).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("tick failed during interface fetch or OS detection: {e}");
            return TickSignal::Failure;
        }
    };

    let delete_usecase = DeleteNetworkUseCase::new(repository, fs, configurer, os);
    let delete_outcome = match delete_usecase.run(node).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("orphan cleanup failed: {e}");
            return TickSignal::Failure;
        }
    };

    if !delete_outcome.deleted.is_empty() {
        log::info!("removed orphaned configs: {:?}", delete_outcome.deleted);
    }

    if configure_outcome.processed + delete_outcome.deleted.len() > 0 {
        TickSignal::HasWork
    } else {
        TickSignal::NoWork
    }
}

fn install_signal_handlers(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(s) => s,
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {e}");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        log::info!("shutdown signal received, finishing the in-flight tick");
        shutdown.cancel();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        log::warn!("second shutdown signal received, forcing exit");
        std::process::exit(0);
    });
}
