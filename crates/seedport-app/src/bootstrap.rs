use std::sync::Arc;

use seedport_api::{ApiServer, ApiState, TorrentHandles};
use seedport_config::AppConfig;
use seedport_fsops::{
    ArtifactRule, DiskProbe, EvictionPolicy, EvictionService, Sandbox, StatvfsProbe,
};
use seedport_rpc::{AdmissionDefaults, RpcTorrentService, SessionClient};
use seedport_telemetry::{LogFormat, LoggingConfig, Metrics, ProcessSpan};
use seedport_torrent_core::{TorrentInspector, TorrentWorkflow};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the application.
pub(crate) struct BootstrapDependencies {
    config: AppConfig,
    telemetry: Metrics,
    session: Arc<SessionClient>,
    probe: Arc<dyn DiskProbe>,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            AppConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let session = SessionClient::new(&config.daemon)
            .map_err(|err| AppError::rpc("session_client.new", err))?;

        Ok(Self {
            config,
            telemetry,
            session: Arc::new(session),
            probe: Arc::new(StatvfsProbe),
        })
    }
}

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging or the HTTP listener fail.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        telemetry,
        session,
        probe,
    } = dependencies;

    let logging = LoggingConfig {
        level: &config.logging.level,
        format: log_format(config.logging.format),
        ..LoggingConfig::default()
    };
    seedport_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _span = ProcessSpan::enter("bootstrap");

    info!(
        content_root = %config.content_root.display(),
        daemon = %config.daemon.rpc_url,
        "Seedport bootstrap starting"
    );

    match session.handshake().await {
        Ok(_) => info!("daemon session established"),
        Err(err) => warn!(error = %err, "daemon unreachable at startup; session renews on demand"),
    }

    let service = Arc::new(RpcTorrentService::new(
        session,
        AdmissionDefaults::for_content_root(config.content_root.clone()),
    ));
    let workflow: Arc<dyn TorrentWorkflow> = service.clone();
    let inspector: Arc<dyn TorrentInspector> = service;

    let policy = artifact_rules(&config).into_iter().fold(
        EvictionPolicy::new(config.content_root.clone(), &config.eviction),
        EvictionPolicy::with_artifact,
    );
    let eviction = EvictionService::new(policy, probe, Arc::clone(&inspector), telemetry.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = eviction.spawn(config.eviction.interval, shutdown_requested(shutdown_rx));

    let state = ApiState::new(
        TorrentHandles::new(workflow, inspector),
        Sandbox::new(config.content_root.clone()),
        eviction,
        telemetry,
        config.export,
        config.api_key.clone(),
    );

    info!(addr = %config.bind_addr, "Launching API listener");
    let serve_result = ApiServer::new(state)
        .serve(config.bind_addr, shutdown_signal())
        .await;

    if shutdown_tx.send(true).is_err() {
        debug!("eviction scheduler already stopped");
    }
    if let Err(err) = scheduler.await {
        warn!(error = %err, "eviction scheduler join failed");
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

/// Daemon bookkeeping files cleared by the first eviction step.
fn artifact_rules(config: &AppConfig) -> Vec<ArtifactRule> {
    config
        .daemon
        .state_dir
        .as_ref()
        .map(|state_dir| {
            vec![
                ArtifactRule::new(state_dir.join("resume"), "*.resume"),
                ArtifactRule::new(state_dir.join("torrents"), "*.torrent"),
            ]
        })
        .unwrap_or_default()
}

const fn log_format(configured: Option<seedport_config::LogFormat>) -> LogFormat {
    match configured {
        Some(seedport_config::LogFormat::Json) => LogFormat::Json,
        Some(seedport_config::LogFormat::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    }
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        debug!("shutdown channel closed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Ok(AppConfig::from_lookup(|name| vars.get(name).cloned())?)
    }

    #[test]
    fn artifact_rules_cover_daemon_state_dir() -> anyhow::Result<()> {
        let config = config(&[("SEEDPORT_DAEMON_STATE_DIR", "/var/lib/daemon")])?;
        assert_eq!(
            artifact_rules(&config),
            vec![
                ArtifactRule::new("/var/lib/daemon/resume", "*.resume"),
                ArtifactRule::new("/var/lib/daemon/torrents", "*.torrent"),
            ]
        );
        Ok(())
    }

    #[test]
    fn artifact_rules_without_state_dir_are_empty() -> anyhow::Result<()> {
        let config = config(&[])?;
        assert!(artifact_rules(&config).is_empty());
        Ok(())
    }

    #[test]
    fn log_format_falls_back_to_build_profile() {
        assert_eq!(
            log_format(Some(seedport_config::LogFormat::Json)),
            LogFormat::Json
        );
        assert_eq!(
            log_format(Some(seedport_config::LogFormat::Pretty)),
            LogFormat::Pretty
        );
        assert_eq!(log_format(None), LogFormat::infer());
    }

    #[tokio::test]
    async fn shutdown_requested_resolves_once_flag_flips() -> anyhow::Result<()> {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(shutdown_requested(rx));
        tx.send(true)?;
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await??;
        Ok(())
    }
}
