//! Shared handles passed to every request handler.

use std::sync::Arc;

use seedport_config::ExportSettings;
use seedport_fsops::{EvictionService, Sandbox};
use seedport_telemetry::Metrics;
use seedport_torrent_core::{TorrentInspector, TorrentWorkflow};

/// Daemon-facing handles used by the HTTP surface.
#[derive(Clone)]
pub struct TorrentHandles {
    workflow: Arc<dyn TorrentWorkflow>,
    inspector: Arc<dyn TorrentInspector>,
}

impl TorrentHandles {
    /// Bundle the workflow and inspector implementations.
    #[must_use]
    pub fn new(workflow: Arc<dyn TorrentWorkflow>, inspector: Arc<dyn TorrentInspector>) -> Self {
        Self {
            workflow,
            inspector,
        }
    }

    /// Mutating operations.
    #[must_use]
    pub fn workflow(&self) -> &Arc<dyn TorrentWorkflow> {
        &self.workflow
    }

    /// Read-only operations.
    #[must_use]
    pub fn inspector(&self) -> &Arc<dyn TorrentInspector> {
        &self.inspector
    }
}

/// State shared by all handlers.
pub struct ApiState {
    pub(crate) torrents: TorrentHandles,
    pub(crate) sandbox: Sandbox,
    pub(crate) eviction: EvictionService,
    pub(crate) telemetry: Metrics,
    pub(crate) export: ExportSettings,
    pub(crate) api_key: Option<String>,
}

impl ApiState {
    /// Assemble handler state.
    #[must_use]
    pub fn new(
        torrents: TorrentHandles,
        sandbox: Sandbox,
        eviction: EvictionService,
        telemetry: Metrics,
        export: ExportSettings,
        api_key: Option<String>,
    ) -> Self {
        Self {
            torrents,
            sandbox,
            eviction,
            telemetry,
            export,
            api_key,
        }
    }
}
