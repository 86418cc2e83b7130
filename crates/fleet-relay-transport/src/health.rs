//! Read-only health probes.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};

use crate::RelayState;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub traccar_connected: bool,
    pub clients: usize,
    pub timestamp: DateTime<Utc>,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub traccar_connected: bool,
    pub clients: usize,
    /// Seconds since the relay started.
    pub uptime: f64,
    /// `None` when the platform does not expose process memory.
    pub memory: Option<MemoryUsage>,
}

/// Process memory in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub rss: u64,
    #[serde(rename = "virtual")]
    pub virtual_bytes: u64,
}

impl MemoryUsage {
    /// Sample the current process.
    #[must_use]
    pub fn sample() -> Option<Self> {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                tracing::debug!("Process memory unavailable: {e}");
                return None;
            }
        };
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
        system.process(pid).map(|p| Self {
            rss: p.memory(),
            virtual_bytes: p.virtual_memory(),
        })
    }
}

/// `GET /health`
pub async fn health_handler(State(state): State<RelayState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        traccar_connected: state.monitor.is_connected(),
        clients: state.hub.client_count(),
        timestamp: Utc::now(),
    })
}

/// `GET /status`
pub async fn status_handler(State(state): State<RelayState>) -> Json<StatusReport> {
    Json(StatusReport {
        traccar_connected: state.monitor.is_connected(),
        clients: state.hub.client_count(),
        uptime: state.uptime().as_secs_f64(),
        memory: MemoryUsage::sample(),
    })
}
