//! Firewall threshold hot-reload support.
//!
//! Watches the TOML configuration file for changes and reloads the
//! [`FirewallConfig`] without restarting the server. The thresholds are stored
//! behind an `Arc<RwLock<FirewallConfig>>` so that concurrent readers
//! (decision handlers) are never blocked for more than the brief write-lock
//! duration during a reload.
//!
//! Reload triggers:
//!
//! - **File change**: [`start_file_watcher`] uses the [`notify`] crate
//!   to detect modifications to `linkpeek.toml`.
//! - **SIGHUP** (Unix only): [`start_sighup_handler`] listens for the
//!   HUP signal for manual reload via `kill -HUP <pid>`.
//!
//! Invalid configuration is handled fail-safe: the old thresholds are retained
//! and a warning is logged.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::config::{AppConfig, FirewallConfig};

/// Reload the firewall thresholds from disk, replacing the contents of the
/// `RwLock`.
///
/// On success the new thresholds are swapped in atomically. On failure (I/O
/// error, invalid TOML, missing env vars) the old thresholds are retained and
/// the error is returned.
pub fn reload_firewall_config(
    firewall_lock: &Arc<RwLock<FirewallConfig>>,
    config_path: &Path,
) -> crate::error::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    let mut firewall = firewall_lock.write().unwrap();
    *firewall = config.firewall;
    info!(
        "Firewall config reloaded from {} (high={}, medium={})",
        config_path.display(),
        firewall.high_risk_threshold,
        firewall.medium_risk_threshold
    );
    Ok(())
}

/// Start a file-system watcher that triggers [`reload_firewall_config`] on
/// config changes.
///
/// Returns a [`RecommendedWatcher`] handle that must be kept alive for the
/// duration of the watch. Dropping the handle stops the watcher.
pub fn start_file_watcher(
    config_path: PathBuf,
    firewall_lock: Arc<RwLock<FirewallConfig>>,
) -> notify::Result<RecommendedWatcher> {
    let path = config_path.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                info!("Config file changed, reloading firewall thresholds...");
                if let Err(e) = reload_firewall_config(&firewall_lock, &path) {
                    warn!("Firewall config reload failed (keeping old config): {}", e);
                }
            }
        }
        Err(e) => {
            warn!("File watcher error: {}", e);
        }
    })?;

    watcher.watch(&config_path, RecursiveMode::NonRecursive)?;
    info!("Watching {} for changes", config_path.display());
    Ok(watcher)
}

/// Start a SIGHUP handler that reloads the firewall config on signal.
///
/// On non-Unix platforms this is a no-op.
#[cfg(unix)]
pub fn start_sighup_handler(config_path: PathBuf, firewall_lock: Arc<RwLock<FirewallConfig>>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sig = signal(SignalKind::hangup()).expect("Failed to register SIGHUP handler");
        loop {
            sig.recv().await;
            info!("SIGHUP received, reloading firewall config...");
            if let Err(e) = reload_firewall_config(&firewall_lock, &config_path) {
                warn!("Firewall reload on SIGHUP failed (keeping old config): {}", e);
            }
        }
    });
}

/// No-op SIGHUP handler for non-Unix platforms.
#[cfg(not(unix))]
pub fn start_sighup_handler(_config_path: PathBuf, _firewall_lock: Arc<RwLock<FirewallConfig>>) {
    // SIGHUP is not available on this platform
}
