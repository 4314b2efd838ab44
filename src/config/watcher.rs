//! Hot reload of the gate policy from the config file.
//!
//! Only the sections that feed the gate policy (routes, exclusions, rate
//! limit, deployment mode) apply live. Changes anywhere else are logged and
//! wait for a restart.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GateConfig;

/// Sections compared on reload, split by whether the running gate can apply them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    pub live: Vec<&'static str>,
    pub restart_only: Vec<&'static str>,
}

impl ConfigDiff {
    pub fn between(old: &GateConfig, new: &GateConfig) -> Self {
        let mut diff = Self::default();

        let mut live = |name, changed: bool| {
            if changed {
                diff.live.push(name);
            }
        };
        live("routes", old.routes != new.routes);
        live("exclusions", old.exclusions != new.exclusions);
        live("rate_limit", old.rate_limit != new.rate_limit);
        live("security.mode", old.security.mode != new.security.mode);

        let mut restart = |name, changed: bool| {
            if changed {
                diff.restart_only.push(name);
            }
        };
        restart("listener", old.listener != new.listener);
        restart("upstream", old.upstream != new.upstream);
        restart("auth", old.auth != new.auth);
        restart("timeouts", old.timeouts != new.timeouts);
        restart("observability", old.observability != new.observability);
        restart(
            "security.max_body_size",
            old.security.max_body_size != new.security.max_body_size,
        );

        diff
    }
}

/// Watches the config file and forwards policy-relevant updates.
pub struct ConfigWatcher {
    path: PathBuf,
    current: Mutex<GateConfig>,
    update_tx: mpsc::UnboundedSender<GateConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration the server started with.
    pub fn new(path: &Path, current: GateConfig) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current: Mutex::new(current),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Dropping the returned handle stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => self.reload(),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }

    fn reload(&self) {
        let new_config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Config reload rejected, keeping current policy");
                return;
            }
        };

        let Ok(mut current) = self.current.lock() else {
            tracing::error!("Config watcher state poisoned");
            return;
        };

        let diff = ConfigDiff::between(&current, &new_config);
        if !diff.restart_only.is_empty() {
            tracing::warn!(sections = ?diff.restart_only, "Changes take effect after restart");
        }
        if diff.live.is_empty() {
            tracing::debug!("Config file touched, gate policy unchanged");
            return;
        }

        tracing::info!(sections = ?diff.live, "Applying gate policy update");
        *current = new_config.clone();
        if self.update_tx.send(new_config).is_err() {
            tracing::debug!("Config update receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentMode;

    #[test]
    fn test_identical_configs() {
        let config = GateConfig::default();
        assert_eq!(ConfigDiff::between(&config, &config.clone()), ConfigDiff::default());
    }

    #[test]
    fn test_live_and_restart_sections() {
        let old = GateConfig::default();
        let mut new = old.clone();
        new.rate_limit.max_requests = 10;
        new.security.mode = DeploymentMode::Production;
        new.upstream.address = "127.0.0.1:4000".to_string();

        let diff = ConfigDiff::between(&old, &new);
        assert_eq!(diff.live, vec!["rate_limit", "security.mode"]);
        assert_eq!(diff.restart_only, vec!["upstream"]);
    }

    #[test]
    fn test_reload_forwards_policy_changes_only() {
        let dir = std::env::temp_dir().join(format!("portal-gate-watch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gate.toml");

        let (watcher, mut updates) = ConfigWatcher::new(&path, GateConfig::default());

        std::fs::write(&path, "[upstream]\naddress = \"127.0.0.1:4000\"\n").unwrap();
        watcher.reload();
        assert!(updates.try_recv().is_err());

        std::fs::write(&path, "[rate_limit]\nmax_requests = 5\n").unwrap();
        watcher.reload();
        assert_eq!(updates.try_recv().unwrap().rate_limit.max_requests, 5);

        std::fs::write(&path, "not = [valid").unwrap();
        watcher.reload();
        assert!(updates.try_recv().is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
