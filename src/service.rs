//! Real-time driver around an [`EncounterController`].
//!
//! The controller sits behind a mutex; a tokio task ticks it on an interval
//! and every event it produces is published as JSON on a broadcast channel.
//! The current phase is mirrored on a watch channel.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    arena::SimulatedArena,
    config::{ConfigLoader, EncounterConfig},
    encounter::EncounterController,
    wave::{WaveEvent, WavePhase},
};

pub type SharedController = Arc<Mutex<EncounterController<SimulatedArena>>>;

const EVENT_BUFFER: usize = 512;

/// Where `reload_config` reads from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub base_dir: PathBuf,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    pub waves: usize,
    pub tiers: usize,
    pub issues: Vec<String>,
}

pub struct EncounterService {
    controller: SharedController,
    events: broadcast::Sender<String>,
    phase: watch::Sender<WavePhase>,
    shutdown: watch::Sender<bool>,
    source: Option<ConfigSource>,
}

impl EncounterService {
    pub fn new(controller: EncounterController<SimulatedArena>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (phase, _) = watch::channel(controller.phase());
        let (shutdown, _) = watch::channel(false);
        Self {
            controller: Arc::new(Mutex::new(controller)),
            events,
            phase,
            shutdown,
            source: None,
        }
    }

    pub fn with_config_source(mut self, source: ConfigSource) -> Self {
        self.source = Some(source);
        self
    }

    /// JSON-encoded [`WaveEvent`]s, in emission order.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    pub fn watch_phase(&self) -> watch::Receiver<WavePhase> {
        self.phase.subscribe()
    }

    /// Runs `f` against the controller, then publishes whatever events it
    /// left behind.
    pub fn with_controller<R>(
        &self,
        f: impl FnOnce(&mut EncounterController<SimulatedArena>) -> R,
    ) -> R {
        let mut controller = self.controller.lock().expect("controller lock poisoned");
        let result = f(&mut controller);
        let events = controller.drain_events();
        let phase = controller.phase();
        drop(controller);
        self.publish(events, phase);
        result
    }

    /// Runs due timers. A wave end that reloaded loot also re-reads the
    /// chest settings from the config source, when there is one.
    pub fn tick(&self) {
        let mut controller = self.controller.lock().expect("controller lock poisoned");
        let events = controller.tick();
        let phase = controller.phase();
        drop(controller);
        let loot_reloaded = events
            .iter()
            .any(|e| matches!(e, WaveEvent::LootReloadRequested));
        self.publish(events, phase);
        if loot_reloaded {
            if let Some(config) = self.reread_config() {
                self.with_controller(|c| c.apply_chest_config(config));
            }
        }
    }

    /// Starts a new loot epoch with freshly read chest settings.
    pub fn reload_loot(&self) {
        let config = self.reread_config();
        self.with_controller(|c| {
            if let Some(config) = config {
                c.apply_chest_config(config);
            }
            c.reload_loot();
        });
    }

    /// Re-reads the configuration file and applies it without touching the
    /// run phase.
    pub fn reload_config(&self) -> Result<ReloadSummary> {
        let source = self
            .source
            .as_ref()
            .context("no configuration file to reload from")?;
        let report = ConfigLoader::new(&source.base_dir).load(&source.file)?;
        let summary = ReloadSummary {
            waves: report.config.plan.len(),
            tiers: report.config.catalog.tier_names().count(),
            issues: report.issues.iter().map(ToString::to_string).collect(),
        };
        self.with_controller(|c| c.apply_config(report.config));
        info!(waves = summary.waves, tiers = summary.tiers, "configuration reloaded");
        Ok(summary)
    }

    /// Ticks the controller every `period` until [`EncounterService::shutdown`].
    pub fn spawn_driver(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => service.tick(),
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("encounter driver stopped");
        })
    }

    /// Stops any running waves and ends the driver loop.
    pub fn shutdown(&self) {
        let stopped = self.with_controller(|c| c.stop_waves());
        if stopped {
            info!("waves stopped for shutdown");
        }
        self.shutdown.send_replace(true);
    }

    fn reread_config(&self) -> Option<EncounterConfig> {
        let source = self.source.as_ref()?;
        match ConfigLoader::new(&source.base_dir).load(&source.file) {
            Ok(report) => Some(report.config),
            Err(err) => {
                warn!("keeping current loot tables: {err:#}");
                None
            }
        }
    }

    fn publish(&self, events: Vec<WaveEvent>, phase: WavePhase) {
        for event in &events {
            match serde_json::to_string(event) {
                // No subscribers is fine.
                Ok(payload) => {
                    let _ = self.events.send(payload);
                }
                Err(err) => warn!("failed to encode wave event: {err}"),
            }
        }
        self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
    }
}
