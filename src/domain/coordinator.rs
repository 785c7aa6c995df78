//! Multi-asset coordinator.
//!
//! Owns one strategy loop thread per registered asset. The registry is
//! guarded by a single `RwLock`: adding, removing and (re)starting take the
//! write lock, status queries take the read lock. Worker threads are never
//! joined while the lock is held. Every loop shares the same
//! terminal, clock and immutable [`StrategyConfig`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::domain::strategy::StrategyConfig;
use crate::domain::strategy_loop::{AssetStrategy, LoopState, StrategyLoop, StrategyStatus};
use crate::domain::timeframe::Timeframe;
use crate::ports::clock_port::Clock;
use crate::ports::log_port::LogSink;
use crate::ports::terminal_port::TerminalPort;

struct Entry {
    strategy: Arc<AssetStrategy>,
    log: Arc<dyn LogSink>,
    worker: Option<JoinHandle<()>>,
}

impl Entry {
    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            join_worker(self.strategy.asset(), worker);
        }
    }
}

fn join_worker(asset: &str, worker: JoinHandle<()>) {
    if worker.join().is_err() {
        warn!(asset, "strategy thread panicked");
    }
}

pub struct Coordinator {
    terminal: Arc<dyn TerminalPort>,
    clock: Arc<dyn Clock>,
    config: Arc<StrategyConfig>,
    registry: RwLock<HashMap<String, Entry>>,
}

impl Coordinator {
    pub fn new(
        terminal: Arc<dyn TerminalPort>,
        clock: Arc<dyn Clock>,
        config: StrategyConfig,
    ) -> Self {
        Self {
            terminal,
            clock,
            config: Arc::new(config),
            registry: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(&self, strategy: &Arc<AssetStrategy>, log: &Arc<dyn LogSink>) -> Option<JoinHandle<()>> {
        let worker = StrategyLoop::new(
            Arc::clone(strategy),
            Arc::clone(&self.config),
            Arc::clone(&self.terminal),
            Arc::clone(&self.clock),
            Arc::clone(log),
        );
        match thread::Builder::new()
            .name(format!("strategy-{}", strategy.asset()))
            .spawn(move || worker.run())
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(asset = strategy.asset(), error = %err, "failed to spawn strategy thread");
                None
            }
        }
    }

    /// Registers and starts a loop for `asset`. Returns `false` if the asset
    /// is already registered or its thread could not be started.
    pub fn add(&self, asset: &str, timeframe: Timeframe, lot: f64, log: Arc<dyn LogSink>) -> bool {
        let mut registry = self.write();
        if registry.contains_key(asset) {
            return false;
        }

        let strategy = Arc::new(AssetStrategy::new(asset, timeframe, lot));
        let Some(worker) = self.spawn(&strategy, &log) else {
            return false;
        };
        info!(asset, %timeframe, lot, "strategy added");
        registry.insert(
            asset.to_string(),
            Entry {
                strategy,
                log,
                worker: Some(worker),
            },
        );
        true
    }

    /// Stops, deregisters and joins the loop for `asset`. Returns `false` if
    /// the asset was not registered.
    pub fn remove(&self, asset: &str) -> bool {
        let Some(mut entry) = self.write().remove(asset) else {
            return false;
        };
        entry.strategy.stop_signal().request_stop();
        entry.join();
        info!(asset, "strategy removed");
        true
    }

    /// Restarts every stopped loop. Running loops are left alone.
    ///
    /// A stopped worker may still be inside its last cycle; it is joined with
    /// the registry unlocked.
    pub fn start_all(&self) {
        let mut restarting: Vec<(Arc<AssetStrategy>, Option<JoinHandle<()>>)> = Vec::new();
        for entry in self.write().values_mut() {
            let alive = entry.worker.as_ref().is_some_and(|w| !w.is_finished());
            if entry.strategy.state() == LoopState::Running && alive {
                continue;
            }
            entry.strategy.stop_signal().request_stop();
            restarting.push((Arc::clone(&entry.strategy), entry.worker.take()));
        }

        for (strategy, worker) in &mut restarting {
            if let Some(worker) = worker.take() {
                join_worker(strategy.asset(), worker);
            }
        }

        let mut registry = self.write();
        for (strategy, _) in restarting {
            // Skip assets removed, re-added or restarted while we were joining.
            let Some(entry) = registry.get_mut(strategy.asset()) else {
                continue;
            };
            if !Arc::ptr_eq(&entry.strategy, &strategy) || entry.worker.is_some() {
                continue;
            }
            entry.strategy.stop_signal().resume();
            entry.worker = self.spawn(&entry.strategy, &entry.log);
            if entry.worker.is_none() {
                entry.strategy.stop_signal().request_stop();
            }
        }
    }

    /// Requests every loop to stop without waiting for it. Idempotent.
    pub fn stop_all(&self) {
        for entry in self.read().values() {
            entry.strategy.stop_signal().request_stop();
        }
    }

    pub fn status_of(&self, asset: &str) -> Option<StrategyStatus> {
        self.read().get(asset).map(|entry| entry.strategy.status())
    }

    /// Registered assets in lexical order.
    pub fn assets(&self) -> Vec<String> {
        let mut assets: Vec<String> = self.read().keys().cloned().collect();
        assets.sort();
        assets
    }

    /// Stops and joins every loop, leaving the registry empty.
    pub fn shutdown(&self) {
        let entries: Vec<Entry> = self.write().drain().map(|(_, entry)| entry).collect();
        for entry in &entries {
            entry.strategy.stop_signal().request_stop();
        }
        for mut entry in entries {
            entry.join();
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
