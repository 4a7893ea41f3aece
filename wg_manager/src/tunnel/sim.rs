//! In-process stand-in for the tunnel engine.
//!
//! [`SimulatedEngine`] answers directives according to a per-tunnel
//! [`EngineScript`] and records every directive it receives. With
//! [`EngineScript::Manual`] it stays silent and the caller drives the
//! lifecycle through [`SimulatedEngine::emit`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::tunnel::config::TunnelConfiguration;
use crate::tunnel::engine::{EngineError, EngineEvent, EngineEventSender, TunnelEngine};
use crate::tunnel::types::TunnelId;

/// A directive received by the simulated engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start(TunnelId),
    Stop(TunnelId),
}

/// How the simulated engine answers a start directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineScript {
    /// Report `Activated` after `delay`
    Succeed { delay: Duration },
    /// Report `Failed(reason)` after `delay`
    Fail { delay: Duration, reason: String },
    /// Report `Waiting` at once, then `PrerequisiteMet` and `Activated` after `delay`
    WaitForNetwork { delay: Duration },
    /// Report nothing
    Manual,
}

#[derive(Default)]
struct SimState {
    scripts: HashMap<TunnelId, EngineScript>,
    commands: Vec<EngineCommand>,
    running: HashMap<TunnelId, TunnelConfiguration>,
    runtime_overrides: HashMap<TunnelId, TunnelConfiguration>,
    /// Bumped on every directive so late scripted reports can be dropped
    generations: HashMap<TunnelId, u64>,
    refuse_start: Option<String>,
    refuse_stop: Option<String>,
}

struct SimInner {
    events: EngineEventSender,
    default_script: EngineScript,
    state: Mutex<SimState>,
}

/// Scripted in-process [`TunnelEngine`].
#[derive(Clone)]
pub struct SimulatedEngine {
    inner: Arc<SimInner>,
}

impl SimulatedEngine {
    /// Create an engine answering every tunnel with `script`, plus the
    /// receiving end of its event channel (see
    /// [`TunnelsManager::attach_engine`](crate::TunnelsManager::attach_engine)).
    pub fn new(script: EngineScript) -> (Self, mpsc::UnboundedReceiver<(TunnelId, EngineEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = SimulatedEngine {
            inner: Arc::new(SimInner {
                events: tx,
                default_script: script,
                state: Mutex::new(SimState::default()),
            }),
        };
        (engine, rx)
    }

    /// An engine that never reports on its own.
    pub fn manual() -> (Self, mpsc::UnboundedReceiver<(TunnelId, EngineEvent)>) {
        Self::new(EngineScript::Manual)
    }

    /// Override the script for one tunnel.
    pub fn set_script(&self, id: TunnelId, script: EngineScript) {
        self.state().scripts.insert(id, script);
    }

    /// Make every following start directive fail synchronously.
    pub fn refuse_start(&self, reason: impl Into<String>) {
        self.state().refuse_start = Some(reason.into());
    }

    /// Make every following stop directive fail synchronously.
    pub fn refuse_stop(&self, reason: impl Into<String>) {
        self.state().refuse_stop = Some(reason.into());
    }

    /// Report the given configuration as the running one, e.g. to simulate
    /// an address assigned by the server.
    pub fn set_runtime_configuration(&self, id: TunnelId, configuration: TunnelConfiguration) {
        self.state().runtime_overrides.insert(id, configuration);
    }

    /// Send an event as if the engine had produced it.
    pub fn emit(&self, id: TunnelId, event: EngineEvent) {
        let _ = self.inner.events.send((id, event));
    }

    /// Every directive received so far, oldest first.
    pub fn commands(&self) -> Vec<EngineCommand> {
        self.state().commands.clone()
    }

    pub fn is_running(&self, id: TunnelId) -> bool {
        self.state().running.contains_key(&id)
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bump_generation(state: &mut SimState, id: TunnelId) -> u64 {
        let generation = state.generations.entry(id).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Send `events` after `delay`, unless another directive arrived meanwhile.
    fn report_later(&self, id: TunnelId, generation: u64, delay: Duration, events: Vec<EngineEvent>) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = engine.state().generations.get(&id).copied();
            if current != Some(generation) {
                debug!(id = %id, "Dropping superseded simulated report");
                return;
            }
            for event in events {
                if matches!(event, EngineEvent::Failed(_)) {
                    engine.state().running.remove(&id);
                }
                engine.emit(id, event);
            }
        });
    }
}

#[async_trait]
impl TunnelEngine for SimulatedEngine {
    async fn start_tunnel(
        &self,
        id: TunnelId,
        configuration: &TunnelConfiguration,
    ) -> Result<(), EngineError> {
        let (script, generation) = {
            let mut state = self.state();
            state.commands.push(EngineCommand::Start(id));
            if let Some(reason) = state.refuse_start.clone() {
                return Err(EngineError::Rejected(reason));
            }
            state.running.insert(id, configuration.clone());
            let script = state
                .scripts
                .get(&id)
                .cloned()
                .unwrap_or_else(|| self.inner.default_script.clone());
            (script, Self::bump_generation(&mut state, id))
        };

        debug!(id = %id, ?script, "Simulated engine starting tunnel");
        match script {
            EngineScript::Succeed { delay } => {
                self.report_later(id, generation, delay, vec![EngineEvent::Activated]);
            }
            EngineScript::Fail { delay, reason } => {
                self.report_later(id, generation, delay, vec![EngineEvent::Failed(reason)]);
            }
            EngineScript::WaitForNetwork { delay } => {
                self.emit(id, EngineEvent::Waiting);
                self.report_later(
                    id,
                    generation,
                    delay,
                    vec![EngineEvent::PrerequisiteMet, EngineEvent::Activated],
                );
            }
            EngineScript::Manual => {}
        }
        Ok(())
    }

    async fn stop_tunnel(&self, id: TunnelId) -> Result<(), EngineError> {
        let (script, generation) = {
            let mut state = self.state();
            state.commands.push(EngineCommand::Stop(id));
            if let Some(reason) = state.refuse_stop.clone() {
                return Err(EngineError::Rejected(reason));
            }
            state.running.remove(&id);
            let script = state
                .scripts
                .get(&id)
                .cloned()
                .unwrap_or_else(|| self.inner.default_script.clone());
            (script, Self::bump_generation(&mut state, id))
        };

        debug!(id = %id, "Simulated engine stopping tunnel");
        let delay = match script {
            EngineScript::Succeed { delay }
            | EngineScript::Fail { delay, .. }
            | EngineScript::WaitForNetwork { delay } => delay,
            EngineScript::Manual => return Ok(()),
        };
        self.report_later(id, generation, delay, vec![EngineEvent::Deactivated]);
        Ok(())
    }

    async fn runtime_configuration(&self, id: TunnelId) -> Option<TunnelConfiguration> {
        let state = self.state();
        let running = state.running.get(&id)?;
        Some(
            state
                .runtime_overrides
                .get(&id)
                .cloned()
                .unwrap_or_else(|| running.clone()),
        )
    }
}
