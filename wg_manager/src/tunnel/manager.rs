//! Tunnel management.
//!
//! [`TunnelsManager`] owns every tunnel record, validates requests against
//! the status state machine, hands directives to the engine and publishes a
//! [`TunnelEvent`] after each change to a record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::tunnel::config::TunnelConfiguration;
use crate::tunnel::engine::{EngineEvent, TunnelEngine};
use crate::tunnel::error::{TunnelError, TunnelResult};
use crate::tunnel::events::{EventHub, Subscription, SubscriptionId, TunnelEvent};
use crate::tunnel::on_demand::{ActivateOnDemandSetting, NetworkConditions};
use crate::tunnel::state::{self, TransitionError, Trigger};
use crate::tunnel::types::{RuntimeStats, TunnelId, TunnelSnapshot, TunnelStatus};

const WATCHDOG_FAILURE: &str = "timed out waiting for the tunnel engine";

/// Tuning knobs for a [`TunnelsManager`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// How long a tunnel may stay `Activating` before it is failed
    pub activation_timeout: Duration,

    /// How long a tunnel may stay `Deactivating`, `Restarting` or
    /// `Reasserting`
    pub deactivation_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions {
            activation_timeout: Duration::from_secs(30),
            deactivation_timeout: Duration::from_secs(15),
        }
    }
}

impl ManagerOptions {
    fn timeout_for(&self, status: TunnelStatus) -> Option<Duration> {
        match status {
            TunnelStatus::Activating => Some(self.activation_timeout),
            TunnelStatus::Deactivating | TunnelStatus::Restarting | TunnelStatus::Reasserting => {
                Some(self.deactivation_timeout)
            }
            _ => None,
        }
    }
}

struct TunnelRecord {
    configuration: TunnelConfiguration,
    status: TunnelStatus,
    activate_on_demand: Option<ActivateOnDemandSetting>,
    runtime_stats: Option<RuntimeStats>,
    /// Bumped on every status change; lets a watchdog tell whether the
    /// transition it guards is still the current one.
    transition_seq: u64,
    /// A stop was sent after the record had already settled (cancelled
    /// wait, watchdog expiry); the engine still owes a `Deactivated` for it.
    stop_owed: bool,
}

impl TunnelRecord {
    fn name(&self) -> &str {
        &self.configuration.name
    }

    fn snapshot(&self, id: TunnelId) -> TunnelSnapshot {
        TunnelSnapshot {
            id,
            name: self.configuration.name.clone(),
            configuration: self.configuration.clone(),
            status: self.status,
            activate_on_demand: self.activate_on_demand.clone(),
            runtime_stats: self.runtime_stats.clone(),
        }
    }
}

type TunnelMap = HashMap<TunnelId, TunnelRecord>;

/// Outcome of a status transition applied to a record.
#[derive(Debug, Clone, Copy)]
struct Applied {
    old: TunnelStatus,
    new: TunnelStatus,
    seq: u64,
}

/// Registry of tunnels and coordinator of their lifecycle.
///
/// Cheap to clone; clones share the same registry. Construct one per process
/// and hand it to whatever needs it.
#[derive(Clone)]
pub struct TunnelsManager {
    /// Registered tunnels
    tunnels: Arc<Mutex<TunnelMap>>,

    /// Subscribers to tunnel events
    events: Arc<EventHub>,

    /// The engine doing the actual work
    engine: Arc<dyn TunnelEngine>,

    /// Timeout tasks guarding in-flight transitions
    watchdogs: Arc<Mutex<HashMap<TunnelId, JoinHandle<()>>>>,

    options: ManagerOptions,
}

impl TunnelsManager {
    /// Create a new tunnels manager with default options.
    pub fn new(engine: Arc<dyn TunnelEngine>) -> Self {
        Self::with_options(engine, ManagerOptions::default())
    }

    pub fn with_options(engine: Arc<dyn TunnelEngine>, options: ManagerOptions) -> Self {
        TunnelsManager {
            tunnels: Arc::new(Mutex::new(HashMap::new())),
            events: Arc::new(EventHub::new()),
            engine,
            watchdogs: Arc::new(Mutex::new(HashMap::new())),
            options,
        }
    }

    /// Register a new tunnel.
    pub fn create(&self, configuration: TunnelConfiguration) -> TunnelResult<TunnelId> {
        self.create_with_on_demand(configuration, None)
    }

    /// Register a new tunnel together with its on-demand policy.
    pub fn create_with_on_demand(
        &self,
        configuration: TunnelConfiguration,
        activate_on_demand: Option<ActivateOnDemandSetting>,
    ) -> TunnelResult<TunnelId> {
        configuration.validate()?;

        let mut tunnels = self.lock_tunnels();
        if tunnels.values().any(|r| r.name() == configuration.name) {
            return Err(TunnelError::DuplicateName(configuration.name));
        }

        let id = TunnelId::new();
        let name = configuration.name.clone();
        tunnels.insert(
            id,
            TunnelRecord {
                configuration,
                status: TunnelStatus::Inactive,
                activate_on_demand,
                runtime_stats: None,
                transition_seq: 0,
                stop_owed: false,
            },
        );
        self.events.publish(TunnelEvent::Added {
            id,
            name: name.clone(),
        });

        info!(tunnel = %name, id = %id, "Added tunnel to manager");
        Ok(id)
    }

    /// Remove an inactive tunnel.
    pub fn remove(&self, id: TunnelId) -> TunnelResult<()> {
        let mut tunnels = self.lock_tunnels();
        let record = tunnels.get(&id).ok_or(TunnelError::NotFound(id))?;
        if record.status != TunnelStatus::Inactive {
            return Err(TunnelError::InvalidTransition {
                name: record.name().to_string(),
                status: record.status,
                action: "remove",
            });
        }

        let record = tunnels.remove(&id).ok_or(TunnelError::NotFound(id))?;
        let name = record.configuration.name;
        self.events.publish(TunnelEvent::Removed {
            id,
            name: name.clone(),
        });

        info!(tunnel = %name, id = %id, "Tunnel removed from manager");
        Ok(())
    }

    /// Ask the engine to bring a tunnel up.
    ///
    /// Returns once the engine has accepted the directive; the outcome is
    /// published as a [`TunnelEvent::StatusChanged`].
    pub async fn start_activation(&self, id: TunnelId) -> TunnelResult<()> {
        let (applied, name, configuration) = {
            let mut tunnels = self.lock_tunnels();
            let applied =
                self.apply_transition(&mut tunnels, id, Trigger::ActivationRequested, None)?;
            let record = tunnels.get(&id).ok_or(TunnelError::NotFound(id))?;
            (
                applied,
                record.name().to_string(),
                record.configuration.clone(),
            )
        };

        info!(tunnel = %name, id = %id, "Starting activation");
        if let Err(e) = self.engine.start_tunnel(id, &configuration).await {
            error!(tunnel = %name, id = %id, error = %e, "Engine refused activation");
            self.fail_if_current(id, applied.seq, e.to_string());
            return Err(TunnelError::EngineFailure(e.to_string()));
        }
        Ok(())
    }

    /// Ask the engine to bring a tunnel down.
    ///
    /// A tunnel waiting for a prerequisite is cancelled straight back to
    /// `Inactive`.
    pub async fn start_deactivation(&self, id: TunnelId) -> TunnelResult<()> {
        let (applied, name) = {
            let mut tunnels = self.lock_tunnels();
            let applied =
                self.apply_transition(&mut tunnels, id, Trigger::DeactivationRequested, None)?;
            let record = tunnels.get_mut(&id).ok_or(TunnelError::NotFound(id))?;
            if applied.old == TunnelStatus::Waiting {
                record.stop_owed = true;
            }
            (applied, record.name().to_string())
        };

        info!(tunnel = %name, id = %id, from = %applied.old, "Starting deactivation");
        match applied.old {
            // The engine is already tearing the tunnel down
            TunnelStatus::Restarting => Ok(()),
            TunnelStatus::Waiting => {
                if let Err(e) = self.engine.stop_tunnel(id).await {
                    warn!(tunnel = %name, id = %id, error = %e, "Engine did not acknowledge cancellation");
                    self.forget_owed_stop(id);
                }
                Ok(())
            }
            _ => {
                if let Err(e) = self.engine.stop_tunnel(id).await {
                    error!(tunnel = %name, id = %id, error = %e, "Engine refused deactivation");
                    self.fail_if_current(id, applied.seq, e.to_string());
                    return Err(TunnelError::EngineFailure(e.to_string()));
                }
                Ok(())
            }
        }
    }

    /// Replace a tunnel's configuration.
    ///
    /// An inactive tunnel just takes the new configuration. A running one is
    /// restarted with it: it passes through `Restarting` and `Activating`
    /// back to `Active`.
    pub async fn modify(&self, id: TunnelId, configuration: TunnelConfiguration) -> TunnelResult<()> {
        configuration.validate()?;

        let applied = {
            let mut tunnels = self.lock_tunnels();
            if tunnels
                .iter()
                .any(|(other, r)| *other != id && r.name() == configuration.name)
            {
                return Err(TunnelError::DuplicateName(configuration.name));
            }

            let record = tunnels.get_mut(&id).ok_or(TunnelError::NotFound(id))?;
            state::transition(record.status, Trigger::ConfigurationChanged).map_err(|e| {
                rejection(e, record.name(), record.status, "modify")
            })?;

            let old_name = std::mem::replace(&mut record.configuration, configuration).name;
            if old_name != record.name() {
                info!(id = %id, from = %old_name, to = %record.name(), "Tunnel renamed");
            }
            self.events.publish(TunnelEvent::ConfigChanged {
                id,
                name: record.name().to_string(),
            });

            self.apply_transition(&mut tunnels, id, Trigger::ConfigurationChanged, None)?
        };

        if applied.new == TunnelStatus::Restarting {
            info!(id = %id, "Restarting tunnel with new configuration");
            if let Err(e) = self.engine.stop_tunnel(id).await {
                error!(id = %id, error = %e, "Engine refused restart");
                self.fail_if_current(id, applied.seq, e.to_string());
                return Err(TunnelError::EngineFailure(e.to_string()));
            }
        }
        Ok(())
    }

    /// Replace a tunnel's on-demand policy.
    pub fn set_on_demand(
        &self,
        id: TunnelId,
        setting: Option<ActivateOnDemandSetting>,
    ) -> TunnelResult<()> {
        let mut tunnels = self.lock_tunnels();
        let record = tunnels.get_mut(&id).ok_or(TunnelError::NotFound(id))?;
        record.activate_on_demand = setting;
        self.events.publish(TunnelEvent::ConfigChanged {
            id,
            name: record.name().to_string(),
        });
        debug!(tunnel = %record.name(), "On-demand policy updated");
        Ok(())
    }

    /// Start every inactive tunnel whose on-demand policy matches `network`.
    ///
    /// Returns the tunnels whose activation was handed to the engine.
    pub async fn apply_network_conditions(&self, network: &NetworkConditions) -> Vec<TunnelId> {
        let mut candidates: Vec<(String, TunnelId)> = {
            let tunnels = self.lock_tunnels();
            tunnels
                .iter()
                .filter(|(_, r)| r.status == TunnelStatus::Inactive)
                .filter(|(_, r)| {
                    r.activate_on_demand
                        .as_ref()
                        .is_some_and(|s| s.should_activate(network))
                })
                .map(|(id, r)| (r.name().to_string(), *id))
                .collect()
        };
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let mut started = Vec::new();
        for (name, id) in candidates {
            match self.start_activation(id).await {
                Ok(()) => {
                    info!(tunnel = %name, ?network, "Activated on demand");
                    started.push(id);
                }
                Err(e) => {
                    warn!(tunnel = %name, error = %e, "On-demand activation skipped");
                }
            }
        }
        started
    }

    /// Feed one engine report into the manager.
    ///
    /// Returns false when the report does not apply to the tunnel's current
    /// status (or the tunnel is gone) and was ignored.
    pub async fn handle_engine_event(&self, id: TunnelId, event: EngineEvent) -> bool {
        let (trigger, failure) = match event {
            EngineEvent::Activated => (Trigger::EngineActivated, None),
            EngineEvent::Deactivated => (Trigger::EngineDeactivated, None),
            EngineEvent::Reasserting => (Trigger::EngineReasserting, None),
            EngineEvent::Reasserted => (Trigger::EngineReasserted, None),
            EngineEvent::Waiting => (Trigger::EngineWaiting, None),
            EngineEvent::PrerequisiteMet => (Trigger::PrerequisiteMet, None),
            EngineEvent::Failed(reason) => (Trigger::EngineFailed, Some(reason)),
            EngineEvent::Stats(stats) => return self.update_stats(id, stats),
        };

        let outcome = {
            let mut tunnels = self.lock_tunnels();
            if trigger == Trigger::EngineDeactivated && self.settle_owed_stop(&mut tunnels, id) {
                return false;
            }
            self.apply_transition(&mut tunnels, id, trigger, failure.clone())
                .map(|applied| {
                    let record = tunnels.get(&id);
                    (
                        applied,
                        record.map(|r| r.configuration.clone()),
                        record.map(|r| r.name().to_string()).unwrap_or_default(),
                    )
                })
        };

        let (applied, configuration, name) = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(id = %id, ?trigger, error = %e, "Ignoring engine event");
                return false;
            }
        };

        if let Some(reason) = failure {
            error!(tunnel = %name, id = %id, from = %applied.old, reason = %reason, "Tunnel engine reported failure");
        } else {
            info!(tunnel = %name, id = %id, from = %applied.old, to = %applied.new, "Tunnel status changed");
        }

        // Second half of a restart: the old session is down, start the new one
        if applied.old == TunnelStatus::Restarting && applied.new == TunnelStatus::Activating {
            if let Some(configuration) = configuration {
                if let Err(e) = self.engine.start_tunnel(id, &configuration).await {
                    error!(tunnel = %name, id = %id, error = %e, "Engine refused reactivation");
                    self.fail_if_current(id, applied.seq, e.to_string());
                }
            }
        }
        true
    }

    /// Consume engine reports from a channel until every sender is dropped.
    pub fn attach_engine(
        &self,
        mut rx: mpsc::UnboundedReceiver<(TunnelId, EngineEvent)>,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            debug!("Engine event pump started");
            while let Some((id, event)) = rx.recv().await {
                manager.handle_engine_event(id, event).await;
            }
            debug!("Engine event pump stopped");
        })
    }

    /// Ask the engine for the configuration it is actually running.
    ///
    /// The stored configuration is not touched. Returns `None` unless the
    /// tunnel is active.
    pub async fn get_runtime_configuration(
        &self,
        id: TunnelId,
    ) -> TunnelResult<Option<TunnelConfiguration>> {
        let status = self.status(id)?;
        if status != TunnelStatus::Active {
            return Ok(None);
        }
        Ok(self.engine.runtime_configuration(id).await)
    }

    /// The runtime configuration, but only if it differs from the stored one
    /// (e.g. an address handed out by the server).
    pub async fn runtime_configuration_drift(
        &self,
        id: TunnelId,
    ) -> TunnelResult<Option<TunnelConfiguration>> {
        let Some(runtime) = self.get_runtime_configuration(id).await? else {
            return Ok(None);
        };
        let tunnels = self.lock_tunnels();
        let record = tunnels.get(&id).ok_or(TunnelError::NotFound(id))?;
        Ok((runtime != record.configuration).then_some(runtime))
    }

    /// Subscribe to every tunnel event.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Run `callback` for every tunnel event on a dedicated task.
    ///
    /// The callback may call back into the manager.
    pub fn subscribe_with<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(TunnelEvent) + Send + 'static,
    {
        let mut subscription = self.events.subscribe();
        let id = subscription.id();
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                callback(event);
            }
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Snapshot of one tunnel.
    pub fn get(&self, id: TunnelId) -> Option<TunnelSnapshot> {
        self.lock_tunnels().get(&id).map(|r| r.snapshot(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<TunnelId> {
        self.lock_tunnels()
            .iter()
            .find(|(_, r)| r.name() == name)
            .map(|(id, _)| *id)
    }

    pub fn status(&self, id: TunnelId) -> TunnelResult<TunnelStatus> {
        self.lock_tunnels()
            .get(&id)
            .map(|r| r.status)
            .ok_or(TunnelError::NotFound(id))
    }

    /// Snapshots of every tunnel, sorted by name.
    pub fn list(&self) -> Vec<TunnelSnapshot> {
        let mut all: Vec<TunnelSnapshot> = self
            .lock_tunnels()
            .iter()
            .map(|(id, r)| r.snapshot(*id))
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// The first tunnel (by name) that is not inactive.
    pub fn active_tunnel(&self) -> Option<TunnelSnapshot> {
        self.list()
            .into_iter()
            .find(|t| t.status != TunnelStatus::Inactive)
    }

    pub fn len(&self) -> usize {
        self.lock_tunnels().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_tunnels().is_empty()
    }

    /// Bring down every running tunnel and stop all watchdogs.
    ///
    /// Returns the tunnels for which deactivation was started.
    pub async fn shutdown(&self) -> Vec<TunnelId> {
        let running: Vec<TunnelId> = self
            .lock_tunnels()
            .iter()
            .filter(|(_, r)| {
                matches!(
                    r.status,
                    TunnelStatus::Active
                        | TunnelStatus::Reasserting
                        | TunnelStatus::Restarting
                        | TunnelStatus::Waiting
                )
            })
            .map(|(id, _)| *id)
            .collect();

        let mut stopped = Vec::new();
        for id in running {
            match self.start_deactivation(id).await {
                Ok(()) => stopped.push(id),
                Err(e) => warn!(id = %id, error = %e, "Deactivation during shutdown failed"),
            }
        }

        let tasks: Vec<(TunnelId, JoinHandle<()>)> = self.lock_watchdogs().drain().collect();
        for (id, task) in tasks {
            debug!(id = %id, "Aborting watchdog during shutdown");
            task.abort();
        }
        info!(count = stopped.len(), "Tunnels manager shut down");
        stopped
    }

    /// Apply `trigger` to the record and publish the change.
    ///
    /// Must be called with the tunnels lock held so that publication order
    /// matches mutation order.
    fn apply_transition(
        &self,
        tunnels: &mut TunnelMap,
        id: TunnelId,
        trigger: Trigger,
        failure: Option<String>,
    ) -> TunnelResult<Applied> {
        let record = tunnels.get_mut(&id).ok_or(TunnelError::NotFound(id))?;
        let old = record.status;
        let new = state::transition(old, trigger).map_err(|e| {
            let action = match trigger {
                Trigger::ActivationRequested => "activate",
                Trigger::DeactivationRequested => "deactivate",
                Trigger::ConfigurationChanged => "modify",
                _ => "apply engine event to",
            };
            rejection(e, record.name(), old, action)
        })?;

        if new == old {
            return Ok(Applied {
                old,
                new,
                seq: record.transition_seq,
            });
        }

        record.status = new;
        record.transition_seq += 1;
        if new != TunnelStatus::Active {
            record.runtime_stats = None;
        }
        let seq = record.transition_seq;

        self.events.publish(TunnelEvent::StatusChanged {
            id,
            name: record.name().to_string(),
            old,
            new,
            failure,
        });

        match self.options.timeout_for(new) {
            Some(timeout) => self.arm_watchdog(id, seq, timeout),
            None => self.disarm_watchdog(id),
        }

        Ok(Applied { old, new, seq })
    }

    /// Fail the tunnel to `Inactive` unless it has moved on since `seq`.
    fn fail_if_current(&self, id: TunnelId, seq: u64, reason: String) {
        let mut tunnels = self.lock_tunnels();
        let current = tunnels.get(&id).map(|r| r.transition_seq);
        if current != Some(seq) {
            debug!(id = %id, "Transition already superseded, not failing it");
            return;
        }
        if let Err(e) = self.apply_transition(&mut tunnels, id, Trigger::EngineFailed, Some(reason)) {
            warn!(id = %id, error = %e, "Could not settle failed tunnel");
        }
    }

    /// Account for a `Deactivated` report against an owed stop.
    ///
    /// Returns true when the report completes a stop the record has already
    /// settled and must be swallowed. While `Deactivating` or `Restarting`
    /// the report is expected anyway, so it is applied and the debt cleared.
    fn settle_owed_stop(&self, tunnels: &mut TunnelMap, id: TunnelId) -> bool {
        let Some(record) = tunnels.get_mut(&id) else {
            return false;
        };
        if !record.stop_owed {
            return false;
        }
        record.stop_owed = false;
        match record.status {
            TunnelStatus::Deactivating | TunnelStatus::Restarting => false,
            status => {
                debug!(tunnel = %record.name(), status = %status, "Swallowing completion of an earlier stop");
                true
            }
        }
    }

    /// The engine refused a stop, so no completion will arrive for it.
    fn forget_owed_stop(&self, id: TunnelId) {
        if let Some(record) = self.lock_tunnels().get_mut(&id) {
            record.stop_owed = false;
        }
    }

    fn update_stats(&self, id: TunnelId, stats: RuntimeStats) -> bool {
        let mut tunnels = self.lock_tunnels();
        match tunnels.get_mut(&id) {
            Some(record) if record.status == TunnelStatus::Active => {
                trace!(tunnel = %record.name(), rx = stats.rx_bytes, tx = stats.tx_bytes, "Runtime stats updated");
                record.runtime_stats = Some(stats);
                true
            }
            Some(record) => {
                debug!(tunnel = %record.name(), status = %record.status, "Dropping stats for inactive tunnel");
                false
            }
            None => false,
        }
    }

    fn arm_watchdog(&self, id: TunnelId, seq: u64, timeout: Duration) {
        let manager = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            manager.expire(id, seq).await;
        });
        if let Some(previous) = self.lock_watchdogs().insert(id, task) {
            previous.abort();
        }
    }

    fn disarm_watchdog(&self, id: TunnelId) {
        if let Some(task) = self.lock_watchdogs().remove(&id) {
            task.abort();
        }
    }

    /// Watchdog expiry: fail the guarded transition if it is still current.
    async fn expire(&self, id: TunnelId, seq: u64) {
        let expired = {
            let mut tunnels = self.lock_tunnels();
            let stuck = tunnels
                .get(&id)
                .filter(|r| {
                    r.transition_seq == seq && self.options.timeout_for(r.status).is_some()
                })
                .map(|r| (r.name().to_string(), r.status));
            match stuck {
                Some((name, status)) => {
                    warn!(tunnel = %name, status = %status, "Tunnel transition timed out");
                    // Detach our own handle so settling does not abort this task
                    self.lock_watchdogs().remove(&id);
                    let settled = self
                        .apply_transition(
                            &mut tunnels,
                            id,
                            Trigger::EngineFailed,
                            Some(WATCHDOG_FAILURE.to_string()),
                        )
                        .is_ok();
                    if let Some(record) = tunnels.get_mut(&id).filter(|_| settled) {
                        record.stop_owed = true;
                    }
                    settled
                }
                None => false,
            }
        };

        if expired {
            if let Err(e) = self.engine.stop_tunnel(id).await {
                debug!(id = %id, error = %e, "Engine stop after timeout failed");
                self.forget_owed_stop(id);
            }
        }
    }

    fn lock_tunnels(&self) -> MutexGuard<'_, TunnelMap> {
        self.tunnels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_watchdogs(&self) -> MutexGuard<'_, HashMap<TunnelId, JoinHandle<()>>> {
        self.watchdogs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn rejection(
    err: TransitionError,
    name: &str,
    status: TunnelStatus,
    action: &'static str,
) -> TunnelError {
    match err {
        TransitionError::OperationInProgress => TunnelError::OperationInProgress {
            name: name.to_string(),
            status,
        },
        TransitionError::InvalidTransition => TunnelError::InvalidTransition {
            name: name.to_string(),
            status,
            action,
        },
    }
}
