use std::sync::Arc;

use proptest::prelude::*;
use wg_manager::tunnel::sim::SimulatedEngine;
use wg_manager::tunnel::state::{Trigger, transition};
use wg_manager::tunnel::{EngineEvent, InterfaceConfiguration, WireGuardKey};
use wg_manager::{TunnelConfiguration, TunnelEvent, TunnelStatus, TunnelsManager};

#[derive(Debug, Clone)]
enum Step {
    Activate,
    Deactivate,
    Modify(u16),
    Engine(EngineEvent),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Activate),
        3 => Just(Step::Deactivate),
        1 => (1280u16..1500).prop_map(Step::Modify),
        2 => Just(Step::Engine(EngineEvent::Activated)),
        2 => Just(Step::Engine(EngineEvent::Deactivated)),
        1 => Just(Step::Engine(EngineEvent::Reasserting)),
        1 => Just(Step::Engine(EngineEvent::Reasserted)),
        1 => Just(Step::Engine(EngineEvent::Waiting)),
        1 => Just(Step::Engine(EngineEvent::PrerequisiteMet)),
        1 => "[a-z ]{1,12}".prop_map(|reason| Step::Engine(EngineEvent::Failed(reason))),
    ]
}

fn config(mtu: Option<u16>) -> TunnelConfiguration {
    let mut interface = InterfaceConfiguration::new(WireGuardKey::from_bytes([3; 32]));
    interface.mtu = mtu;
    TunnelConfiguration::new("seq", interface)
}

fn status_changes(events: &[TunnelEvent]) -> Vec<(TunnelStatus, TunnelStatus, Option<String>)> {
    events
        .iter()
        .filter_map(|e| match e {
            TunnelEvent::StatusChanged {
                old, new, failure, ..
            } => Some((*old, *new, failure.clone())),
            _ => None,
        })
        .collect()
}

async fn run(steps: Vec<Step>) -> Result<(), TestCaseError> {
    let (engine, _rx) = SimulatedEngine::manual();
    let manager = TunnelsManager::new(Arc::new(engine));
    let id = manager.create(config(None)).unwrap();
    let mut sub = manager.subscribe();
    sub.drain();

    for step in steps {
        let before = manager.status(id).unwrap();
        match step {
            Step::Activate | Step::Deactivate | Step::Modify(_) => {
                let (trigger, result) = match step {
                    Step::Activate => (
                        Trigger::ActivationRequested,
                        manager.start_activation(id).await,
                    ),
                    Step::Deactivate => (
                        Trigger::DeactivationRequested,
                        manager.start_deactivation(id).await,
                    ),
                    Step::Modify(mtu) => (
                        Trigger::ConfigurationChanged,
                        manager.modify(id, config(Some(mtu))).await,
                    ),
                    Step::Engine(_) => unreachable!(),
                };
                let after = manager.status(id).unwrap();
                let events = sub.drain();
                match transition(before, trigger) {
                    Ok(expected) => {
                        prop_assert!(result.is_ok(), "{:?} from {} refused", trigger, before);
                        prop_assert_eq!(after, expected);
                        let changes = status_changes(&events);
                        if expected == before {
                            prop_assert!(changes.is_empty());
                        } else {
                            prop_assert_eq!(changes, vec![(before, expected, None)]);
                        }
                    }
                    Err(_) => {
                        prop_assert!(result.is_err(), "{:?} from {} accepted", trigger, before);
                        prop_assert_eq!(after, before);
                        prop_assert!(events.is_empty());
                    }
                }
            }
            Step::Engine(event) => {
                let failure = match &event {
                    EngineEvent::Failed(reason) => Some(reason.clone()),
                    _ => None,
                };
                let applied = manager.handle_engine_event(id, event).await;
                let after = manager.status(id).unwrap();
                let changes = status_changes(&sub.drain());
                if applied {
                    prop_assert_eq!(changes.len(), 1);
                    prop_assert_eq!(changes[0].0, before);
                    prop_assert_eq!(changes[0].1, after);
                    if failure.is_some() {
                        prop_assert_eq!(after, TunnelStatus::Inactive);
                        prop_assert_eq!(&changes[0].2, &failure);
                    }
                } else {
                    prop_assert_eq!(after, before);
                    prop_assert!(changes.is_empty());
                }
            }
        }
    }

    // Whatever the sequence, a failure settles the tunnel and it can be
    // activated again
    if manager.status(id).unwrap() != TunnelStatus::Inactive {
        prop_assert!(
            manager
                .handle_engine_event(id, EngineEvent::Failed("reset".to_string()))
                .await
        );
    }
    prop_assert_eq!(manager.status(id).unwrap(), TunnelStatus::Inactive);
    prop_assert!(manager.start_activation(id).await.is_ok());
    prop_assert_eq!(manager.status(id).unwrap(), TunnelStatus::Activating);
    Ok(())
}

proptest! {
    #[test]
    fn every_request_changes_status_at_most_once(steps in proptest::collection::vec(step(), 0..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(steps))?;
    }
}
