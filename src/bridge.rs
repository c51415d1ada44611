//! Adapter from the OS service table to `CoreCommand::ServiceEvent`.
//!
//! The platform source is polled on a background thread; every instance whose
//! properties changed since the previous poll becomes one modification event,
//! and a service that vanished is reported once as `Unknown`. No service is
//! filtered out here, the registry decides what it tracks.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{debug, trace, warn};

use crate::error::MonitorError;
use crate::model::{CoreCommand, ServiceEvent};
use crate::monitor::CommandSink;

/// Properties of one service as reported by the OS. Any of them may be absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServiceInstance {
    pub state: Option<String>,
    pub display_name: Option<String>,
    pub path_name: Option<String>,
}

impl ServiceInstance {
    pub fn new(state: &str, display_name: &str, path_name: &str) -> Self {
        Self {
            state: Some(state.to_string()),
            display_name: Some(display_name.to_string()),
            path_name: Some(path_name.to_string()),
        }
    }
}

/// One "instance modified" notification.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstanceModification {
    pub target_instance: Option<ServiceInstance>,
}

/// Extracts `{state, name, path}`, trimmed. Malformed events yield `None`.
pub fn normalize(raw: &InstanceModification) -> Option<ServiceEvent> {
    let target = raw.target_instance.as_ref()?;
    let state = target.state.as_deref()?.trim();
    let name = target.display_name.as_deref()?.trim();
    if state.is_empty() || name.is_empty() {
        return None;
    }
    let path = target.path_name.as_deref().unwrap_or_default().trim();
    Some(ServiceEvent {
        name: name.to_string(),
        path: path.to_string(),
        state: state.to_string(),
    })
}

/// A platform's view of all local services.
pub trait ServiceSource: Send + 'static {
    fn snapshot(&mut self) -> Result<Vec<ServiceInstance>>;
}

const GONE_STATE: &str = "Unknown";

/// Turns a new snapshot into modification events, updating `previous`.
fn diff(
    previous: &mut HashMap<String, ServiceInstance>,
    current: Vec<ServiceInstance>,
) -> Vec<InstanceModification> {
    let mut seen = HashMap::with_capacity(current.len());
    let mut modified = Vec::new();
    for instance in current {
        let Some(key) = instance
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
        else {
            trace!("Skipping unnamed service instance");
            continue;
        };
        if previous.get(&key) != Some(&instance) {
            modified.push(InstanceModification {
                target_instance: Some(instance.clone()),
            });
        }
        seen.insert(key, instance);
    }
    for (name, instance) in previous.drain() {
        if seen.contains_key(&name) {
            continue;
        }
        debug!("Service '{}' disappeared", name);
        modified.push(InstanceModification {
            target_instance: Some(ServiceInstance {
                state: Some(GONE_STATE.to_string()),
                ..instance
            }),
        });
    }
    *previous = seen;
    modified
}

/// Running subscription to service changes. Dropping it unsubscribes.
pub struct ServiceWatch {
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ServiceWatch {
    /// Takes the first snapshot synchronously, posts it as `Seed`, then keeps
    /// polling every `interval`. Failing to read the first snapshot is fatal.
    pub fn start<Src, K>(mut source: Src, interval: Duration, sink: K) -> Result<Self, MonitorError>
    where
        Src: ServiceSource,
        K: CommandSink,
    {
        let initial = source
            .snapshot()
            .map_err(|e| MonitorError::Subscribe(format!("{:#}", e)))?;
        let mut previous = HashMap::new();
        let seed: Vec<ServiceEvent> = diff(&mut previous, initial)
            .iter()
            .filter_map(normalize)
            .collect();
        debug!("Service watch started with {} services", seed.len());
        if !sink.post(CoreCommand::Seed(seed)) {
            return Err(MonitorError::Subscribe("monitor is not running".into()));
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let current = match source.snapshot() {
                    Ok(current) => current,
                    Err(e) => {
                        warn!("Service snapshot failed: {:#}", e);
                        continue;
                    }
                };
                for modification in diff(&mut previous, current) {
                    match normalize(&modification) {
                        Some(event) => {
                            trace!("Service '{}' is now '{}'", event.name, event.state);
                            if !sink.post(CoreCommand::ServiceEvent(event)) {
                                debug!("Monitor gone; service watch exiting");
                                return;
                            }
                        }
                        None => debug!("Skipping malformed service event"),
                    }
                }
            }
            debug!("Service watch stopped");
        });

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Unsubscribes and joins the polling thread. Only the first call does
    /// anything.
    pub fn stop(&mut self) -> bool {
        let Some(stop_tx) = self.stop_tx.take() else {
            return false;
        };
        let _ = stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Service watch thread panicked");
            }
        }
        true
    }
}

impl Drop for ServiceWatch {
    fn drop(&mut self) {
        self.stop();
    }
}
