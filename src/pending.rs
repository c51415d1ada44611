//! Escalation for services that never leave a pending state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::{CoreEvent, ServiceStatus};

#[derive(Debug)]
struct PendingEntry {
    state: ServiceStatus,
    since: Instant,
    reported: bool,
}

#[derive(Debug, Default)]
pub struct PendingWatch {
    threshold: Option<Duration>,
    entries: HashMap<String, PendingEntry>,
}

impl PendingWatch {
    pub fn new(threshold: Option<Duration>) -> Self {
        Self {
            threshold,
            entries: HashMap::new(),
        }
    }

    pub fn set_threshold(&mut self, threshold: Option<Duration>) {
        self.threshold = threshold;
        if threshold.is_none() {
            self.entries.clear();
        }
    }

    /// Records an observed state for a tracked service. The timer starts at
    /// the first pending report and is cleared by any settled state.
    pub fn observe(&mut self, name: &str, status: ServiceStatus, now: Instant) {
        if self.threshold.is_none() {
            return;
        }
        if !status.is_pending() {
            self.entries.remove(name);
            return;
        }
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert(PendingEntry {
                state: status,
                since: now,
                reported: false,
            });
        entry.state = status;
    }

    pub fn forget(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// Returns one `StatusStuck` per service that crossed the threshold.
    pub fn expired(&mut self, now: Instant) -> Vec<CoreEvent> {
        let Some(threshold) = self.threshold else {
            return Vec::new();
        };
        let mut events: Vec<CoreEvent> = self
            .entries
            .iter_mut()
            .filter(|(_, e)| !e.reported && now.saturating_duration_since(e.since) >= threshold)
            .map(|(name, e)| {
                e.reported = true;
                CoreEvent::StatusStuck {
                    service_name: name.clone(),
                    pending_state: e.state,
                }
            })
            .collect();
        events.sort_by(|a, b| stuck_name(a).cmp(stuck_name(b)));
        events
    }
}

fn stuck_name(event: &CoreEvent) -> &str {
    match event {
        CoreEvent::StatusStuck { service_name, .. } => service_name,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECS: Duration = Duration::from_secs(30);

    #[test]
    fn disabled_without_threshold() {
        let mut watch = PendingWatch::new(None);
        let start = Instant::now();
        watch.observe("svc", ServiceStatus::StopPending, start);
        assert!(watch.expired(start + SECS * 10).is_empty());
    }

    #[test]
    fn reports_once_after_threshold() {
        let mut watch = PendingWatch::new(Some(SECS));
        let start = Instant::now();
        watch.observe("svc", ServiceStatus::StartPending, start);
        assert!(watch.expired(start + Duration::from_secs(5)).is_empty());

        let events = watch.expired(start + SECS);
        assert_eq!(
            events,
            vec![CoreEvent::StatusStuck {
                service_name: "svc".into(),
                pending_state: ServiceStatus::StartPending,
            }]
        );
        assert!(watch.expired(start + SECS * 2).is_empty());
    }

    #[test]
    fn settled_state_clears_timer() {
        let mut watch = PendingWatch::new(Some(SECS));
        let start = Instant::now();
        watch.observe("svc", ServiceStatus::StopPending, start);
        watch.observe("svc", ServiceStatus::Stopped, start + Duration::from_secs(1));
        assert!(watch.expired(start + SECS * 2).is_empty());
    }

    #[test]
    fn repeated_pending_keeps_first_timestamp() {
        let mut watch = PendingWatch::new(Some(SECS));
        let start = Instant::now();
        watch.observe("svc", ServiceStatus::StopPending, start);
        watch.observe("svc", ServiceStatus::StopPending, start + Duration::from_secs(20));
        assert_eq!(watch.expired(start + SECS).len(), 1);
    }
}
