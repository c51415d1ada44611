//! Registry of tracked services.
//!
//! Every mutating call returns the events it fired, in order. Callers forward
//! them to subscribers unchanged, so one OS transition maps to exactly one
//! batch of events.

use std::collections::HashSet;

use log::{debug, trace, warn};

use crate::model::{CoreEvent, ListChange, ListOrigin, ServiceRecord, ServiceStatus};

#[derive(Clone, Debug, Default)]
pub struct ServiceRegistry {
    services: Vec<ServiceRecord>,
    auto_add_patterns: Vec<String>,
}

impl ServiceRegistry {
    pub fn new(auto_add_patterns: &[String]) -> Self {
        let mut registry = Self::default();
        registry.set_auto_add_patterns(auto_add_patterns);
        registry
    }

    pub fn set_auto_add_patterns(&mut self, patterns: &[String]) {
        self.auto_add_patterns = patterns
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
    }

    /// Replaces the registry contents. The first record of a given name wins.
    pub fn load(&mut self, persisted: Vec<ServiceRecord>) {
        let mut seen = HashSet::new();
        self.services.clear();
        for mut record in persisted {
            let name = record.name.trim().to_string();
            if name.is_empty() {
                warn!("Skipping persisted service with an empty name");
                continue;
            }
            if !seen.insert(name.clone()) {
                warn!("Dropping duplicate persisted service '{}'", name);
                continue;
            }
            record.name = name;
            record.status = ServiceStatus::Unknown;
            self.services.push(record);
        }
        debug!("Loaded {} tracked services", self.services.len());
    }

    pub fn add(&mut self, record: ServiceRecord, origin: ListOrigin) -> Option<CoreEvent> {
        if self.contains(&record.name) {
            trace!("Service '{}' already tracked", record.name);
            return None;
        }
        debug!("Tracking service '{}' ({:?})", record.name, origin);
        self.services.push(record.clone());
        Some(CoreEvent::ListChanged {
            service: record,
            change: ListChange::Add(origin),
        })
    }

    pub fn remove(&mut self, name: &str) -> Option<CoreEvent> {
        let index = self.services.iter().position(|s| s.name == name)?;
        let service = self.services.remove(index);
        debug!("Stopped tracking service '{}'", service.name);
        Some(CoreEvent::ListChanged {
            service,
            change: ListChange::Remove,
        })
    }

    /// Applies a status reported by the OS, auto-adding the service when it
    /// matches a discovery pattern.
    pub fn set_status(&mut self, name: &str, path: &str, raw_status: &str) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if raw_status.to_lowercase().contains("pending") {
            trace!("Ignoring transitional state '{}' for '{}'", raw_status, name);
            return events;
        }

        let current = ServiceStatus::parse(raw_status);
        if !self.contains(name) {
            // A vanished or unreadable service is never discovered.
            if current == ServiceStatus::Unknown || !self.matches_auto_add(name, path) {
                return events;
            }
            let record = ServiceRecord::new(name, path);
            events.extend(self.add(record, ListOrigin::AutoDiscovered));
        }

        if let Some(record) = self.services.iter_mut().find(|s| s.name == name) {
            let previous = record.status;
            if previous != current {
                record.status = current;
                events.push(CoreEvent::StatusChanged {
                    service_name: name.to_string(),
                    previous,
                    current,
                });
            }
        }
        events
    }

    /// Brings membership in line with an edited list. Names missing from the
    /// list are removed, new names are added as user additions, and kept
    /// records take the edited preferences while keeping their live status.
    pub fn sync_membership(&mut self, edited: &[ServiceRecord]) -> Vec<CoreEvent> {
        let wanted: HashSet<&str> = edited
            .iter()
            .map(|r| r.name.trim())
            .filter(|n| !n.is_empty())
            .collect();
        let dropped: Vec<String> = self
            .services
            .iter()
            .filter(|s| !wanted.contains(s.name.as_str()))
            .map(|s| s.name.clone())
            .collect();

        let mut events = Vec::new();
        for name in dropped {
            events.extend(self.remove(&name));
        }

        let mut seen = HashSet::new();
        for record in edited {
            let name = record.name.trim();
            if name.is_empty() || !seen.insert(name) {
                continue;
            }
            if let Some(existing) = self.services.iter_mut().find(|s| s.name == name) {
                existing.display_name = record.display_name.clone();
                existing.path = record.path.clone();
                existing.notify_on_status_change = record.notify_on_status_change;
                existing.update_tray_icon_on_status_change =
                    record.update_tray_icon_on_status_change;
                continue;
            }
            let mut added = record.clone();
            added.name = name.to_string();
            added.status = ServiceStatus::Unknown;
            events.extend(self.add(added, ListOrigin::UserAdded));
        }
        events
    }

    /// Records an observed status without firing events. Used for the
    /// initial snapshot, where Unknown -> observed is not a transition.
    pub fn seed_status(&mut self, name: &str, raw_status: &str) -> bool {
        match self.services.iter_mut().find(|s| s.name == name) {
            Some(record) => {
                record.status = ServiceStatus::parse(raw_status);
                true
            }
            None => false,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ServiceRecord> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_by_name(name).is_some()
    }

    pub fn services(&self) -> &[ServiceRecord] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    fn matches_auto_add(&self, name: &str, path: &str) -> bool {
        let name = name.to_lowercase();
        let path = path.to_lowercase();
        self.auto_add_patterns
            .iter()
            .any(|p| name.contains(p.as_str()) || path.contains(p.as_str()))
    }
}
