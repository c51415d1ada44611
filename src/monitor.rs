//! The owning context of the registry.
//!
//! `Monitor` is the only thing that mutates tracked services. Code running on
//! the owning thread calls `Monitor::handle` inline; every other thread posts
//! a `CoreCommand` through a `CommandSink` and never blocks on the owner.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, error, info, trace, warn};

use crate::bridge::ServiceWatch;
use crate::config::{Config, SettingsStore};
use crate::error::MonitorError;
use crate::model::{CoreCommand, CoreEvent, ListChange, ListOrigin, ServiceStatus};
use crate::pending::PendingWatch;
use crate::registry::ServiceRegistry;
use crate::resolver::{VisualState, resolve};
use crate::updates::UpdateTracker;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Anything that can hand a command to the owning context.
pub trait CommandSink: Send + 'static {
    /// Returns false once the owner is gone.
    fn post(&self, cmd: CoreCommand) -> bool;
}

impl CommandSink for Sender<CoreCommand> {
    fn post(&self, cmd: CoreCommand) -> bool {
        self.send(cmd).is_ok()
    }
}

/// Inbound queue of the owning context, drained by `Monitor::run`.
pub struct Mailbox {
    tx: Sender<CoreCommand>,
    rx: Receiver<CoreCommand>,
}

impl Mailbox {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn poster(&self) -> Poster {
        Poster {
            tx: self.tx.clone(),
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle for threads that feed the mailbox.
#[derive(Clone)]
pub struct Poster {
    tx: Sender<CoreCommand>,
}

impl CommandSink for Poster {
    fn post(&self, cmd: CoreCommand) -> bool {
        self.tx.send(cmd).is_ok()
    }
}

/// Read-only view handed to subscribers after a command was handled.
pub struct MonitorView<'a> {
    pub registry: &'a ServiceRegistry,
    pub config: &'a Config,
    pub visual: VisualState,
    pub has_updates: bool,
}

pub trait Subscriber {
    fn on_event(&mut self, view: &MonitorView<'_>, event: &CoreEvent);

    fn on_error(&mut self, error: &MonitorError) {
        error!("{}", error);
    }
}

/// Result of handling one command. Events are delivered even when a
/// follow-up write failed.
#[derive(Debug, Default)]
pub struct Outcome {
    pub events: Vec<CoreEvent>,
    pub errors: Vec<MonitorError>,
}

pub struct Monitor<S: SettingsStore> {
    registry: ServiceRegistry,
    tracker: UpdateTracker,
    pending: PendingWatch,
    config: Config,
    store: S,
    visual: VisualState,
    /// Last raw state reported for every service, tracked or not.
    observed: HashMap<String, String>,
    watch: Option<ServiceWatch>,
    shut_down: bool,
}

impl<S: SettingsStore> Monitor<S> {
    pub fn new(config: Config, store: S) -> Self {
        let mut registry = ServiceRegistry::new(&config.monitoring.auto_add_patterns);
        registry.load(config.services.clone());
        let tracker = UpdateTracker::new(config.updates.update_check);
        let pending = PendingWatch::new(escalation(&config));
        let visual = resolve(registry.services(), tracker.has_updates());
        Self {
            registry,
            tracker,
            pending,
            config,
            store,
            visual,
            observed: HashMap::new(),
            watch: None,
            shut_down: false,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn visual_state(&self) -> VisualState {
        self.visual
    }

    pub fn has_updates(&self) -> bool {
        self.tracker.has_updates()
    }

    pub fn view(&self) -> MonitorView<'_> {
        MonitorView {
            registry: &self.registry,
            config: &self.config,
            visual: self.visual,
            has_updates: self.tracker.has_updates(),
        }
    }

    /// Takes ownership of the OS watch so teardown can stop it first.
    pub fn attach_watch(&mut self, watch: ServiceWatch) {
        self.watch = Some(watch);
    }

    pub fn is_watching(&self) -> bool {
        self.watch.as_ref().is_some_and(ServiceWatch::is_running)
    }

    pub fn handle(&mut self, cmd: CoreCommand) -> Outcome {
        let mut outcome = Outcome::default();
        if self.shut_down {
            trace!("Monitor shut down; dropping {:?}", cmd);
            return outcome;
        }

        match cmd {
            CoreCommand::ServiceEvent(event) => {
                self.observed
                    .insert(event.name.clone(), event.state.clone());
                let events = self
                    .registry
                    .set_status(&event.name, &event.path, &event.state);
                if self.registry.contains(&event.name) {
                    self.pending
                        .observe(&event.name, ServiceStatus::parse(&event.state), Instant::now());
                }
                let membership_changed = events
                    .iter()
                    .any(|e| matches!(e, CoreEvent::ListChanged { .. }));
                outcome.events.extend(events);
                if membership_changed {
                    self.persist_into(&mut outcome);
                }
            }
            CoreCommand::Seed(events) => {
                let now = Instant::now();
                let mut seeded = 0usize;
                for event in &events {
                    self.observed
                        .insert(event.name.clone(), event.state.clone());
                    if self.registry.seed_status(&event.name, &event.state) {
                        self.pending
                            .observe(&event.name, ServiceStatus::parse(&event.state), now);
                        seeded += 1;
                    }
                }
                debug!("Seeded status for {} tracked services", seeded);
            }
            CoreCommand::AddService(record) => {
                if let Some(event) = self.registry.add(record, ListOrigin::UserAdded) {
                    self.seed_from_observed(&event);
                    outcome.events.push(event);
                    self.persist_into(&mut outcome);
                }
            }
            CoreCommand::RemoveService { name } => {
                if let Some(event) = self.registry.remove(&name) {
                    self.pending.forget(&name);
                    outcome.events.push(event);
                    self.persist_into(&mut outcome);
                }
            }
            CoreCommand::SettingsChanged(config) => self.apply_settings(*config, &mut outcome),
            CoreCommand::IgnoreUpdate => {
                info!("Ignoring available software update");
                self.tracker.ignore();
                self.persist_into(&mut outcome);
            }
            CoreCommand::ActionCompleted {
                service,
                action,
                result,
            } => match result {
                Ok(()) => debug!("Service '{}': {} succeeded", service, action),
                Err(message) => {
                    warn!("Service '{}': {} failed: {}", service, action, message);
                    outcome.events.push(CoreEvent::ActionFailed {
                        service_name: service,
                        message,
                    });
                }
            },
            CoreCommand::Tick => {
                let stuck = self.pending.expired(Instant::now());
                for event in &stuck {
                    if let CoreEvent::StatusStuck { service_name, pending_state } = event {
                        warn!("Service '{}' stuck in {}", service_name, pending_state);
                    }
                }
                outcome.events.extend(stuck);
            }
            CoreCommand::Shutdown => {
                self.shutdown();
                return outcome;
            }
        }

        let visual = resolve(self.registry.services(), self.tracker.has_updates());
        if visual != self.visual {
            debug!("Visual state {:?} -> {:?}", self.visual, visual);
            self.visual = visual;
            outcome.events.push(CoreEvent::VisualStateChanged(visual));
        }
        outcome
    }

    /// Consumes the mailbox until `Shutdown`, forwarding everything to the
    /// subscriber synchronously. Errors never stop the loop.
    pub fn run(&mut self, mailbox: &Mailbox, subscriber: &mut dyn Subscriber) {
        self.run_with_tick(mailbox, subscriber, TICK_INTERVAL);
    }

    fn run_with_tick(&mut self, mailbox: &Mailbox, subscriber: &mut dyn Subscriber, every: Duration) {
        let ticker = crossbeam_channel::tick(every);
        loop {
            let next = select! {
                recv(mailbox.rx) -> msg => match msg {
                    Ok(CoreCommand::Shutdown) | Err(_) => None,
                    Ok(cmd) => Some(cmd),
                },
                recv(ticker) -> _ => Some(CoreCommand::Tick),
            };
            let Some(cmd) = next else {
                break;
            };
            let outcome = self.handle(cmd);
            self.deliver(outcome, subscriber);
        }
        self.shutdown();
    }

    pub fn deliver(&self, outcome: Outcome, subscriber: &mut dyn Subscriber) {
        let view = self.view();
        for event in &outcome.events {
            subscriber.on_event(&view, event);
        }
        for error in &outcome.errors {
            subscriber.on_error(error);
        }
    }

    /// Stops the OS watch. Safe to call more than once; returns whether this
    /// call did the work.
    pub fn shutdown(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        self.shut_down = true;
        if let Some(mut watch) = self.watch.take() {
            watch.stop();
        }
        info!("Service monitor stopped");
        true
    }

    fn apply_settings(&mut self, new: Config, outcome: &mut Outcome) {
        self.registry
            .set_auto_add_patterns(&new.monitoring.auto_add_patterns);
        self.pending.set_threshold(escalation(&new));
        self.config.monitoring = new.monitoring;
        self.config.notifications = new.notifications;

        // A hand-edited service list is a user add/remove.
        let membership = self.registry.sync_membership(&new.services);
        for event in &membership {
            match event {
                CoreEvent::ListChanged {
                    service,
                    change: ListChange::Remove,
                } => self.pending.forget(&service.name),
                added => self.seed_from_observed(added),
            }
        }
        let mut dirty = !membership.is_empty();
        outcome.events.extend(membership);

        let notice = self.tracker.on_settings_reloaded(new.updates.update_check);
        self.config.updates.update_check = new.updates.update_check;
        if let Some(kind) = notice {
            info!("Software update notice: {:?}", kind);
            outcome.events.push(CoreEvent::UpdateStateChanged { kind });
            dirty = true;
        }
        if dirty {
            self.persist_into(outcome);
        }
    }

    /// A newly added service starts from its last reported state, if any.
    fn seed_from_observed(&mut self, event: &CoreEvent) {
        let CoreEvent::ListChanged { service, .. } = event else {
            return;
        };
        if let Some(state) = self.observed.get(&service.name) {
            self.registry.seed_status(&service.name, state);
            self.pending
                .observe(&service.name, ServiceStatus::parse(state), Instant::now());
        }
    }

    fn persist_into(&mut self, outcome: &mut Outcome) {
        self.config.services = self.registry.services().to_vec();
        self.config.updates.update_check = self.tracker.state().mask();
        if let Err(e) = self.store.save(&self.config) {
            error!("Failed to persist settings: {:#}", e);
            outcome.errors.push(MonitorError::persist(format!("{:#}", e)));
        }
    }
}

fn escalation(config: &Config) -> Option<Duration> {
    config
        .monitoring
        .pending_escalation_secs
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::MemoryStore;
    use crate::model::{ServiceEvent, ServiceRecord, UpdateNotice};
    use std::thread;
    use crate::resolver::IconKind;

    fn event(name: &str, path: &str, state: &str) -> CoreCommand {
        CoreCommand::ServiceEvent(ServiceEvent {
            name: name.into(),
            path: path.into(),
            state: state.into(),
        })
    }

    fn monitor_with(services: Vec<ServiceRecord>, mask: u8) -> Monitor<MemoryStore> {
        let mut config = Config::default();
        config.services = services;
        config.updates.update_check = mask;
        Monitor::new(config, MemoryStore::default())
    }

    fn settings_with_mask(monitor: &Monitor<MemoryStore>, mask: u8) -> CoreCommand {
        let mut config = monitor.config().clone();
        config.updates.update_check = mask;
        CoreCommand::SettingsChanged(Box::new(config))
    }

    #[test]
    fn status_change_updates_visual_state() {
        let mut monitor = monitor_with(vec![ServiceRecord::new("MySQL80", "")], 0);
        let outcome = monitor.handle(event("MySQL80", "", "Running"));
        assert!(matches!(outcome.events[0], CoreEvent::StatusChanged { .. }));
        assert_eq!(
            outcome.events[1],
            CoreEvent::VisualStateChanged(VisualState::new(IconKind::Running, false))
        );

        let outcome = monitor.handle(event("MySQL80", "", "Running"));
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn pending_events_change_nothing() {
        let mut monitor = monitor_with(vec![ServiceRecord::new("MySQL80", "")], 0);
        monitor.handle(event("MySQL80", "", "Running"));
        let outcome = monitor.handle(event("MySQL80", "", "Stop Pending"));
        assert!(outcome.events.is_empty());
        assert!(monitor.store().saved.is_empty());
    }

    #[test]
    fn auto_discovery_is_persisted() {
        let mut monitor = monitor_with(Vec::new(), 0);
        let outcome = monitor.handle(event("MySQL57", r"C:\mysql\bin\mysqld.exe", "Stopped"));
        let adds = outcome
            .events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    CoreEvent::ListChanged {
                        change: ListChange::Add(ListOrigin::AutoDiscovered),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(adds, 1);
        assert_eq!(monitor.store().saved.len(), 1);
        assert_eq!(monitor.store().saved[0].services[0].name, "MySQL57");
        assert_eq!(monitor.visual_state().kind, IconKind::Stopped);
    }

    #[test]
    fn has_updates_notifies_once_and_persists_mask() {
        let mut monitor = monitor_with(Vec::new(), 0);
        let cmd = settings_with_mask(&monitor, 2);
        let outcome = monitor.handle(cmd);
        assert!(outcome.events.contains(&CoreEvent::UpdateStateChanged {
            kind: UpdateNotice::HasUpdates
        }));
        assert!(outcome
            .events
            .contains(&CoreEvent::VisualStateChanged(VisualState::new(IconKind::Neutral, true))));
        assert_eq!(monitor.store().saved.last().unwrap().updates.update_check, 6);

        let cmd = settings_with_mask(&monitor, 6);
        assert!(monitor.handle(cmd).events.is_empty());
        assert_eq!(monitor.store().saved.len(), 1);
    }

    #[test]
    fn ignore_update_clears_mask() {
        let mut monitor = monitor_with(Vec::new(), 6);
        assert!(monitor.has_updates());
        let outcome = monitor.handle(CoreCommand::IgnoreUpdate);
        assert_eq!(monitor.store().saved.last().unwrap().updates.update_check, 0);
        assert!(outcome
            .events
            .contains(&CoreEvent::VisualStateChanged(VisualState::new(IconKind::Neutral, false))));
    }

    #[test]
    fn persist_failure_is_surfaced_with_events() {
        let mut monitor = monitor_with(Vec::new(), 0);
        let cmd = settings_with_mask(&monitor, 1);
        monitor.store.fail = true;
        let outcome = monitor.handle(cmd);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(outcome.errors[0], MonitorError::Persist(_)));
        assert!(outcome.events.contains(&CoreEvent::UpdateStateChanged {
            kind: UpdateNotice::Checking
        }));
    }

    #[test]
    fn user_add_and_remove() {
        let mut monitor = monitor_with(Vec::new(), 0);
        let outcome = monitor.handle(CoreCommand::AddService(ServiceRecord::new("Redis", "")));
        assert!(matches!(
            outcome.events[0],
            CoreEvent::ListChanged { change: ListChange::Add(ListOrigin::UserAdded), .. }
        ));
        assert!(monitor.handle(CoreCommand::AddService(ServiceRecord::new("Redis", ""))).events.is_empty());

        let outcome = monitor.handle(CoreCommand::RemoveService { name: "Redis".into() });
        assert!(matches!(
            outcome.events[0],
            CoreEvent::ListChanged { change: ListChange::Remove, .. }
        ));
        assert!(monitor.handle(CoreCommand::RemoveService { name: "Redis".into() }).events.is_empty());
        assert_eq!(monitor.store().saved.len(), 2);
    }

    #[test]
    fn seed_is_silent_but_resolves() {
        let mut monitor = monitor_with(vec![ServiceRecord::new("MySQL80", "")], 0);
        let outcome = monitor.handle(CoreCommand::Seed(vec![ServiceEvent {
            name: "MySQL80".into(),
            path: String::new(),
            state: "Stopped".into(),
        }]));
        assert_eq!(
            outcome.events,
            vec![CoreEvent::VisualStateChanged(VisualState::new(IconKind::Stopped, false))]
        );
    }

    #[test]
    fn failed_action_is_reported() {
        let mut monitor = monitor_with(vec![ServiceRecord::new("MySQL80", "")], 0);
        let outcome = monitor.handle(CoreCommand::ActionCompleted {
            service: "MySQL80".into(),
            action: crate::model::ServiceAction::Start,
            result: Err("Access is denied.".into()),
        });
        assert_eq!(
            outcome.events,
            vec![CoreEvent::ActionFailed {
                service_name: "MySQL80".into(),
                message: "Access is denied.".into(),
            }]
        );
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut monitor = monitor_with(Vec::new(), 0);
        assert!(monitor.shutdown());
        assert!(!monitor.shutdown());
        assert!(monitor.handle(event("MySQL80", "", "Running")).events.is_empty());
    }

    #[test]
    fn edited_service_list_survives_later_writes() {
        let mut monitor = monitor_with(vec![ServiceRecord::new("MySQL80", "")], 6);
        let mut edited = monitor.config().clone();
        edited.services.push(ServiceRecord::new("Redis", ""));
        let outcome = monitor.handle(CoreCommand::SettingsChanged(Box::new(edited)));
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            CoreEvent::ListChanged { service, change: ListChange::Add(ListOrigin::UserAdded) }
                if service.name == "Redis"
        )));
        assert!(monitor.registry().contains("Redis"));

        monitor.handle(CoreCommand::IgnoreUpdate);
        let saved = monitor.store().saved.last().unwrap();
        let names: Vec<&str> = saved.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["MySQL80", "Redis"]);
        assert_eq!(saved.updates.update_check, 0);
    }

    #[test]
    fn edited_removal_is_applied() {
        let mut monitor = monitor_with(
            vec![ServiceRecord::new("MySQL80", ""), ServiceRecord::new("Redis", "")],
            0,
        );
        let mut edited = monitor.config().clone();
        edited.services.retain(|s| s.name != "Redis");
        let outcome = monitor.handle(CoreCommand::SettingsChanged(Box::new(edited)));
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            CoreEvent::ListChanged { change: ListChange::Remove, .. }
        )));
        assert!(!monitor.registry().contains("Redis"));
        assert_eq!(monitor.store().saved.last().unwrap().services.len(), 1);
    }

    #[test]
    fn added_service_starts_from_last_reported_state() {
        let mut monitor = monitor_with(Vec::new(), 0);
        assert!(monitor.handle(event("Redis", "", "Running")).events.is_empty());
        let outcome = monitor.handle(CoreCommand::AddService(ServiceRecord::new("Redis", "")));
        assert_eq!(
            monitor.registry().get_by_name("Redis").unwrap().status,
            ServiceStatus::Running
        );
        assert!(outcome
            .events
            .contains(&CoreEvent::VisualStateChanged(VisualState::new(IconKind::Running, false))));
    }

    #[test]
    fn stuck_pending_is_reported_despite_unrelated_traffic() {
        let mut config = Config::default();
        config.services = vec![ServiceRecord::new("MySQL80", "")];
        config.monitoring.pending_escalation_secs = Some(1);
        let mut monitor = Monitor::new(config, MemoryStore::default());
        let mailbox = Mailbox::new();
        let poster = mailbox.poster();
        assert!(poster.post(event("MySQL80", "", "Start Pending")));

        // An untracked service changing faster than the tick interval.
        let chatter = thread::spawn(move || {
            let start = Instant::now();
            let mut running = false;
            while start.elapsed() < Duration::from_millis(1800) {
                running = !running;
                let state = if running { "Running" } else { "Stopped" };
                poster.post(event("Spooler", "", state));
                thread::sleep(Duration::from_millis(20));
            }
            poster.post(CoreCommand::Shutdown);
        });

        let mut collect = Collect(Vec::new());
        monitor.run_with_tick(&mailbox, &mut collect, Duration::from_millis(50));
        chatter.join().unwrap();

        let stuck: Vec<_> = collect
            .0
            .iter()
            .filter(|e| matches!(e, CoreEvent::StatusStuck { .. }))
            .collect();
        assert_eq!(
            stuck,
            vec![&CoreEvent::StatusStuck {
                service_name: "MySQL80".into(),
                pending_state: ServiceStatus::StartPending,
            }]
        );
    }

    struct QuietSource;

    impl crate::bridge::ServiceSource for QuietSource {
        fn snapshot(&mut self) -> anyhow::Result<Vec<crate::bridge::ServiceInstance>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn shutdown_posted_from_another_thread_stops_the_watch() {
        let mailbox = Mailbox::new();
        let mut monitor = monitor_with(Vec::new(), 0);
        let watch =
            ServiceWatch::start(QuietSource, Duration::from_millis(10), mailbox.poster()).unwrap();
        monitor.attach_watch(watch);
        assert!(monitor.is_watching());

        let poster = mailbox.poster();
        let signal = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            poster.post(CoreCommand::Shutdown)
        });

        let mut collect = Collect(Vec::new());
        monitor.run(&mailbox, &mut collect);
        assert!(signal.join().unwrap());
        assert!(!monitor.is_watching());
        assert!(!monitor.shutdown());
    }

    struct Collect(Vec<CoreEvent>);

    impl Subscriber for Collect {
        fn on_event(&mut self, _view: &MonitorView<'_>, event: &CoreEvent) {
            self.0.push(event.clone());
        }
    }

    #[test]
    fn run_serializes_posts_from_other_threads() {
        let mailbox = Mailbox::new();
        let mut monitor = monitor_with(vec![ServiceRecord::new("MySQL80", "")], 0);
        let posters: Vec<_> = (0..4)
            .map(|i| {
                let poster = mailbox.poster();
                thread::spawn(move || {
                    let state = if i % 2 == 0 { "Running" } else { "Stopped" };
                    poster.post(event("MySQL80", "", state))
                })
            })
            .collect();
        for handle in posters {
            assert!(handle.join().unwrap());
        }
        mailbox.poster().post(CoreCommand::Shutdown);

        let mut collect = Collect(Vec::new());
        monitor.run(&mailbox, &mut collect);

        // Every recorded transition starts where the previous one ended.
        let mut last = ServiceStatus::Unknown;
        for e in &collect.0 {
            if let CoreEvent::StatusChanged { previous, current, .. } = e {
                assert_eq!(*previous, last);
                assert_ne!(previous, current);
                last = *current;
            }
        }
        assert_eq!(monitor.registry().get_by_name("MySQL80").unwrap().status, last);
        assert!(!monitor.shutdown());
    }
}
