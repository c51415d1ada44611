#[cfg(target_os = "macos")]
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use log::{error, info, warn};
use tray_icon::menu::MenuEvent;
use tray_icon::{TrayIcon, TrayIconBuilder};
use winit::event::{Event, StartCause};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopProxy};

use crate::bridge::ServiceWatch;
use crate::config::{JsonFileStore, get_config_path, load_or_create_config_at};
use crate::dispatch::notice_for;
use crate::model::*;
use crate::monitor::{CommandSink, Monitor, MonitorView, Subscriber};
use crate::platform::current::control::SystemControl;
use crate::platform::current::services::SystemServices;
use crate::resolver::VisualState;
use crate::settings_watch::spawn_settings_watcher;
use crate::ui::icon::create_icon;
use crate::ui::menu::{build_menu, build_tooltip, parse_menu_action};
#[cfg(target_os = "windows")]
use crate::utils::hidden_command;
use crate::worker::spawn_worker;

const MENU_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl CommandSink for EventLoopProxy<UserEvent> {
    fn post(&self, cmd: CoreCommand) -> bool {
        self.send_event(UserEvent::Core(cmd)).is_ok()
    }
}

/// Reflects core events in the tray: notices, icon and menu.
struct TraySubscriber<'a> {
    tray_icon: &'a TrayIcon,
    menu_dirty: bool,
}

impl Subscriber for TraySubscriber<'_> {
    fn on_event(&mut self, view: &MonitorView<'_>, event: &CoreEvent) {
        match event {
            CoreEvent::VisualStateChanged(state) => {
                update_icon(self.tray_icon, *state);
                self.menu_dirty = true;
            }
            CoreEvent::StatusChanged { .. } | CoreEvent::ListChanged { .. } => {
                self.menu_dirty = true;
            }
            _ => {}
        }
        if let Some(notice) = notice_for(view, event) {
            crate::notify::show_notice(&notice);
        }
    }

    fn on_error(&mut self, error: &crate::error::MonitorError) {
        error!("{}", error);
        crate::notify::show_notice(&Notice::error("Service Notifier", error.to_string()));
    }
}

pub fn run() -> Result<()> {
    let config_path = get_config_path();
    let config = load_or_create_config_at(&config_path).context("failed to load configuration")?;
    let interval = Duration::from_millis(config.monitoring.poll_interval_ms);
    let mut monitor = Monitor::new(config, JsonFileStore::new(config_path.clone()));

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    let proxy = event_loop.create_proxy();
    let (worker_tx, worker_rx) = crossbeam_channel::unbounded();

    let watch = ServiceWatch::start(SystemServices::default(), interval, proxy.clone())
        .context("failed to subscribe to service changes")?;
    monitor.attach_watch(watch);
    let _settings_watcher = spawn_settings_watcher(config_path.clone(), proxy.clone());
    let _worker = spawn_worker(worker_rx, SystemControl, proxy.clone());
    let menu_receiver = MenuEvent::receiver().clone();

    let icon = create_icon(monitor.visual_state()).context("failed to create tray icon image")?;
    let initial_menu = build_menu(&monitor.view()).context("failed to build initial menu")?;
    let tray_icon = TrayIconBuilder::new()
        .with_icon(icon)
        .with_menu(Box::new(initial_menu))
        .with_tooltip(build_tooltip(monitor.registry().len()))
        .build()
        .context("failed to create tray icon")?;
    tray_icon
        .set_visible(true)
        .context("failed to show tray icon")?;

    info!(
        "Monitoring {} service(s) from the tray",
        monitor.registry().len()
    );

    let mut worker_sender: Option<Sender<WorkerCommand>> = Some(worker_tx);

    #[allow(deprecated)]
    let run_result = event_loop.run(move |event, event_loop| match event {
        Event::NewEvents(StartCause::Init) => {
            event_loop
                .set_control_flow(ControlFlow::WaitUntil(Instant::now() + MENU_POLL_INTERVAL));
        }
        Event::NewEvents(StartCause::ResumeTimeReached { .. }) => {
            while let Ok(event) = menu_receiver.try_recv() {
                if let Some(action) = parse_menu_action(event.id().0.as_str()) {
                    let _ = proxy.send_event(UserEvent::MenuAction(action));
                }
            }
            handle_core(&mut monitor, &tray_icon, CoreCommand::Tick);
            event_loop
                .set_control_flow(ControlFlow::WaitUntil(Instant::now() + MENU_POLL_INTERVAL));
        }
        Event::UserEvent(user_event) => match user_event {
            UserEvent::Core(cmd) => handle_core(&mut monitor, &tray_icon, cmd),
            UserEvent::MenuAction(action) => match action {
                MenuAction::StartService { name } => {
                    dispatch_control(&mut worker_sender, name, ServiceAction::Start)
                }
                MenuAction::StopService { name } => {
                    dispatch_control(&mut worker_sender, name, ServiceAction::Stop)
                }
                MenuAction::RestartService { name } => {
                    dispatch_control(&mut worker_sender, name, ServiceAction::Restart)
                }
                MenuAction::IgnoreUpdate => {
                    handle_core(&mut monitor, &tray_icon, CoreCommand::IgnoreUpdate)
                }
                MenuAction::EditConfig => open_config_editor(&config_path),
                MenuAction::Quit => {
                    monitor.shutdown();
                    event_loop.exit();
                }
            },
        },
        Event::LoopExiting => {
            worker_sender.take();
            monitor.shutdown();
        }
        _ => {}
    });

    run_result.context("event loop terminated with error")?;
    Ok(())
}

fn handle_core(monitor: &mut Monitor<JsonFileStore>, tray_icon: &TrayIcon, cmd: CoreCommand) {
    let outcome = monitor.handle(cmd);
    if outcome.events.is_empty() && outcome.errors.is_empty() {
        return;
    }
    let mut subscriber = TraySubscriber {
        tray_icon,
        menu_dirty: false,
    };
    monitor.deliver(outcome, &mut subscriber);
    if subscriber.menu_dirty {
        sync_menu(tray_icon, &monitor.view());
    }
}

fn dispatch_control(
    worker_sender: &mut Option<Sender<WorkerCommand>>,
    service: String,
    action: ServiceAction,
) {
    let Some(sender) = worker_sender.as_ref() else {
        warn!("Worker unavailable; cannot {} '{}'", action, service);
        return;
    };
    if let Err(err) = sender.send(WorkerCommand::Control { service, action }) {
        error!("Unable to dispatch service command: {}", err);
        *worker_sender = None;
    }
}

fn open_config_editor(config_path: &std::path::Path) {
    let path_str = config_path.to_string_lossy().to_string();

    #[cfg(target_os = "macos")]
    let spawned = Command::new("open").arg("-t").arg(&path_str).spawn();

    #[cfg(target_os = "windows")]
    let spawned = hidden_command("notepad").arg(&path_str).spawn();

    match spawned {
        Ok(_) => info!("Opened config file: {}", path_str),
        Err(e) => error!("Failed to open config file {}: {}", path_str, e),
    }
}

/// Rebuilds the menu and tooltip from the current registry.
fn sync_menu(tray_icon: &TrayIcon, view: &MonitorView<'_>) {
    match build_menu(view) {
        Ok(menu) => tray_icon.set_menu(Some(Box::new(menu))),
        Err(err) => error!("Failed to rebuild menu: {}", err),
    }

    let tooltip = build_tooltip(view.registry.len());
    if let Err(err) = tray_icon.set_tooltip(Some(tooltip.as_str())) {
        error!("Failed to update tooltip: {}", err);
    }
}

fn update_icon(tray_icon: &TrayIcon, state: VisualState) {
    match create_icon(state) {
        Ok(icon) => {
            if let Err(err) = tray_icon.set_icon(Some(icon)) {
                error!("Failed to update icon: {}", err);
            }
        }
        Err(err) => error!("{:#}", err),
    }
}
