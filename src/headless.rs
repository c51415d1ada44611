//! Shell without a tray: notices go straight to the desktop notifier.

use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use crate::bridge::ServiceWatch;
use crate::config::{JsonFileStore, get_config_path, load_or_create_config_at};
use crate::dispatch::notice_for;
use crate::model::{CoreCommand, CoreEvent};
use crate::monitor::{CommandSink, Mailbox, Monitor, MonitorView, Poster, Subscriber};
use crate::platform::current::services::SystemServices;
use crate::settings_watch::spawn_settings_watcher;

struct NoticeSubscriber;

impl Subscriber for NoticeSubscriber {
    fn on_event(&mut self, view: &MonitorView<'_>, event: &CoreEvent) {
        log::debug!("{:?}", event);
        if let Some(notice) = notice_for(view, event) {
            info!("{}: {}", notice.title, notice.body);
            crate::notify::show_notice(&notice);
        }
    }
}

pub fn run() -> Result<()> {
    let config_path = get_config_path();
    let config = load_or_create_config_at(&config_path).context("failed to load configuration")?;
    let interval = Duration::from_millis(config.monitoring.poll_interval_ms);

    let mailbox = Mailbox::new();
    let mut monitor = Monitor::new(config, JsonFileStore::new(config_path.clone()));
    let watch = ServiceWatch::start(SystemServices::default(), interval, mailbox.poster())
        .context("failed to subscribe to service changes")?;
    monitor.attach_watch(watch);
    let _settings_watcher = spawn_settings_watcher(config_path, mailbox.poster());
    shutdown_on_signal(mailbox.poster())?;

    info!(
        "Monitoring {} service(s) without a tray",
        monitor.registry().len()
    );
    monitor.run(&mailbox, &mut NoticeSubscriber);
    Ok(())
}

/// SIGINT/SIGTERM (Ctrl+C on Windows) ends `Monitor::run`, which stops the
/// service watch before returning.
fn shutdown_on_signal(poster: Poster) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Termination requested");
        let _ = poster.post(CoreCommand::Shutdown);
    })
    .context("failed to install signal handler")
}
