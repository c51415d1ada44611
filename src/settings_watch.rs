use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::load_and_validate_config_at;
use crate::model::CoreCommand;
use crate::monitor::CommandSink;

const CONFIG_DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

type WatchResult = Result<NotifyEvent, notify::Error>;

/// Watches the settings file and posts `SettingsChanged` once writes to it
/// have gone quiet. The parent directory is watched so editors that replace
/// the file are still seen.
pub fn spawn_settings_watcher<K: CommandSink>(config_path: PathBuf, sink: K) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (tx, rx) = crossbeam_channel::unbounded();

        let mut watcher: RecommendedWatcher = match Watcher::new(
            move |res: WatchResult| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create settings watcher: {}", e);
                return;
            }
        };

        let watch_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
            log::error!("Failed to watch settings directory: {}", e);
            return;
        }

        log::debug!("Settings watcher started for {:?}", config_path);
        forward_quiet_writes(&rx, &config_path, &sink, CONFIG_DEBOUNCE_DURATION);
    })
}

/// Reloads after the last write of a burst, once `quiet` has passed without
/// another one. Returns when the event source or the sink goes away.
fn forward_quiet_writes<K: CommandSink>(
    rx: &Receiver<WatchResult>,
    config_path: &Path,
    sink: &K,
    quiet: Duration,
) {
    let mut pending = false;
    loop {
        let next = if pending {
            rx.recv_timeout(quiet)
        } else {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };
        match next {
            Ok(Ok(event)) => {
                if is_settings_write(&event, config_path) {
                    pending = true;
                }
            }
            Ok(Err(e)) => log::error!("Settings watch error: {}", e),
            Err(RecvTimeoutError::Timeout) => {
                pending = false;
                log::debug!("Settings file changed, reloading");
                match load_and_validate_config_at(config_path) {
                    Ok(new_config) => {
                        if !sink.post(CoreCommand::SettingsChanged(Box::new(new_config))) {
                            return;
                        }
                    }
                    Err(e) => log::warn!("Settings reload failed: {:#}", e),
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn is_settings_write(event: &NotifyEvent, config_path: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == config_path.file_name())
}
