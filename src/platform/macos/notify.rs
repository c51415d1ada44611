//! macOS notifications using osascript

use std::process::Command;

use crate::model::Notice;
use crate::utils::truncate;

pub fn show_notice(notice: &Notice) {
    let title = escape(&notice.title);
    let body = escape(&truncate(&notice.body, 200));
    let script = format!(
        "display notification \"{}\" with title \"Service Notifier\" subtitle \"{}\"",
        body, title
    );
    if let Err(e) = Command::new("osascript").args(["-e", &script]).spawn() {
        log::warn!("Failed to show notification: {}", e);
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
