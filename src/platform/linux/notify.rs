//! Desktop notifications using notify-send

use crate::model::{FeedbackSeverity, Notice};
use crate::utils::{hidden_command, truncate};

pub fn show_notice(notice: &Notice) {
    let urgency = match notice.severity {
        FeedbackSeverity::Info | FeedbackSeverity::Warning => "normal",
        FeedbackSeverity::Error => "critical",
    };
    let result = hidden_command("notify-send")
        .args([
            "--app-name=Service Notifier",
            &format!("--urgency={}", urgency),
            &notice.title,
            &truncate(&notice.body, 200),
        ])
        .spawn();
    if let Err(e) = result {
        log::warn!("Failed to show notification: {}", e);
    }
}
