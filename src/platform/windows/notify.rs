//! Windows toast notifications using PowerShell

use crate::model::{FeedbackSeverity, Notice};
use crate::utils::{hidden_command, truncate};

const APP_ID: &str = "ServiceNotifier.App";

pub fn show_notice(notice: &Notice) {
    let title = match notice.severity {
        FeedbackSeverity::Error => format!("\u{26A0} {}", notice.title),
        _ => notice.title.clone(),
    };
    show_toast_powershell(&title, &truncate(&notice.body, 200));
}

fn escape(s: &str) -> String {
    // Embedded in a literal here-string holding XML.
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn show_toast_powershell(title: &str, body: &str) {
    let title = escape(title);
    let body = escape(body);

    let script = format!(
        r#"
$ErrorActionPreference = 'SilentlyContinue'
[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null
[Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null

$template = @'
<toast>
    <visual>
        <binding template="ToastGeneric">
            <text>{title}</text>
            <text>{body}</text>
        </binding>
    </visual>
</toast>
'@

$xml = New-Object Windows.Data.Xml.Dom.XmlDocument
$xml.LoadXml($template)
$toast = [Windows.UI.Notifications.ToastNotification]::new($xml)
[Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('{app_id}').Show($toast)
"#,
        title = title,
        body = body,
        app_id = APP_ID,
    );

    // Fire and forget.
    if let Err(e) = hidden_command("powershell")
        .args([
            "-NoProfile",
            "-NonInteractive",
            "-WindowStyle",
            "Hidden",
            "-Command",
            &script,
        ])
        .spawn()
    {
        log::warn!("Failed to show notification: {}", e);
    }
}
