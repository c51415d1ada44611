//! Start/stop launchd jobs

use std::process::Command;

use crate::error::MonitorError;
use crate::model::ServiceAction;
use crate::utils::command_failure_text;
use crate::worker::ServiceControl;

#[derive(Debug, Default)]
pub struct SystemControl;

impl ServiceControl for SystemControl {
    fn control(&self, service: &str, action: ServiceAction) -> Result<(), MonitorError> {
        match action {
            ServiceAction::Start => launchctl("start", service),
            ServiceAction::Stop => launchctl("stop", service),
            ServiceAction::Restart => {
                launchctl("stop", service)?;
                launchctl("start", service)
            }
        }
    }
}

fn launchctl(verb: &str, label: &str) -> Result<(), MonitorError> {
    let failure = |message: String| MonitorError::ServiceAction {
        service: label.to_string(),
        message,
    };
    let out = Command::new("launchctl")
        .args([verb, label])
        .output()
        .map_err(|e| failure(format!("launchctl error: {}", e)))?;
    if out.status.success() {
        Ok(())
    } else {
        Err(failure(command_failure_text(&out.stdout, &out.stderr)))
    }
}
