//! Start/stop Windows services with `net`, which accepts display names

use crate::error::MonitorError;
use crate::model::ServiceAction;
use crate::utils::{command_failure_text, hidden_command};
use crate::worker::ServiceControl;

#[derive(Debug, Default)]
pub struct SystemControl;

impl ServiceControl for SystemControl {
    fn control(&self, service: &str, action: ServiceAction) -> Result<(), MonitorError> {
        match action {
            ServiceAction::Start => run_net("start", service),
            ServiceAction::Stop => run_net("stop", service),
            ServiceAction::Restart => {
                run_net("stop", service)?;
                run_net("start", service)
            }
        }
    }
}

fn run_net(verb: &str, service: &str) -> Result<(), MonitorError> {
    let failure = |message: String| MonitorError::ServiceAction {
        service: service.to_string(),
        message,
    };
    let out = hidden_command("net")
        .args([verb, service])
        .output()
        .map_err(|e| failure(format!("Service control error: {}", e)))?;
    if out.status.success() {
        return Ok(());
    }

    let output = command_failure_text(&out.stdout, &out.stderr);
    if output.contains("Access is denied") || output.contains("System error 5") {
        Err(failure("Access denied. Run as Administrator.".to_string()))
    } else {
        Err(failure(output))
    }
}
