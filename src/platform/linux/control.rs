//! Start/stop systemd units

use crate::error::MonitorError;
use crate::model::ServiceAction;
use crate::utils::{command_failure_text, hidden_command};
use crate::worker::ServiceControl;

#[derive(Debug, Default)]
pub struct SystemControl;

impl ServiceControl for SystemControl {
    fn control(&self, service: &str, action: ServiceAction) -> Result<(), MonitorError> {
        let failure = |message: String| MonitorError::ServiceAction {
            service: service.to_string(),
            message,
        };
        let verb = action.to_string();
        let out = hidden_command("systemctl")
            .args([verb.as_str(), service])
            .output()
            .map_err(|e| failure(format!("systemctl error: {}", e)))?;
        if out.status.success() {
            Ok(())
        } else {
            Err(failure(command_failure_text(&out.stdout, &out.stderr)))
        }
    }
}
