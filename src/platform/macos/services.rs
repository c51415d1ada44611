//! macOS service table via `launchctl list`

use std::process::Command;

use anyhow::{Context, Result, anyhow};

use crate::bridge::{ServiceInstance, ServiceSource};

#[derive(Debug, Default)]
pub struct SystemServices;

impl ServiceSource for SystemServices {
    fn snapshot(&mut self) -> Result<Vec<ServiceInstance>> {
        let output = Command::new("launchctl")
            .arg("list")
            .output()
            .context("failed to execute launchctl")?;

        if !output.status.success() {
            return Err(anyhow!(
                "launchctl list failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(parse_launchctl_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses `PID\tStatus\tLabel` rows. A job with a PID is running.
pub fn parse_launchctl_list(output: &str) -> Vec<ServiceInstance> {
    output
        .lines()
        .skip_while(|l| l.starts_with("PID"))
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let pid = parts.next()?.trim();
            let _last_exit = parts.next()?;
            let label = parts.next()?.trim();
            if label.is_empty() {
                return None;
            }
            let state = if pid == "-" { "Stopped" } else { "Running" };
            Some(ServiceInstance::new(state, label, label))
        })
        .collect()
}
