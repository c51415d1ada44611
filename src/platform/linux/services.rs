//! systemd service table via `systemctl list-units`

use anyhow::{Context, Result, anyhow};

use crate::bridge::{ServiceInstance, ServiceSource};
use crate::utils::hidden_command;

#[derive(Debug, Default)]
pub struct SystemServices;

impl ServiceSource for SystemServices {
    fn snapshot(&mut self) -> Result<Vec<ServiceInstance>> {
        let output = hidden_command("systemctl")
            .args([
                "list-units",
                "--type=service",
                "--all",
                "--plain",
                "--no-legend",
                "--no-pager",
            ])
            .output()
            .context("failed to execute systemctl")?;

        if !output.status.success() {
            return Err(anyhow!(
                "systemctl list-units failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(parse_list_units(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Maps systemd's ACTIVE column onto the service-manager wording the
/// registry understands.
fn state_text(active: &str) -> &'static str {
    match active {
        "active" | "reloading" => "Running",
        "inactive" | "failed" => "Stopped",
        "activating" => "Start Pending",
        "deactivating" => "Stop Pending",
        _ => "Unknown",
    }
}

/// Parses `UNIT LOAD ACTIVE SUB DESCRIPTION...` rows.
pub fn parse_list_units(output: &str) -> Vec<ServiceInstance> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line
                .trim_start_matches(|c: char| c == '\u{25CF}' || c.is_whitespace())
                .split_whitespace();
            let unit = cols.next()?;
            let _load = cols.next()?;
            let active = cols.next()?;
            if !unit.ends_with(".service") {
                return None;
            }
            Some(ServiceInstance::new(state_text(active), unit, unit))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_list_units;

    #[test]
    fn parses_units() {
        let out = "\
mysql.service       loaded active   running MySQL Community Server
\u{25CF} redis.service  loaded failed   failed  Advanced key-value store
nginx.service       loaded activating start  A high performance web server
cron.service        loaded deactivating stop-sigterm Regular background program
garbage
";
        let services = parse_list_units(out);
        assert_eq!(services.len(), 4);
        assert_eq!(services[0].display_name.as_deref(), Some("mysql.service"));
        assert_eq!(services[0].state.as_deref(), Some("Running"));
        assert_eq!(services[1].display_name.as_deref(), Some("redis.service"));
        assert_eq!(services[1].state.as_deref(), Some("Stopped"));
        assert_eq!(services[2].state.as_deref(), Some("Start Pending"));
        assert_eq!(services[3].state.as_deref(), Some("Stop Pending"));
    }

    #[test]
    fn ignores_non_service_units() {
        assert!(parse_list_units("dev-sda.device loaded active plugged Disk\n").is_empty());
    }
}
