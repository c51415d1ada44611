use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::resolver::VisualState;

/// Lifecycle state of an OS service, mirroring the service manager's own states.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ServiceStatus {
    Running,
    Stopped,
    StartPending,
    StopPending,
    PausePending,
    ContinuePending,
    Paused,
    #[default]
    Unknown,
}

impl ServiceStatus {
    /// Parses the state text reported by the OS ("Running", "Start Pending", ...).
    /// Anything unrecognised maps to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "startpending" => Self::StartPending,
            "stoppending" => Self::StopPending,
            "pausepending" => Self::PausePending,
            "continuepending" => Self::ContinuePending,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(
            self,
            Self::StartPending | Self::StopPending | Self::PausePending | Self::ContinuePending
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::StartPending => "Start Pending",
            Self::StopPending => "Stop Pending",
            Self::PausePending => "Pause Pending",
            Self::ContinuePending => "Continue Pending",
            Self::Paused => "Paused",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// One tracked service. Only membership and preferences are persisted;
/// `status` is always re-observed from the OS.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ServiceRecord {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub path: String,
    #[serde(skip)]
    pub status: ServiceStatus,
    #[serde(default = "default_true")]
    pub notify_on_status_change: bool,
    #[serde(default = "default_true")]
    pub update_tray_icon_on_status_change: bool,
}

fn default_true() -> bool {
    true
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            path: path.into(),
            status: ServiceStatus::Unknown,
            notify_on_status_change: true,
            update_tray_icon_on_status_change: true,
        }
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Label used in menus and balloons.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListOrigin {
    UserAdded,
    AutoDiscovered,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListChange {
    Add(ListOrigin),
    Remove,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateNotice {
    Checking,
    HasUpdates,
}

/// Events emitted by the monitoring core, in the order they happened.
#[derive(Clone, Debug, PartialEq)]
pub enum CoreEvent {
    StatusChanged {
        service_name: String,
        previous: ServiceStatus,
        current: ServiceStatus,
    },
    ListChanged {
        service: ServiceRecord,
        change: ListChange,
    },
    UpdateStateChanged {
        kind: UpdateNotice,
    },
    VisualStateChanged(VisualState),
    StatusStuck {
        service_name: String,
        pending_state: ServiceStatus,
    },
    ActionFailed {
        service_name: String,
        message: String,
    },
}

/// A normalized service-modification event, ready for `ServiceRegistry::set_status`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceEvent {
    pub name: String,
    pub path: String,
    pub state: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        })
    }
}

/// Commands handled by the monitor on its owning context.
#[derive(Clone, Debug)]
pub enum CoreCommand {
    ServiceEvent(ServiceEvent),
    Seed(Vec<ServiceEvent>),
    AddService(ServiceRecord),
    RemoveService { name: String },
    SettingsChanged(Box<Config>),
    IgnoreUpdate,
    ActionCompleted {
        service: String,
        action: ServiceAction,
        result: Result<(), String>,
    },
    Tick,
    Shutdown,
}

#[derive(Clone, Debug)]
pub enum WorkerCommand {
    Control {
        service: String,
        action: ServiceAction,
    },
}

#[derive(Clone, Debug)]
pub enum UserEvent {
    Core(CoreCommand),
    MenuAction(MenuAction),
}

#[derive(Clone, Debug, PartialEq)]
pub enum MenuAction {
    StartService { name: String },
    StopService { name: String },
    RestartService { name: String },
    IgnoreUpdate,
    EditConfig,
    Quit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeedbackSeverity {
    Info,
    Warning,
    Error,
}

/// A user-visible notification produced by the dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub severity: FeedbackSeverity,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: String, severity: FeedbackSeverity) -> Self {
        Self {
            title: title.into(),
            body,
            severity,
        }
    }

    pub fn info(title: impl Into<String>, body: String) -> Self {
        Self::new(title, body, FeedbackSeverity::Info)
    }

    pub fn warning(title: impl Into<String>, body: String) -> Self {
        Self::new(title, body, FeedbackSeverity::Warning)
    }

    pub fn error(title: impl Into<String>, body: String) -> Self {
        Self::new(title, body, FeedbackSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_os_state_text() {
        assert_eq!(ServiceStatus::parse("Running"), ServiceStatus::Running);
        assert_eq!(ServiceStatus::parse(" Stopped "), ServiceStatus::Stopped);
        assert_eq!(ServiceStatus::parse("Start Pending"), ServiceStatus::StartPending);
        assert_eq!(ServiceStatus::parse("STOP_PENDING"), ServiceStatus::StopPending);
        assert_eq!(ServiceStatus::parse("Paused"), ServiceStatus::Paused);
        assert_eq!(ServiceStatus::parse("degraded"), ServiceStatus::Unknown);
        assert_eq!(ServiceStatus::parse(""), ServiceStatus::Unknown);
    }

    #[test]
    fn display_matches_os_wording() {
        assert_eq!(ServiceStatus::ContinuePending.to_string(), "Continue Pending");
        assert_eq!(ServiceStatus::default().to_string(), "Unknown");
    }

    #[test]
    fn status_is_not_persisted() {
        let record = ServiceRecord::new("MySQL80", "C:\\mysqld.exe").with_status(ServiceStatus::Running);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("Running"));
        let back: ServiceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, ServiceStatus::Unknown);
        assert_eq!(back.name, "MySQL80");
    }

    #[test]
    fn label_falls_back_to_name() {
        let mut record = ServiceRecord::new("redis", "");
        record.display_name.clear();
        assert_eq!(record.label(), "redis");
    }
}
