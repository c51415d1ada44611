use crate::model::{ServiceRecord, ServiceStatus};

/// Which icon the notification area should show.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum IconKind {
    #[default]
    Neutral,
    Stopped,
    Starting,
    Running,
}

/// Aggregate state of all participating services, plus the update alert badge.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct VisualState {
    pub kind: IconKind,
    pub alert: bool,
}

impl VisualState {
    pub fn new(kind: IconKind, alert: bool) -> Self {
        Self { kind, alert }
    }
}

/// Worst status wins: Stopped over StartPending over Running over nothing.
pub fn resolve(records: &[ServiceRecord], has_update: bool) -> VisualState {
    let participating = || records.iter().filter(|r| r.update_tray_icon_on_status_change);
    let any = |status: ServiceStatus| participating().any(|r| r.status == status);

    let kind = if any(ServiceStatus::Stopped) {
        IconKind::Stopped
    } else if any(ServiceStatus::StartPending) {
        IconKind::Starting
    } else if any(ServiceStatus::Running) {
        IconKind::Running
    } else {
        IconKind::Neutral
    };
    VisualState::new(kind, has_update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, status: ServiceStatus, participates: bool) -> ServiceRecord {
        let mut r = ServiceRecord::new(name, "").with_status(status);
        r.update_tray_icon_on_status_change = participates;
        r
    }

    #[test]
    fn empty_is_neutral() {
        assert_eq!(resolve(&[], false), VisualState::new(IconKind::Neutral, false));
    }

    #[test]
    fn stopped_wins_over_running() {
        let records = [
            rec("a", ServiceStatus::Stopped, true),
            rec("b", ServiceStatus::Running, true),
        ];
        assert_eq!(resolve(&records, false).kind, IconKind::Stopped);
        let reversed = [records[1].clone(), records[0].clone()];
        assert_eq!(resolve(&reversed, false).kind, IconKind::Stopped);
    }

    #[test]
    fn starting_wins_over_running() {
        let records = [
            rec("a", ServiceStatus::Running, true),
            rec("b", ServiceStatus::StartPending, true),
        ];
        assert_eq!(resolve(&records, true), VisualState::new(IconKind::Starting, true));
    }

    #[test]
    fn non_participating_records_are_ignored() {
        let records = [rec("a", ServiceStatus::Running, false)];
        assert_eq!(resolve(&records, true), VisualState::new(IconKind::Neutral, true));

        let records = [
            rec("a", ServiceStatus::Stopped, false),
            rec("b", ServiceStatus::Running, true),
        ];
        assert_eq!(resolve(&records, false).kind, IconKind::Running);
    }

    #[test]
    fn other_statuses_are_neutral() {
        let records = [
            rec("a", ServiceStatus::Paused, true),
            rec("b", ServiceStatus::Unknown, true),
            rec("c", ServiceStatus::StopPending, true),
        ];
        assert_eq!(resolve(&records, false).kind, IconKind::Neutral);
    }
}
