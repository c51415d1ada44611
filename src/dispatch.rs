//! Decides which core events become user-visible notices.

use crate::model::{CoreEvent, ListChange, ListOrigin, Notice, UpdateNotice};
use crate::monitor::MonitorView;

const TITLE_SERVICE_STATUS: &str = "Service Status";
const TITLE_SERVICE_LIST: &str = "Service List";
const TITLE_SOFTWARE_UPDATE: &str = "Software Update";
const TITLE_STATUS_CHANGE_FAILED: &str = "Status Change Failed";

pub fn notice_for(view: &MonitorView<'_>, event: &CoreEvent) -> Option<Notice> {
    let prefs = &view.config.notifications;
    match event {
        CoreEvent::StatusChanged {
            service_name,
            previous,
            current,
        } => {
            if !prefs.notify_of_status_change {
                return None;
            }
            let service = view.registry.get_by_name(service_name)?;
            if !service.notify_on_status_change {
                return None;
            }
            Some(Notice::info(
                TITLE_SERVICE_STATUS,
                format!(
                    "The service '{}' changed from {} to {}.",
                    service.label(),
                    previous,
                    current
                ),
            ))
        }
        CoreEvent::ListChanged {
            service,
            change: ListChange::Add(ListOrigin::AutoDiscovered),
        } if prefs.notify_of_auto_service_addition => Some(Notice::info(
            TITLE_SERVICE_LIST,
            format!("The service '{}' was added to the monitored list.", service.label()),
        )),
        CoreEvent::ListChanged { .. } => None,
        CoreEvent::UpdateStateChanged { kind } => Some(Notice::info(
            TITLE_SOFTWARE_UPDATE,
            match kind {
                UpdateNotice::Checking => "Checking for software updates...".to_string(),
                UpdateNotice::HasUpdates => {
                    "Software updates are available. Launch the installer to apply them."
                        .to_string()
                }
            },
        )),
        CoreEvent::StatusStuck {
            service_name,
            pending_state,
        } => Some(Notice::warning(
            TITLE_SERVICE_STATUS,
            format!(
                "The service '{}' has been in {} for too long.",
                service_name, pending_state
            ),
        )),
        CoreEvent::ActionFailed {
            service_name,
            message,
        } => Some(Notice::error(
            TITLE_STATUS_CHANGE_FAILED,
            format!("The service '{}' could not change status: {}", service_name, message),
        )),
        CoreEvent::VisualStateChanged(_) => None,
    }
}
