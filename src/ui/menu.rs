#[cfg(any(target_os = "windows", target_os = "macos"))]
use anyhow::Result;
#[cfg(any(target_os = "windows", target_os = "macos"))]
use tray_icon::menu::{Menu, MenuItem, PredefinedMenuItem, Submenu};

use crate::model::{MenuAction, ServiceRecord, ServiceStatus};
#[cfg(any(target_os = "windows", target_os = "macos"))]
use crate::monitor::MonitorView;

const APP_NAME: &str = "Service Notifier";
const MAX_TOOLTIP_LENGTH: usize = 63;
const MENU_ID_IGNORE_UPDATE: &str = "ignore_update";
const MENU_ID_EDIT_CONFIG: &str = "edit_config";
const MENU_ID_QUIT: &str = "quit";
const MENU_ID_START_PREFIX: &str = "service_start_";
const MENU_ID_STOP_PREFIX: &str = "service_stop_";
const MENU_ID_RESTART_PREFIX: &str = "service_restart_";
#[cfg(any(target_os = "windows", target_os = "macos"))]
const MENU_ID_EMPTY: &str = "empty";

pub fn parse_menu_action(id: &str) -> Option<MenuAction> {
    match id {
        MENU_ID_IGNORE_UPDATE => return Some(MenuAction::IgnoreUpdate),
        MENU_ID_EDIT_CONFIG => return Some(MenuAction::EditConfig),
        MENU_ID_QUIT => return Some(MenuAction::Quit),
        _ => {}
    }
    let named = |prefix: &str| {
        id.strip_prefix(prefix)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    };
    if let Some(name) = named(MENU_ID_START_PREFIX) {
        Some(MenuAction::StartService { name })
    } else if let Some(name) = named(MENU_ID_STOP_PREFIX) {
        Some(MenuAction::StopService { name })
    } else if let Some(name) = named(MENU_ID_RESTART_PREFIX) {
        Some(MenuAction::RestartService { name })
    } else {
        None
    }
}

pub fn service_menu_id(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}

/// "Service Notifier (x.y.z)\nN service(s) monitored.", capped at the
/// notification-area limit.
pub fn build_tooltip(service_count: usize) -> String {
    fit_tooltip(format!(
        "{} ({})\n{} service(s) monitored.",
        APP_NAME,
        env!("CARGO_PKG_VERSION"),
        service_count
    ))
}

/// The notification area rejects 63 characters or more.
fn fit_tooltip(text: String) -> String {
    if text.chars().count() < MAX_TOOLTIP_LENGTH {
        return text;
    }
    let kept: String = text.chars().take(MAX_TOOLTIP_LENGTH - 3).collect();
    format!("{}...", kept)
}

pub fn status_label(service: &ServiceRecord) -> String {
    format!("{} \u{00B7} {}", service.label(), service.status)
}

/// Which actions make sense for a service in its current state.
pub fn available_actions(status: ServiceStatus) -> (bool, bool, bool) {
    let start = matches!(
        status,
        ServiceStatus::Stopped | ServiceStatus::Paused | ServiceStatus::Unknown
    );
    let stop = matches!(status, ServiceStatus::Running | ServiceStatus::Paused);
    let restart = status == ServiceStatus::Running;
    (start, stop, restart)
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
pub fn build_menu(view: &MonitorView<'_>) -> Result<Menu> {
    let menu = Menu::new();

    if view.registry.is_empty() {
        let item = MenuItem::with_id(MENU_ID_EMPTY, "No services monitored", false, None);
        menu.append(&item)?;
    }

    for service in view.registry.services() {
        let (start, stop, restart) = available_actions(service.status);
        let submenu = Submenu::new(status_label(service), true);
        submenu.append(&MenuItem::with_id(
            service_menu_id(MENU_ID_START_PREFIX, &service.name),
            "Start",
            start,
            None,
        ))?;
        submenu.append(&MenuItem::with_id(
            service_menu_id(MENU_ID_STOP_PREFIX, &service.name),
            "Stop",
            stop,
            None,
        ))?;
        submenu.append(&MenuItem::with_id(
            service_menu_id(MENU_ID_RESTART_PREFIX, &service.name),
            "Restart",
            restart,
            None,
        ))?;
        menu.append(&submenu)?;
    }

    if view.has_updates {
        menu.append(&PredefinedMenuItem::separator())?;
        menu.append(&MenuItem::with_id(
            MENU_ID_IGNORE_UPDATE,
            "Ignore this update",
            true,
            None,
        ))?;
    }

    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&MenuItem::with_id(
        MENU_ID_EDIT_CONFIG,
        "Edit Config...",
        true,
        None,
    ))?;
    menu.append(&MenuItem::with_id(MENU_ID_QUIT, "Quit", true, None))?;
    Ok(menu)
}
