#[cfg(any(target_os = "windows", target_os = "macos"))]
pub mod app;
pub mod headless;

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod monitor;
pub mod pending;
pub mod registry;
pub mod resolver;
pub mod settings_watch;
pub mod updates;
pub mod utils;
pub mod worker;

// Platform abstraction layer
pub mod platform;

// UI modules (cross-platform)
pub mod ui {
    pub mod icon;
    pub mod menu;
}

// Re-export platform-specific implementations through unified interface
pub mod notify {
    pub use crate::platform::current::notify::*;
}

/// Runs the tray shell where one exists, otherwise the headless shell.
pub fn run() -> anyhow::Result<()> {
    #[cfg(any(target_os = "windows", target_os = "macos"))]
    {
        app::run()
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        headless::run()
    }
}
