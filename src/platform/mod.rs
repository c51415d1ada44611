//! Platform abstraction layer
//!
//! This module provides platform-specific implementations for:
//! - Reading the service table (`services`)
//! - Starting and stopping services (`control`)
//! - Desktop notifications (`notify`)

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub mod linux;

// Re-export the current platform's modules
#[cfg(target_os = "macos")]
pub use macos as current;

#[cfg(target_os = "windows")]
pub use windows as current;

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub use linux as current;
