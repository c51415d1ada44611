//! Windows service table read in-process from the Service Control Manager.

use std::collections::{HashMap, HashSet};
use std::slice;

use anyhow::{Context, Result};
use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA};
use windows::Win32::Security::SC_HANDLE;
use windows::Win32::System::Services::{
    CloseServiceHandle, ENUM_SERVICE_STATUS_PROCESSW, EnumServicesStatusExW, OpenSCManagerW,
    OpenServiceW, QUERY_SERVICE_CONFIGW, QueryServiceConfigW, SC_ENUM_PROCESS_INFO,
    SC_MANAGER_CONNECT, SC_MANAGER_ENUMERATE_SERVICE, SERVICE_QUERY_CONFIG, SERVICE_STATE_ALL,
    SERVICE_WIN32,
};
use windows::core::{PCWSTR, PWSTR};

use crate::bridge::{ServiceInstance, ServiceSource};

const INITIAL_BUFFER_BYTES: usize = 64 * 1024;

/// Binary paths are fetched once per service and reused on later polls.
#[derive(Debug, Default)]
pub struct SystemServices {
    paths: HashMap<String, Option<String>>,
}

impl ServiceSource for SystemServices {
    fn snapshot(&mut self) -> Result<Vec<ServiceInstance>> {
        let manager = ScHandle::open_manager()?;
        let mut seen = HashSet::new();
        let mut services = Vec::new();

        manager.for_each_service(|entry| {
            let name = unsafe { wide_to_string(entry.lpServiceName) };
            let Some(name) = name else {
                return;
            };
            let path = self
                .paths
                .entry(name.clone())
                .or_insert_with(|| binary_path(&manager, entry.lpServiceName))
                .clone();
            services.push(ServiceInstance {
                state: Some(state_text(entry.ServiceStatusProcess.dwCurrentState.0).to_string()),
                display_name: unsafe { wide_to_string(entry.lpDisplayName) },
                path_name: path,
            });
            seen.insert(name);
        })?;

        self.paths.retain(|name, _| seen.contains(name));
        Ok(services)
    }
}

/// Closes the wrapped SCM handle on drop.
struct ScHandle(SC_HANDLE);

impl ScHandle {
    fn open_manager() -> Result<Self> {
        let handle = unsafe {
            OpenSCManagerW(
                PCWSTR::null(),
                PCWSTR::null(),
                SC_MANAGER_CONNECT | SC_MANAGER_ENUMERATE_SERVICE,
            )
        }
        .context("failed to open the service control manager")?;
        Ok(Self(handle))
    }

    /// Walks every Win32 service, growing the buffer when a single entry
    /// does not fit.
    fn for_each_service(&self, mut visit: impl FnMut(&ENUM_SERVICE_STATUS_PROCESSW)) -> Result<()> {
        let mut buffer = AlignedBuffer::new(INITIAL_BUFFER_BYTES);
        let mut resume = 0u32;
        loop {
            let mut needed = 0u32;
            let mut returned = 0u32;
            let result = unsafe {
                EnumServicesStatusExW(
                    self.0,
                    SC_ENUM_PROCESS_INFO,
                    SERVICE_WIN32,
                    SERVICE_STATE_ALL,
                    Some(buffer.bytes_mut()),
                    &mut needed,
                    &mut returned,
                    Some(&mut resume as *mut u32),
                    PCWSTR::null(),
                )
            };
            let more = match result {
                Ok(()) => false,
                Err(e) if e.code() == ERROR_MORE_DATA.to_hresult() => true,
                Err(e) => return Err(e).context("failed to enumerate services"),
            };

            let entries = unsafe {
                slice::from_raw_parts(
                    buffer.as_ptr::<ENUM_SERVICE_STATUS_PROCESSW>(),
                    returned as usize,
                )
            };
            entries.iter().for_each(&mut visit);

            if !more {
                return Ok(());
            }
            if returned == 0 {
                buffer = AlignedBuffer::new(needed as usize);
            }
        }
    }
}

impl Drop for ScHandle {
    fn drop(&mut self) {
        let _ = unsafe { CloseServiceHandle(self.0) };
    }
}

/// Byte buffer with pointer alignment for the structs the SCM writes into it.
struct AlignedBuffer(Vec<u64>);

impl AlignedBuffer {
    fn new(bytes: usize) -> Self {
        Self(vec![0; bytes.div_ceil(8).max(1)])
    }

    fn len(&self) -> usize {
        self.0.len() * 8
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        unsafe { slice::from_raw_parts_mut(self.0.as_mut_ptr().cast::<u8>(), len) }
    }

    fn as_ptr<T>(&self) -> *const T {
        self.0.as_ptr().cast::<T>()
    }
}

/// `None` when the service cannot be opened for configuration queries.
fn binary_path(manager: &ScHandle, name: PWSTR) -> Option<String> {
    let service = unsafe { OpenServiceW(manager.0, PCWSTR(name.0), SERVICE_QUERY_CONFIG) }
        .map(ScHandle)
        .map_err(|e| log::debug!("OpenServiceW failed: {}", e))
        .ok()?;

    let mut needed = 0u32;
    match unsafe { QueryServiceConfigW(service.0, None, 0, &mut needed) } {
        Err(e) if e.code() == ERROR_INSUFFICIENT_BUFFER.to_hresult() => {}
        Err(e) => {
            log::debug!("QueryServiceConfigW failed: {}", e);
            return None;
        }
        Ok(()) => return None,
    }

    let mut buffer = AlignedBuffer::new(needed as usize);
    let config = buffer.bytes_mut().as_mut_ptr().cast::<QUERY_SERVICE_CONFIGW>();
    let size = buffer.len() as u32;
    if let Err(e) = unsafe { QueryServiceConfigW(service.0, Some(config), size, &mut needed) } {
        log::debug!("QueryServiceConfigW failed: {}", e);
        return None;
    }
    unsafe { wide_to_string((*config).lpBinaryPathName) }
}

/// # Safety
/// `text` must be null or point to a NUL-terminated UTF-16 string.
unsafe fn wide_to_string(text: PWSTR) -> Option<String> {
    if text.is_null() {
        return None;
    }
    unsafe { text.to_string() }.ok().filter(|s| !s.trim().is_empty())
}

/// `SERVICE_STATUS_CURRENT_STATE` in the wording `ServiceStatus::parse` reads.
fn state_text(code: u32) -> &'static str {
    match code {
        1 => "Stopped",
        2 => "Start Pending",
        3 => "Stop Pending",
        4 => "Running",
        5 => "Continue Pending",
        6 => "Pause Pending",
        7 => "Paused",
        _ => "Unknown",
    }
}
