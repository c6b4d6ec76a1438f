use std::{path::Path, time::Duration};

use anyhow::{anyhow, Result};
use tracing::{instrument, warn};
use windows::{
    core::PWSTR,
    Win32::{
        Foundation::{CloseHandle, BOOL, HWND},
        System::{
            SystemInformation::GetTickCount64,
            Threading::{
                OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
                PROCESS_QUERY_LIMITED_INFORMATION,
            },
        },
        UI::{
            Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO},
            WindowsAndMessaging::{
                GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW,
                GetWindowThreadProcessId,
            },
        },
    },
};

use super::{ActiveWindowData, WindowManager};

/// Executable file name (`chrome.exe`) of the process owning `window`. Processes we aren't
/// allowed to open are reported without a name instead of failing the sample.
fn window_process_name(window: HWND) -> Option<String> {
    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(window, Some(&mut pid)) };
    if pid == 0 {
        return None;
    }

    let handle = match unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), pid) } {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Failed to open process {pid}: {e:?}");
            return None;
        }
    };

    let mut buffer = [0u16; 4096];
    let mut length = buffer.len() as u32;
    let query = unsafe {
        QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut length,
        )
    };
    if let Err(e) = unsafe { CloseHandle(handle) } {
        warn!("Failed to close process handle {e:?}");
    }
    if let Err(e) = query {
        warn!("Failed to query image name of {pid}: {e:?}");
        return None;
    }

    let full_path = String::from_utf16_lossy(&buffer[..length as usize]);
    Path::new(&full_path)
        .file_name()
        .map(|v| v.to_string_lossy().into_owned())
}

fn window_title(window: HWND) -> Option<String> {
    let length = unsafe { GetWindowTextLengthW(window) };
    if length <= 0 {
        return None;
    }
    let mut buffer = vec![0u16; length as usize + 1];
    let copied = unsafe { GetWindowTextW(window, &mut buffer) };
    let title = String::from_utf16_lossy(&buffer[..copied.max(0) as usize]);
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[derive(Default)]
pub struct WindowsWindowManager {}

impl WindowsWindowManager {
    pub fn new() -> Self {
        Self {}
    }
}

impl WindowManager for WindowsWindowManager {
    #[instrument(skip(self))]
    fn get_active_window_data(&mut self) -> Result<Option<ActiveWindowData>> {
        let window = unsafe { GetForegroundWindow() };
        if window.is_invalid() {
            return Ok(None);
        }

        Ok(Some(ActiveWindowData {
            window_title: window_title(window),
            process_name: window_process_name(window),
        }))
    }

    #[instrument(skip(self))]
    fn get_idle_time(&mut self) -> Result<Duration> {
        let mut last = LASTINPUTINFO {
            cbSize: size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };
        if !unsafe { GetLastInputInfo(&mut last) }.as_bool() {
            return Err(anyhow!("GetLastInputInfo failed"));
        }

        // dwTime is a 32 bit tick count, compare in the same width so wrap-around after ~49 days
        // doesn't produce huge idle times.
        let now = unsafe { GetTickCount64() } as u32;
        Ok(Duration::from_millis(now.wrapping_sub(last.dwTime) as u64))
    }
}
