//! Contains logic for reading the foreground window and user idle time in different environments.
//! [GenericWindowManager] is the main artifact of this module that abstracts the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

use std::time::Duration;

use anyhow::Result;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWindowData {
    /// Title of the window. For example 'bash in hello' or 'Issue 42 - Google Chrome'
    pub window_title: Option<String>,
    /// Executable of the owning process, as reported by the platform. For example `chrome.exe` or
    /// `/usr/bin/nvim`.
    pub process_name: Option<String>,
}

/// Intended to serve as a contract windows and linux systems must implement.
#[cfg_attr(test, automock)]
pub trait WindowManager: Send {
    /// `Ok(None)` means no window currently has focus.
    fn get_active_window_data(&mut self) -> Result<Option<ActiveWindowData>>;

    /// Time since the last user input.
    fn get_idle_time(&mut self) -> Result<Duration>;
}

/// Serves as a cross-compatible WindowManager implementation.
pub struct GenericWindowManager {
    inner: Box<dyn WindowManager>,
}

impl GenericWindowManager {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                Ok(Self {
                    inner: Box::new(win::WindowsWindowManager::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                Ok(Self {
                    inner: Box::new(x11::LinuxWindowManager::new()?),
                })
            }
            else {
                Err(anyhow::anyhow!(
                    "No window manager was compiled in, rebuild with the `win` or `x11` feature"
                ))
            }
        }
    }
}

impl WindowManager for GenericWindowManager {
    fn get_active_window_data(&mut self) -> Result<Option<ActiveWindowData>> {
        self.inner.get_active_window_data()
    }

    fn get_idle_time(&mut self) -> Result<Duration> {
        self.inner.get_idle_time()
    }
}
