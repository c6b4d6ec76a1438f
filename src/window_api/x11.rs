use std::time::Duration;

use anyhow::{anyhow, Result};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::instrument;
use xcb::{
    screensaver::QueryInfo,
    x::{self, Atom, Drawable, GetProperty, InternAtom, Window, ATOM_ANY},
    Connection, Xid,
};

use super::{ActiveWindowData, WindowManager};

fn intern(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

fn read_property(
    conn: &Connection,
    window: Window,
    property: Atom,
    long_length: u32,
) -> Result<x::GetPropertyReply> {
    Ok(conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length,
    }))?)
}

pub struct LinuxWindowManager {
    connection: Connection,
    root: Window,
    active_window_atom: Atom,
    window_name_atom: Atom,
    pid_atom: Atom,
    system: System,
}

impl LinuxWindowManager {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = Connection::connect(None)?;
        let root = connection
            .get_setup()
            .roots()
            .nth(preferred_screen.max(0) as usize)
            .map(|screen| screen.root())
            .ok_or_else(|| anyhow!("X server reported no screen {preferred_screen}"))?;
        let active_window_atom = intern(&connection, b"_NET_ACTIVE_WINDOW")?;
        let window_name_atom = intern(&connection, b"_NET_WM_NAME")?;
        let pid_atom = intern(&connection, b"_NET_WM_PID")?;
        Ok(Self {
            connection,
            root,
            active_window_atom,
            window_name_atom,
            pid_atom,
            system: System::new(),
        })
    }

    fn active_window(&self) -> Result<Option<Window>> {
        let reply = read_property(&self.connection, self.root, self.active_window_atom, 1)?;
        Ok(reply
            .value::<Window>()
            .first()
            .copied()
            .filter(|window| window.resource_id() != 0))
    }

    fn title(&self, window: Window) -> Result<Option<String>> {
        let reply = read_property(&self.connection, window, self.window_name_atom, 1024)?;
        let title = String::from_utf8_lossy(reply.value::<u8>());
        let title = title.trim();
        Ok((!title.is_empty()).then(|| title.to_string()))
    }

    /// Executable file name of the process owning `window`, `None` when the window doesn't
    /// advertise a pid.
    fn process_name(&mut self, window: Window) -> Result<Option<String>> {
        let reply = read_property(&self.connection, window, self.pid_atom, 1)?;
        let Some(pid) = reply.value::<u32>().first().copied() else {
            return Ok(None);
        };
        let pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_exe(sysinfo::UpdateKind::OnlyIfNotSet),
        );
        Ok(self.system.process(pid).map(|process| {
            process
                .exe()
                .and_then(|exe| exe.file_name())
                .unwrap_or_else(|| process.name())
                .to_string_lossy()
                .into_owned()
        }))
    }
}

impl WindowManager for LinuxWindowManager {
    #[instrument(skip(self))]
    fn get_active_window_data(&mut self) -> Result<Option<ActiveWindowData>> {
        let Some(window) = self.active_window()? else {
            return Ok(None);
        };
        Ok(Some(ActiveWindowData {
            window_title: self.title(window)?,
            process_name: self.process_name(window)?,
        }))
    }

    #[instrument(skip(self))]
    fn get_idle_time(&mut self) -> Result<Duration> {
        let reply = self
            .connection
            .wait_for_reply(self.connection.send_request(&QueryInfo {
                drawable: Drawable::Window(self.root),
            }))?;
        Ok(Duration::from_millis(reply.ms_since_user_input() as u64))
    }
}
