//! Key presses sent to the game when a repair is due.

use crate::config::ActivationConfig;
use crate::error::{ActivationError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
#[cfg(not(windows))]
use tracing::warn;

/// Windows virtual-key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualKey(pub u16);

impl VirtualKey {
    pub const SPACE: VirtualKey = VirtualKey(0x20);

    pub fn code(&self) -> u16 {
        self.0
    }
}

impl FromStr for VirtualKey {
    type Err = ActivationError;

    /// Accepts a single letter or digit, `F1`..`F24`, a few named keys, or a
    /// hex code such as `0x52`.
    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let name = value.trim().to_ascii_uppercase();
        let unknown = || ActivationError::UnknownKey {
            name: value.to_string(),
        };

        if let Some(hex) = name.strip_prefix("0X") {
            let code = u16::from_str_radix(hex, 16).map_err(|_| unknown())?;
            if code == 0 || code > 0xFE {
                return Err(unknown());
            }
            return Ok(VirtualKey(code));
        }

        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_uppercase() || c.is_ascii_digit() {
                return Ok(VirtualKey(c as u16));
            }
            return Err(unknown());
        }

        if let Some(number) = name.strip_prefix('F') {
            if let Ok(n) = number.parse::<u16>() {
                if (1..=24).contains(&n) {
                    return Ok(VirtualKey(0x70 + n - 1));
                }
            }
        }

        let code = match name.as_str() {
            "SPACE" => 0x20,
            "ENTER" | "RETURN" => 0x0D,
            "TAB" => 0x09,
            "ESC" | "ESCAPE" => 0x1B,
            "BACKSPACE" => 0x08,
            "INSERT" => 0x2D,
            "DELETE" => 0x2E,
            "HOME" => 0x24,
            "END" => 0x23,
            _ => return Err(unknown()),
        };
        Ok(VirtualKey(code))
    }
}

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0x30..=0x39 | 0x41..=0x5A => write!(f, "{}", self.0 as u8 as char),
            0x70..=0x87 => write!(f, "F{}", self.0 - 0x70 + 1),
            0x20 => write!(f, "SPACE"),
            0x0D => write!(f, "ENTER"),
            0x09 => write!(f, "TAB"),
            0x1B => write!(f, "ESC"),
            code => write!(f, "0x{:02X}", code),
        }
    }
}

/// Delivers a key press to the game
pub trait KeySender: Send + Sync {
    fn send_key(&self, key: VirtualKey) -> Result<()>;
}

/// Dry-run sender that only logs and counts the keys it was asked to send
#[derive(Debug, Default)]
pub struct LoggingKeySender {
    presses: AtomicU64,
    last_key: Mutex<Option<VirtualKey>>,
}

impl LoggingKeySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_count(&self) -> u64 {
        self.presses.load(Ordering::Relaxed)
    }

    pub fn last_key(&self) -> Option<VirtualKey> {
        *self.last_key.lock()
    }
}

impl KeySender for LoggingKeySender {
    fn send_key(&self, key: VirtualKey) -> Result<()> {
        info!("Dry run: would press {}", key);
        self.presses.fetch_add(1, Ordering::Relaxed);
        *self.last_key.lock() = Some(key);
        Ok(())
    }
}

/// Sender for the configured activation mode
pub fn key_sender_from_config(config: &ActivationConfig) -> Arc<dyn KeySender> {
    if config.dry_run {
        info!("Activation dry run: repair keys are only logged");
        return Arc::new(LoggingKeySender::new());
    }

    #[cfg(windows)]
    {
        info!("Repair keys go to {}", config.process_name);
        Arc::new(WindowKeySender::new(config.process_name.clone()))
    }

    #[cfg(not(windows))]
    {
        warn!("Key posting needs Windows; repair keys are only logged");
        Arc::new(LoggingKeySender::new())
    }
}

#[cfg(windows)]
pub use window::WindowKeySender;

#[cfg(windows)]
mod window {
    use super::{KeySender, VirtualKey};
    use crate::error::{ActivationError, Result};
    use tracing::debug;

    use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, WPARAM};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::UI::Input::KeyboardAndMouse::{MapVirtualKeyW, MAPVK_VK_TO_VSC};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowThreadProcessId, IsWindowVisible, PostMessageW, WM_KEYDOWN,
        WM_KEYUP,
    };

    /// Posts key down/up messages to the visible top-level window of a
    /// named process. The window is looked up on every press so a restarted
    /// game is picked up without reconfiguration.
    pub struct WindowKeySender {
        process_name: String,
    }

    impl WindowKeySender {
        pub fn new(process_name: impl Into<String>) -> Self {
            Self {
                process_name: process_name.into(),
            }
        }

        fn find_process(&self) -> Result<u32> {
            // SAFETY: the snapshot handle is closed before returning and the
            // entry struct is sized as the API requires
            unsafe {
                let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).map_err(|e| {
                    ActivationError::ProcessNotFound {
                        name: format!("{} (snapshot failed: {})", self.process_name, e),
                    }
                })?;

                let mut entry = PROCESSENTRY32W {
                    dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                    ..Default::default()
                };

                let mut found = None;
                let mut more = Process32FirstW(snapshot, &mut entry).is_ok();
                while more {
                    let len = entry
                        .szExeFile
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(entry.szExeFile.len());
                    let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
                    if exe.eq_ignore_ascii_case(&self.process_name) {
                        found = Some(entry.th32ProcessID);
                        break;
                    }
                    more = Process32NextW(snapshot, &mut entry).is_ok();
                }

                if let Err(e) = CloseHandle(snapshot) {
                    debug!("Failed to close process snapshot: {}", e);
                }

                found.ok_or_else(|| {
                    ActivationError::ProcessNotFound {
                        name: self.process_name.clone(),
                    }
                    .into()
                })
            }
        }

        fn find_window(&self, pid: u32) -> Result<HWND> {
            let mut search = WindowSearch { pid, hwnd: None };
            // SAFETY: `search` outlives the enumeration, which is synchronous
            let _ = unsafe {
                EnumWindows(
                    Some(match_window),
                    LPARAM(&mut search as *mut WindowSearch as isize),
                )
            };
            search.hwnd.ok_or_else(|| {
                ActivationError::WindowNotFound {
                    name: self.process_name.clone(),
                }
                .into()
            })
        }
    }

    struct WindowSearch {
        pid: u32,
        hwnd: Option<HWND>,
    }

    unsafe extern "system" fn match_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = &mut *(lparam.0 as *mut WindowSearch);
        let mut pid = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
        if pid == search.pid && IsWindowVisible(hwnd).as_bool() {
            search.hwnd = Some(hwnd);
            // Stop enumerating
            return BOOL(0);
        }
        BOOL(1)
    }

    impl KeySender for WindowKeySender {
        fn send_key(&self, key: VirtualKey) -> Result<()> {
            let pid = self.find_process()?;
            let hwnd = self.find_window(pid)?;

            // SAFETY: plain message posting to a window handle we just found
            unsafe {
                let scan = MapVirtualKeyW(key.code() as u32, MAPVK_VK_TO_VSC) as isize;
                let down = 1 | (scan << 16);
                let up = down | (1 << 30) | (1 << 31);
                let post_failed = |e: windows::core::Error| ActivationError::PostFailed {
                    key: key.to_string(),
                    details: e.to_string(),
                };

                PostMessageW(hwnd, WM_KEYDOWN, WPARAM(key.code() as usize), LPARAM(down))
                    .map_err(post_failed)?;
                PostMessageW(hwnd, WM_KEYUP, WPARAM(key.code() as usize), LPARAM(up))
                    .map_err(post_failed)?;
            }

            debug!("Posted {} to {} (pid {})", key, self.process_name, pid);
            Ok(())
        }
    }
}
