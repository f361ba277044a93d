//! Global start/stop hotkey.
//!
//! Hotkey strings look like `"ctrl+alt+p"`: any number of modifiers and
//! exactly one key, where the key uses the same names as [`crate::keys`].

use std::thread;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{KpError, Result};
use crate::keys::{parse_key, KeyCode};

/// Turns presses of one hotkey into flips of a watched on/off state.
struct Toggle {
    hotkey_id: u32,
    active: bool,
    sender: watch::Sender<bool>,
}

impl Toggle {
    /// Returns `false` once nobody is listening any more.
    fn handle(&mut self, id: u32, state: HotKeyState) -> bool {
        if id != self.hotkey_id || state != HotKeyState::Pressed {
            return true;
        }

        self.active = !self.active;
        debug!("toggle hotkey pressed, active = {}", self.active);
        self.sender.send(self.active).is_ok()
    }
}

fn register(hotkey: HotKey, hotkey_str: &str) -> Result<GlobalHotKeyManager> {
    let manager = GlobalHotKeyManager::new()
        .map_err(|e| KpError::hotkey(format!("failed to create hotkey manager: {e}")))?;
    manager
        .register(hotkey)
        .map_err(|e| KpError::hotkey(format!("failed to register '{hotkey_str}': {e}")))?;
    info!("toggle hotkey '{}' registered", hotkey_str);
    Ok(manager)
}

/// A registered start/stop hotkey and the thread listening for it.
///
/// Dropping the manager unregisters the hotkey and ends the thread.
pub struct HotkeyManager {
    active_receiver: watch::Receiver<bool>,
    #[cfg(windows)]
    thread_id: u32,
    #[cfg(not(windows))]
    _manager: GlobalHotKeyManager,
}

impl HotkeyManager {
    /// Register `hotkey_str` and start listening.
    ///
    /// `initially_active` is the state the first press toggles away from.
    #[cfg(windows)]
    pub fn spawn(hotkey_str: &str, initially_active: bool) -> Result<Self> {
        use std::sync::mpsc;

        let hotkey = parse_hotkey(hotkey_str)?;
        let hotkey_id = hotkey.id();
        let (sender, active_receiver) = watch::channel(initially_active);
        let (ready_tx, ready_rx) = mpsc::channel();
        let label = hotkey_str.to_string();

        // Windows delivers WM_HOTKEY to the thread that created the manager,
        // so creation, registration and the message loop share one thread.
        thread::spawn(move || {
            let manager = match register(hotkey, &label) {
                Ok(manager) => manager,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(win32::current_thread_id()));

            let mut toggle = Toggle {
                hotkey_id,
                active: initially_active,
                sender,
            };
            let events = GlobalHotKeyEvent::receiver();
            while win32::pump_one_message() {
                while let Ok(event) = events.try_recv() {
                    if !toggle.handle(event.id, event.state) {
                        win32::quit_loop();
                    }
                }
            }

            drop(manager);
            debug!("hotkey thread exiting");
        });

        let thread_id = ready_rx
            .recv()
            .map_err(|_| KpError::hotkey("hotkey thread exited during setup"))??;

        Ok(Self {
            active_receiver,
            thread_id,
        })
    }

    /// Register `hotkey_str` and start listening.
    ///
    /// `initially_active` is the state the first press toggles away from.
    #[cfg(not(windows))]
    pub fn spawn(hotkey_str: &str, initially_active: bool) -> Result<Self> {
        use std::time::Duration;

        let hotkey = parse_hotkey(hotkey_str)?;
        let hotkey_id = hotkey.id();
        let manager = register(hotkey, hotkey_str)?;
        let (sender, active_receiver) = watch::channel(initially_active);

        let mut toggle = Toggle {
            hotkey_id,
            active: initially_active,
            sender,
        };
        let events = GlobalHotKeyEvent::receiver();

        thread::spawn(move || {
            while !toggle.sender.is_closed() {
                if let Ok(event) = events.try_recv() {
                    if !toggle.handle(event.id, event.state) {
                        break;
                    }
                }

                thread::sleep(Duration::from_millis(10));
            }
        });

        Ok(Self {
            active_receiver,
            _manager: manager,
        })
    }

    /// Receiver that sees `true` when the hotkey asks for a run and `false`
    /// when it asks for a stop.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.active_receiver.clone()
    }
}

#[cfg(windows)]
impl Drop for HotkeyManager {
    fn drop(&mut self) {
        win32::quit_thread(self.thread_id);
    }
}

#[cfg(windows)]
mod win32 {
    use std::{mem, ptr};

    use winapi::um::processthreadsapi::GetCurrentThreadId;
    use winapi::um::winuser::{
        DispatchMessageW, GetMessageW, PostQuitMessage, PostThreadMessageW, TranslateMessage,
        MSG, WM_QUIT,
    };

    pub fn current_thread_id() -> u32 {
        // SAFETY: no preconditions.
        unsafe { GetCurrentThreadId() }
    }

    /// Block for one message on this thread and dispatch it. Returns
    /// `false` on WM_QUIT or error.
    pub fn pump_one_message() -> bool {
        // SAFETY: MSG is a plain C struct; all-zero is a valid value.
        let mut msg: MSG = unsafe { mem::zeroed() };
        // SAFETY: `msg` is a live out-pointer; a null HWND means any window
        // on this thread, including thread messages.
        let got = unsafe { GetMessageW(&mut msg, ptr::null_mut(), 0, 0) };
        if got <= 0 {
            return false;
        }
        // SAFETY: `msg` was filled in by GetMessageW above.
        unsafe {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
        true
    }

    pub fn quit_loop() {
        // SAFETY: posts WM_QUIT to the calling thread's own queue.
        unsafe { PostQuitMessage(0) }
    }

    pub fn quit_thread(thread_id: u32) {
        // SAFETY: posting to a thread that has exited fails harmlessly.
        unsafe {
            PostThreadMessageW(thread_id, WM_QUIT, 0, 0);
        }
    }
}

pub fn parse_hotkey(hotkey_str: &str) -> Result<HotKey> {
    let binding = hotkey_str.to_lowercase();
    let parts: Vec<&str> = binding
        .split('+')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(KpError::hotkey("empty hotkey string"));
    }

    let mut modifiers = Modifiers::empty();
    let mut key_code = None;

    for part in &parts {
        match *part {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "alt" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "meta" | "cmd" | "super" | "win" => modifiers |= Modifiers::SUPER,
            key => {
                if key_code.is_some() {
                    return Err(KpError::hotkey(format!(
                        "multiple keys specified in hotkey: {hotkey_str}"
                    )));
                }
                let vk = parse_key(key)?;
                let code = hotkey_code(vk).ok_or_else(|| {
                    KpError::hotkey(format!("'{key}' cannot be used in a hotkey"))
                })?;
                key_code = Some(code);
            }
        }
    }

    let code = key_code
        .ok_or_else(|| KpError::hotkey(format!("no key specified in hotkey: {hotkey_str}")))?;

    Ok(HotKey::new(Some(modifiers), code))
}

const LETTER_CODES: [Code; 26] = [
    Code::KeyA,
    Code::KeyB,
    Code::KeyC,
    Code::KeyD,
    Code::KeyE,
    Code::KeyF,
    Code::KeyG,
    Code::KeyH,
    Code::KeyI,
    Code::KeyJ,
    Code::KeyK,
    Code::KeyL,
    Code::KeyM,
    Code::KeyN,
    Code::KeyO,
    Code::KeyP,
    Code::KeyQ,
    Code::KeyR,
    Code::KeyS,
    Code::KeyT,
    Code::KeyU,
    Code::KeyV,
    Code::KeyW,
    Code::KeyX,
    Code::KeyY,
    Code::KeyZ,
];

const DIGIT_CODES: [Code; 10] = [
    Code::Digit0,
    Code::Digit1,
    Code::Digit2,
    Code::Digit3,
    Code::Digit4,
    Code::Digit5,
    Code::Digit6,
    Code::Digit7,
    Code::Digit8,
    Code::Digit9,
];

const NUMPAD_CODES: [Code; 10] = [
    Code::Numpad0,
    Code::Numpad1,
    Code::Numpad2,
    Code::Numpad3,
    Code::Numpad4,
    Code::Numpad5,
    Code::Numpad6,
    Code::Numpad7,
    Code::Numpad8,
    Code::Numpad9,
];

const FUNCTION_CODES: [Code; 12] = [
    Code::F1,
    Code::F2,
    Code::F3,
    Code::F4,
    Code::F5,
    Code::F6,
    Code::F7,
    Code::F8,
    Code::F9,
    Code::F10,
    Code::F11,
    Code::F12,
];

/// Map a virtual-key code to the hotkey crate's physical key code.
fn hotkey_code(vk: KeyCode) -> Option<Code> {
    let index = |base: KeyCode| usize::from(vk - base);

    match vk {
        0x41..=0x5A => LETTER_CODES.get(index(0x41)).copied(),
        0x30..=0x39 => DIGIT_CODES.get(index(0x30)).copied(),
        0x60..=0x69 => NUMPAD_CODES.get(index(0x60)).copied(),
        0x70..=0x7B => FUNCTION_CODES.get(index(0x70)).copied(),
        0x08 => Some(Code::Backspace),
        0x09 => Some(Code::Tab),
        0x0D => Some(Code::Enter),
        0x1B => Some(Code::Escape),
        0x20 => Some(Code::Space),
        0x25 => Some(Code::ArrowLeft),
        0x26 => Some(Code::ArrowUp),
        0x27 => Some(Code::ArrowRight),
        0x28 => Some(Code::ArrowDown),
        _ => None,
    }
}
