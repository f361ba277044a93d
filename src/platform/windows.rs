//! Windows backend: one `SendInput` call per batch.
//!
//! Mouse-button virtual keys (`VK_LBUTTON`, `VK_RBUTTON`, `VK_MBUTTON`) are
//! not delivered as keyboard input by Windows, so they are translated into
//! `MOUSEINPUT` button events inside the same batch.

use std::mem;

use tracing::debug;
use winapi::um::winuser::{
    SendInput, INPUT, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEINPUT,
};

use crate::error::{KpError, Result};
use crate::injector::{InputBackend, KeyDirection, KeyEvent};
use crate::keys::{VK_LBUTTON, VK_MBUTTON, VK_RBUTTON};

/// Injects key events via `SendInput`.
///
/// Stateless: each `send()` builds an `INPUT` array and submits it
/// synchronously.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendInputBackend;

impl SendInputBackend {
    pub fn new() -> Self {
        SendInputBackend
    }
}

fn mouse_flags(event: &KeyEvent) -> Option<u32> {
    let flags = match (event.code, event.direction) {
        (VK_LBUTTON, KeyDirection::Down) => MOUSEEVENTF_LEFTDOWN,
        (VK_LBUTTON, KeyDirection::Up) => MOUSEEVENTF_LEFTUP,
        (VK_RBUTTON, KeyDirection::Down) => MOUSEEVENTF_RIGHTDOWN,
        (VK_RBUTTON, KeyDirection::Up) => MOUSEEVENTF_RIGHTUP,
        (VK_MBUTTON, KeyDirection::Down) => MOUSEEVENTF_MIDDLEDOWN,
        (VK_MBUTTON, KeyDirection::Up) => MOUSEEVENTF_MIDDLEUP,
        _ => return None,
    };
    Some(flags)
}

fn to_input(event: &KeyEvent) -> INPUT {
    // SAFETY: INPUT is a plain C struct; all-zero is a valid value.
    let mut input: INPUT = unsafe { mem::zeroed() };

    if let Some(flags) = mouse_flags(event) {
        input.type_ = INPUT_MOUSE;
        // SAFETY: type_ is INPUT_MOUSE, so `mi` is the active union field.
        unsafe {
            *input.u.mi_mut() = MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            };
        }
    } else {
        let flags = match event.direction {
            KeyDirection::Down => 0,
            KeyDirection::Up => KEYEVENTF_KEYUP,
        };
        input.type_ = INPUT_KEYBOARD;
        // SAFETY: type_ is INPUT_KEYBOARD, so `ki` is the active union field.
        unsafe {
            *input.u.ki_mut() = KEYBDINPUT {
                wVk: event.code,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            };
        }
    }

    input
}

impl InputBackend for SendInputBackend {
    fn send(&self, batch: &[KeyEvent]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut inputs: Vec<INPUT> = batch.iter().map(to_input).collect();
        let count = u32::try_from(inputs.len()).map_err(|_| KpError::injection(0, batch.len()))?;

        // SAFETY: `inputs` is a live, correctly sized array of INPUT records.
        let sent = unsafe {
            SendInput(
                count,
                inputs.as_mut_ptr(),
                mem::size_of::<INPUT>() as i32,
            )
        } as usize;

        if sent < batch.len() {
            return Err(KpError::injection(sent, batch.len()));
        }

        debug!("SendInput accepted {} events", sent);
        Ok(sent)
    }
}
