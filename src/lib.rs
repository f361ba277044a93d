//! # Key Presser
//!
//! Presses a set of keys together, over and over, waiting a fixed or
//! randomized delay between presses. Key sets can be saved as named macros
//! in a flat text file and loaded back.
//!
//! ## Features
//!
//! - All keys in a set go down in one batch and come up in one batch
//! - Optional randomized delay (10-100% of the configured seconds)
//! - Stop wakes the background loop immediately and waits for it to exit
//! - Append-only macro store compatible with the classic `macros.txt` format
//! - Global hotkey to stop and restart a run
//! - JSON configuration file support
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use key_presser::{platform, InputInjector, MacroRunner, MacroStore, SharedState};
//!
//! let store = MacroStore::new("macros.txt");
//! let shared = Arc::new(SharedState::new());
//! if let Ok(Some(m)) = store.find("chord") {
//!     shared.apply_macro(&m);
//! }
//!
//! let mut runner = MacroRunner::new(shared, InputInjector::new(platform::native_backend()));
//! runner.start();
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! runner.stop();
//! ```
//!
//! ## Store format
//!
//! Three lines per macro: name, delay in seconds, space-separated key codes.
//!
//! ```text
//! chord
//! 3
//! 65 66
//! ```

pub mod config;
pub mod error;
pub mod global_hotkey;
pub mod injector;
pub mod keys;
pub mod platform;
pub mod runner;
pub mod store;

pub use config::Config;
pub use error::{KpError, Result};
pub use crate::global_hotkey::HotkeyManager;
pub use injector::{InputBackend, InputInjector, KeyEvent, LogBackend};
pub use keys::{KeyCode, KeySet};
pub use runner::{MacroRunner, SharedState};
pub use store::{Macro, MacroStore};
