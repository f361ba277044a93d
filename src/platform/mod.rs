//! Native input backends.
//!
//! Windows gets a `SendInput` backend. Other platforms are not supported
//! yet; their backend reports every batch as an error, which the injector
//! logs and drops, so the run loop still ticks.

use std::sync::Arc;

use crate::injector::InputBackend;

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use self::windows::SendInputBackend;

#[cfg(not(windows))]
mod unsupported;

#[cfg(not(windows))]
pub use self::unsupported::UnsupportedBackend;

/// Returns the backend for the platform this binary was built for.
pub fn native_backend() -> Arc<dyn InputBackend> {
    #[cfg(windows)]
    {
        Arc::new(SendInputBackend::new())
    }

    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedBackend)
    }
}
