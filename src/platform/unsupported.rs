use crate::error::{KpError, Result};
use crate::injector::{InputBackend, KeyEvent};

/// Stand-in backend for platforms without native injection.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl InputBackend for UnsupportedBackend {
    fn send(&self, batch: &[KeyEvent]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        Err(KpError::unsupported_platform(
            "key injection is only implemented for Windows; use --dry-run",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_is_not_an_error() {
        assert_eq!(UnsupportedBackend.send(&[]).unwrap(), 0);
    }

    #[test]
    fn test_non_empty_batch_reports_unsupported() {
        let err = UnsupportedBackend.send(&[KeyEvent::down(0x41)]).unwrap_err();
        assert!(matches!(err, KpError::UnsupportedPlatform(_)));
    }
}
