//! Error kinds reported by the interface manager.

use std::sync::atomic::{AtomicU8, Ordering};

/// Failure kinds of manager operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error, strum::EnumIter)]
#[repr(u8)]
pub enum EthError {
    #[error("Invalid parameter")]
    InvalidParameter = 1,
    #[error("Mutex timeout")]
    MutexTimeout = 2,
    #[error("Already initialized")]
    AlreadyInitialized = 3,
    #[error("Not initialized")]
    NotInitialized = 4,
    #[error("PHY start failed")]
    PhyStartFailed = 5,
    #[error("Configuration failed")]
    ConfigFailed = 6,
    #[error("Connection timeout")]
    ConnectionTimeout = 7,
    #[error("Event handler failed")]
    EventHandlerFailed = 8,
    #[error("Memory allocation failed")]
    MemoryAllocationFailed = 9,
    #[error("Network interface error")]
    NetifError = 10,
    #[error("Unknown error")]
    Unknown = 11,
}

pub type EthResult<T> = Result<T, EthError>;

impl EthError {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::InvalidParameter,
            2 => Self::MutexTimeout,
            3 => Self::AlreadyInitialized,
            4 => Self::NotInitialized,
            5 => Self::PhyStartFailed,
            6 => Self::ConfigFailed,
            7 => Self::ConnectionTimeout,
            8 => Self::EventHandlerFailed,
            9 => Self::MemoryAllocationFailed,
            10 => Self::NetifError,
            11 => Self::Unknown,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameter => "Invalid parameter",
            Self::MutexTimeout => "Mutex timeout",
            Self::AlreadyInitialized => "Already initialized",
            Self::NotInitialized => "Not initialized",
            Self::PhyStartFailed => "PHY start failed",
            Self::ConfigFailed => "Configuration failed",
            Self::ConnectionTimeout => "Connection timeout",
            Self::EventHandlerFailed => "Event handler failed",
            Self::MemoryAllocationFailed => "Memory allocation failed",
            Self::NetifError => "Network interface error",
            Self::Unknown => "Unknown error",
        }
    }
}

/// Text for an optional error, `"OK"` for `None`.
pub fn error_to_string(error: Option<EthError>) -> &'static str {
    error.map_or("OK", EthError::as_str)
}

/// Lock-free record of the most recent failure.
#[derive(Debug, Default)]
pub(crate) struct LastError(AtomicU8);

impl LastError {
    pub(crate) fn get(&self) -> Option<EthError> {
        EthError::from_code(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, error: EthError) {
        self.0.store(error.code(), Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    /// Record the error of a failed result and pass the result through.
    pub(crate) fn record<T>(&self, result: EthResult<T>) -> EthResult<T> {
        if let Err(error) = &result {
            self.set(*error);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_code_roundtrip_covers_all_kinds() {
        for error in EthError::iter() {
            assert_eq!(EthError::from_code(error.code()), Some(error));
            assert_eq!(error.to_string(), error.as_str());
        }
        assert_eq!(EthError::from_code(0), None);
        assert_eq!(EthError::from_code(200), None);
    }

    #[test]
    fn test_error_to_string() {
        assert_eq!(error_to_string(None), "OK");
        assert_eq!(
            error_to_string(Some(EthError::InvalidParameter)),
            "Invalid parameter"
        );
        assert_eq!(
            error_to_string(Some(EthError::NetifError)),
            "Network interface error"
        );
    }

    #[test]
    fn test_last_error_record() {
        let last = LastError::default();
        assert_eq!(last.get(), None);

        let ok: EthResult<u8> = last.record(Ok(1));
        assert_eq!(ok, Ok(1));
        assert_eq!(last.get(), None);

        let err: EthResult<()> = last.record(Err(EthError::MutexTimeout));
        assert_eq!(err, Err(EthError::MutexTimeout));
        assert_eq!(last.get(), Some(EthError::MutexTimeout));

        last.clear();
        assert_eq!(last.get(), None);
    }
}
