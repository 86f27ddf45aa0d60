//! Unified error types for the control layer.
//!
//! Port calls return the narrow error of their subsystem. The top-level
//! `Error` collects them for callers outside the control loop, such as
//! `ControlService::new` and the firmware entry point. All variants are
//! `Copy`.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The mesh engine refused or failed an operation.
    Engine(EngineError),
    /// The persistent store could not be opened or written.
    Storage(StorageError),
    /// Configuration is invalid or could not be parsed.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(e) => write!(f, "engine: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// A precondition is not yet met; the same call may succeed later.
    NotReady,
    /// The engine rejected the request outright.
    Rejected,
    /// Transport or storage I/O failed underneath the engine.
    Io,
    /// The engine (or the requested transport) is not available.
    Unavailable,
    /// No route to the recipient.
    NoRoute,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "not ready"),
            Self::Rejected => write!(f, "rejected"),
            Self::Io => write!(f, "I/O failure"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::NoRoute => write!(f, "no route"),
        }
    }
}

impl From<EngineError> for Error {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage is held elsewhere or not mounted; retry later.
    Unavailable,
    /// Read or write failed.
    Io,
    /// No space left for the zone.
    Full,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::Io => write!(f, "I/O failure"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field is outside its accepted range.
    ValidationFailed(&'static str),
    /// The document could not be parsed.
    Parse,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(field) => write!(f, "invalid value for {field}"),
            Self::Parse => write!(f, "parse error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
