//! Error types used by the modevisor runtime, its modes and the control plane.
//!
//! - [`RuntimeError`]: errors raised by the scheduler runtime itself.
//! - [`ModeError`]: errors raised by a mode's `priority` / `step` / `cleanup`.
//! - [`ControlError`]: rejected control-plane requests (bad name, bad priority).
//! - [`ConfigError`]: malformed configuration, fatal at startup.
//! - [`SessionError`]: failures talking to collaborator services.
//!
//! Every enum provides `as_label()` returning a short stable snake_case label
//! for logs and events.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the scheduler runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; the running mode did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck mode: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Name of the mode that was still running.
        stuck: Option<String>,
    },

    /// The scheduler loop was started twice on the same instance.
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// The control-plane listener could not be bound or served.
    #[error("control plane i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: None };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::Io(_) => "runtime_io",
        }
    }
}

/// # Errors produced by a mode policy.
///
/// A policy should catch collaborator failures itself and degrade to a safe
/// default; whatever still escapes is contained by the worker and scheduler.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModeError {
    /// A step or query failed but may succeed on the next attempt.
    #[error("mode failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A collaborator service could not be reached or answered badly.
    #[error("collaborator {service} unavailable: {error}")]
    Collaborator {
        /// Collaborator name (e.g. `presence`, `lights`).
        service: &'static str,
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error; the worker stops retrying immediately.
    #[error("fatal mode error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl ModeError {
    /// Shorthand for [`ModeError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ModeError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ModeError::Fail { .. } => "mode_failed",
            ModeError::Collaborator { .. } => "mode_collaborator",
            ModeError::Fatal { .. } => "mode_fatal",
        }
    }

    /// Indicates whether the worker may retry the failed step.
    ///
    /// # Example
    /// ```
    /// use modevisor::ModeError;
    ///
    /// assert!(ModeError::fail("boom").is_retryable());
    /// assert!(!ModeError::Fatal { error: "nope".into() }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ModeError::Fatal { .. })
    }
}

impl From<SessionError> for ModeError {
    fn from(e: SessionError) -> Self {
        ModeError::Collaborator {
            service: e.service(),
            error: e.to_string(),
        }
    }
}

/// # Rejected control-plane requests.
///
/// Returned synchronously to the caller; scheduler state is left untouched.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// No registered mode carries this name.
    #[error("unknown mode name: {name:?}")]
    UnknownMode {
        /// The name as received.
        name: String,
    },

    /// The request did not name a mode.
    #[error("missing mode name")]
    MissingMode,

    /// The priority override is not a non-negative integer.
    #[error("invalid priority: {value}")]
    InvalidPriority {
        /// The raw value as received.
        value: String,
    },

    /// The request body was not valid JSON.
    #[error("malformed request body: {reason}")]
    MalformedBody {
        /// Parser message.
        reason: String,
    },
}

impl ControlError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ControlError::UnknownMode { .. } => "control_unknown_mode",
            ControlError::MissingMode => "control_missing_mode",
            ControlError::InvalidPriority { .. } => "control_invalid_priority",
            ControlError::MalformedBody { .. } => "control_malformed_body",
        }
    }
}

/// # Configuration errors (fatal at startup).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that was opened.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the expected schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A field holds a value outside its allowed range.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// # Errors talking to a collaborator service.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport-level failure (connect, timeout, undecodable body).
    #[error("{service}: http error: {source}")]
    Http {
        /// Collaborator name.
        service: &'static str,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },

    /// The service answered with `success: false` or a non-2xx status.
    #[error("{service}: request rejected ({status}): {message}")]
    Rejected {
        /// Collaborator name.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Message carried by the response envelope.
        message: String,
    },
}

impl SessionError {
    /// Name of the collaborator that failed.
    pub fn service(&self) -> &'static str {
        match self {
            SessionError::Http { service, .. } | SessionError::Rejected { service, .. } => service,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Http { .. } => "session_http",
            SessionError::Rejected { .. } => "session_rejected",
        }
    }
}
