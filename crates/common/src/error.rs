use derive_more::Display;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Defines the application's custom error types.
///
#[derive(Debug, Error)]
pub enum Error {
    #[error("Error: {0}")]
    Any(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Task failed: {0}")]
    OperationFailed(String),
    #[error("Timeout after: {0} seconds")]
    Timeout(f32),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("vSphere API error: {0} failed: status {1}, body: {2}")]
    Vsphere(VsphereError, reqwest::StatusCode, String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Failed to set logger: {0}")]
    Logger(#[from] tracing_log::log::SetLoggerError),
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tracing::dispatcher::SetGlobalDefaultError),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    /// Returns `true` for a remote task that reached the `error` state.
    ///
    pub fn is_operation_failed(&self) -> bool {
        matches!(self, Error::OperationFailed(_))
    }
}

/// Represents the vSphere API operation that failed.
///
#[derive(Debug, Display, Clone, Copy, PartialEq)]
pub enum VsphereError {
    Content,
    Login,
    Logout,
    Inventory,
    Property,
    MarkAsVirtualMachine,
    MarkAsTemplate,
    PowerOn,
    PowerOff,
    UpgradeHardware,
    UpgradeTools,
    TaskStatus,
}
