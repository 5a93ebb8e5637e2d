// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    #[error("Command timed out after {0} seconds: {1}")]
    Timeout(u64, String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
