//! Error types for the pump driver.
//!
//! `PumpError` is the single error type returned by every public operation of
//! the driver. It is built with `thiserror` and separates failures by who has
//! to act on them:
//!
//! - **Configuration errors** - `Configuration`, `Config`
//!   - Bad syringe geometry, impossible conversion factors or unreadable config files
//!   - Recovery: fix the configuration and re-open the session
//!
//! - **Device errors** - `DeviceComm`, `UnknownDeviceState`, `ObjectSize`
//!   - The controller (or the transport in front of it) reported a failure
//!   - Carry the device's own error code and description
//!   - Recovery: inspect the code, `halt()`/`enable()` and retry, or power cycle
//!
//! - **Local validation errors** - `Precondition`, `Capacity`, `InvalidArgument`, `SessionClosed`
//!   - Detected before any command is sent, so the device state is untouched
//!
//! - **Wait errors** - `HomingTimeout`, `MoveTimeout`, `Cancelled`
//!   - A bounded wait did not observe the expected position
//!
//! Nothing in the driver terminates the process; every failure reaches the
//! caller as one of these variants.

use crate::transport::{DeviceErrorCode, NodeId};
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type PumpResult<T> = std::result::Result<T, PumpError>;

/// Primary error type for the pump driver.
#[derive(Error, Debug)]
pub enum PumpError {
    /// Configuration file parsing failed.
    ///
    /// **Source**: Wraps `figment::Error` from the layered config loader.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Syringe geometry or derived conversion factors are unusable.
    ///
    /// Raised at initialisation, never during motion. A zero gear
    /// denominator or a non-positive syringe cross-section lands here.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// A transport primitive reported a non-zero device error code.
    ///
    /// `message` is the description the controller supplies for `code`.
    #[error("Node {node}: {operation} failed with device error {code}: {message}")]
    DeviceComm {
        /// Node the command was addressed to
        node: NodeId,
        /// Primitive that failed
        operation: &'static str,
        /// Device error code
        code: DeviceErrorCode,
        /// Device-supplied description of `code`
        message: String,
    },

    /// The controller reported a status code outside the known state set.
    #[error("Node {node}: unknown device state code {code:#06x}")]
    UnknownDeviceState {
        /// Node that reported the code
        node: NodeId,
        /// Raw status code
        code: u16,
    },

    /// An object dictionary read returned the wrong number of bytes.
    #[error("Node {node}: object {index:#06x}:{sub_index} returned {actual} bytes, expected {expected}")]
    ObjectSize {
        /// Node that was read
        node: NodeId,
        /// Object index
        index: u16,
        /// Object sub-index
        sub_index: u8,
        /// Expected byte count
        expected: usize,
        /// Byte count actually returned
        actual: usize,
    },

    /// The operation was invoked in the wrong state.
    ///
    /// Example: `move_to_set_speed` before any `set_speed`.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Aspirate/dose would overflow or underflow the syringe.
    #[error("Capacity exceeded: target {target_ul:.1} µl outside [{min_ul:.1}, {max_ul:.1}] µl")]
    Capacity {
        /// Requested target position in µl
        target_ul: f64,
        /// Lowest allowed position (full syringe)
        min_ul: f64,
        /// Highest allowed position (empty syringe)
        max_ul: f64,
    },

    /// An argument is outside the accepted domain (e.g. zero velocity).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Homing did not reach the expected position in time.
    #[error("Node {node}: homing did not reach {expected} counts within {timeout:?} (last position {last_position})")]
    HomingTimeout {
        /// Node being homed
        node: NodeId,
        /// Expected raw position
        expected: i32,
        /// Last raw position observed
        last_position: i32,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// A profiled move did not reach its target in time.
    #[error("Node {node}: move did not reach {expected} counts within {timeout:?} (last position {last_position})")]
    MoveTimeout {
        /// Node being moved
        node: NodeId,
        /// Expected raw position
        expected: i32,
        /// Last raw position observed
        last_position: i32,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// A wait was aborted through its `CancelHandle`.
    #[error("Node {node}: wait cancelled at position {last_position}")]
    Cancelled {
        /// Node whose wait was cancelled
        node: NodeId,
        /// Last raw position observed
        last_position: i32,
    },

    /// The session was already closed.
    #[error("Node {0}: session is closed")]
    SessionClosed(NodeId),
}

impl From<figment::Error> for PumpError {
    fn from(err: figment::Error) -> Self {
        PumpError::Config(Box::new(err))
    }
}

impl PumpError {
    /// Device error code carried by this error, if any.
    pub fn device_code(&self) -> Option<DeviceErrorCode> {
        match self {
            PumpError::DeviceComm { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the failure was detected locally, before any device command.
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            PumpError::Precondition(_)
                | PumpError::Capacity { .. }
                | PumpError::InvalidArgument(_)
                | PumpError::SessionClosed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_comm_display() {
        let err = PumpError::DeviceComm {
            node: NodeId(2),
            operation: "SetEnableState",
            code: DeviceErrorCode(0x3400_0000),
            message: "Overcurrent error".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Node 2"));
        assert!(text.contains("SetEnableState"));
        assert!(text.contains("0x34000000"));
        assert!(text.contains("Overcurrent error"));
        assert_eq!(err.device_code(), Some(DeviceErrorCode(0x3400_0000)));
    }

    #[test]
    fn test_local_rejections() {
        assert!(PumpError::Precondition("no speed".into()).is_local_rejection());
        assert!(PumpError::InvalidArgument("zero".into()).is_local_rejection());
        assert!(PumpError::Capacity {
            target_ul: -600.0,
            min_ul: -500.0,
            max_ul: 0.0
        }
        .is_local_rejection());
        assert!(!PumpError::Configuration("area".into()).is_local_rejection());
    }

    #[test]
    fn test_capacity_display() {
        let err = PumpError::Capacity {
            target_ul: -600.0,
            min_ul: -499.8,
            max_ul: 0.0,
        };
        assert_eq!(
            err.to_string(),
            "Capacity exceeded: target -600.0 µl outside [-499.8, 0.0] µl"
        );
    }
}
