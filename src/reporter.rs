//! Device error reporting.
//!
//! Every primitive returns either a value or a [`DeviceErrorCode`].
//! [`ErrorReporter`] resolves the code into the controller's own description,
//! logs it, and hands back a structured [`PumpError::DeviceComm`] so the caller
//! decides whether to retry, halt or give up. It never aborts the process.

use crate::error::{PumpError, PumpResult};
use crate::transport::{DeviceErrorCode, EposTransport, NodeId, TransportResult};
use serde::Serialize;

/// A device error code with its description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Device error code
    pub code: DeviceErrorCode,
    /// Human-readable description
    pub message: String,
}

/// Converts primitive failures of one node into `PumpError`s.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReporter {
    node: NodeId,
}

impl ErrorReporter {
    /// Reporter for `node`.
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }

    /// Look up the description of `code`.
    ///
    /// If the lookup itself fails the message says so; this never errors.
    pub async fn report(&self, transport: &dyn EposTransport, code: DeviceErrorCode) -> ErrorInfo {
        let message = match transport.get_error_info(code).await {
            Ok(message) => message,
            Err(lookup) => {
                tracing::warn!(
                    node = %self.node,
                    %code,
                    lookup_code = %lookup,
                    "Device error description unavailable"
                );
                format!("unknown device error (description lookup failed with {lookup})")
            }
        };
        ErrorInfo { code, message }
    }

    /// Pass a successful primitive result through, or report and convert the failure.
    pub async fn check<T>(
        &self,
        transport: &dyn EposTransport,
        operation: &'static str,
        result: TransportResult<T>,
    ) -> PumpResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(code) => {
                let info = self.report(transport, code).await;
                tracing::error!(
                    node = %self.node,
                    operation,
                    code = %info.code,
                    message = %info.message,
                    "Device command failed"
                );
                Err(PumpError::DeviceComm {
                    node: self.node,
                    operation,
                    code: info.code,
                    message: info.message,
                })
            }
        }
    }
}
