//! Transport contract towards the motor controller.
//!
//! The driver never speaks the controller's wire protocol itself. It consumes
//! a fixed set of primitives, modelled after the EPOS command library, through
//! the [`EposTransport`] trait. Every primitive either succeeds or fails with
//! the device's own [`DeviceErrorCode`]; turning that code into a diagnostic is
//! the job of [`crate::reporter::ErrorReporter`].
//!
//! Several pump nodes usually hang off one serial line. [`SharedBus`] wraps a
//! single transport in an async mutex so that each session gets its own handle
//! while physical access stays serialised.
//!
//! # Example
//!
//! ```rust,ignore
//! use nemesys::sim::SimulatedEpos;
//! use nemesys::transport::{NodeId, SharedBus};
//!
//! let bus = SharedBus::new(SimulatedEpos::new());
//! let pump_a = PumpSession::open(Box::new(bus.clone()), config_a).await?;
//! let pump_b = PumpSession::open(Box::new(bus.clone()), config_b).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

// =============================================================================
// Identifiers and codes
// =============================================================================

/// Address of one device on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u8);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Out-of-band error code reported by a failed primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceErrorCode(pub u32);

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Result of a transport primitive.
pub type TransportResult<T> = Result<T, DeviceErrorCode>;

/// Object dictionary entry (index + sub-index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectAddress {
    /// Object index
    pub index: u16,
    /// Object sub-index
    pub sub_index: u8,
}

impl ObjectAddress {
    /// Velocity notation index (signed exponent, 1 byte).
    pub const VELOCITY_NOTATION: Self = Self::new(0x608B, 0);
    /// Encoder pulse number per turn (4 bytes).
    pub const ENCODER_RESOLUTION: Self = Self::new(0x2210, 1);
    /// Gear factor numerator (4 bytes).
    pub const GEAR_NUMERATOR: Self = Self::new(0x200C, 1);
    /// Gear factor denominator (4 bytes).
    pub const GEAR_DENOMINATOR: Self = Self::new(0x200C, 4);

    /// Build an address from index and sub-index.
    pub const fn new(index: u16, sub_index: u8) -> Self {
        Self { index, sub_index }
    }
}

impl fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}:{}", self.index, self.sub_index)
    }
}

/// Names of the transport primitives, used in logs, errors and fault injection.
pub mod ops {
    #![allow(missing_docs)]
    pub const OPEN_DEVICE: &str = "OpenDevice";
    pub const CLOSE_DEVICE: &str = "CloseDevice";
    pub const CLEAR_FAULT: &str = "ClearFault";
    pub const SET_ENABLE_STATE: &str = "SetEnableState";
    pub const SET_DISABLE_STATE: &str = "SetDisableState";
    pub const GET_STATE: &str = "GetState";
    pub const GET_POSITION_IS: &str = "GetPositionIs";
    pub const GET_VELOCITY_IS: &str = "GetVelocityIs";
    pub const GET_MOVEMENT_STATE: &str = "GetMovementState";
    pub const ACTIVATE_MODE: &str = "ActivateMode";
    pub const GET_OPERATION_MODE: &str = "GetOperationMode";
    pub const SET_POSITION_PROFILE: &str = "SetPositionProfile";
    pub const GET_POSITION_PROFILE: &str = "GetPositionProfile";
    pub const MOVE_TO_POSITION: &str = "MoveToPosition";
    pub const HALT_POSITION_MOVEMENT: &str = "HaltPositionMovement";
    pub const SET_HOMING_PARAMETER: &str = "SetHomingParameter";
    pub const FIND_HOME: &str = "FindHome";
    pub const GET_ALL_DIGITAL_OUTPUTS: &str = "GetAllDigitalOutputs";
    pub const SET_ALL_DIGITAL_OUTPUTS: &str = "SetAllDigitalOutputs";
    pub const GET_OBJECT: &str = "GetObject";
}

// =============================================================================
// Operating modes and motion parameters
// =============================================================================

/// Operating mode of the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Profiled position moves (mode 1)
    ProfilePosition,
    /// Profiled velocity (mode 3)
    ProfileVelocity,
    /// Reference search (mode 6)
    Homing,
    /// Interpolated position (mode 7)
    InterpolatedPosition,
    /// Direct position control (mode -1)
    Position,
    /// Direct velocity control (mode -2)
    Velocity,
    /// Current control (mode -3)
    Current,
    /// Any other mode code
    Other(i8),
}

impl OperationMode {
    /// Raw mode code as used by the controller.
    pub fn code(self) -> i8 {
        match self {
            OperationMode::ProfilePosition => 1,
            OperationMode::ProfileVelocity => 3,
            OperationMode::Homing => 6,
            OperationMode::InterpolatedPosition => 7,
            OperationMode::Position => -1,
            OperationMode::Velocity => -2,
            OperationMode::Current => -3,
            OperationMode::Other(code) => code,
        }
    }

    /// Decode a raw mode code.
    pub fn from_code(code: i8) -> Self {
        match code {
            1 => OperationMode::ProfilePosition,
            3 => OperationMode::ProfileVelocity,
            6 => OperationMode::Homing,
            7 => OperationMode::InterpolatedPosition,
            -1 => OperationMode::Position,
            -2 => OperationMode::Velocity,
            -3 => OperationMode::Current,
            other => OperationMode::Other(other),
        }
    }
}

/// Position profile: velocity in device velocity units, ramps in rpm/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionProfile {
    /// Profile velocity
    pub velocity: u32,
    /// Profile acceleration
    pub acceleration: u32,
    /// Profile deceleration
    pub deceleration: u32,
}

/// Reference-search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomingParameters {
    /// Homing acceleration
    pub acceleration: u32,
    /// Speed while searching for the switch
    pub speed_switch: u32,
    /// Speed while searching for the index
    pub speed_index: u32,
    /// Offset moved away from the switch
    pub home_offset: i32,
    /// Current threshold for block detection
    pub current_threshold: u16,
    /// Position assigned to the reference point
    pub home_position: i32,
}

/// Reference-search method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomingMethod {
    /// Negative limit switch (method 17)
    NegativeLimitSwitch,
    /// Positive limit switch (method 18)
    PositiveLimitSwitch,
}

impl HomingMethod {
    /// Raw method code.
    pub fn code(self) -> i8 {
        match self {
            HomingMethod::NegativeLimitSwitch => 17,
            HomingMethod::PositiveLimitSwitch => 18,
        }
    }
}

// =============================================================================
// Transport trait
// =============================================================================

/// Primitive operations offered by the motor controller transport.
///
/// Implementations own the physical link. All methods take `&self`; an
/// implementation that multiplexes several nodes must serialise access itself
/// (see [`SharedBus`]).
#[async_trait]
pub trait EposTransport: Send + Sync {
    /// Open the physical link.
    async fn open(&self) -> TransportResult<()>;

    /// Close the physical link.
    async fn close(&self) -> TransportResult<()>;

    /// Clear a pending fault on the node.
    async fn clear_fault(&self, node: NodeId) -> TransportResult<()>;

    /// Request the enabled state.
    async fn set_enable_state(&self, node: NodeId) -> TransportResult<()>;

    /// Request the disabled state.
    async fn set_disable_state(&self, node: NodeId) -> TransportResult<()>;

    /// Raw device state code (0 disabled, 1 enabled, 2 quick stop, 3 fault).
    async fn get_state(&self, node: NodeId) -> TransportResult<u16>;

    /// Actual position in encoder counts.
    async fn get_position_is(&self, node: NodeId) -> TransportResult<i32>;

    /// Actual velocity in device velocity units.
    async fn get_velocity_is(&self, node: NodeId) -> TransportResult<i32>;

    /// Target-reached flag of the current movement.
    async fn get_movement_state(&self, node: NodeId) -> TransportResult<bool>;

    /// Switch the node into an operating mode.
    async fn activate_mode(&self, node: NodeId, mode: OperationMode) -> TransportResult<()>;

    /// Currently active operating mode.
    async fn get_operation_mode(&self, node: NodeId) -> TransportResult<OperationMode>;

    /// Program the position profile.
    async fn set_position_profile(
        &self,
        node: NodeId,
        profile: PositionProfile,
    ) -> TransportResult<()>;

    /// Read back the position profile.
    async fn get_position_profile(&self, node: NodeId) -> TransportResult<PositionProfile>;

    /// Start a profiled move.
    async fn move_to_position(
        &self,
        node: NodeId,
        target: i32,
        absolute: bool,
        immediately: bool,
    ) -> TransportResult<()>;

    /// Stop a profiled move.
    async fn halt_position_movement(&self, node: NodeId) -> TransportResult<()>;

    /// Program the reference search.
    async fn set_homing_parameter(
        &self,
        node: NodeId,
        params: HomingParameters,
    ) -> TransportResult<()>;

    /// Start the reference search.
    async fn find_home(&self, node: NodeId, method: HomingMethod) -> TransportResult<()>;

    /// Read the digital output word.
    async fn get_all_digital_outputs(&self, node: NodeId) -> TransportResult<u16>;

    /// Write the digital output word.
    async fn set_all_digital_outputs(&self, node: NodeId, word: u16) -> TransportResult<()>;

    /// Read `len` bytes of an object dictionary entry (little endian).
    async fn get_object(
        &self,
        node: NodeId,
        address: ObjectAddress,
        len: usize,
    ) -> TransportResult<Vec<u8>>;

    /// Human-readable description of an error code.
    async fn get_error_info(&self, code: DeviceErrorCode) -> TransportResult<String>;
}

#[async_trait]
impl<T: EposTransport + ?Sized> EposTransport for Box<T> {
    async fn open(&self) -> TransportResult<()> {
        (**self).open().await
    }
    async fn close(&self) -> TransportResult<()> {
        (**self).close().await
    }
    async fn clear_fault(&self, node: NodeId) -> TransportResult<()> {
        (**self).clear_fault(node).await
    }
    async fn set_enable_state(&self, node: NodeId) -> TransportResult<()> {
        (**self).set_enable_state(node).await
    }
    async fn set_disable_state(&self, node: NodeId) -> TransportResult<()> {
        (**self).set_disable_state(node).await
    }
    async fn get_state(&self, node: NodeId) -> TransportResult<u16> {
        (**self).get_state(node).await
    }
    async fn get_position_is(&self, node: NodeId) -> TransportResult<i32> {
        (**self).get_position_is(node).await
    }
    async fn get_velocity_is(&self, node: NodeId) -> TransportResult<i32> {
        (**self).get_velocity_is(node).await
    }
    async fn get_movement_state(&self, node: NodeId) -> TransportResult<bool> {
        (**self).get_movement_state(node).await
    }
    async fn activate_mode(&self, node: NodeId, mode: OperationMode) -> TransportResult<()> {
        (**self).activate_mode(node, mode).await
    }
    async fn get_operation_mode(&self, node: NodeId) -> TransportResult<OperationMode> {
        (**self).get_operation_mode(node).await
    }
    async fn set_position_profile(
        &self,
        node: NodeId,
        profile: PositionProfile,
    ) -> TransportResult<()> {
        (**self).set_position_profile(node, profile).await
    }
    async fn get_position_profile(&self, node: NodeId) -> TransportResult<PositionProfile> {
        (**self).get_position_profile(node).await
    }
    async fn move_to_position(
        &self,
        node: NodeId,
        target: i32,
        absolute: bool,
        immediately: bool,
    ) -> TransportResult<()> {
        (**self)
            .move_to_position(node, target, absolute, immediately)
            .await
    }
    async fn halt_position_movement(&self, node: NodeId) -> TransportResult<()> {
        (**self).halt_position_movement(node).await
    }
    async fn set_homing_parameter(
        &self,
        node: NodeId,
        params: HomingParameters,
    ) -> TransportResult<()> {
        (**self).set_homing_parameter(node, params).await
    }
    async fn find_home(&self, node: NodeId, method: HomingMethod) -> TransportResult<()> {
        (**self).find_home(node, method).await
    }
    async fn get_all_digital_outputs(&self, node: NodeId) -> TransportResult<u16> {
        (**self).get_all_digital_outputs(node).await
    }
    async fn set_all_digital_outputs(&self, node: NodeId, word: u16) -> TransportResult<()> {
        (**self).set_all_digital_outputs(node, word).await
    }
    async fn get_object(
        &self,
        node: NodeId,
        address: ObjectAddress,
        len: usize,
    ) -> TransportResult<Vec<u8>> {
        (**self).get_object(node, address, len).await
    }
    async fn get_error_info(&self, code: DeviceErrorCode) -> TransportResult<String> {
        (**self).get_error_info(code).await
    }
}

// =============================================================================
// SharedBus - one physical line, many sessions
// =============================================================================

/// A transport shared by several node sessions.
///
/// Each clone is an independent handle. Every primitive locks the underlying
/// transport for its duration, so commands to different nodes never
/// interleave on the wire. `open`/`close` are reference counted: the link is
/// opened by the first handle and closed by the last.
pub struct SharedBus<T> {
    inner: Arc<Mutex<T>>,
    open_handles: Arc<AtomicUsize>,
}

impl<T> Clone for SharedBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            open_handles: Arc::clone(&self.open_handles),
        }
    }
}

impl<T: EposTransport> SharedBus<T> {
    /// Wrap a transport for sharing.
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of handles that currently hold the link open.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Run a closure against the underlying transport while holding the bus.
    pub async fn with_transport<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().await;
        f(&guard)
    }
}

#[async_trait]
impl<T: EposTransport> EposTransport for SharedBus<T> {
    async fn open(&self) -> TransportResult<()> {
        let guard = self.inner.lock().await;
        if self.open_handles.load(Ordering::SeqCst) == 0 {
            guard.open().await?;
            tracing::debug!("Shared bus opened");
        }
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        let guard = self.inner.lock().await;
        let previous = self.open_handles.load(Ordering::SeqCst);
        if previous == 0 {
            return Ok(());
        }
        if previous == 1 {
            guard.close().await?;
            tracing::debug!("Shared bus closed by last handle");
        }
        self.open_handles.store(previous - 1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_fault(&self, node: NodeId) -> TransportResult<()> {
        self.inner.lock().await.clear_fault(node).await
    }
    async fn set_enable_state(&self, node: NodeId) -> TransportResult<()> {
        self.inner.lock().await.set_enable_state(node).await
    }
    async fn set_disable_state(&self, node: NodeId) -> TransportResult<()> {
        self.inner.lock().await.set_disable_state(node).await
    }
    async fn get_state(&self, node: NodeId) -> TransportResult<u16> {
        self.inner.lock().await.get_state(node).await
    }
    async fn get_position_is(&self, node: NodeId) -> TransportResult<i32> {
        self.inner.lock().await.get_position_is(node).await
    }
    async fn get_velocity_is(&self, node: NodeId) -> TransportResult<i32> {
        self.inner.lock().await.get_velocity_is(node).await
    }
    async fn get_movement_state(&self, node: NodeId) -> TransportResult<bool> {
        self.inner.lock().await.get_movement_state(node).await
    }
    async fn activate_mode(&self, node: NodeId, mode: OperationMode) -> TransportResult<()> {
        self.inner.lock().await.activate_mode(node, mode).await
    }
    async fn get_operation_mode(&self, node: NodeId) -> TransportResult<OperationMode> {
        self.inner.lock().await.get_operation_mode(node).await
    }
    async fn set_position_profile(
        &self,
        node: NodeId,
        profile: PositionProfile,
    ) -> TransportResult<()> {
        self.inner
            .lock()
            .await
            .set_position_profile(node, profile)
            .await
    }
    async fn get_position_profile(&self, node: NodeId) -> TransportResult<PositionProfile> {
        self.inner.lock().await.get_position_profile(node).await
    }
    async fn move_to_position(
        &self,
        node: NodeId,
        target: i32,
        absolute: bool,
        immediately: bool,
    ) -> TransportResult<()> {
        self.inner
            .lock()
            .await
            .move_to_position(node, target, absolute, immediately)
            .await
    }
    async fn halt_position_movement(&self, node: NodeId) -> TransportResult<()> {
        self.inner.lock().await.halt_position_movement(node).await
    }
    async fn set_homing_parameter(
        &self,
        node: NodeId,
        params: HomingParameters,
    ) -> TransportResult<()> {
        self.inner
            .lock()
            .await
            .set_homing_parameter(node, params)
            .await
    }
    async fn find_home(&self, node: NodeId, method: HomingMethod) -> TransportResult<()> {
        self.inner.lock().await.find_home(node, method).await
    }
    async fn get_all_digital_outputs(&self, node: NodeId) -> TransportResult<u16> {
        self.inner.lock().await.get_all_digital_outputs(node).await
    }
    async fn set_all_digital_outputs(&self, node: NodeId, word: u16) -> TransportResult<()> {
        self.inner
            .lock()
            .await
            .set_all_digital_outputs(node, word)
            .await
    }
    async fn get_object(
        &self,
        node: NodeId,
        address: ObjectAddress,
        len: usize,
    ) -> TransportResult<Vec<u8>> {
        self.inner.lock().await.get_object(node, address, len).await
    }
    async fn get_error_info(&self, code: DeviceErrorCode) -> TransportResult<String> {
        self.inner.lock().await.get_error_info(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_mode_codes() {
        for mode in [
            OperationMode::ProfilePosition,
            OperationMode::ProfileVelocity,
            OperationMode::Homing,
            OperationMode::InterpolatedPosition,
            OperationMode::Position,
            OperationMode::Velocity,
            OperationMode::Current,
        ] {
            assert_eq!(OperationMode::from_code(mode.code()), mode);
        }
        assert_eq!(OperationMode::from_code(-6), OperationMode::Other(-6));
        assert_eq!(OperationMode::ProfilePosition.code(), 1);
        assert_eq!(OperationMode::Homing.code(), 6);
    }

    #[test]
    fn test_homing_method_codes() {
        assert_eq!(HomingMethod::PositiveLimitSwitch.code(), 18);
        assert_eq!(HomingMethod::NegativeLimitSwitch.code(), 17);
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(NodeId(3).to_string(), "3");
        assert_eq!(DeviceErrorCode(0x1000_0001).to_string(), "0x10000001");
        assert_eq!(ObjectAddress::ENCODER_RESOLUTION.to_string(), "0x2210:1");
    }
}
