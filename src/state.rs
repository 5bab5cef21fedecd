//! Motion/fault state model of one pump node.
//!
//! The controller itself only reports four states (disabled, enabled, quick
//! stop, fault). `Homing` and `Moving` are refinements of `Enabled` that the
//! session adds while one of its own moves is in flight and the controller
//! has not yet flagged the target as reached.
//!
//! ```text
//! Disabled ──enable──▶ Enabled ──home──▶ Homing ──target reached──▶ Enabled
//!                         │  ▲
//!                         │  └──────────── Moving ◀──move_to──┘
//!                         └──quick stop──▶ QuickStop
//! any state ──device fault──▶ Fault ──enable (clear fault)──▶ Enabled
//! ```

use crate::error::{PumpError, PumpResult};
use crate::transport::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw state codes reported by the controller.
pub mod codes {
    /// Power stage disabled
    pub const DISABLED: u16 = 0;
    /// Power stage enabled
    pub const ENABLED: u16 = 1;
    /// Quick stop active
    pub const QUICK_STOP: u16 = 2;
    /// Fault latched
    pub const FAULT: u16 = 3;
}

/// Motion/fault state of a pump node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionState {
    /// Power stage off
    Disabled,
    /// Powered and idle
    Enabled,
    /// Quick stop active
    QuickStop,
    /// Fault latched
    Fault,
    /// Reference search in progress
    Homing,
    /// Profiled move in progress
    Moving,
}

impl MotionState {
    /// Map a device-reported state code.
    ///
    /// Unknown codes are an error rather than a guess.
    pub fn from_device_code(node: NodeId, code: u16) -> PumpResult<Self> {
        match code {
            codes::DISABLED => Ok(MotionState::Disabled),
            codes::ENABLED => Ok(MotionState::Enabled),
            codes::QUICK_STOP => Ok(MotionState::QuickStop),
            codes::FAULT => Ok(MotionState::Fault),
            other => Err(PumpError::UnknownDeviceState { node, code: other }),
        }
    }

    /// True while the node is powered (including active motion).
    pub fn is_powered(self) -> bool {
        matches!(
            self,
            MotionState::Enabled | MotionState::Homing | MotionState::Moving
        )
    }

    /// True during homing or a profiled move.
    pub fn is_in_motion(self) -> bool {
        matches!(self, MotionState::Homing | MotionState::Moving)
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MotionState::Disabled => "DISABLED",
            MotionState::Enabled => "ENABLED",
            MotionState::QuickStop => "QUICKSTOP",
            MotionState::Fault => "FAULT",
            MotionState::Homing => "HOMING",
            MotionState::Moving => "MOVING",
        };
        write!(f, "{}", label)
    }
}

/// Motion the session itself started and has not seen complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActiveMotion {
    Homing { expected: i32 },
    Profiled { target: i32 },
}

impl ActiveMotion {
    /// Raw position that completes the motion.
    pub(crate) fn target(self) -> i32 {
        match self {
            ActiveMotion::Homing { expected } => expected,
            ActiveMotion::Profiled { target } => target,
        }
    }

    pub(crate) fn state(self) -> MotionState {
        match self {
            ActiveMotion::Homing { .. } => MotionState::Homing,
            ActiveMotion::Profiled { .. } => MotionState::Moving,
        }
    }
}
