//! Reference search (homing) parameters.
//!
//! The pump homes against one of its limit switches. The parameter set is
//! fixed for the Nemesys mechanics; only the position assigned to the
//! reference point is configurable.

use crate::transport::{HomingMethod, HomingParameters};
use serde::{Deserialize, Serialize};

/// Homing acceleration (rpm/s).
pub const HOMING_ACCELERATION: u32 = 200_000;
/// Speed while searching for the switch.
pub const SPEED_SWITCH: u32 = 2_000_000;
/// Speed while searching for the index pulse.
pub const SPEED_INDEX: u32 = 10_000;
/// Distance moved away from the switch (counts).
pub const HOME_OFFSET: i32 = 20_000;
/// Current threshold for block detection (mA).
pub const CURRENT_THRESHOLD: u16 = 200;

/// Which limit switch to home against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomingDirection {
    /// Positive limit switch (syringe empty)
    Positive,
    /// Negative limit switch
    Negative,
}

impl HomingDirection {
    /// Controller method for this direction.
    pub fn method(self) -> HomingMethod {
        match self {
            HomingDirection::Positive => HomingMethod::PositiveLimitSwitch,
            HomingDirection::Negative => HomingMethod::NegativeLimitSwitch,
        }
    }

    /// Raw position that signals completion.
    ///
    /// Positive homing always ends at 0; negative homing ends at the
    /// commanded home position.
    pub fn expected_position(self, home_position: i32) -> i32 {
        match self {
            HomingDirection::Positive => 0,
            HomingDirection::Negative => home_position,
        }
    }
}

/// Full parameter set sent before `find_home`.
///
/// The positive limit search always assigns 0 to the reference point, so the
/// pump's volume axis starts empty.
pub fn homing_parameters(direction: HomingDirection, home_position: i32) -> HomingParameters {
    HomingParameters {
        acceleration: HOMING_ACCELERATION,
        speed_switch: SPEED_SWITCH,
        speed_index: SPEED_INDEX,
        home_offset: HOME_OFFSET,
        current_threshold: CURRENT_THRESHOLD,
        home_position: direction.expected_position(home_position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_positions() {
        assert_eq!(HomingDirection::Positive.expected_position(1234), 0);
        assert_eq!(HomingDirection::Negative.expected_position(1234), 1234);
    }

    #[test]
    fn test_parameters_are_fixed() {
        let params = homing_parameters(HomingDirection::Negative, -500);
        assert_eq!(params.acceleration, 200_000);
        assert_eq!(params.speed_switch, 2_000_000);
        assert_eq!(params.speed_index, 10_000);
        assert_eq!(params.home_offset, 20_000);
        assert_eq!(params.current_threshold, 200);
        assert_eq!(params.home_position, -500);

        assert_eq!(
            homing_parameters(HomingDirection::Positive, -500).home_position,
            0
        );
    }

    #[test]
    fn test_methods() {
        assert_eq!(
            HomingDirection::Positive.method(),
            HomingMethod::PositiveLimitSwitch
        );
        assert_eq!(
            HomingDirection::Negative.method(),
            HomingMethod::NegativeLimitSwitch
        );
    }
}
