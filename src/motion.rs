//! Profiled position move parameters.

use crate::error::{PumpError, PumpResult};
use crate::transport::PositionProfile;

/// Profile acceleration (rpm/s). The controller accepts up to 1e7.
pub const PROFILE_ACCELERATION: u32 = 200_000;
/// Profile deceleration (rpm/s).
pub const PROFILE_DECELERATION: u32 = 200_000;

/// Position profile for a move at `velocity` device units.
pub fn position_profile(velocity: u32) -> PositionProfile {
    PositionProfile {
        velocity,
        acceleration: PROFILE_ACCELERATION,
        deceleration: PROFILE_DECELERATION,
    }
}

/// Reject flow rates that cannot describe a move.
pub(crate) fn check_flow(flow_ul_s: f64) -> PumpResult<()> {
    if !flow_ul_s.is_finite() {
        return Err(PumpError::InvalidArgument(format!(
            "flow rate must be finite, got {flow_ul_s}"
        )));
    }
    if flow_ul_s == 0.0 {
        return Err(PumpError::InvalidArgument(
            "flow rate must be non-zero; use halt() to stop".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_ramps() {
        let profile = position_profile(1_140_500);
        assert_eq!(profile.velocity, 1_140_500);
        assert_eq!(profile.acceleration, 200_000);
        assert_eq!(profile.deceleration, 200_000);
    }

    #[test]
    fn test_check_flow() {
        assert!(check_flow(10.0).is_ok());
        assert!(check_flow(-10.0).is_ok());
        assert!(check_flow(0.0).is_err());
        assert!(check_flow(f64::NAN).is_err());
    }
}
