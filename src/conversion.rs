//! Unit conversion between device counts and syringe volumes.
//!
//! The controller works in quadrature encoder counts (position) and velocity
//! units scaled by the velocity notation exponent. The syringe works in µl
//! and µl/s. [`ConversionFactors::derive`] combines the gearing read from the
//! controller with the configured syringe geometry.
//!
//! The arithmetic reproduces the calibrated reference behaviour exactly:
//! intermediate results are truncated, not rounded, and the cross-section
//! uses `3.14` rather than `π`. Changing either shifts every converted
//! position by a few counts and breaks agreement with existing calibrations.

use crate::error::{PumpError, PumpResult};
use serde::{Deserialize, Serialize};

/// Value of π used by the calibrated reference arithmetic.
pub const CALIBRATION_PI: f64 = 3.14;

/// Quadrature counts per encoder pulse.
const QUADRATURE: f64 = 4.0;

/// Gearing quantities read from the controller's object dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGearing {
    /// Encoder pulses per motor turn
    pub encoder_resolution: u32,
    /// Gear factor numerator
    pub gear_numerator: u32,
    /// Gear factor denominator
    pub gear_denominator: u32,
    /// Velocity notation exponent (power of ten)
    pub velocity_exponent: i8,
}

/// Configured syringe geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyringeGeometry {
    /// Plunger stroke in mm
    pub stroke_mm: f64,
    /// Inner diameter in mm
    pub diameter_mm: f64,
}

impl SyringeGeometry {
    /// Cross-section in mm² (µl per mm of stroke).
    pub fn cross_section_mm2(&self) -> f64 {
        (CALIBRATION_PI * self.diameter_mm.powi(2)) / 4.0
    }

    /// Full-stroke volume in µl.
    pub fn capacity_ul(&self) -> f64 {
        self.stroke_mm * self.cross_section_mm2()
    }

    fn validate(&self) -> PumpResult<()> {
        if !(self.stroke_mm.is_finite() && self.stroke_mm > 0.0) {
            return Err(PumpError::Configuration(format!(
                "syringe stroke must be positive, got {} mm",
                self.stroke_mm
            )));
        }
        if !(self.diameter_mm.is_finite() && self.diameter_mm > 0.0) {
            return Err(PumpError::Configuration(format!(
                "syringe diameter must be positive, got {} mm",
                self.diameter_mm
            )));
        }
        Ok(())
    }
}

/// Factors mapping device units to syringe units.
///
/// Both factors are strictly positive; construction only goes through
/// [`ConversionFactors::derive`] or [`ConversionFactors::new`], which enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionFactors {
    counts_per_ul: u32,
    counts_per_ul_s: u32,
}

impl ConversionFactors {
    /// Build factors from known values.
    pub fn new(counts_per_ul: u32, counts_per_ul_s: u32) -> PumpResult<Self> {
        if counts_per_ul == 0 || counts_per_ul_s == 0 {
            return Err(PumpError::Configuration(format!(
                "conversion factors must be positive, got {counts_per_ul} counts/µl and {counts_per_ul_s} per µl/s"
            )));
        }
        Ok(Self {
            counts_per_ul,
            counts_per_ul_s,
        })
    }

    /// Derive factors from controller gearing and syringe geometry.
    ///
    /// # Errors
    /// `Configuration` if the geometry is not positive, the gear denominator
    /// is zero, or a factor truncates to zero.
    pub fn derive(gearing: DeviceGearing, syringe: SyringeGeometry) -> PumpResult<Self> {
        syringe.validate()?;
        if gearing.gear_denominator == 0 {
            return Err(PumpError::Configuration(
                "gear factor denominator is zero".into(),
            ));
        }

        let area = syringe.cross_section_mm2();
        if !(area.is_finite() && area > 0.0) {
            return Err(PumpError::Configuration(format!(
                "syringe cross-section must be positive, got {area} mm²"
            )));
        }

        let ratio = f64::from(gearing.gear_numerator) / f64::from(gearing.gear_denominator);

        let counts_per_mm = (QUADRATURE * f64::from(gearing.encoder_resolution) * ratio).trunc();
        let counts_per_ul = (counts_per_mm / area).trunc();

        let velocity_scale = 10f64.powi(i32::from(gearing.velocity_exponent));
        let rpm_per_mm_s = ((syringe.stroke_mm * ratio) / velocity_scale).trunc();
        let counts_per_ul_s = (rpm_per_mm_s / area).trunc();

        tracing::debug!(
            counts_per_mm,
            counts_per_ul,
            rpm_per_mm_s,
            counts_per_ul_s,
            area,
            "Derived conversion factors"
        );

        Self::new(to_factor(counts_per_ul)?, to_factor(counts_per_ul_s)?)
    }

    /// Encoder counts per µl.
    pub fn counts_per_ul(&self) -> u32 {
        self.counts_per_ul
    }

    /// Velocity units per µl/s.
    pub fn counts_per_ul_s(&self) -> u32 {
        self.counts_per_ul_s
    }

    /// Volume (µl) to position counts, truncating toward zero.
    pub fn to_counts(&self, volume_ul: f64) -> PumpResult<i32> {
        let counts = (volume_ul * f64::from(self.counts_per_ul)).trunc();
        if !counts.is_finite() || counts < f64::from(i32::MIN) || counts > f64::from(i32::MAX) {
            return Err(PumpError::InvalidArgument(format!(
                "volume {volume_ul} µl is outside the position range"
            )));
        }
        Ok(counts as i32)
    }

    /// Flow rate (µl/s) to unsigned velocity units; the sign is dropped.
    pub fn to_flow_counts(&self, flow_ul_s: f64) -> PumpResult<u32> {
        let counts = (flow_ul_s.abs() * f64::from(self.counts_per_ul_s)).trunc();
        if !counts.is_finite() || counts > f64::from(u32::MAX) {
            return Err(PumpError::InvalidArgument(format!(
                "flow rate {flow_ul_s} µl/s is outside the velocity range"
            )));
        }
        Ok(counts as u32)
    }

    /// Position counts to volume (µl).
    pub fn to_volume(&self, counts: i32) -> f64 {
        f64::from(counts) / f64::from(self.counts_per_ul)
    }

    /// Velocity units to flow rate (µl/s).
    pub fn to_flow(&self, counts: i64) -> f64 {
        counts as f64 / f64::from(self.counts_per_ul_s)
    }
}

fn to_factor(value: f64) -> PumpResult<u32> {
    if value.is_finite() && value >= 1.0 && value <= f64::from(u32::MAX) {
        Ok(value as u32)
    } else {
        Err(PumpError::Configuration(format!(
            "derived conversion factor {value} is not a positive 32-bit count"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_syringe() -> SyringeGeometry {
        SyringeGeometry {
            stroke_mm: 60.0,
            diameter_mm: 3.2574,
        }
    }

    #[test]
    fn test_golden_factors_geared_motor() {
        let gearing = DeviceGearing {
            encoder_resolution: 512,
            gear_numerator: 19,
            gear_denominator: 6,
            velocity_exponent: -3,
        };
        let factors = ConversionFactors::derive(gearing, reference_syringe()).unwrap();
        assert_eq!(factors.counts_per_ul(), 778);
        assert_eq!(factors.counts_per_ul_s(), 22810);
    }

    #[test]
    fn test_golden_factors_direct_drive() {
        let gearing = DeviceGearing {
            encoder_resolution: 512,
            gear_numerator: 1,
            gear_denominator: 1,
            velocity_exponent: 0,
        };
        let factors = ConversionFactors::derive(gearing, reference_syringe()).unwrap();
        // 2048 / 8.3294 = 245.88 and 60 / 8.3294 = 7.2 are truncated, not rounded
        assert_eq!(factors.counts_per_ul(), 245);
        assert_eq!(factors.counts_per_ul_s(), 7);
    }

    #[test]
    fn test_reference_capacity_is_500ul() {
        let capacity = reference_syringe().capacity_ul();
        assert!((capacity - 499.76).abs() < 0.01, "capacity {capacity}");
    }

    #[test]
    fn test_zero_gear_denominator_rejected() {
        let gearing = DeviceGearing {
            encoder_resolution: 512,
            gear_numerator: 1,
            gear_denominator: 0,
            velocity_exponent: 0,
        };
        let err = ConversionFactors::derive(gearing, reference_syringe()).unwrap_err();
        assert!(matches!(err, PumpError::Configuration(_)));
    }

    #[test]
    fn test_bad_geometry_rejected() {
        let gearing = DeviceGearing {
            encoder_resolution: 512,
            gear_numerator: 1,
            gear_denominator: 1,
            velocity_exponent: 0,
        };
        for (stroke_mm, diameter_mm) in [(60.0, 0.0), (60.0, -1.0), (0.0, 3.0), (f64::NAN, 3.0)] {
            let syringe = SyringeGeometry {
                stroke_mm,
                diameter_mm,
            };
            assert!(matches!(
                ConversionFactors::derive(gearing, syringe),
                Err(PumpError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_factor_truncating_to_zero_rejected() {
        // A 100 mm bore gives less than one count per µl
        let gearing = DeviceGearing {
            encoder_resolution: 512,
            gear_numerator: 1,
            gear_denominator: 1,
            velocity_exponent: 0,
        };
        let syringe = SyringeGeometry {
            stroke_mm: 60.0,
            diameter_mm: 100.0,
        };
        assert!(matches!(
            ConversionFactors::derive(gearing, syringe),
            Err(PumpError::Configuration(_))
        ));
    }

    #[test]
    fn test_conversions_truncate() {
        let factors = ConversionFactors::new(778, 22810).unwrap();
        assert_eq!(factors.to_counts(-50.0).unwrap(), -38900);
        assert_eq!(factors.to_counts(0.5).unwrap(), 389);
        assert_eq!(factors.to_counts(0.0019).unwrap(), 1);
        assert_eq!(factors.to_flow_counts(50.0).unwrap(), 1_140_500);
        assert_eq!(factors.to_flow_counts(-50.0).unwrap(), 1_140_500);
        assert!((factors.to_volume(-38900) + 50.0).abs() < 1e-9);
        assert!((factors.to_flow(1_140_500) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_volume_rejected() {
        let factors = ConversionFactors::new(778, 22810).unwrap();
        assert!(matches!(
            factors.to_counts(1e12),
            Err(PumpError::InvalidArgument(_))
        ));
        assert!(matches!(
            factors.to_flow_counts(f64::INFINITY),
            Err(PumpError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zero_factor_rejected() {
        assert!(ConversionFactors::new(0, 1).is_err());
        assert!(ConversionFactors::new(1, 0).is_err());
    }
}
