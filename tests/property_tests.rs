//! Property-based tests for conversion arithmetic, the capacity guard and
//! the valve sequence.

use nemesys::conversion::{ConversionFactors, DeviceGearing, SyringeGeometry};
use nemesys::sim::{Command, SimulatedEpos};
use nemesys::transport::EposTransport;
use nemesys::valve::{ValveController, VALVE_BITS};
use nemesys::{NodeId, PumpConfig, PumpError, PumpSession, SharedBus};
use proptest::prelude::*;

const NODE: NodeId = NodeId(2);

fn reference_factors() -> ConversionFactors {
    ConversionFactors::new(778, 22810).unwrap()
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    /// Gear ratios from 1 to 21 with millirpm or 1/10 millirpm velocity
    /// notation always give usable factors.
    #[test]
    fn derive_gives_positive_factors(
        encoder_resolution in 256u32..=4096,
        gear_denominator in 1u32..=20,
        extra in 0u32..=20,
        velocity_exponent in -4i8..=-3,
        stroke_mm in 1.0f64..100.0,
        diameter_mm in 0.5f64..5.0,
    ) {
        let gearing = DeviceGearing {
            encoder_resolution,
            gear_numerator: gear_denominator + extra,
            gear_denominator,
            velocity_exponent,
        };
        let syringe = SyringeGeometry { stroke_mm, diameter_mm };
        let factors = ConversionFactors::derive(gearing, syringe).unwrap();
        prop_assert!(factors.counts_per_ul() >= 1);
        prop_assert!(factors.counts_per_ul_s() >= 1);
    }

    /// Outside that region derive either succeeds with positive factors or
    /// reports a configuration error; it never yields a zero factor.
    #[test]
    fn derive_never_yields_zero(
        encoder_resolution in 1u32..=4096,
        gear_numerator in 1u32..=100,
        gear_denominator in 0u32..=100,
        velocity_exponent in -6i8..=2,
        stroke_mm in 0.1f64..200.0,
        diameter_mm in 0.1f64..30.0,
    ) {
        let gearing = DeviceGearing {
            encoder_resolution,
            gear_numerator,
            gear_denominator,
            velocity_exponent,
        };
        let syringe = SyringeGeometry { stroke_mm, diameter_mm };
        match ConversionFactors::derive(gearing, syringe) {
            Ok(factors) => {
                prop_assert!(factors.counts_per_ul() >= 1);
                prop_assert!(factors.counts_per_ul_s() >= 1);
            }
            Err(PumpError::Configuration(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    /// Volume to counts and back loses less than one count, toward zero.
    #[test]
    fn position_conversion_truncates_toward_zero(volume_ul in -499.0f64..=0.0) {
        let factors = reference_factors();
        let counts = factors.to_counts(volume_ul).unwrap();
        let back = factors.to_volume(counts);
        prop_assert!(back >= volume_ul - 1e-9);
        prop_assert!(back - volume_ul < 1.0 / 778.0 + 1e-9);
    }

    #[test]
    fn flow_conversion_drops_sign(flow in 0.01f64..1000.0) {
        let factors = reference_factors();
        prop_assert_eq!(
            factors.to_flow_counts(flow).unwrap(),
            factors.to_flow_counts(-flow).unwrap()
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Aspirating from empty either refuses without a move command or lands
    /// within one count of the requested fill.
    #[test]
    fn aspirate_respects_capacity(volume_ul in 0.0f64..1000.0) {
        let rt = paused_runtime();
        let (result, position, capacity, moved) = rt.block_on(async {
            let bus = SharedBus::new(SimulatedEpos::new());
            let mut pump = PumpSession::open(Box::new(bus.clone()), PumpConfig::new("prop", NODE))
                .await
                .unwrap();
            let result = pump.aspirate(volume_ul, 100.0).await;
            let position = pump.position().await.unwrap();
            let capacity = pump.capacity_ul().unwrap();
            let moved = bus
                .with_transport(|sim| {
                    sim.journal(NODE)
                        .iter()
                        .any(|cmd| matches!(cmd, Command::MoveToPosition { .. }))
                })
                .await;
            pump.close().await.unwrap();
            (result, position, capacity, moved)
        });

        if volume_ul > capacity {
            prop_assert!(matches!(result, Err(PumpError::Capacity { .. })), "expected PumpError::Capacity, got {:?}", result);
            prop_assert!(!moved);
            prop_assert_eq!(position, 0.0);
        } else {
            prop_assert!(result.is_ok());
            prop_assert!(position >= -volume_ul - 1e-9);
            prop_assert!(position + volume_ul < 1.0 / 778.0 + 1e-9);
            prop_assert!(position >= -capacity);
        }
    }

    /// Two toggles restore the output word, and the first write flips both
    /// valve bits together.
    #[test]
    fn valve_double_toggle_restores_outputs(word in any::<u16>()) {
        let rt = paused_runtime();
        let (first, second, journal, final_word) = rt.block_on(async {
            let sim = SimulatedEpos::new();
            sim.open().await.unwrap();
            sim.set_digital_outputs(NODE, word);
            let valve = ValveController::new(NODE);
            let first = valve.toggle(&sim).await.unwrap();
            let second = valve.toggle(&sim).await.unwrap();
            (first, second, sim.journal(NODE), sim.digital_outputs(NODE))
        });

        prop_assert_eq!(final_word, word);
        prop_assert_ne!(first, second);
        prop_assert_eq!(journal.len(), 4);
        prop_assert_eq!(&journal[0], &Command::SetDigitalOutputs(word ^ VALVE_BITS));
    }
}
