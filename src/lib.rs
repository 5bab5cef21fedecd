//! # Nemesys Syringe Pump Driver
//!
//! Async driver for Cetoni Nemesys syringe pumps built on Maxon EPOS2 motor
//! controllers. The crate turns volumetric commands (aspirate 100 µl at
//! 10 µl/s) into controller primitives (encoder counts, profiled position
//! moves) and reports raw counts back in syringe units.
//!
//! ## Crate Structure
//!
//! - **`pump`**: `PumpSession`, one per pump node; the public command surface.
//! - **`conversion`**: derivation of the counts-per-µl and counts-per-µl/s
//!   factors from controller gearing and syringe geometry.
//! - **`state`**: mapping of device status codes into `MotionState`.
//! - **`homing`** / **`motion`**: parameter sets for the reference search
//!   and for profiled moves.
//! - **`valve`**: the two-phase digital-output sequence that switches the valve.
//! - **`reporter`**: resolves device error codes into `PumpError`s.
//! - **`transport`**: the `EposTransport` trait the driver consumes, plus
//!   `SharedBus` for several nodes on one line.
//! - **`wait`**: bounded, cancellable polling for blocking moves.
//! - **`sim`**: in-memory controller used by the tests and the CLI.
//! - **`config`** / **`logging`** / **`error`**: Figment configuration,
//!   tracing setup and the `PumpError` type.

pub mod config;
pub mod conversion;
pub mod error;
pub mod homing;
pub mod logging;
pub mod motion;
pub mod pump;
pub mod reporter;
pub mod sim;
pub mod state;
pub mod transport;
pub mod valve;
pub mod wait;

pub use config::{AppConfig, PumpConfig};
pub use conversion::{ConversionFactors, DeviceGearing, SyringeGeometry};
pub use error::{PumpError, PumpResult};
pub use homing::HomingDirection;
pub use pump::{PumpInfo, PumpSession, PumpStatus};
pub use state::MotionState;
pub use transport::{DeviceErrorCode, EposTransport, NodeId, SharedBus};
pub use wait::{CancelHandle, WaitPolicy};
