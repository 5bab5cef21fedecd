//! Session for one Nemesys pump node.
//!
//! [`PumpSession`] owns the transport handle for a node and exposes the pump
//! in syringe units: positions in µl (≤ 0, the fill level is `-position`) and
//! flow rates in µl/s. Opening a session reads the gearing from the
//! controller's object dictionary, derives the [`ConversionFactors`] once and
//! enables the power stage.
//!
//! Commands take `&mut self`, so commands to one node are strictly ordered.
//! Queries take `&self`. Waiting operations are bounded by the session's
//! [`WaitPolicy`] and can be aborted with a [`CancelHandle`]; on timeout or
//! cancellation the session halts the drive before returning the error.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut pump = PumpSession::open(Box::new(bus.clone()), config).await?;
//! pump.home(HomingDirection::Positive, true).await?;
//! pump.aspirate(100.0, 10.0).await?;
//! pump.toggle_valve().await?;
//! pump.dose(50.0, 10.0).await?;
//! pump.close().await?;
//! ```

use crate::config::PumpConfig;
use crate::conversion::{ConversionFactors, DeviceGearing};
use crate::error::{PumpError, PumpResult};
use crate::homing::{homing_parameters, HomingDirection};
use crate::motion::{check_flow, position_profile};
use crate::reporter::ErrorReporter;
use crate::state::{ActiveMotion, MotionState};
use crate::transport::{
    ops, EposTransport, NodeId, ObjectAddress, OperationMode, TransportResult,
};
use crate::valve::ValveController;
use crate::wait::{CancelHandle, CancelToken, Poller, Tick, WaitPolicy};
use serde::Serialize;
use tracing::instrument;

/// Static description of an initialised pump.
#[derive(Debug, Clone, Serialize)]
pub struct PumpInfo {
    /// Configured pump name
    pub name: String,
    /// Node address
    pub node: NodeId,
    /// Gearing read from the controller
    pub gearing: DeviceGearing,
    /// Encoder counts per µl
    pub counts_per_ul: u32,
    /// Velocity units per µl/s
    pub counts_per_ul_s: u32,
    /// Usable syringe volume (µl)
    pub capacity_ul: f64,
}

/// Snapshot of the pump's dynamic state.
#[derive(Debug, Clone, Serialize)]
pub struct PumpStatus {
    /// Motion state
    pub state: MotionState,
    /// Plunger position (µl, ≤ 0)
    pub position_ul: f64,
    /// Actual flow (µl/s)
    pub velocity_ul_s: f64,
    /// Velocity heuristic, see [`PumpSession::is_moving`]
    pub moving: bool,
    /// Target-reached flag of the current movement
    pub target_reached: bool,
    /// Valve state
    pub valve_open: bool,
    /// Target of the motion this session started, if still running
    pub target_ul: Option<f64>,
}

/// Calibration established by `initialize`.
#[derive(Debug, Clone, Copy)]
struct Calibration {
    gearing: DeviceGearing,
    factors: ConversionFactors,
    capacity_ul: f64,
}

/// Driver session for one pump node.
pub struct PumpSession {
    config: PumpConfig,
    node: NodeId,
    transport: Box<dyn EposTransport>,
    reporter: ErrorReporter,
    valve: ValveController,
    policy: WaitPolicy,
    calibration: Option<Calibration>,
    last_state: MotionState,
    active: Option<ActiveMotion>,
    speed_set: bool,
    cancel: CancelToken,
    open: bool,
}

impl std::fmt::Debug for PumpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpSession")
            .field("name", &self.config.name)
            .field("node", &self.node)
            .field("last_state", &self.last_state)
            .field("active", &self.active)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl PumpSession {
    /// Open the transport, initialise the pump and enable it.
    ///
    /// On failure the transport is closed again before the error is returned.
    #[instrument(skip(transport, config), fields(pump = %config.name, node = %config.node_id), err)]
    pub async fn open(transport: Box<dyn EposTransport>, config: PumpConfig) -> PumpResult<Self> {
        config.validate()?;
        let node = config.node_id;
        let reporter = ErrorReporter::new(node);

        let result = transport.open().await;
        reporter
            .check(transport.as_ref(), ops::OPEN_DEVICE, result)
            .await?;

        let mut session = Self {
            policy: config.wait_policy(),
            config,
            node,
            transport,
            reporter,
            valve: ValveController::new(node),
            calibration: None,
            last_state: MotionState::Disabled,
            active: None,
            speed_set: false,
            cancel: CancelToken::new(),
            open: true,
        };

        if let Err(e) = session.initialize().await {
            session.teardown().await;
            return Err(e);
        }
        Ok(session)
    }

    /// Derive the conversion factors and enable the drive.
    ///
    /// Called by [`PumpSession::open`]; calling it again re-reads the gearing
    /// and recomputes the factors.
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn initialize(&mut self) -> PumpResult<()> {
        self.ensure_open()?;
        let gearing = self.read_gearing().await?;
        let geometry = self.config.geometry();
        let factors = ConversionFactors::derive(gearing, geometry)?;
        let capacity_ul = self
            .config
            .syringe
            .capacity_ul
            .unwrap_or_else(|| geometry.capacity_ul());

        self.calibration = Some(Calibration {
            gearing,
            factors,
            capacity_ul,
        });
        self.speed_set = false;

        tracing::info!(
            pump = %self.config.name,
            node = %self.node,
            counts_per_ul = factors.counts_per_ul(),
            counts_per_ul_s = factors.counts_per_ul_s(),
            capacity_ul,
            "Pump initialized"
        );

        self.enable().await
    }

    /// Clear any fault and enable the power stage.
    ///
    /// Any failure leaves the session in [`MotionState::Fault`].
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn enable(&mut self) -> PumpResult<()> {
        self.ensure_open()?;
        let result = self.clear_fault_and_enable().await;
        self.active = None;
        self.last_state = match result {
            Ok(()) => MotionState::Enabled,
            Err(_) => MotionState::Fault,
        };
        result
    }

    async fn clear_fault_and_enable(&self) -> PumpResult<()> {
        let result = self.transport.clear_fault(self.node).await;
        self.call(ops::CLEAR_FAULT, result).await?;
        let result = self.transport.set_enable_state(self.node).await;
        self.call(ops::SET_ENABLE_STATE, result).await
    }

    /// Disable the power stage. No implicit halt is issued.
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn disable(&mut self) -> PumpResult<()> {
        self.ensure_open()?;
        let result = self.transport.set_disable_state(self.node).await;
        self.call(ops::SET_DISABLE_STATE, result).await?;
        self.active = None;
        self.last_state = MotionState::Disabled;
        Ok(())
    }

    /// Disable the drive and close the transport.
    ///
    /// The transport is closed even if disabling fails; the first error is
    /// returned.
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn close(mut self) -> PumpResult<()> {
        self.ensure_open()?;
        let disabled = self.disable().await;
        let result = self.transport.close().await;
        let closed = self.call(ops::CLOSE_DEVICE, result).await;
        self.open = false;
        tracing::info!(pump = %self.config.name, node = %self.node, "Pump session closed");
        disabled.and(closed)
    }

    async fn teardown(&mut self) {
        if let Err(code) = self.transport.close().await {
            tracing::warn!(node = %self.node, %code, "Closing transport after failed open");
        }
        self.open = false;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Node address of this session.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> &PumpConfig {
        &self.config
    }

    /// Conversion factors derived at initialisation.
    pub fn factors(&self) -> PumpResult<ConversionFactors> {
        Ok(self.calibration()?.factors)
    }

    /// Usable syringe volume (µl).
    pub fn capacity_ul(&self) -> PumpResult<f64> {
        Ok(self.calibration()?.capacity_ul)
    }

    /// State recorded by the last enable/disable.
    pub fn last_state(&self) -> MotionState {
        self.last_state
    }

    /// Handle that aborts a waiting motion command.
    ///
    /// `cancel` applies to the `home`, `move_to`, `move_to_set_speed`,
    /// `aspirate` or `dose` call in progress, including while its setup
    /// commands are still being sent; the wait then ends with `Cancelled`.
    /// A cancel issued while no motion command runs is discarded when the
    /// next one starts.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.handle()
    }

    /// Static pump description.
    pub fn info(&self) -> PumpResult<PumpInfo> {
        let calibration = self.calibration()?;
        Ok(PumpInfo {
            name: self.config.name.clone(),
            node: self.node,
            gearing: calibration.gearing,
            counts_per_ul: calibration.factors.counts_per_ul(),
            counts_per_ul_s: calibration.factors.counts_per_ul_s(),
            capacity_ul: calibration.capacity_ul,
        })
    }

    /// Current state, position, velocity and valve in one snapshot.
    pub async fn status(&self) -> PumpResult<PumpStatus> {
        let factors = self.factors()?;
        Ok(PumpStatus {
            state: self.state().await?,
            position_ul: self.position().await?,
            velocity_ul_s: self.velocity().await?,
            moving: self.is_moving().await?,
            target_reached: self.is_target_reached().await?,
            valve_open: self.is_valve_open().await?,
            target_ul: self
                .active
                .map(|motion| factors.to_volume(motion.target())),
        })
    }

    /// Device state.
    ///
    /// While a homing or profiled move started by this session has not
    /// reached its target, `Enabled` is refined to `Homing` or `Moving`
    /// using the explicit movement-state query.
    pub async fn state(&self) -> PumpResult<MotionState> {
        self.ensure_open()?;
        let result = self.transport.get_state(self.node).await;
        let code = self.call(ops::GET_STATE, result).await?;
        let state = MotionState::from_device_code(self.node, code)?;

        if let (MotionState::Enabled, Some(motion)) = (state, self.active) {
            if !self.is_target_reached().await? {
                return Ok(motion.state());
            }
        }
        Ok(state)
    }

    /// Active operating mode.
    pub async fn operation_mode(&self) -> PumpResult<OperationMode> {
        self.ensure_open()?;
        let result = self.transport.get_operation_mode(self.node).await;
        self.call(ops::GET_OPERATION_MODE, result).await
    }

    /// Raw plunger position in encoder counts.
    pub async fn raw_position(&self) -> PumpResult<i32> {
        self.ensure_open()?;
        let result = self.transport.get_position_is(self.node).await;
        self.call(ops::GET_POSITION_IS, result).await
    }

    /// Plunger position (µl, ≤ 0).
    pub async fn position(&self) -> PumpResult<f64> {
        let factors = self.factors()?;
        Ok(factors.to_volume(self.raw_position().await?))
    }

    /// Actual flow (µl/s).
    pub async fn velocity(&self) -> PumpResult<f64> {
        let factors = self.factors()?;
        Ok(factors.to_flow(i64::from(self.raw_velocity().await?)))
    }

    async fn raw_velocity(&self) -> PumpResult<i32> {
        self.ensure_open()?;
        let result = self.transport.get_velocity_is(self.node).await;
        self.call(ops::GET_VELOCITY_IS, result).await
    }

    /// Whether the drive reports a non-zero velocity.
    ///
    /// This is a heuristic: a drive can be between moves at zero velocity or
    /// creeping without a move. Use [`PumpSession::is_target_reached`] or
    /// [`PumpSession::state`] for the device's own view.
    pub async fn is_moving(&self) -> PumpResult<bool> {
        Ok(self.raw_velocity().await? != 0)
    }

    /// Target-reached flag of the current movement.
    pub async fn is_target_reached(&self) -> PumpResult<bool> {
        self.ensure_open()?;
        let result = self.transport.get_movement_state(self.node).await;
        self.call(ops::GET_MOVEMENT_STATE, result).await
    }

    /// Whether the valve is open.
    pub async fn is_valve_open(&self) -> PumpResult<bool> {
        self.ensure_open()?;
        self.valve.is_open(self.transport.as_ref()).await
    }

    /// Programmed profile velocity (µl/s).
    ///
    /// # Errors
    /// `Precondition` unless the drive is in profile-position mode.
    pub async fn set_speed_value(&self) -> PumpResult<f64> {
        let factors = self.factors()?;
        self.require_profile_mode().await?;
        let result = self.transport.get_position_profile(self.node).await;
        let profile = self.call(ops::GET_POSITION_PROFILE, result).await?;
        Ok(factors.to_flow(i64::from(profile.velocity)))
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Stop any movement and clear a pending fault. Idempotent.
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn halt(&mut self) -> PumpResult<()> {
        self.ensure_open()?;
        let result = self.transport.halt_position_movement(self.node).await;
        self.call(ops::HALT_POSITION_MOVEMENT, result).await?;
        self.active = None;
        let result = self.transport.clear_fault(self.node).await;
        self.call(ops::CLEAR_FAULT, result).await?;
        tracing::info!(node = %self.node, "Pump halted");
        Ok(())
    }

    /// Reference search against a limit switch.
    ///
    /// With `wait`, returns once the raw position equals 0 (positive) or the
    /// configured home position (negative).
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn home(&mut self, direction: HomingDirection, wait: bool) -> PumpResult<()> {
        self.ensure_open()?;
        let params = homing_parameters(direction, self.config.homing.home_position);
        self.cancel.reset();

        self.activate_mode(OperationMode::Homing).await?;
        let result = self.transport.set_homing_parameter(self.node, params).await;
        self.call(ops::SET_HOMING_PARAMETER, result).await?;
        let result = self.transport.find_home(self.node, direction.method()).await;
        self.call(ops::FIND_HOME, result).await?;

        tracing::info!(node = %self.node, ?direction, expected = params.home_position, "Homing started");
        self.start_motion(
            ActiveMotion::Homing {
                expected: params.home_position,
            },
            wait,
        )
        .await
    }

    /// Profiled move to `position_ul` at `flow_ul_s`.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero or non-finite flow; use
    /// [`PumpSession::halt`] to stop.
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn move_to(&mut self, position_ul: f64, flow_ul_s: f64, wait: bool) -> PumpResult<()> {
        self.ensure_open()?;
        self.cancel.reset();
        self.profiled_move(position_ul, flow_ul_s, wait).await
    }

    /// Legacy overload of [`PumpSession::move_to`]: a flow of 0 halts.
    pub async fn move_to_position_speed(
        &mut self,
        position_ul: f64,
        flow_ul_s: f64,
        wait: bool,
    ) -> PumpResult<()> {
        if flow_ul_s == 0.0 {
            return self.halt().await;
        }
        self.move_to(position_ul, flow_ul_s, wait).await
    }

    /// Program the profile velocity without moving; returns the read-back
    /// speed (µl/s).
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn set_speed(&mut self, flow_ul_s: f64) -> PumpResult<f64> {
        self.ensure_open()?;
        check_flow(flow_ul_s)?;
        let velocity = self.flow_counts(flow_ul_s)?;
        self.program_profile(velocity).await?;
        self.speed_set = true;
        self.set_speed_value().await
    }

    /// Alias of [`PumpSession::set_speed`].
    pub async fn set_velocity(&mut self, flow_ul_s: f64) -> PumpResult<f64> {
        self.set_speed(flow_ul_s).await
    }

    /// Move to `position_ul` at the speed programmed by `set_speed`.
    ///
    /// # Errors
    /// `Precondition` if `set_speed` was not called in this session or the
    /// drive has since left profile-position mode.
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn move_to_set_speed(&mut self, position_ul: f64, wait: bool) -> PumpResult<()> {
        self.ensure_open()?;
        if !self.speed_set {
            return Err(PumpError::Precondition(
                "move_to_set_speed requires a prior set_speed".into(),
            ));
        }
        let target = self.factors()?.to_counts(position_ul)?;
        self.cancel.reset();
        self.require_profile_mode().await?;
        self.start_profiled_move(target, wait).await
    }

    /// Draw `volume_ul` into the syringe and wait for completion.
    ///
    /// # Errors
    /// `Capacity` without moving if the syringe would overflow.
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn aspirate(&mut self, volume_ul: f64, flow_ul_s: f64) -> PumpResult<()> {
        let capacity = self.capacity_ul()?;
        self.cancel.reset();
        let target = self.position().await?.trunc() - volume_ul.abs();
        if target < -capacity {
            return Err(PumpError::Capacity {
                target_ul: target,
                min_ul: -capacity,
                max_ul: 0.0,
            });
        }
        self.profiled_move(target, flow_ul_s, true).await?;
        tracing::info!(node = %self.node, volume_ul, fill_ul = -target, "Aspirated");
        Ok(())
    }

    /// Expel `volume_ul` from the syringe and wait for completion.
    ///
    /// # Errors
    /// `Capacity` without moving if the syringe would be emptied past zero.
    #[instrument(skip(self), fields(node = %self.node), err)]
    pub async fn dose(&mut self, volume_ul: f64, flow_ul_s: f64) -> PumpResult<()> {
        let capacity = self.capacity_ul()?;
        self.cancel.reset();
        let target = self.position().await?.trunc() + volume_ul.abs();
        if target > 0.0 {
            return Err(PumpError::Capacity {
                target_ul: target,
                min_ul: -capacity,
                max_ul: 0.0,
            });
        }
        self.profiled_move(target, flow_ul_s, true).await?;
        tracing::info!(node = %self.node, volume_ul, fill_ul = -target, "Dosed");
        Ok(())
    }

    /// Switch the valve; returns the new open state.
    pub async fn toggle_valve(&mut self) -> PumpResult<bool> {
        self.ensure_open()?;
        self.valve.toggle(self.transport.as_ref()).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_open(&self) -> PumpResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(PumpError::SessionClosed(self.node))
        }
    }

    fn calibration(&self) -> PumpResult<Calibration> {
        self.ensure_open()?;
        self.calibration
            .ok_or_else(|| PumpError::Precondition("pump is not initialized".into()))
    }

    async fn call<T>(&self, operation: &'static str, result: TransportResult<T>) -> PumpResult<T> {
        self.reporter
            .check(self.transport.as_ref(), operation, result)
            .await
    }

    fn flow_counts(&self, flow_ul_s: f64) -> PumpResult<u32> {
        let velocity = self.factors()?.to_flow_counts(flow_ul_s)?;
        if velocity == 0 {
            return Err(PumpError::InvalidArgument(format!(
                "flow rate {flow_ul_s} µl/s is below one velocity unit"
            )));
        }
        Ok(velocity)
    }

    async fn read_gearing(&self) -> PumpResult<DeviceGearing> {
        let velocity_exponent =
            i8::from_le_bytes(self.read_object(ObjectAddress::VELOCITY_NOTATION).await?);
        let encoder_resolution =
            u32::from_le_bytes(self.read_object(ObjectAddress::ENCODER_RESOLUTION).await?);
        let gear_numerator =
            u32::from_le_bytes(self.read_object(ObjectAddress::GEAR_NUMERATOR).await?);
        let gear_denominator =
            u32::from_le_bytes(self.read_object(ObjectAddress::GEAR_DENOMINATOR).await?);

        let gearing = DeviceGearing {
            encoder_resolution,
            gear_numerator,
            gear_denominator,
            velocity_exponent,
        };
        tracing::debug!(node = %self.node, ?gearing, "Read drive gearing");
        Ok(gearing)
    }

    /// Read an object dictionary entry of exactly `N` bytes.
    async fn read_object<const N: usize>(&self, address: ObjectAddress) -> PumpResult<[u8; N]> {
        let result = self.transport.get_object(self.node, address, N).await;
        let bytes = self.call(ops::GET_OBJECT, result).await?;
        <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| PumpError::ObjectSize {
            node: self.node,
            index: address.index,
            sub_index: address.sub_index,
            expected: N,
            actual: bytes.len(),
        })
    }

    async fn activate_mode(&self, mode: OperationMode) -> PumpResult<()> {
        let result = self.transport.activate_mode(self.node, mode).await;
        self.call(ops::ACTIVATE_MODE, result).await
    }

    async fn require_profile_mode(&self) -> PumpResult<()> {
        let mode = self.operation_mode().await?;
        if mode == OperationMode::ProfilePosition {
            Ok(())
        } else {
            Err(PumpError::Precondition(format!(
                "drive is in {mode:?} mode, not profile position"
            )))
        }
    }

    async fn profiled_move(&mut self, position_ul: f64, flow_ul_s: f64, wait: bool) -> PumpResult<()> {
        check_flow(flow_ul_s)?;
        let target = self.factors()?.to_counts(position_ul)?;
        let velocity = self.flow_counts(flow_ul_s)?;
        self.program_profile(velocity).await?;
        self.start_profiled_move(target, wait).await
    }

    async fn program_profile(&self, velocity: u32) -> PumpResult<()> {
        self.activate_mode(OperationMode::ProfilePosition).await?;
        let result = self
            .transport
            .set_position_profile(self.node, position_profile(velocity))
            .await;
        self.call(ops::SET_POSITION_PROFILE, result).await
    }

    async fn start_profiled_move(&mut self, target: i32, wait: bool) -> PumpResult<()> {
        let result = self
            .transport
            .move_to_position(self.node, target, true, true)
            .await;
        self.call(ops::MOVE_TO_POSITION, result).await?;
        tracing::debug!(node = %self.node, target, "Profiled move started");
        self.start_motion(ActiveMotion::Profiled { target }, wait)
            .await
    }

    async fn start_motion(&mut self, motion: ActiveMotion, wait: bool) -> PumpResult<()> {
        self.active = Some(motion);
        if !wait {
            return Ok(());
        }

        let outcome = self.wait_for(motion).await;
        self.cancel.reset();
        match outcome {
            Ok(()) => {
                self.active = None;
                Ok(())
            }
            Err(e @ (PumpError::HomingTimeout { .. }
            | PumpError::MoveTimeout { .. }
            | PumpError::Cancelled { .. })) => {
                if let Err(halt_error) = self.halt().await {
                    tracing::warn!(node = %self.node, error = %halt_error, "Halt after aborted wait failed");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Poll the raw position until it equals the motion's target.
    async fn wait_for(&mut self, motion: ActiveMotion) -> PumpResult<()> {
        let node = self.node;
        let expected = motion.target();
        let timeout = match motion {
            ActiveMotion::Homing { .. } => self.policy.homing_timeout,
            ActiveMotion::Profiled { .. } => self.policy.move_timeout,
        };
        let transport = self.transport.as_ref();
        let reporter = self.reporter;
        let mut poller = Poller::start(self.policy.poll_interval, timeout, &mut self.cancel);

        loop {
            let result = transport.get_position_is(node).await;
            let position = reporter
                .check(transport, ops::GET_POSITION_IS, result)
                .await?;
            if position == expected {
                tracing::debug!(%node, position, polls = poller.polls(), "Target position reached");
                return Ok(());
            }

            match poller.tick().await {
                Tick::Continue => {
                    tracing::trace!(%node, position, expected, "Waiting for target position");
                }
                Tick::TimedOut => {
                    tracing::warn!(%node, position, expected, ?timeout, "Wait timed out");
                    let (timeout, last_position) = (poller.timeout(), position);
                    return Err(match motion {
                        ActiveMotion::Homing { .. } => PumpError::HomingTimeout {
                            node,
                            expected,
                            last_position,
                            timeout,
                        },
                        ActiveMotion::Profiled { .. } => PumpError::MoveTimeout {
                            node,
                            expected,
                            last_position,
                            timeout,
                        },
                    });
                }
                Tick::Cancelled => {
                    tracing::info!(%node, position, "Wait cancelled");
                    return Err(PumpError::Cancelled {
                        node,
                        last_position: position,
                    });
                }
            }
        }
    }
}

impl Drop for PumpSession {
    fn drop(&mut self) {
        if self.open {
            tracing::warn!(
                pump = %self.config.name,
                node = %self.node,
                "PumpSession dropped without close(); drive left enabled"
            );
        }
    }
}
