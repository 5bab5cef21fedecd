//! Simulated EPOS controller.
//!
//! [`SimulatedEpos`] implements [`EposTransport`] for any number of nodes so
//! sessions, the CLI and the test suite can run without hardware. Each node
//! has an object dictionary, a device state code, an operating mode, a
//! position profile, a digital output word and a simple motion model.
//!
//! The motion model is poll driven: every `get_position_is` call advances an
//! active move by a fixed stride towards its target. Tests therefore control
//! how many polls a move takes, and time itself stays virtual.
//!
//! Applied commands are recorded in a per-node journal. Failures can be
//! injected per primitive and the drive can be stalled so a move never
//! reaches its target.

use crate::error::{PumpError, PumpResult};
use crate::state::codes;
use crate::transport::{
    ops, DeviceErrorCode, EposTransport, HomingMethod, HomingParameters, NodeId, ObjectAddress,
    OperationMode, PositionProfile, TransportResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Error codes produced by the simulator.
pub mod error_codes {
    use crate::transport::DeviceErrorCode;

    /// Generic internal failure
    pub const INTERNAL: DeviceErrorCode = DeviceErrorCode(0x1000_0001);
    /// Bus did not answer in time
    pub const TIMEOUT: DeviceErrorCode = DeviceErrorCode(0x1000_0007);
    /// Link has not been opened
    pub const NOT_OPEN: DeviceErrorCode = DeviceErrorCode(0x1000_000C);
    /// Command not allowed in the current device state
    pub const WRONG_STATE: DeviceErrorCode = DeviceErrorCode(0x1000_0022);
    /// Motor current limit exceeded
    pub const OVERCURRENT: DeviceErrorCode = DeviceErrorCode(0x0000_2310);
    /// Object dictionary entry does not exist
    pub const OBJECT_NOT_FOUND: DeviceErrorCode = DeviceErrorCode(0x0602_0000);

    pub(super) fn describe(code: DeviceErrorCode) -> Option<&'static str> {
        match code {
            INTERNAL => Some("Internal error"),
            TIMEOUT => Some("Timeout error"),
            NOT_OPEN => Some("Communication port is not open"),
            WRONG_STATE => Some("Command not allowed in the current device state"),
            OVERCURRENT => Some("Overcurrent error"),
            OBJECT_NOT_FOUND => Some("Object does not exist in the object dictionary"),
            _ => None,
        }
    }
}

/// Commands applied by the simulator, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Link closed
    Close,
    /// Fault cleared
    ClearFault,
    /// Enable state requested
    Enable,
    /// Disable state requested
    Disable,
    /// Operating mode switched
    ActivateMode(OperationMode),
    /// Position profile programmed
    SetPositionProfile(PositionProfile),
    /// Profiled move started
    MoveToPosition {
        /// Target position (counts)
        target: i32,
        /// Absolute or relative target
        absolute: bool,
        /// Start without waiting for the previous move
        immediately: bool,
    },
    /// Movement halted
    Halt,
    /// Homing parameters programmed
    SetHomingParameter(HomingParameters),
    /// Reference search started
    FindHome(HomingMethod),
    /// Digital output word written
    SetDigitalOutputs(u16),
}

// =============================================================================
// Node description
// =============================================================================

/// Static description of a simulated node.
///
/// Loaded from TOML by the CLI; every field has the Nemesys default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimNodeConfig {
    /// Encoder pulses per turn
    pub encoder_resolution: u32,
    /// Gear numerator
    pub gear_numerator: u32,
    /// Gear denominator
    pub gear_denominator: u32,
    /// Velocity notation exponent
    pub velocity_exponent: i8,
    /// Counts travelled per position poll
    pub stride: i32,
    /// Position at power-up
    pub initial_position: i32,
}

impl Default for SimNodeConfig {
    fn default() -> Self {
        Self {
            encoder_resolution: 512,
            gear_numerator: 19,
            gear_denominator: 6,
            velocity_exponent: -3,
            stride: 50_000,
            initial_position: 0,
        }
    }
}

impl SimNodeConfig {
    /// Parse a node description from TOML.
    pub fn from_toml_str(text: &str) -> PumpResult<Self> {
        toml::from_str(text)
            .map_err(|e| PumpError::Configuration(format!("invalid simulator description: {e}")))
    }

    fn object_dictionary(&self) -> HashMap<ObjectAddress, Vec<u8>> {
        HashMap::from([
            (
                ObjectAddress::VELOCITY_NOTATION,
                self.velocity_exponent.to_le_bytes().to_vec(),
            ),
            (
                ObjectAddress::ENCODER_RESOLUTION,
                self.encoder_resolution.to_le_bytes().to_vec(),
            ),
            (
                ObjectAddress::GEAR_NUMERATOR,
                self.gear_numerator.to_le_bytes().to_vec(),
            ),
            (
                ObjectAddress::GEAR_DENOMINATOR,
                self.gear_denominator.to_le_bytes().to_vec(),
            ),
        ])
    }
}

// =============================================================================
// Node state
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct ActiveMove {
    target: i32,
    velocity: i32,
}

#[derive(Debug)]
struct SimNode {
    state: u16,
    mode: OperationMode,
    profile: PositionProfile,
    homing: Option<HomingParameters>,
    position: i32,
    active: Option<ActiveMove>,
    stride: i32,
    stalled: bool,
    outputs: u16,
    objects: HashMap<ObjectAddress, Vec<u8>>,
    journal: Vec<Command>,
}

impl SimNode {
    fn new(config: &SimNodeConfig) -> Self {
        Self {
            state: codes::DISABLED,
            mode: OperationMode::ProfilePosition,
            profile: PositionProfile::default(),
            homing: None,
            position: config.initial_position,
            active: None,
            stride: config.stride.max(1),
            stalled: false,
            outputs: 0,
            objects: config.object_dictionary(),
            journal: Vec::new(),
        }
    }

    fn require_enabled(&self) -> TransportResult<()> {
        if self.state == codes::ENABLED {
            Ok(())
        } else {
            Err(error_codes::WRONG_STATE)
        }
    }

    fn start_move(&mut self, target: i32, speed: u32) {
        let speed = i32::try_from(speed).unwrap_or(i32::MAX).max(1);
        let velocity = if target >= self.position { speed } else { -speed };
        self.active = (target != self.position).then_some(ActiveMove { target, velocity });
    }

    fn step(&mut self) {
        if self.stalled {
            return;
        }
        if let Some(active) = self.active {
            let distance = i64::from(active.target) - i64::from(self.position);
            if distance.abs() <= i64::from(self.stride) {
                self.position = active.target;
                self.active = None;
            } else {
                self.position += self.stride * distance.signum() as i32;
            }
        }
    }
}

#[derive(Debug, Default)]
struct SimInner {
    open: bool,
    defaults: SimNodeConfig,
    nodes: HashMap<NodeId, SimNode>,
    faults: HashMap<(NodeId, &'static str), DeviceErrorCode>,
    latency: HashMap<(NodeId, &'static str), Duration>,
}

impl SimInner {
    fn node(&mut self, node: NodeId) -> &mut SimNode {
        let defaults = &self.defaults;
        self.nodes
            .entry(node)
            .or_insert_with(|| SimNode::new(defaults))
    }

    /// Consume an injected fault and require an open link.
    fn gate(&mut self, node: NodeId, operation: &'static str) -> TransportResult<&mut SimNode> {
        if let Some(code) = self.faults.remove(&(node, operation)) {
            tracing::debug!(%node, operation, %code, "Injected fault");
            return Err(code);
        }
        if !self.open {
            return Err(error_codes::NOT_OPEN);
        }
        Ok(self.node(node))
    }
}

// =============================================================================
// SimulatedEpos
// =============================================================================

/// In-memory EPOS controller serving any number of nodes.
///
/// Nodes are created on first use from the default [`SimNodeConfig`].
#[derive(Debug, Default)]
pub struct SimulatedEpos {
    inner: Mutex<SimInner>,
}

impl SimulatedEpos {
    /// Simulator with the Nemesys default node description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulator whose nodes are created from `defaults`.
    pub fn with_defaults(defaults: SimNodeConfig) -> Self {
        Self {
            inner: Mutex::new(SimInner {
                defaults,
                ..SimInner::default()
            }),
        }
    }

    /// Fail the next call of `operation` on `node` with `code`.
    pub fn fail_once(&self, node: NodeId, operation: &'static str, code: DeviceErrorCode) {
        self.inner.lock().faults.insert((node, operation), code);
    }

    /// Delay every call of `operation` on `node` by `latency` before it is
    /// applied. The link stays busy for the delay.
    pub fn set_latency(&self, node: NodeId, operation: &'static str, latency: Duration) {
        self.inner.lock().latency.insert((node, operation), latency);
    }

    async fn delay(&self, node: NodeId, operation: &'static str) {
        let latency = self.inner.lock().latency.get(&(node, operation)).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Freeze or release the drive of `node`.
    pub fn set_stalled(&self, node: NodeId, stalled: bool) {
        self.inner.lock().node(node).stalled = stalled;
    }

    /// Counts travelled per position poll on `node`.
    pub fn set_stride(&self, node: NodeId, stride: i32) {
        self.inner.lock().node(node).stride = stride.max(1);
    }

    /// Force the raw device state code.
    pub fn set_device_state(&self, node: NodeId, code: u16) {
        self.inner.lock().node(node).state = code;
    }

    /// Raw device state code.
    pub fn device_state(&self, node: NodeId) -> u16 {
        self.inner.lock().node(node).state
    }

    /// Place the drive at `position` counts and cancel any move.
    pub fn set_position(&self, node: NodeId, position: i32) {
        let mut inner = self.inner.lock();
        let sim = inner.node(node);
        sim.position = position;
        sim.active = None;
    }

    /// Current position without advancing the motion model.
    pub fn position(&self, node: NodeId) -> i32 {
        self.inner.lock().node(node).position
    }

    /// Overwrite the digital output word.
    pub fn set_digital_outputs(&self, node: NodeId, word: u16) {
        self.inner.lock().node(node).outputs = word;
    }

    /// Current digital output word.
    pub fn digital_outputs(&self, node: NodeId) -> u16 {
        self.inner.lock().node(node).outputs
    }

    /// Replace an object dictionary entry.
    pub fn set_object(&self, node: NodeId, address: ObjectAddress, bytes: Vec<u8>) {
        self.inner.lock().node(node).objects.insert(address, bytes);
    }

    /// Whether the link is open.
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Commands applied to `node` so far.
    pub fn journal(&self, node: NodeId) -> Vec<Command> {
        self.inner.lock().node(node).journal.clone()
    }

    /// Forget the journal of `node`.
    pub fn clear_journal(&self, node: NodeId) {
        self.inner.lock().node(node).journal.clear();
    }
}

#[async_trait]
impl EposTransport for SimulatedEpos {
    async fn open(&self) -> TransportResult<()> {
        let mut inner = self.inner.lock();
        inner.open = true;
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        let mut inner = self.inner.lock();
        inner.open = false;
        for sim in inner.nodes.values_mut() {
            sim.journal.push(Command::Close);
        }
        Ok(())
    }

    async fn clear_fault(&self, node: NodeId) -> TransportResult<()> {
        self.delay(node, ops::CLEAR_FAULT).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::CLEAR_FAULT)?;
        if sim.state == codes::FAULT {
            sim.state = codes::DISABLED;
        }
        sim.journal.push(Command::ClearFault);
        Ok(())
    }

    async fn set_enable_state(&self, node: NodeId) -> TransportResult<()> {
        self.delay(node, ops::SET_ENABLE_STATE).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::SET_ENABLE_STATE)?;
        if sim.state == codes::FAULT {
            return Err(error_codes::WRONG_STATE);
        }
        sim.state = codes::ENABLED;
        sim.journal.push(Command::Enable);
        Ok(())
    }

    async fn set_disable_state(&self, node: NodeId) -> TransportResult<()> {
        self.delay(node, ops::SET_DISABLE_STATE).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::SET_DISABLE_STATE)?;
        sim.state = codes::DISABLED;
        sim.active = None;
        sim.journal.push(Command::Disable);
        Ok(())
    }

    async fn get_state(&self, node: NodeId) -> TransportResult<u16> {
        self.delay(node, ops::GET_STATE).await;
        let mut inner = self.inner.lock();
        Ok(inner.gate(node, ops::GET_STATE)?.state)
    }

    async fn get_position_is(&self, node: NodeId) -> TransportResult<i32> {
        self.delay(node, ops::GET_POSITION_IS).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::GET_POSITION_IS)?;
        sim.step();
        Ok(sim.position)
    }

    async fn get_velocity_is(&self, node: NodeId) -> TransportResult<i32> {
        self.delay(node, ops::GET_VELOCITY_IS).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::GET_VELOCITY_IS)?;
        Ok(sim.active.map_or(0, |active| active.velocity))
    }

    async fn get_movement_state(&self, node: NodeId) -> TransportResult<bool> {
        self.delay(node, ops::GET_MOVEMENT_STATE).await;
        let mut inner = self.inner.lock();
        Ok(inner.gate(node, ops::GET_MOVEMENT_STATE)?.active.is_none())
    }

    async fn activate_mode(&self, node: NodeId, mode: OperationMode) -> TransportResult<()> {
        self.delay(node, ops::ACTIVATE_MODE).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::ACTIVATE_MODE)?;
        sim.mode = mode;
        sim.journal.push(Command::ActivateMode(mode));
        Ok(())
    }

    async fn get_operation_mode(&self, node: NodeId) -> TransportResult<OperationMode> {
        self.delay(node, ops::GET_OPERATION_MODE).await;
        let mut inner = self.inner.lock();
        Ok(inner.gate(node, ops::GET_OPERATION_MODE)?.mode)
    }

    async fn set_position_profile(
        &self,
        node: NodeId,
        profile: PositionProfile,
    ) -> TransportResult<()> {
        self.delay(node, ops::SET_POSITION_PROFILE).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::SET_POSITION_PROFILE)?;
        sim.profile = profile;
        sim.journal.push(Command::SetPositionProfile(profile));
        Ok(())
    }

    async fn get_position_profile(&self, node: NodeId) -> TransportResult<PositionProfile> {
        self.delay(node, ops::GET_POSITION_PROFILE).await;
        let mut inner = self.inner.lock();
        Ok(inner.gate(node, ops::GET_POSITION_PROFILE)?.profile)
    }

    async fn move_to_position(
        &self,
        node: NodeId,
        target: i32,
        absolute: bool,
        immediately: bool,
    ) -> TransportResult<()> {
        self.delay(node, ops::MOVE_TO_POSITION).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::MOVE_TO_POSITION)?;
        sim.require_enabled()?;
        if sim.mode != OperationMode::ProfilePosition {
            return Err(error_codes::WRONG_STATE);
        }
        let target = if absolute {
            target
        } else {
            sim.position.saturating_add(target)
        };
        let speed = sim.profile.velocity;
        sim.start_move(target, speed);
        sim.journal.push(Command::MoveToPosition {
            target,
            absolute,
            immediately,
        });
        Ok(())
    }

    async fn halt_position_movement(&self, node: NodeId) -> TransportResult<()> {
        self.delay(node, ops::HALT_POSITION_MOVEMENT).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::HALT_POSITION_MOVEMENT)?;
        sim.active = None;
        sim.journal.push(Command::Halt);
        Ok(())
    }

    async fn set_homing_parameter(
        &self,
        node: NodeId,
        params: HomingParameters,
    ) -> TransportResult<()> {
        self.delay(node, ops::SET_HOMING_PARAMETER).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::SET_HOMING_PARAMETER)?;
        sim.homing = Some(params);
        sim.journal.push(Command::SetHomingParameter(params));
        Ok(())
    }

    async fn find_home(&self, node: NodeId, method: HomingMethod) -> TransportResult<()> {
        self.delay(node, ops::FIND_HOME).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::FIND_HOME)?;
        sim.require_enabled()?;
        if sim.mode != OperationMode::Homing {
            return Err(error_codes::WRONG_STATE);
        }
        let params = sim.homing.ok_or(error_codes::WRONG_STATE)?;
        sim.start_move(params.home_position, params.speed_switch);
        sim.journal.push(Command::FindHome(method));
        Ok(())
    }

    async fn get_all_digital_outputs(&self, node: NodeId) -> TransportResult<u16> {
        self.delay(node, ops::GET_ALL_DIGITAL_OUTPUTS).await;
        let mut inner = self.inner.lock();
        Ok(inner.gate(node, ops::GET_ALL_DIGITAL_OUTPUTS)?.outputs)
    }

    async fn set_all_digital_outputs(&self, node: NodeId, word: u16) -> TransportResult<()> {
        self.delay(node, ops::SET_ALL_DIGITAL_OUTPUTS).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::SET_ALL_DIGITAL_OUTPUTS)?;
        sim.outputs = word;
        sim.journal.push(Command::SetDigitalOutputs(word));
        Ok(())
    }

    async fn get_object(
        &self,
        node: NodeId,
        address: ObjectAddress,
        _len: usize,
    ) -> TransportResult<Vec<u8>> {
        self.delay(node, ops::GET_OBJECT).await;
        let mut inner = self.inner.lock();
        let sim = inner.gate(node, ops::GET_OBJECT)?;
        sim.objects
            .get(&address)
            .cloned()
            .ok_or(error_codes::OBJECT_NOT_FOUND)
    }

    async fn get_error_info(&self, code: DeviceErrorCode) -> TransportResult<String> {
        error_codes::describe(code)
            .map(str::to_string)
            .ok_or(error_codes::INTERNAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: NodeId = NodeId(4);

    async fn enabled_sim() -> SimulatedEpos {
        let sim = SimulatedEpos::new();
        sim.open().await.unwrap();
        sim.set_enable_state(NODE).await.unwrap();
        sim
    }

    #[tokio::test]
    async fn test_closed_link_rejects_commands() {
        let sim = SimulatedEpos::new();
        assert_eq!(sim.get_state(NODE).await, Err(error_codes::NOT_OPEN));
        sim.open().await.unwrap();
        assert_eq!(sim.get_state(NODE).await, Ok(codes::DISABLED));
    }

    #[tokio::test]
    async fn test_default_object_dictionary() {
        let sim = enabled_sim().await;
        let exp = sim
            .get_object(NODE, ObjectAddress::VELOCITY_NOTATION, 1)
            .await
            .unwrap();
        assert_eq!(exp, vec![0xFD]);
        let enc = sim
            .get_object(NODE, ObjectAddress::ENCODER_RESOLUTION, 4)
            .await
            .unwrap();
        assert_eq!(u32::from_le_bytes([enc[0], enc[1], enc[2], enc[3]]), 512);
        assert_eq!(
            sim.get_object(NODE, ObjectAddress::new(0x1234, 0), 4).await,
            Err(error_codes::OBJECT_NOT_FOUND)
        );
    }

    #[tokio::test]
    async fn test_move_advances_per_poll() {
        let sim = enabled_sim().await;
        sim.set_stride(NODE, 100);
        sim.set_position_profile(
            NODE,
            PositionProfile {
                velocity: 500,
                acceleration: 1,
                deceleration: 1,
            },
        )
        .await
        .unwrap();
        sim.move_to_position(NODE, -250, true, true).await.unwrap();

        assert_eq!(sim.get_velocity_is(NODE).await, Ok(-500));
        assert_eq!(sim.get_movement_state(NODE).await, Ok(false));
        assert_eq!(sim.get_position_is(NODE).await, Ok(-100));
        assert_eq!(sim.get_position_is(NODE).await, Ok(-200));
        assert_eq!(sim.get_position_is(NODE).await, Ok(-250));
        assert_eq!(sim.get_movement_state(NODE).await, Ok(true));
        assert_eq!(sim.get_velocity_is(NODE).await, Ok(0));
    }

    #[tokio::test]
    async fn test_stalled_drive_keeps_position() {
        let sim = enabled_sim().await;
        sim.set_stalled(NODE, true);
        sim.move_to_position(NODE, 1_000_000, true, true)
            .await
            .unwrap();
        for _ in 0..5 {
            assert_eq!(sim.get_position_is(NODE).await, Ok(0));
        }
        sim.halt_position_movement(NODE).await.unwrap();
        assert_eq!(sim.get_movement_state(NODE).await, Ok(true));
    }

    #[tokio::test]
    async fn test_move_requires_enabled_drive() {
        let sim = SimulatedEpos::new();
        sim.open().await.unwrap();
        assert_eq!(
            sim.move_to_position(NODE, 10, true, true).await,
            Err(error_codes::WRONG_STATE)
        );
        assert!(sim.journal(NODE).is_empty());
    }

    #[tokio::test]
    async fn test_homing_runs_to_home_position() {
        let sim = enabled_sim().await;
        sim.set_position(NODE, -300_000);
        sim.activate_mode(NODE, OperationMode::Homing).await.unwrap();
        sim.set_homing_parameter(
            NODE,
            HomingParameters {
                acceleration: 1,
                speed_switch: 2,
                speed_index: 3,
                home_offset: 4,
                current_threshold: 5,
                home_position: 0,
            },
        )
        .await
        .unwrap();
        sim.find_home(NODE, HomingMethod::PositiveLimitSwitch)
            .await
            .unwrap();
        let mut polls = 0;
        while sim.get_position_is(NODE).await.unwrap() != 0 {
            polls += 1;
        }
        assert_eq!(polls, 5);
    }

    #[tokio::test]
    async fn test_fault_injection_is_one_shot() {
        let sim = enabled_sim().await;
        sim.fail_once(NODE, ops::GET_POSITION_IS, error_codes::TIMEOUT);
        assert_eq!(sim.get_position_is(NODE).await, Err(error_codes::TIMEOUT));
        assert_eq!(sim.get_position_is(NODE).await, Ok(0));
        // Other nodes are unaffected.
        sim.fail_once(NODE, ops::GET_STATE, error_codes::TIMEOUT);
        assert!(sim.get_state(NodeId(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_fault_state_blocks_enable_until_cleared() {
        let sim = enabled_sim().await;
        sim.set_device_state(NODE, codes::FAULT);
        assert_eq!(
            sim.set_enable_state(NODE).await,
            Err(error_codes::WRONG_STATE)
        );
        sim.clear_fault(NODE).await.unwrap();
        sim.set_enable_state(NODE).await.unwrap();
        assert_eq!(sim.device_state(NODE), codes::ENABLED);
    }

    #[tokio::test]
    async fn test_error_descriptions() {
        let sim = SimulatedEpos::new();
        assert_eq!(
            sim.get_error_info(error_codes::OVERCURRENT).await.unwrap(),
            "Overcurrent error"
        );
        assert!(sim.get_error_info(DeviceErrorCode(0xDEAD_BEEF)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_one_primitive() {
        let sim = enabled_sim().await;
        sim.set_latency(NODE, ops::HALT_POSITION_MOVEMENT, Duration::from_millis(100));

        let start = tokio::time::Instant::now();
        sim.get_state(NODE).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(1));
        sim.halt_position_movement(NODE).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_node_description_from_toml() {
        let config = SimNodeConfig::from_toml_str(
            "encoder_resolution = 1024\nvelocity_exponent = 0\nstride = 10\n",
        )
        .unwrap();
        assert_eq!(config.encoder_resolution, 1024);
        assert_eq!(config.gear_numerator, 19);
        assert_eq!(config.velocity_exponent, 0);
        assert_eq!(config.stride, 10);
        assert!(SimNodeConfig::from_toml_str("stride = \"fast\"").is_err());
    }
}
