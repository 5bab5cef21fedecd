//! Layered configuration using Figment.
//!
//! Configuration is merged from, in increasing priority:
//! 1. built-in defaults (two pumps on nodes 2 and 3, reference syringe)
//! 2. a TOML file (default `config/nemesys.toml`)
//! 3. environment variables prefixed with `NEMESYS_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use nemesys::config::AppConfig;
//!
//! // NEMESYS_APPLICATION__LOG_LEVEL=debug overrides the file
//! let config = AppConfig::load()?;
//! config.validate()?;
//! println!("{} pumps configured", config.pumps.len());
//! # Ok::<(), nemesys::error::PumpError>(())
//! ```

use crate::conversion::SyringeGeometry;
use crate::error::{PumpError, PumpResult};
use crate::transport::NodeId;
use crate::wait::WaitPolicy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/nemesys.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// One entry per pump node
    pub pumps: Vec<PumpConfig>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Configuration of one pump node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Name used in logs and on the command line
    pub name: String,
    /// Node address on the bus
    pub node_id: NodeId,
    /// Syringe mounted on the pump
    #[serde(default)]
    pub syringe: SyringeConfig,
    /// Reference search settings
    #[serde(default)]
    pub homing: HomingConfig,
    /// Polling and move timeouts
    #[serde(default)]
    pub motion: MotionConfig,
}

/// Syringe geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyringeConfig {
    /// Piston stroke (mm)
    #[serde(default = "default_stroke")]
    pub stroke_mm: f64,
    /// Inner diameter (mm)
    #[serde(default = "default_diameter")]
    pub diameter_mm: f64,
    /// Usable volume (µl); derived from the geometry when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_ul: Option<f64>,
}

/// Homing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomingConfig {
    /// Position (counts) assigned by a negative reference search
    #[serde(default)]
    pub home_position: i32,
    /// Upper bound for a waiting `home`
    #[serde(default = "default_homing_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Motion wait settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Delay between position polls
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Upper bound for a waiting move
    #[serde(default = "default_move_timeout", with = "humantime_serde")]
    pub move_timeout: Duration,
}

fn default_stroke() -> f64 {
    60.0
}

fn default_diameter() -> f64 {
    3.2574
}

fn default_homing_timeout() -> Duration {
    WaitPolicy::default().homing_timeout
}

fn default_poll_interval() -> Duration {
    WaitPolicy::default().poll_interval
}

fn default_move_timeout() -> Duration {
    WaitPolicy::default().move_timeout
}

impl Default for SyringeConfig {
    fn default() -> Self {
        Self {
            stroke_mm: default_stroke(),
            diameter_mm: default_diameter(),
            capacity_ul: None,
        }
    }
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            home_position: 0,
            timeout: default_homing_timeout(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            move_timeout: default_move_timeout(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application: ApplicationConfig {
                name: "Nemesys".to_string(),
                log_level: "info".to_string(),
            },
            pumps: vec![
                PumpConfig::new("pump_a", NodeId(2)),
                PumpConfig::new("pump_b", NodeId(3)),
            ],
        }
    }
}

impl PumpConfig {
    /// Pump with the reference syringe and default timing.
    pub fn new(name: impl Into<String>, node_id: NodeId) -> Self {
        Self {
            name: name.into(),
            node_id,
            syringe: SyringeConfig::default(),
            homing: HomingConfig::default(),
            motion: MotionConfig::default(),
        }
    }

    /// Syringe geometry used for the conversion factors.
    pub fn geometry(&self) -> SyringeGeometry {
        SyringeGeometry {
            stroke_mm: self.syringe.stroke_mm,
            diameter_mm: self.syringe.diameter_mm,
        }
    }

    /// Timing of waiting operations.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            poll_interval: self.motion.poll_interval,
            homing_timeout: self.homing.timeout,
            move_timeout: self.motion.move_timeout,
        }
    }

    /// Check one pump entry.
    pub fn validate(&self) -> PumpResult<()> {
        let invalid = |what: String| -> PumpResult<()> {
            Err(PumpError::Configuration(format!(
                "pump '{}' (node {}): {what}",
                self.name, self.node_id
            )))
        };

        for (field, value) in [
            ("stroke_mm", self.syringe.stroke_mm),
            ("diameter_mm", self.syringe.diameter_mm),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return invalid(format!("{field} must be positive, got {value}"));
            }
        }
        if let Some(capacity) = self.syringe.capacity_ul {
            if !capacity.is_finite() || capacity <= 0.0 {
                return invalid(format!("capacity_ul must be positive, got {capacity}"));
            }
        }
        if self.motion.poll_interval.is_zero() {
            return invalid("poll_interval must be non-zero".to_string());
        }
        if self.motion.move_timeout.is_zero() || self.homing.timeout.is_zero() {
            return invalid("timeouts must be non-zero".to_string());
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load from the default file and the environment.
    pub fn load() -> PumpResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and the environment.
    ///
    /// A missing file is not an error; the defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> PumpResult<Self> {
        let config = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("NEMESYS_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> PumpResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(PumpError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.pumps.is_empty() {
            return Err(PumpError::Configuration(
                "at least one pump must be configured".to_string(),
            ));
        }

        let mut nodes = HashSet::new();
        let mut names = HashSet::new();
        for pump in &self.pumps {
            pump.validate()?;
            if !nodes.insert(pump.node_id) {
                return Err(PumpError::Configuration(format!(
                    "Duplicate node id: {}",
                    pump.node_id
                )));
            }
            if !names.insert(pump.name.as_str()) {
                return Err(PumpError::Configuration(format!(
                    "Duplicate pump name: {}",
                    pump.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a pump by name.
    pub fn pump(&self, name: &str) -> Option<&PumpConfig> {
        self.pumps.iter().find(|pump| pump.name == name)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> PumpResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PumpError::Configuration(format!("cannot render configuration: {e}")))
    }
}
