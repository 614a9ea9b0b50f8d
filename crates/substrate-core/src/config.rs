//! Substrate configuration.
//!
//! Every section is optional; missing keys fall back to the built-in
//! defaults.
//!
//! ```toml
//! [layout.ram]
//! start = 0
//! size = 2097152
//!
//! [layout.console]
//! start = 2097152
//! size = 65536
//!
//! [layout.framebuffer]
//! start = 3145728
//! width = 64
//! height = 64
//!
//! [scheduler]
//! time_check_interval = 64
//! priority = "viewport_distance"
//! viewport_padding = 2
//!
//! [console]
//! max_lines = 24
//! line_width = 80
//!
//! [validator]
//! require_signature = false
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, ConsoleConfig, MemoryLayout, PriorityMode, RegionKind, ValidatorConfig,
};

/// Default number of steps between wall-clock samples during a pass.
pub const DEFAULT_TIME_CHECK_INTERVAL: u32 = 64;

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Steps between pass deadline checks. Must be nonzero.
    pub time_check_interval: u32,
    /// Initial visiting order.
    pub priority: PriorityMode,
    /// Grid cells added on every side of the viewport before culling.
    pub viewport_padding: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_check_interval: DEFAULT_TIME_CHECK_INTERVAL,
            priority: PriorityMode::Sequential,
            viewport_padding: 0,
        }
    }
}

/// Complete substrate configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstrateConfig {
    /// Memory map applied to every core.
    pub layout: MemoryLayout,
    /// Scheduler tuning.
    pub scheduler: SchedulerConfig,
    /// Console device tuning.
    pub console: ConsoleConfig,
    /// Integrity validation policy.
    pub validator: ValidatorConfig,
}

impl SubstrateConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and any error
    /// [`SubstrateConfig::validate`] reports.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the layout and parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Layout`] for an inconsistent memory map and
    /// [`ConfigError::Value`] for out-of-range parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let regions = self.layout.build_regions()?;
        if self.scheduler.time_check_interval == 0 {
            return Err(ConfigError::Value {
                field: "scheduler.time_check_interval",
                reason: "must be at least 1",
            });
        }
        if self.console.max_lines == 0 {
            return Err(ConfigError::Value {
                field: "console.max_lines",
                reason: "must be at least 1",
            });
        }
        if let Some(region) = regions.descriptors().find(|region| region.end > CORE_ADDRESS_LIMIT) {
            return Err(ConfigError::Value {
                field: layout_field(region.kind),
                reason: "must end inside the 32-bit core address space",
            });
        }
        Ok(())
    }
}

const CORE_ADDRESS_LIMIT: u64 = 1 << 32;

const fn layout_field(kind: RegionKind) -> &'static str {
    match kind {
        RegionKind::Ram => "layout.ram",
        RegionKind::Console => "layout.console",
        RegionKind::Framebuffer { .. } => "layout.framebuffer",
    }
}
