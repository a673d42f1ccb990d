// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use labwired_cosim_config::BridgeSettings;
use serde::{Deserialize, Serialize};

/// Names of the parameters the bridge reads from the kernel.
pub mod params {
    pub const QUANTUM: &str = "CPU.quantum";
    pub const KERNEL: &str = "CPU.kernel";
    pub const ROOTFS: &str = "CPU.rootfs";
    pub const DTB: &str = "CPU.dtb";
    pub const KERNEL_CMD: &str = "CPU.kernel_cmd";
    pub const EXTRA_ARGUMENTS: &str = "CPU.extra_arguments";
}

pub const DEFAULT_IRQ_POOL_CAPACITY: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Number of pre-allocated interrupt trigger descriptors.
    pub irq_pool_capacity: usize,
    /// Abort start-up when DMI discovery grants nothing.
    pub require_dmi: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            irq_pool_capacity: DEFAULT_IRQ_POOL_CAPACITY,
            require_dmi: true,
        }
    }
}

impl From<&BridgeSettings> for BridgeConfig {
    fn from(settings: &BridgeSettings) -> Self {
        let defaults = Self::default();
        Self {
            irq_pool_capacity: settings
                .irq_pool_capacity
                .unwrap_or(defaults.irq_pool_capacity),
            require_dmi: settings.require_dmi.unwrap_or(defaults.require_dmi),
        }
    }
}
