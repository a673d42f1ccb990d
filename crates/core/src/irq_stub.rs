// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::snapshot::{IrqStubSnapshot, IRQ_STUB_SNAPSHOT_VERSION};
use crate::{BridgeError, BridgeResult, DigitalLevel, IrqLine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Device stub that forwards one interrupt level into the host's interrupt
/// controller.
///
/// Exported to the bridge like any other line; the only state is the latched
/// level, which takes part in save/restore.
#[derive(Debug)]
pub struct IrqStub {
    name: String,
    int_level: AtomicBool,
    output: Arc<dyn IrqLine>,
}

impl IrqStub {
    pub fn new(name: impl Into<String>, output: Arc<dyn IrqLine>) -> Self {
        Self {
            name: name.into(),
            int_level: AtomicBool::new(false),
            output,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn int_level(&self) -> bool {
        self.int_level.load(Ordering::SeqCst)
    }

    fn update(&self) {
        self.output.set_level(self.int_level().into());
    }

    pub fn snapshot(&self) -> BridgeResult<serde_json::Value> {
        Ok(serde_json::to_value(IrqStubSnapshot {
            version: IRQ_STUB_SNAPSHOT_VERSION,
            int_level: self.int_level(),
        })?)
    }

    /// Restore the latched level and drive the output to match it.
    pub fn restore(&self, state: serde_json::Value) -> BridgeResult<()> {
        let snap: IrqStubSnapshot = serde_json::from_value(state)?;
        if snap.version != IRQ_STUB_SNAPSHOT_VERSION {
            return Err(BridgeError::SnapshotVersion(snap.version));
        }
        self.int_level.store(snap.int_level, Ordering::SeqCst);
        self.update();
        Ok(())
    }
}

impl IrqLine for IrqStub {
    fn set_level(&self, level: DigitalLevel) {
        self.int_level.store(level.into(), Ordering::SeqCst);
        self.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::LevelLine;

    #[test]
    fn test_level_is_forwarded() {
        let gic = Arc::new(LevelLine::new());
        let stub = IrqStub::new("nvdla", gic.clone());
        stub.set_level(DigitalLevel::High);
        assert!(stub.int_level());
        assert!(gic.is_high());
        stub.set_level(DigitalLevel::Low);
        assert!(!gic.is_high());
    }

    #[test]
    fn test_snapshot_roundtrip_drives_output() {
        let gic = Arc::new(LevelLine::new());
        let stub = IrqStub::new("nvdla", gic.clone());
        stub.set_level(DigitalLevel::High);
        let snap = stub.snapshot().unwrap();
        assert_eq!(snap["version"], 1);
        assert_eq!(snap["int_level"], true);

        let restored_gic = Arc::new(LevelLine::new());
        let restored = IrqStub::new("nvdla", restored_gic.clone());
        restored.restore(snap).unwrap();
        assert!(restored.int_level());
        assert!(restored_gic.is_high());
    }

    #[test]
    fn test_snapshot_is_a_versioned_object() {
        let stub = IrqStub::new("nvdla", Arc::new(LevelLine::new()));
        let snap = stub.snapshot().unwrap();
        assert_eq!(
            snap,
            serde_json::json!({ "version": IRQ_STUB_SNAPSHOT_VERSION, "int_level": false })
        );
    }

    #[test]
    fn test_restore_rejects_unknown_version() {
        let stub = IrqStub::new("nvdla", Arc::new(LevelLine::new()));
        let err = stub
            .restore(serde_json::json!({ "version": 2, "int_level": true }))
            .unwrap_err();
        assert!(matches!(err, BridgeError::SnapshotVersion(2)));
        assert!(!stub.int_level());
    }
}
