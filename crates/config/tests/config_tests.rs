// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use labwired_cosim_config::{parse_size, ManifestError, Platform, SessionManifest, TargetKind};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn test_full_manifest_from_file() {
    let m = SessionManifest::from_file(fixture("session.yaml")).unwrap();
    assert_eq!(m.name, "loopback-session");
    assert_eq!(m.platform, Platform::Generic);
    assert_eq!(m.irq_lines, 4);
    assert_eq!(m.bridge.irq_pool_capacity, Some(128));
    assert_eq!(m.bridge.require_dmi, Some(true));
    assert_eq!(m.params["CPU.quantum"].as_uint(), Some(1000));
    assert_eq!(m.targets.len(), 2);
    assert_eq!(m.targets[0].r#type, TargetKind::Registers);
    assert_eq!(m.targets[1].r#type, TargetKind::Ram);
    assert_eq!(m.targets[1].base_address, 0x1000);
    assert_eq!(parse_size(&m.targets[1].size).unwrap(), 0x1000);
}

#[test]
fn test_json_manifest() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("labwired-cosim-manifest-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{"name":"json","platform":"aarch64","params":{"CPU.quantum":10}}"#,
    )
    .unwrap();
    let m = SessionManifest::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(m.platform, Platform::Aarch64);
    assert_eq!(m.params["CPU.quantum"].as_uint(), Some(10));
}

#[test]
fn test_missing_file_reports_path() {
    let err = SessionManifest::from_file("does/not/exist.yaml").unwrap_err();
    assert!(format!("{:#}", err).contains("exist.yaml"));
}

#[test]
fn test_parse_size_units() {
    assert_eq!(parse_size("4KiB").unwrap(), 4096);
    assert_eq!(parse_size("1KB").unwrap(), 1000);
    assert_eq!(parse_size("1MiB").unwrap(), 1024 * 1024);
    assert!(parse_size("lots").is_err());
}

#[test]
fn test_target_wrapping_address_space_rejected() {
    let yaml = r#"
name: "wrap"
targets:
  - { id: "top", type: "ram", base_address: 0xFFFFFFFFFFFFF000, size: "8KiB" }
"#;
    let m: SessionManifest = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(
        m.validate().unwrap_err().downcast_ref::<ManifestError>(),
        Some(&ManifestError::AddressOverflow("top".into()))
    );

    let yaml = r#"
name: "top"
targets:
  - { id: "top", type: "ram", base_address: 0xFFFFFFFFFFFFF000, size: "4KiB" }
  - { id: "low", type: "registers", base_address: 0xFFFFFFFFFFFFE000, size: "4KiB" }
"#;
    let m: SessionManifest = serde_yaml::from_str(yaml).unwrap();
    assert!(m.validate().is_ok());
}
