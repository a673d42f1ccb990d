// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_irq_lines() -> usize {
    1
}

/// Host command-line profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Standard host arguments plus the Linux boot options.
    #[default]
    Generic,
    #[serde(alias = "arm64")]
    Aarch64,
}

impl std::str::FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Platform::Generic),
            "aarch64" | "arm64" => Ok(Platform::Aarch64),
            other => Err(anyhow::anyhow!("Unknown platform '{}'", other)),
        }
    }
}

/// A kernel parameter value as written in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Uint(u64),
    Text(String),
}

impl ParamValue {
    /// Unsigned view. Text is accepted in decimal or `0x` hex.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            ParamValue::Uint(v) => Some(*v),
            ParamValue::Text(s) => parse_uint(s),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::Uint(_) => None,
        }
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::Uint(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Byte-addressed register file, reachable only through transactions.
    #[serde(alias = "regs")]
    Registers,
    /// Shared memory that grants direct access.
    #[serde(alias = "memory")]
    Ram,
}

/// A target bound into the loopback kernel's address map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    pub r#type: TargetKind,
    pub base_address: u64,
    pub size: String, // e.g. "4KB"
    /// File to map for `ram` targets. Anonymous memory when unset.
    #[serde(default)]
    pub backing: Option<PathBuf>,
}

/// Tunables for the bridge itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default)]
    pub irq_pool_capacity: Option<usize>,
    #[serde(default)]
    pub require_dmi: Option<bool>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("irq_lines must be at least 1")]
    NoIrqLines,
    #[error("duplicate target id '{0}'")]
    DuplicateTarget(String),
    #[error("target '{0}' has zero size")]
    EmptyTarget(String),
    #[error("targets '{0}' and '{1}' overlap")]
    Overlap(String, String),
    #[error("target '{0}' uses a backing file but is not a ram target")]
    UnexpectedBacking(String),
    #[error("target '{0}' runs past the end of the 64-bit address space")]
    AddressOverflow(String),
}

/// One co-simulation session: the kernel's parameters, its targets and how
/// the host should be launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default = "default_irq_lines")]
    pub irq_lines: usize,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl SessionManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session manifest {:?}", path))?;

        let manifest: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse session manifest JSON {:?}", path))?
        } else {
            serde_yaml::from_str(&content).context("Failed to parse Session Manifest YAML")?
        };

        manifest.validate()?;
        tracing::debug!(
            "Loaded session '{}' with {} target(s), {} param(s)",
            manifest.name,
            manifest.targets.len(),
            manifest.params.len()
        );
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.irq_lines == 0 {
            return Err(ManifestError::NoIrqLines.into());
        }

        let mut seen = HashSet::new();
        let mut spans = Vec::with_capacity(self.targets.len());
        for t in &self.targets {
            if !seen.insert(t.id.as_str()) {
                return Err(ManifestError::DuplicateTarget(t.id.clone()).into());
            }
            if t.backing.is_some() && t.r#type != TargetKind::Ram {
                return Err(ManifestError::UnexpectedBacking(t.id.clone()).into());
            }
            let size = parse_size(&t.size)
                .with_context(|| format!("Invalid size for target '{}'", t.id))?;
            if size == 0 {
                return Err(ManifestError::EmptyTarget(t.id.clone()).into());
            }
            let last = t
                .base_address
                .checked_add(size - 1)
                .ok_or_else(|| ManifestError::AddressOverflow(t.id.clone()))?;
            spans.push((t.id.as_str(), t.base_address, last));
        }

        // Spans are inclusive.
        for (i, a) in spans.iter().enumerate() {
            for b in &spans[i + 1..] {
                if a.1 <= b.2 && b.1 <= a.2 {
                    return Err(ManifestError::Overlap(a.0.to_string(), b.0.to_string()).into());
                }
            }
        }
        Ok(())
    }
}

/// Decimal or `0x`-prefixed hexadecimal unsigned integer.
pub fn parse_uint(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
