// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! YAML bench profiles and CI test plans.
//!
//! A profile names the device in the socket and how to exercise it; a
//! plan additionally pins the expected outcome so a run can gate CI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoverageMode {
    /// Strategic sampling, seconds per pattern.
    #[default]
    #[serde(alias = "sampled")]
    Quick,
    /// Every address, minutes per pattern on large parts.
    #[serde(alias = "exhaustive")]
    Full,
}

/// A line fault for the simulated socket, as written in test plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum FaultSpec {
    StuckAddress { bit: u8, high: bool },
    StuckData { bit: u8, high: bool },
    BridgedAddress { bits: [u8; 2] },
}

/// Expected catalogue outcome, for plan-driven CI runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    /// Test numbers (1-7) expected to fail; everything else must pass.
    #[serde(default)]
    pub failing_patterns: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchProfile {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Device class in the socket: z80, 6502 or sram.
    pub device: String,
    /// Memory size as a human string ("8KiB", "32KiB"); required for sram.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub coverage: CoverageMode,
    #[serde(default)]
    pub include_random: bool,
    /// Faults injected into the simulated socket. Ignored on hardware.
    #[serde(default)]
    pub faults: Vec<FaultSpec>,
    #[serde(default)]
    pub expect: Option<Expectation>,
}

const KNOWN_DEVICES: [&str; 7] = ["z80", "6502", "sram", "62256", "6265", "4168", "memory"];

/// The tester's address bus is 16 lines wide; larger parts cannot be wired.
const MAX_MEMORY_SIZE: u64 = 65536;

impl BenchProfile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read bench profile at {:?}", path.as_ref()))?;
        let profile: Self =
            serde_yaml::from_str(&content).context("Failed to parse bench profile YAML")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported bench profile schema_version '{}'; expected \"1.0\"",
                self.schema_version
            );
        }
        let device = self.device.trim().to_ascii_lowercase();
        if !KNOWN_DEVICES.contains(&device.as_str()) {
            anyhow::bail!(
                "Unknown device '{}'; supported: z80, 6502, sram",
                self.device
            );
        }
        if self.is_memory_device() {
            let size = self
                .size
                .as_deref()
                .context("Memory profiles need a 'size' (e.g. \"8KiB\", \"32KiB\")")?;
            let bytes = parse_size(size)?;
            if bytes == 0 || !bytes.is_power_of_two() {
                anyhow::bail!("Memory size {} is not a non-zero power of two", size);
            }
            if bytes > MAX_MEMORY_SIZE {
                anyhow::bail!(
                    "Memory size {} exceeds the 64KiB the address bus can reach",
                    size
                );
            }
        } else if !self.faults.is_empty() {
            anyhow::bail!("Fault injection only applies to memory profiles");
        }
        for fault in &self.faults {
            let bits: &[u8] = match fault {
                FaultSpec::StuckAddress { bit, .. } => std::slice::from_ref(bit),
                FaultSpec::StuckData { bit, .. } => std::slice::from_ref(bit),
                FaultSpec::BridgedAddress { bits } => bits,
            };
            let limit = match fault {
                FaultSpec::StuckData { .. } => 8,
                _ => 16,
            };
            for bit in bits {
                if *bit >= limit {
                    anyhow::bail!("Fault bit {} out of range (limit {})", bit, limit);
                }
            }
        }
        if let Some(expect) = &self.expect {
            for n in &expect.failing_patterns {
                if !(1..=7).contains(n) {
                    anyhow::bail!("Expected failing pattern {} out of range 1-7", n);
                }
            }
        }
        Ok(())
    }

    pub fn is_memory_device(&self) -> bool {
        !matches!(
            self.device.trim().to_ascii_lowercase().as_str(),
            "z80" | "6502"
        )
    }

    /// Memory size in bytes, when the profile carries one. Never truncates:
    /// oversize values error out even if `validate` was skipped.
    pub fn size_bytes(&self) -> Result<Option<u32>> {
        match &self.size {
            None => Ok(None),
            Some(s) => {
                let bytes = parse_size(s)?;
                if bytes > MAX_MEMORY_SIZE {
                    anyhow::bail!(
                        "Memory size {} exceeds the 64KiB the address bus can reach",
                        s
                    );
                }
                Ok(Some(bytes as u32))
            }
        }
    }
}

/// Sizes are either plain byte counts ("32768") or human strings with
/// binary units ("8KiB", "32KiB"). Decimal units parse too but will fail
/// the power-of-two check.
pub fn parse_size(size_str: &str) -> Result<u64> {
    let trimmed = size_str.trim();
    if let Ok(bytes) = trimmed.parse::<u64>() {
        return Ok(bytes);
    }
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = trimmed
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_memory_profile() {
        let yaml = r#"
schema_version: "1.0"
device: sram
size: 32KiB
coverage: full
include_random: true
"#;
        let profile: BenchProfile = serde_yaml::from_str(yaml).unwrap();
        profile.validate().unwrap();
        assert_eq!(profile.size_bytes().unwrap(), Some(32768));
        assert_eq!(profile.coverage, CoverageMode::Full);
        assert!(profile.include_random);
    }

    #[test]
    fn test_defaults() {
        let profile: BenchProfile = serde_yaml::from_str("device: z80").unwrap();
        profile.validate().unwrap();
        assert_eq!(profile.schema_version, "1.0");
        assert_eq!(profile.coverage, CoverageMode::Quick);
        assert!(!profile.include_random);
        assert!(profile.faults.is_empty());
    }

    #[test]
    fn test_memory_requires_size() {
        let profile: BenchProfile = serde_yaml::from_str("device: sram").unwrap();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_size_must_be_power_of_two() {
        let yaml = "device: sram\nsize: 3KiB\n";
        let profile: BenchProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_size_bounded_by_address_bus() {
        // 128KiB is a power of two but the 16-line bus cannot reach it.
        let yaml = "device: sram\nsize: 128KiB\n";
        let profile: BenchProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.validate().is_err());
        assert!(profile.size_bytes().is_err());

        // Sizes past u32 must error, not wrap to zero.
        let yaml = "device: sram\nsize: 8GiB\n";
        let profile: BenchProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.validate().is_err());
        assert!(profile.size_bytes().is_err());

        let yaml = "device: sram\nsize: 64KiB\n";
        let profile: BenchProfile = serde_yaml::from_str(yaml).unwrap();
        profile.validate().unwrap();
        assert_eq!(profile.size_bytes().unwrap(), Some(65536));
    }

    #[test]
    fn test_unknown_device_rejected() {
        let profile: BenchProfile = serde_yaml::from_str("device: 8080").unwrap();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_fault_specs_parse() {
        let yaml = r#"
device: sram
size: 32KiB
faults:
  - kind: stuck_address
    bit: 7
    high: false
  - kind: bridged_address
    bits: [0, 1]
expect:
  failing_patterns: [2, 6]
"#;
        let profile: BenchProfile = serde_yaml::from_str(yaml).unwrap();
        profile.validate().unwrap();
        assert_eq!(profile.faults.len(), 2);
        assert_eq!(
            profile.faults[0],
            FaultSpec::StuckAddress {
                bit: 7,
                high: false
            }
        );
        assert_eq!(
            profile.expect.as_ref().unwrap().failing_patterns,
            vec![2, 6]
        );
    }

    #[test]
    fn test_fault_bit_range_checked() {
        let yaml = r#"
device: sram
size: 8KiB
faults:
  - kind: stuck_data
    bit: 9
    high: true
"#;
        let profile: BenchProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_faults_rejected_for_cpu_profiles() {
        let yaml = r#"
device: z80
faults:
  - kind: stuck_address
    bit: 0
    high: true
"#;
        let profile: BenchProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_parse_size_strings() {
        assert_eq!(parse_size("8KiB").unwrap(), 8192);
        assert_eq!(parse_size("32KiB").unwrap(), 32768);
        assert!(parse_size("banana").is_err());
    }
}
