// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Per-device-class signal tables.
//!
//! The three supported device classes share one physical bus, but several
//! lines change meaning, direction and polarity between them. Pin 39 is
//! SRAM /OE, Z80 /RD and 6502 R/W (active-high!); pin 6 is Z80 /M1
//! (active-low) but 6502 SYNC (active-high); pin 10 is Z80 /WAIT
//! (active-low) but 6502 RDY (active-high). Those divergences live here as
//! data, so the bus code has exactly one path that consults them.

use crate::lines::{self, LineId};
use crate::{CoreError, CoreResult};
use std::str::FromStr;

/// Which IC family currently sits in the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Z80 CPU (40-pin DIP).
    CpuA,
    /// 6502 CPU (40-pin DIP).
    CpuB,
    /// HM62256 / HM6265 / D4168 SRAM (28-pin DIP).
    Memory,
}

impl DeviceClass {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceClass::CpuA => "Z80",
            DeviceClass::CpuB => "6502",
            DeviceClass::Memory => "SRAM",
        }
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim().to_ascii_lowercase();
        match v.as_str() {
            "z80" | "cpu_a" => Ok(Self::CpuA),
            "6502" | "cpu_b" => Ok(Self::CpuB),
            "sram" | "62256" | "6265" | "4168" | "memory" => Ok(Self::Memory),
            _ => Err(format!(
                "unsupported device class '{}'; supported: z80, 6502, sram",
                value
            )),
        }
    }
}

/// The function a physical line performs for the selected device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalRole {
    AddressOut,
    DataIo,
    ChipSelect,
    OutputEnable,
    WriteEnable,
    ClockOut,
    ResetOut,
    /// Direction of the current cycle as signalled by a CPU
    /// (Z80 /RD, 6502 R/W).
    ReadWriteSense,
    /// Z80 /WR strobe, observed.
    WriteStrobeSense,
    MemRequestSense,
    IoRequestSense,
    /// Opcode-fetch marker (Z80 /M1, 6502 SYNC).
    FetchSync,
    /// Z80 /WAIT out, 6502 RDY out.
    WaitReady,
    InterruptOut,
    NmiOut,
    BusRequestOut,
    BusAckSense,
    HaltSense,
    RefreshSense,
    SetOverflowOut,
    Phi1Sense,
    Phi2Sense,
}

bitflags::bitflags! {
    /// Set of logical roles currently asserted on the bus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RoleSet: u32 {
        const CHIP_SELECT = 1 << 0;
        const OUTPUT_ENABLE = 1 << 1;
        const WRITE_ENABLE = 1 << 2;
        const RESET = 1 << 3;
        const INTERRUPT = 1 << 4;
        const NMI = 1 << 5;
        const BUS_REQUEST = 1 << 6;
        const WAIT_READY = 1 << 7;
    }
}

/// Which party drives a bound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingDirection {
    /// Driven by the device under test, sampled by the tester.
    In,
    /// Driven by the tester.
    Out,
    /// Direction switches at runtime; gated by the bus direction guard.
    Bidirectional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveLevel {
    ActiveHigh,
    ActiveLow,
}

impl ActiveLevel {
    /// Physical level that asserts a signal with this polarity.
    pub fn asserted(self) -> bool {
        matches!(self, ActiveLevel::ActiveHigh)
    }

    /// Physical level that deasserts it.
    pub fn deasserted(self) -> bool {
        !self.asserted()
    }
}

/// One (role, line) assignment for a device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SignalBinding {
    pub role: LogicalRole,
    pub line: LineId,
    pub direction: BindingDirection,
    pub active_level: ActiveLevel,
}

const fn binding(
    role: LogicalRole,
    line: LineId,
    direction: BindingDirection,
    active_level: ActiveLevel,
) -> SignalBinding {
    SignalBinding {
        role,
        line,
        direction,
        active_level,
    }
}

/// Lookup table from logical roles to physical lines for one device class.
///
/// Referentially stable: `for_class` returns the same table content for a
/// given class on every call. Construction validates that no physical line
/// is bound twice within the class.
#[derive(Debug, Clone)]
pub struct SignalMap {
    class: DeviceClass,
    bindings: Vec<SignalBinding>,
}

impl SignalMap {
    pub fn for_class(class: DeviceClass) -> Self {
        let mut bindings = Vec::with_capacity(40);

        // Address and data buses are common to all classes; only the
        // address direction differs (the tester drives addresses at an
        // SRAM, a socketed CPU drives them at the tester).
        let addr_dir = match class {
            DeviceClass::Memory => BindingDirection::Out,
            DeviceClass::CpuA | DeviceClass::CpuB => BindingDirection::In,
        };
        for bit in 0..16 {
            bindings.push(binding(
                LogicalRole::AddressOut,
                lines::address_line(bit),
                addr_dir,
                ActiveLevel::ActiveHigh,
            ));
        }
        for bit in 0..8 {
            bindings.push(binding(
                LogicalRole::DataIo,
                lines::data_line(bit),
                BindingDirection::Bidirectional,
                ActiveLevel::ActiveHigh,
            ));
        }

        match class {
            DeviceClass::Memory => {
                bindings.push(binding(
                    LogicalRole::ChipSelect,
                    lines::MREQ_CS,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::OutputEnable,
                    lines::RD_RW_OE,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::WriteEnable,
                    lines::WR_WE,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
            }
            DeviceClass::CpuA => {
                bindings.push(binding(
                    LogicalRole::ClockOut,
                    lines::CLOCK,
                    BindingDirection::Out,
                    ActiveLevel::ActiveHigh,
                ));
                bindings.push(binding(
                    LogicalRole::ResetOut,
                    lines::RESET,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                // /RD: low means the CPU is reading.
                bindings.push(binding(
                    LogicalRole::ReadWriteSense,
                    lines::RD_RW_OE,
                    BindingDirection::In,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::WriteStrobeSense,
                    lines::WR_WE,
                    BindingDirection::In,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::MemRequestSense,
                    lines::MREQ_CS,
                    BindingDirection::In,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::IoRequestSense,
                    lines::IORQ,
                    BindingDirection::In,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::FetchSync,
                    lines::M1_SYNC,
                    BindingDirection::In,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::WaitReady,
                    lines::WAIT_RDY,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::InterruptOut,
                    lines::INT_IRQ,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::NmiOut,
                    lines::NMI,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::BusRequestOut,
                    lines::BUSREQ,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::BusAckSense,
                    lines::BUSACK,
                    BindingDirection::In,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::HaltSense,
                    lines::HALT,
                    BindingDirection::In,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::RefreshSense,
                    lines::RFSH,
                    BindingDirection::In,
                    ActiveLevel::ActiveLow,
                ));
            }
            DeviceClass::CpuB => {
                bindings.push(binding(
                    LogicalRole::ClockOut,
                    lines::CLOCK,
                    BindingDirection::Out,
                    ActiveLevel::ActiveHigh,
                ));
                bindings.push(binding(
                    LogicalRole::ResetOut,
                    lines::RESET,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                // R/W: HIGH means the CPU is reading. Opposite of Z80 /RD.
                bindings.push(binding(
                    LogicalRole::ReadWriteSense,
                    lines::RD_RW_OE,
                    BindingDirection::In,
                    ActiveLevel::ActiveHigh,
                ));
                // SYNC: HIGH marks an opcode fetch. Opposite of Z80 /M1.
                bindings.push(binding(
                    LogicalRole::FetchSync,
                    lines::M1_SYNC,
                    BindingDirection::In,
                    ActiveLevel::ActiveHigh,
                ));
                // RDY: HIGH lets the CPU run. Opposite of Z80 /WAIT.
                bindings.push(binding(
                    LogicalRole::WaitReady,
                    lines::WAIT_RDY,
                    BindingDirection::Out,
                    ActiveLevel::ActiveHigh,
                ));
                bindings.push(binding(
                    LogicalRole::InterruptOut,
                    lines::INT_IRQ,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::NmiOut,
                    lines::NMI,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::SetOverflowOut,
                    lines::SET_OVERFLOW,
                    BindingDirection::Out,
                    ActiveLevel::ActiveLow,
                ));
                bindings.push(binding(
                    LogicalRole::Phi1Sense,
                    lines::PHI1,
                    BindingDirection::In,
                    ActiveLevel::ActiveHigh,
                ));
                bindings.push(binding(
                    LogicalRole::Phi2Sense,
                    lines::PHI2,
                    BindingDirection::In,
                    ActiveLevel::ActiveHigh,
                ));
            }
        }

        let map = Self { class, bindings };
        map.assert_no_shared_lines();
        map
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    pub fn bindings(&self) -> &[SignalBinding] {
        &self.bindings
    }

    /// Single binding for a role. Roles that span several lines
    /// (address, data) go through [`Self::lines_for`] instead.
    pub fn binding(&self, role: LogicalRole) -> CoreResult<&SignalBinding> {
        self.bindings
            .iter()
            .find(|b| b.role == role)
            .ok_or(CoreError::UnsupportedRoleForClass {
                class: self.class,
                role,
            })
    }

    pub fn lines_for(&self, role: LogicalRole) -> Vec<LineId> {
        self.bindings
            .iter()
            .filter(|b| b.role == role)
            .map(|b| b.line)
            .collect()
    }

    /// Failsafe levels every tester-driven line must take on entering or
    /// leaving this class: enables deasserted, reset held asserted for CPU
    /// classes, interrupts quiet, clock stopped low.
    pub fn idle_state(&self) -> Vec<(LineId, bool)> {
        self.bindings
            .iter()
            .filter(|b| b.direction == BindingDirection::Out && b.role != LogicalRole::AddressOut)
            .map(|b| {
                let level = match b.role {
                    // Hold a socketed CPU in reset while idle.
                    LogicalRole::ResetOut => b.active_level.asserted(),
                    // Let the CPU run once reset is released (Z80 /WAIT
                    // high, 6502 RDY high -- same physical level, opposite
                    // polarity).
                    LogicalRole::WaitReady => match self.class {
                        DeviceClass::CpuA => b.active_level.deasserted(),
                        _ => b.active_level.asserted(),
                    },
                    LogicalRole::ClockOut => false,
                    _ => b.active_level.deasserted(),
                };
                (b.line, level)
            })
            .collect()
    }

    fn assert_no_shared_lines(&self) {
        let mut seen = std::collections::HashSet::new();
        for b in &self.bindings {
            assert!(
                seen.insert(b.line),
                "{:?} signal map binds {} twice",
                self.class,
                b.line
            );
        }
    }
}
