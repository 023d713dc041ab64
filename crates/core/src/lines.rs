// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::time::Duration;

/// A physical signal line, identified by its board pin number.
///
/// The numbering follows the tester board layout: address bus on pins
/// 22-29 (A0-A7) and 30-37 (A15-A8), data bus on pins 42-49, control
/// signals spread over pins 2-13, 18, 20-21 and 38-41.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct LineId(pub u8);

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pin {}", self.0)
    }
}

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum LineLevel {
    #[default]
    Low,
    High,
}

impl From<bool> for LineLevel {
    fn from(b: bool) -> Self {
        if b {
            LineLevel::High
        } else {
            LineLevel::Low
        }
    }
}

impl From<LineLevel> for bool {
    fn from(level: LineLevel) -> Self {
        match level {
            LineLevel::High => true,
            LineLevel::Low => false,
        }
    }
}

/// Drive direction of a line as seen from the tester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum LineDirection {
    /// High-impedance; the device under test may drive the line.
    #[default]
    Input,
    /// Driven by the tester.
    Output,
}

/// Capability the core uses to touch physical lines.
///
/// Implemented by the real board I/O layer on hardware and by
/// [`crate::sim::SimulatedSocket`] on the host. All calls are synchronous;
/// `hold_for` guarantees a *minimum* delay, never an exact one.
pub trait LineIo {
    fn set_direction(&mut self, line: LineId, direction: LineDirection);
    fn write_level(&mut self, line: LineId, high: bool);
    fn read_level(&mut self, line: LineId) -> bool;
    fn hold_for(&mut self, duration: Duration);
}

// Address bus, low byte A0-A7.
pub const ADDR_LOW: [LineId; 8] = [
    LineId(22),
    LineId(23),
    LineId(24),
    LineId(25),
    LineId(26),
    LineId(27),
    LineId(28),
    LineId(29),
];

// Address bus, high byte A8-A15. Board routes these in reverse pin order.
pub const ADDR_HIGH: [LineId; 8] = [
    LineId(37),
    LineId(36),
    LineId(35),
    LineId(34),
    LineId(33),
    LineId(32),
    LineId(31),
    LineId(30),
];

// Data bus D0-D7, bidirectional, shared by every device class.
pub const DATA: [LineId; 8] = [
    LineId(49),
    LineId(48),
    LineId(47),
    LineId(46),
    LineId(45),
    LineId(44),
    LineId(43),
    LineId(42),
];

pub const CLOCK: LineId = LineId(5);
pub const PHI1: LineId = LineId(21);
pub const PHI2: LineId = LineId(20);
pub const RESET: LineId = LineId(9);

pub const MREQ_CS: LineId = LineId(41); // Z80 /MREQ, SRAM /CS
pub const IORQ: LineId = LineId(40); // Z80 only
pub const RD_RW_OE: LineId = LineId(39); // Z80 /RD, 6502 R/W (inverted!), SRAM /OE
pub const WR_WE: LineId = LineId(38); // Z80 /WR, SRAM /WE

pub const WAIT_RDY: LineId = LineId(10); // Z80 /WAIT, 6502 RDY (inverted!)
pub const INT_IRQ: LineId = LineId(11);
pub const NMI: LineId = LineId(12);

pub const M1_SYNC: LineId = LineId(6); // Z80 /M1, 6502 SYNC (inverted!)
pub const HALT: LineId = LineId(2);
pub const RFSH: LineId = LineId(7);
pub const BUSACK: LineId = LineId(8);
pub const BUSREQ: LineId = LineId(13);
pub const SET_OVERFLOW: LineId = LineId(18);

/// Address line that doubles as a second chip-select on 8 KiB SRAM parts
/// (package pin 26 carries A13 on a 32 KiB HM62256 but CS2/CS on
/// HM6265/D4168, and must sit high for those parts to respond).
pub const ADDR13_CS2: LineId = LineId(32);

pub fn address_line(bit: u8) -> LineId {
    debug_assert!(bit < 16);
    if bit < 8 {
        ADDR_LOW[bit as usize]
    } else {
        ADDR_HIGH[(bit - 8) as usize]
    }
}

pub fn data_line(bit: u8) -> LineId {
    debug_assert!(bit < 8);
    DATA[bit as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bool_conversions() {
        let level: LineLevel = true.into();
        assert_eq!(level, LineLevel::High);
        let b: bool = LineLevel::Low.into();
        assert!(!b);
    }

    #[test]
    fn test_address_lines_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for bit in 0..16 {
            assert!(seen.insert(address_line(bit)), "duplicate line for A{}", bit);
        }
        for bit in 0..8 {
            assert!(seen.insert(data_line(bit)), "data line D{} reuses a pin", bit);
        }
    }

    #[test]
    fn test_a13_alias() {
        assert_eq!(address_line(13), ADDR13_CS2);
    }
}
