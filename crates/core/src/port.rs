// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Timed, polarity-correct read/write cycles against a memory device.

use crate::guard::BusDirectionGuard;
use crate::lines::{LineId, LineIo, ADDR13_CS2};
use crate::signal_map::{LogicalRole, RoleSet, SignalBinding, SignalMap};
use crate::{CoreError, CoreResult};
use std::convert::Infallible;
use std::time::Duration;

/// Write-pulse and access-time minimums. The slowest supported parts need
/// ~70 ns; 1 us gives comfortable margin without hard real-time claims.
/// Holds may run longer, never shorter.
pub const WRITE_PULSE_MIN: Duration = Duration::from_micros(1);
pub const ACCESS_TIME_MIN: Duration = Duration::from_micros(1);

/// Largest part the 16-line address bus can reach.
pub const MAX_ADDRESS_SPACE_BYTES: u32 = 1 << 16;

/// Size and bit-width of the addressable range under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AddressSpace {
    size_bytes: u32,
    address_bits: u8,
}

impl AddressSpace {
    pub fn new(size_bytes: u32) -> CoreResult<Self> {
        if size_bytes == 0
            || !size_bytes.is_power_of_two()
            || size_bytes > MAX_ADDRESS_SPACE_BYTES
        {
            return Err(CoreError::InvalidAddressSpaceSize(size_bytes));
        }
        Ok(Self {
            size_bytes,
            address_bits: size_bytes.trailing_zeros() as u8,
        })
    }

    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn address_bits(&self) -> u8 {
        self.address_bits
    }

    pub fn max_address(&self) -> u32 {
        self.size_bytes - 1
    }
}

/// One read or write cycle at a time, parameterized by the Memory-class
/// signal map. Chip-select brackets the strobe on both cycle kinds: /CS
/// falls first and rises last, so the device never sees a strobe edge
/// without being selected.
#[derive(Debug)]
pub struct MemoryPort {
    address_lines: Vec<LineId>,
    chip_select: SignalBinding,
    output_enable: SignalBinding,
    write_enable: SignalBinding,
    guard: BusDirectionGuard,
    space: AddressSpace,
    asserted: RoleSet,
}

impl MemoryPort {
    /// Fails with `UnsupportedRoleForClass` if the map lacks any of the
    /// three control roles; the Memory table always carries them, so a
    /// failure here means a malformed map, not a user mistake.
    pub fn new(map: &SignalMap, space: AddressSpace) -> CoreResult<Self> {
        Ok(Self {
            address_lines: map.lines_for(LogicalRole::AddressOut),
            chip_select: *map.binding(LogicalRole::ChipSelect)?,
            output_enable: *map.binding(LogicalRole::OutputEnable)?,
            write_enable: *map.binding(LogicalRole::WriteEnable)?,
            guard: BusDirectionGuard::new(),
            space,
            asserted: RoleSet::empty(),
        })
    }

    pub fn address_space(&self) -> AddressSpace {
        self.space
    }

    pub fn asserted_roles(&self) -> RoleSet {
        self.asserted
    }

    pub(crate) fn guard(&self) -> &BusDirectionGuard {
        &self.guard
    }

    fn set_address(&self, io: &mut dyn LineIo, address: u32) {
        for (bit, line) in self.address_lines.iter().enumerate() {
            let mut level = address & (1u32 << bit) != 0;
            // On 8 KiB parts A13 is a second chip-select and must sit high
            // for the chip to respond at all.
            if *line == ADDR13_CS2 && self.space.size_bytes() <= 8192 {
                level = true;
            }
            io.write_level(*line, level);
        }
    }

    fn assert_signal(&mut self, io: &mut dyn LineIo, b: SignalBinding, flag: RoleSet) {
        io.write_level(b.line, b.active_level.asserted());
        self.asserted.insert(flag);
    }

    fn release_signal(&mut self, io: &mut dyn LineIo, b: SignalBinding, flag: RoleSet) {
        io.write_level(b.line, b.active_level.deasserted());
        self.asserted.remove(flag);
    }

    /// One write cycle: address out, data driven under the direction
    /// guard, /CS then /WE asserted, write pulse held, /WE then /CS
    /// released, data bus released.
    pub fn write(&mut self, io: &mut dyn LineIo, address: u32, value: u8) {
        debug_assert!(address <= self.space.max_address());
        self.set_address(io, address);

        let chip_select = self.chip_select;
        let write_enable = self.write_enable;
        // Self is split manually because the guard borrows io for the body.
        let asserted = &mut self.asserted;
        let _: Result<(), Infallible> = self.guard.with_output(io, value, |io| {
            io.write_level(chip_select.line, chip_select.active_level.asserted());
            asserted.insert(RoleSet::CHIP_SELECT);
            io.write_level(write_enable.line, write_enable.active_level.asserted());
            asserted.insert(RoleSet::WRITE_ENABLE);

            io.hold_for(WRITE_PULSE_MIN);

            // Rising /WE latches the data; release in reverse order.
            io.write_level(write_enable.line, write_enable.active_level.deasserted());
            asserted.remove(RoleSet::WRITE_ENABLE);
            io.write_level(chip_select.line, chip_select.active_level.deasserted());
            asserted.remove(RoleSet::CHIP_SELECT);
            Ok(())
        });
    }

    /// One read cycle: address out, data bus confirmed released, /CS then
    /// /OE asserted, access time held, data sampled, /OE then /CS released.
    pub fn read(&mut self, io: &mut dyn LineIo, address: u32) -> u8 {
        debug_assert!(address <= self.space.max_address());
        self.set_address(io, address);

        let chip_select = self.chip_select;
        let output_enable = self.output_enable;
        self.assert_signal(io, chip_select, RoleSet::CHIP_SELECT);
        self.assert_signal(io, output_enable, RoleSet::OUTPUT_ENABLE);

        io.hold_for(ACCESS_TIME_MIN);
        let value = self.guard.read(io);

        self.release_signal(io, output_enable, RoleSet::OUTPUT_ENABLE);
        self.release_signal(io, chip_select, RoleSet::CHIP_SELECT);
        value
    }
}
