// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Square-wave clock source for the CPU device classes.
//!
//! Models the board's hardware timer in clear-on-compare mode with a
//! toggling output: 50% duty cycle, prescaler auto-selected so the compare
//! value fits 16 bits. `f_out = BASE / (2 * prescaler * (compare + 1))`.

use crate::lines::{LineDirection, LineId, LineIo};

/// Timer input clock of the tester board.
pub const BASE_CLOCK_HZ: u32 = 16_000_000;

const PRESCALERS: [u32; 5] = [1, 8, 64, 256, 1024];

#[derive(Debug)]
pub struct ClockGenerator {
    line: LineId,
    frequency_hz: u32,
    prescaler: u32,
    compare: u16,
    running: bool,
}

impl ClockGenerator {
    pub fn new(line: LineId) -> Self {
        Self {
            line,
            frequency_hz: 0,
            prescaler: 0,
            compare: 0,
            running: false,
        }
    }

    /// Pick the divider chain for `frequency_hz` without starting output.
    /// Frequencies are clamped to the achievable range (1 Hz to ~4 MHz);
    /// the actual output may differ slightly from the request because the
    /// compare value is an integer.
    pub fn configure(&mut self, frequency_hz: u32) {
        let requested = frequency_hz.max(1);
        let (prescaler, compare) = Self::select_prescaler(requested);
        self.frequency_hz = requested;
        self.prescaler = prescaler;
        self.compare = compare;
        tracing::debug!(
            requested,
            actual = self.actual_frequency(),
            prescaler,
            compare,
            "clock configured"
        );
    }

    fn select_prescaler(frequency_hz: u32) -> (u32, u16) {
        for prescaler in PRESCALERS {
            let ticks = (BASE_CLOCK_HZ as u64) / (2 * prescaler as u64 * frequency_hz as u64);
            if ticks == 0 {
                // Faster than the chain can do; fastest possible output.
                return (prescaler, 0);
            }
            if ticks - 1 <= u16::MAX as u64 {
                return (prescaler, (ticks - 1) as u16);
            }
        }
        // Slower than 1024 allows; slowest possible output.
        (1024, u16::MAX)
    }

    /// Frequency actually produced by the selected divider chain.
    pub fn actual_frequency(&self) -> u32 {
        if self.prescaler == 0 {
            return 0;
        }
        (BASE_CLOCK_HZ as u64 / (2 * self.prescaler as u64 * (self.compare as u64 + 1))) as u32
    }

    pub fn frequency(&self) -> u32 {
        self.frequency_hz
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Hand the clock line to the timer hardware. Requires configure().
    pub fn start(&mut self, io: &mut dyn LineIo) {
        io.set_direction(self.line, LineDirection::Output);
        self.running = true;
        tracing::debug!(hz = self.actual_frequency(), "clock started");
    }

    /// Stop output and park the line low. Safe to call repeatedly.
    pub fn stop(&mut self, io: &mut dyn LineIo) {
        io.write_level(self.line, false);
        self.running = false;
    }
}
