// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Memory-integrity pattern catalogue.
//!
//! Seven patterns, each a write phase followed by an independent
//! read-verify phase. A mismatch aborts that pattern and records the first
//! offending address; the catalogue runner never short-circuits, so one
//! faulty line cannot hide unrelated faults.

use crate::lines::LineIo;
use crate::port::MemoryPort;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Seed for the random pattern. Fixed so write and verify phases derive
/// the identical sequence without storing it.
pub const RANDOM_PATTERN_SEED: u64 = 12345;

/// Emit a progress callback every this many tested addresses.
pub const PROGRESS_INTERVAL: u32 = 4096;

/// Distinct marker written at address zero by the walking-address pattern,
/// after the per-bit writes, so an address line stuck low faults at the
/// aliasing address rather than passing silently.
const WALKING_ADDRESS_BASE: u8 = 0xA5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternId {
    BasicReadWrite,
    WalkingOnesAddress,
    WalkingOnesData,
    Checkerboard,
    InverseCheckerboard,
    AddressEqualsData,
    RandomPattern,
}

impl PatternId {
    pub const ALL: [PatternId; 7] = [
        PatternId::BasicReadWrite,
        PatternId::WalkingOnesAddress,
        PatternId::WalkingOnesData,
        PatternId::Checkerboard,
        PatternId::InverseCheckerboard,
        PatternId::AddressEqualsData,
        PatternId::RandomPattern,
    ];

    /// Stable test number, 1-7.
    pub fn number(&self) -> u8 {
        match self {
            PatternId::BasicReadWrite => 1,
            PatternId::WalkingOnesAddress => 2,
            PatternId::WalkingOnesData => 3,
            PatternId::Checkerboard => 4,
            PatternId::InverseCheckerboard => 5,
            PatternId::AddressEqualsData => 6,
            PatternId::RandomPattern => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatternId::BasicReadWrite => "Basic Read/Write",
            PatternId::WalkingOnesAddress => "Walking Ones Address",
            PatternId::WalkingOnesData => "Walking Ones Data",
            PatternId::Checkerboard => "Checkerboard",
            PatternId::InverseCheckerboard => "Inverse Checkerboard",
            PatternId::AddressEqualsData => "Address Equals Data",
            PatternId::RandomPattern => "Random Pattern",
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.number() == n)
    }
}

/// Whether a run touches every address or the deterministic sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// First 512 and last 512 addresses, every exact power of two, and
    /// every 128th address. A strict, reproducible subset of Exhaustive.
    Sampled,
    /// Every address in the space.
    Exhaustive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Mismatch {
    pub address: u32,
    pub expected: u8,
    pub actual: u8,
}

/// Result of one pattern run. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TestOutcome {
    pub pattern: PatternId,
    pub coverage: Coverage,
    pub pass: bool,
    pub first_failure: Option<Mismatch>,
    pub addresses_tested: u32,
}

/// Observer for progress and results during long-running pattern runs.
/// The engine blocks for the whole run; these callbacks are the only way
/// a collaborator renders progress.
pub trait TestObserver {
    fn on_pattern_start(&self, _pattern: PatternId, _coverage: Coverage) {}
    fn on_progress(&self, _pattern: PatternId, _addresses_done: u32, _addresses_total: u32) {}
    fn on_outcome(&self, _outcome: &TestOutcome) {}
}

struct PhaseResult {
    first_failure: Option<Mismatch>,
    addresses_tested: u32,
}

/// Drives a [`MemoryPort`] through the pattern catalogue.
pub struct PatternEngine {
    port: MemoryPort,
    observers: Vec<Arc<dyn TestObserver>>,
}

impl PatternEngine {
    pub fn new(port: MemoryPort) -> Self {
        Self {
            port,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn TestObserver>) {
        self.observers.push(observer);
    }

    pub fn port(&self) -> &MemoryPort {
        &self.port
    }

    /// The sampling predicate, preserved exactly from the board firmware:
    /// both memory extremes, every address-line bit-position boundary, and
    /// a uniform 1-in-128 stride.
    pub fn should_test_address(&self, address: u32, coverage: Coverage) -> bool {
        match coverage {
            Coverage::Exhaustive => true,
            Coverage::Sampled => {
                let max = self.port.address_space().max_address();
                address < 512
                    || address > max.saturating_sub(512)
                    || address & address.wrapping_sub(1) == 0
                    || address & 0x7F == 0
            }
        }
    }

    fn tested_addresses(&self, coverage: Coverage) -> impl Iterator<Item = u32> + '_ {
        (0..=self.port.address_space().max_address())
            .filter(move |a| self.should_test_address(*a, coverage))
    }

    fn tested_count(&self, coverage: Coverage) -> u32 {
        match coverage {
            Coverage::Exhaustive => self.port.address_space().size_bytes(),
            Coverage::Sampled => self.tested_addresses(coverage).count() as u32,
        }
    }

    fn emit_progress(&self, pattern: PatternId, done: u32, total: u32) {
        if done > 0 && done % PROGRESS_INTERVAL == 0 {
            for obs in &self.observers {
                obs.on_progress(pattern, done, total);
            }
        }
    }

    fn verify(&mut self, io: &mut dyn LineIo, address: u32, expected: u8) -> Option<Mismatch> {
        let actual = self.port.read(io, address);
        if actual == expected {
            None
        } else {
            Some(Mismatch {
                address,
                expected,
                actual,
            })
        }
    }

    /// Run one pattern and report the outcome. Verification mismatches are
    /// findings about the device under test, not errors; they land in
    /// `first_failure` and the catalogue keeps going.
    pub fn run_pattern(
        &mut self,
        io: &mut dyn LineIo,
        pattern: PatternId,
        coverage: Coverage,
    ) -> TestOutcome {
        for obs in &self.observers {
            obs.on_pattern_start(pattern, coverage);
        }
        tracing::info!(
            test = pattern.number(),
            name = pattern.name(),
            ?coverage,
            "pattern start"
        );

        let phase = match pattern {
            PatternId::BasicReadWrite => self.basic_read_write(io),
            PatternId::WalkingOnesAddress => self.walking_ones_address(io),
            PatternId::WalkingOnesData => self.walking_ones_data(io),
            PatternId::Checkerboard => self.checkerboard(io, pattern, coverage, 0x55, 0xAA),
            PatternId::InverseCheckerboard => self.checkerboard(io, pattern, coverage, 0xAA, 0x55),
            PatternId::AddressEqualsData => self.address_equals_data(io, coverage),
            PatternId::RandomPattern => self.random_pattern(io, coverage),
        };

        let outcome = TestOutcome {
            pattern,
            coverage,
            pass: phase.first_failure.is_none(),
            first_failure: phase.first_failure,
            addresses_tested: phase.addresses_tested,
        };
        if let Some(m) = outcome.first_failure {
            tracing::warn!(
                test = pattern.number(),
                address = format_args!("{:#06x}", m.address),
                expected = format_args!("{:#04x}", m.expected),
                actual = format_args!("{:#04x}", m.actual),
                "pattern failed"
            );
        } else {
            tracing::info!(test = pattern.number(), "pattern passed");
        }
        for obs in &self.observers {
            obs.on_outcome(&outcome);
        }
        outcome
    }

    /// Run patterns 1-6 (plus 7 when `include_random`) in order,
    /// aggregating every outcome.
    pub fn run_catalogue(
        &mut self,
        io: &mut dyn LineIo,
        include_random: bool,
        coverage: Coverage,
    ) -> Vec<TestOutcome> {
        PatternId::ALL
            .into_iter()
            .filter(|p| include_random || *p != PatternId::RandomPattern)
            .map(|p| self.run_pattern(io, p, coverage))
            .collect()
    }

    /// Test 1: two canonical bytes at address zero. Smoke test for the
    /// whole read/write path before the long patterns run.
    fn basic_read_write(&mut self, io: &mut dyn LineIo) -> PhaseResult {
        for value in [0xAAu8, 0x55] {
            self.port.write(io, 0, value);
            if let Some(m) = self.verify(io, 0, value) {
                return PhaseResult {
                    first_failure: Some(m),
                    addresses_tested: 1,
                };
            }
        }
        PhaseResult {
            first_failure: None,
            addresses_tested: 1,
        }
    }

    /// Test 2: a distinct value per address bit at each single-bit
    /// address, then a base value at address zero, verified afterwards.
    /// Two single-bit addresses aliasing to one cell read back the wrong
    /// marker.
    fn walking_ones_address(&mut self, io: &mut dyn LineIo) -> PhaseResult {
        let bits = self.port.address_space().address_bits();
        let value_for_bit = |b: u8| b + 1;

        for b in 0..bits {
            self.port.write(io, 1 << b, value_for_bit(b));
        }
        self.port.write(io, 0, WALKING_ADDRESS_BASE);

        let mut tested = 0;
        for b in 0..bits {
            tested += 1;
            if let Some(m) = self.verify(io, 1 << b, value_for_bit(b)) {
                tracing::warn!("possible issue with address line A{}", b);
                return PhaseResult {
                    first_failure: Some(m),
                    addresses_tested: tested,
                };
            }
        }
        tested += 1;
        let first_failure = self.verify(io, 0, WALKING_ADDRESS_BASE);
        PhaseResult {
            first_failure,
            addresses_tested: tested,
        }
    }

    /// Test 3: the eight single-bit values at address zero, then their
    /// eight complements, written and verified one at a time.
    fn walking_ones_data(&mut self, io: &mut dyn LineIo) -> PhaseResult {
        for complement in [false, true] {
            for d in 0..8u8 {
                let bit = 1u8 << d;
                let value = if complement { !bit } else { bit };
                self.port.write(io, 0, value);
                if let Some(m) = self.verify(io, 0, value) {
                    tracing::warn!("possible issue with data line D{}", d);
                    return PhaseResult {
                        first_failure: Some(m),
                        addresses_tested: 1,
                    };
                }
            }
        }
        PhaseResult {
            first_failure: None,
            addresses_tested: 1,
        }
    }

    /// Tests 4 and 5: parity-alternating constants, verified, then the
    /// reverse assignment. The inverse variant only swaps which pattern is
    /// written first, to catch retention/disturb faults.
    fn checkerboard(
        &mut self,
        io: &mut dyn LineIo,
        pattern: PatternId,
        coverage: Coverage,
        even_first: u8,
        odd_first: u8,
    ) -> PhaseResult {
        let pattern_for = |addr: u32, even: u8, odd: u8| if addr % 2 == 0 { even } else { odd };
        let total = self.tested_count(coverage);

        for (even, odd) in [(even_first, odd_first), (odd_first, even_first)] {
            let addrs: Vec<u32> = self.tested_addresses(coverage).collect();
            let mut done = 0;
            for addr in &addrs {
                self.port.write(io, *addr, pattern_for(*addr, even, odd));
                done += 1;
                self.emit_progress(pattern, done, total);
            }
            done = 0;
            for addr in &addrs {
                let expected = pattern_for(*addr, even, odd);
                if let Some(m) = self.verify(io, *addr, expected) {
                    return PhaseResult {
                        first_failure: Some(m),
                        addresses_tested: done + 1,
                    };
                }
                done += 1;
                self.emit_progress(pattern, done, total);
            }
        }
        PhaseResult {
            first_failure: None,
            addresses_tested: total,
        }
    }

    /// Test 6: low byte of the address at every address. Catches
    /// address/data crosstalk and swapped bus lines that constants miss.
    fn address_equals_data(&mut self, io: &mut dyn LineIo, coverage: Coverage) -> PhaseResult {
        let total = self.tested_count(coverage);
        let addrs: Vec<u32> = self.tested_addresses(coverage).collect();

        let mut done = 0;
        for addr in &addrs {
            self.port.write(io, *addr, (*addr & 0xFF) as u8);
            done += 1;
            self.emit_progress(PatternId::AddressEqualsData, done, total);
        }
        done = 0;
        for addr in &addrs {
            if let Some(m) = self.verify(io, *addr, (*addr & 0xFF) as u8) {
                return PhaseResult {
                    first_failure: Some(m),
                    addresses_tested: done + 1,
                };
            }
            done += 1;
            self.emit_progress(PatternId::AddressEqualsData, done, total);
        }
        PhaseResult {
            first_failure: None,
            addresses_tested: total,
        }
    }

    /// Test 7: deterministic pseudo-random byte per tested address. The
    /// verify phase re-seeds and re-derives the sequence byte for byte
    /// instead of storing it.
    fn random_pattern(&mut self, io: &mut dyn LineIo, coverage: Coverage) -> PhaseResult {
        let total = self.tested_count(coverage);
        let addrs: Vec<u32> = self.tested_addresses(coverage).collect();

        let mut rng = ChaCha8Rng::seed_from_u64(RANDOM_PATTERN_SEED);
        let mut done = 0;
        for addr in &addrs {
            let value = (rng.next_u32() & 0xFF) as u8;
            self.port.write(io, *addr, value);
            done += 1;
            self.emit_progress(PatternId::RandomPattern, done, total);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(RANDOM_PATTERN_SEED);
        done = 0;
        for addr in &addrs {
            let expected = (rng.next_u32() & 0xFF) as u8;
            if let Some(m) = self.verify(io, *addr, expected) {
                return PhaseResult {
                    first_failure: Some(m),
                    addresses_tested: done + 1,
                };
            }
            done += 1;
            self.emit_progress(PatternId::RandomPattern, done, total);
        }
        PhaseResult {
            first_failure: None,
            addresses_tested: total,
        }
    }
}
