// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Session lifecycle: exactly one device class active at a time.
//!
//! [`Tester`] is the single owner of the physical lines. Selecting a
//! device moves the lines into a [`DeviceSession`]; closing the session
//! moves them back. A second select without a close fails with
//! `SessionAlreadyOpen` -- one IC in the socket at a time.

use crate::clock::ClockGenerator;
use crate::guard::DataDirection;
use crate::lines::{LineDirection, LineIo};
use crate::patterns::{Coverage, PatternEngine, TestObserver, TestOutcome};
use crate::port::{AddressSpace, MemoryPort};
use crate::signal_map::{
    BindingDirection, DeviceClass, LogicalRole, SignalBinding, SignalMap,
};
use crate::{CoreError, CoreResult};
use std::sync::Arc;
use std::time::Duration;

/// How long reset is held asserted when pulsing a socketed CPU.
pub const RESET_HOLD: Duration = Duration::from_micros(100);

/// Owns the physical line I/O and hands it to at most one session.
pub struct Tester {
    io: Option<Box<dyn LineIo>>,
    active: Option<DeviceClass>,
}

impl Tester {
    pub fn new(io: Box<dyn LineIo>) -> Self {
        Self {
            io: Some(io),
            active: None,
        }
    }

    /// Device class of the currently open session, if any.
    pub fn active_class(&self) -> Option<DeviceClass> {
        self.active
    }

    /// Like [`active_class`](Self::active_class), but an error when no
    /// session is open. Command frontends call this before dispatching
    /// bus operations so "select a device first" surfaces as a typed error.
    pub fn require_active(&self) -> CoreResult<DeviceClass> {
        self.active.ok_or(CoreError::NoSessionOpen)
    }

    /// Configure the bus for `class` and open a session.
    ///
    /// The class idle state is applied to the lines before the session is
    /// handed out, so the bus is safe from the first instant. Memory
    /// sessions need an address space; CPU sessions ignore it.
    pub fn select_device(
        &mut self,
        class: DeviceClass,
        address_space: Option<AddressSpace>,
    ) -> CoreResult<DeviceSession> {
        if self.io.is_none() {
            tracing::warn!(
                requested = class.name(),
                active = self.active.map(|c| c.name()).unwrap_or("?"),
                "device select refused: session already open"
            );
            return Err(CoreError::SessionAlreadyOpen);
        }

        let map = SignalMap::for_class(class);
        let engine = match class {
            DeviceClass::Memory => {
                let space = address_space.ok_or(CoreError::InvalidAddressSpaceSize(0))?;
                Some(PatternEngine::new(MemoryPort::new(&map, space)?))
            }
            DeviceClass::CpuA | DeviceClass::CpuB => None,
        };
        let clock = map
            .binding(LogicalRole::ClockOut)
            .ok()
            .map(|b| ClockGenerator::new(b.line));

        // All checks passed; take the lines and make them safe.
        let mut io = match self.io.take() {
            Some(io) => io,
            None => return Err(CoreError::SessionAlreadyOpen),
        };
        apply_idle(io.as_mut(), &map);
        self.active = Some(class);
        tracing::info!(device = class.name(), "session opened");

        Ok(DeviceSession {
            map,
            io,
            engine,
            clock,
        })
    }

    /// Re-apply the idle state and reclaim the lines. Consuming the
    /// session makes a double close unrepresentable; re-applying idle on
    /// lines that are already idle is harmless.
    pub fn close_session(&mut self, mut session: DeviceSession) {
        apply_idle(session.io.as_mut(), &session.map);
        tracing::info!(device = session.map.class().name(), "session closed");
        self.io = Some(session.io);
        self.active = None;
    }
}

/// Drive every tester-owned line to its failsafe level and release the
/// rest. Data lines always end up released (Input).
fn apply_idle(io: &mut dyn LineIo, map: &SignalMap) {
    for b in map.bindings() {
        match b.direction {
            BindingDirection::In | BindingDirection::Bidirectional => {
                io.set_direction(b.line, LineDirection::Input);
            }
            BindingDirection::Out => {
                io.set_direction(b.line, LineDirection::Output);
                if b.role == LogicalRole::AddressOut {
                    io.write_level(b.line, false);
                }
            }
        }
    }
    for (line, level) in map.idle_state() {
        io.write_level(line, level);
    }
}

/// One device class bound to the bus: its signal map, its port and
/// pattern engine for Memory, its clock and reset for the CPU classes.
pub struct DeviceSession {
    map: SignalMap,
    io: Box<dyn LineIo>,
    engine: Option<PatternEngine>,
    clock: Option<ClockGenerator>,
}

impl DeviceSession {
    pub fn class(&self) -> DeviceClass {
        self.map.class()
    }

    /// Current signal bindings; the hook the external bus-cycle emulators
    /// read the line roles through.
    pub fn bindings(&self) -> &[SignalBinding] {
        self.map.bindings()
    }

    pub fn data_direction(&self) -> DataDirection {
        match &self.engine {
            Some(engine) => engine.port().guard().direction(),
            None => DataDirection::Input,
        }
    }

    pub fn address_space(&self) -> Option<AddressSpace> {
        self.engine.as_ref().map(|e| e.port().address_space())
    }

    /// Observers receive pattern progress and outcomes; ignored for CPU
    /// sessions, which run no patterns.
    pub fn add_observer(&mut self, observer: Arc<dyn TestObserver>) {
        if let Some(engine) = &mut self.engine {
            engine.add_observer(observer);
        }
    }

    pub fn run_pattern(
        &mut self,
        pattern: crate::patterns::PatternId,
        coverage: Coverage,
    ) -> CoreResult<TestOutcome> {
        let class = self.map.class();
        let Self { io, engine, .. } = self;
        let engine = engine.as_mut().ok_or(CoreError::UnsupportedRoleForClass {
            class,
            role: LogicalRole::WriteEnable,
        })?;
        Ok(engine.run_pattern(io.as_mut(), pattern, coverage))
    }

    pub fn run_catalogue(
        &mut self,
        include_random: bool,
        coverage: Coverage,
    ) -> CoreResult<Vec<TestOutcome>> {
        let class = self.map.class();
        let Self { io, engine, .. } = self;
        let engine = engine.as_mut().ok_or(CoreError::UnsupportedRoleForClass {
            class,
            role: LogicalRole::WriteEnable,
        })?;
        Ok(engine.run_catalogue(io.as_mut(), include_random, coverage))
    }

    /// Pulse reset on a CPU class; for Memory (no reset pin) fall back to
    /// re-applying the idle levels, which deasserts every enable.
    pub fn reset(&mut self) {
        match self.map.binding(LogicalRole::ResetOut) {
            Ok(b) => {
                let (line, active) = (b.line, b.active_level);
                self.io.write_level(line, active.asserted());
                self.io.hold_for(RESET_HOLD);
                self.io.write_level(line, active.deasserted());
                tracing::debug!(device = self.map.class().name(), "reset pulsed");
            }
            Err(_) => apply_idle(self.io.as_mut(), &self.map),
        }
    }

    /// Clock generator for CPU classes; Memory has no clock role.
    pub fn clock_mut(&mut self) -> Option<(&mut ClockGenerator, &mut Box<dyn LineIo>)> {
        let io = &mut self.io;
        self.clock.as_mut().map(move |c| (c, io))
    }
}
