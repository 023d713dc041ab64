// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Mode-aware bus abstraction and memory-integrity test engine.
//!
//! One physical address/data/control bus is shared by three pin-compatible
//! device classes (Z80, 6502, SRAM). [`signal_map::SignalMap`] captures the
//! per-class line roles, directions and polarities as data;
//! [`guard::BusDirectionGuard`] guarantees the data bus is never driven by
//! two parties at once; [`port::MemoryPort`] runs timed read/write cycles;
//! [`patterns::PatternEngine`] runs the diagnostic pattern catalogue; and
//! [`session::Tester`] enforces the one-device-in-the-socket lifecycle.

pub mod clock;
pub mod guard;
pub mod lines;
pub mod patterns;
pub mod port;
pub mod session;
pub mod signal_map;
pub mod sim;

use signal_map::{DeviceClass, LogicalRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("no device session is open; select a device class first")]
    NoSessionOpen,
    #[error("a device session is already open; close it before selecting another device")]
    SessionAlreadyOpen,
    #[error("signal map for {class:?} has no binding for role {role:?}")]
    UnsupportedRoleForClass {
        class: DeviceClass,
        role: LogicalRole,
    },
    #[error("invalid address space size {0}: must be a non-zero power of two")]
    InvalidAddressSpaceSize(u32),
}

pub type CoreResult<T> = Result<T, CoreError>;

pub use lines::{LineDirection, LineId, LineIo, LineLevel};
pub use patterns::{Coverage, Mismatch, PatternId, TestObserver, TestOutcome};
pub use port::AddressSpace;
pub use session::{DeviceSession, Tester};
pub use signal_map::SignalMap;
