// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Direction safety for the shared data bus.
//!
//! The eight data lines are the one place where the tester and the device
//! under test can fight over a wire, which on real hardware means driver
//! damage. Every output drive goes through [`BusDirectionGuard::with_output`],
//! which restores the lines to Input on every exit path, including panics
//! in the body.

use crate::lines::{LineDirection, LineId, LineIo, DATA};

/// Direction of the data bus as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataDirection {
    #[default]
    Input,
    Output,
}

/// Sole gate to the data lines' direction. Owned by the memory port;
/// single-threaded, so structural ownership stands in for locking.
#[derive(Debug)]
pub struct BusDirectionGuard {
    data_lines: [LineId; 8],
    direction: DataDirection,
}

impl Default for BusDirectionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl BusDirectionGuard {
    pub fn new() -> Self {
        Self {
            data_lines: DATA,
            direction: DataDirection::Input,
        }
    }

    pub fn direction(&self) -> DataDirection {
        self.direction
    }

    /// Drive `value` onto the data bus, run `body`, and release the bus.
    ///
    /// The lines go back to Input before this returns, whether `body`
    /// returns, errors out through `?`, or panics.
    pub fn with_output<T, E>(
        &mut self,
        io: &mut dyn LineIo,
        value: u8,
        body: impl FnOnce(&mut dyn LineIo) -> Result<T, E>,
    ) -> Result<T, E> {
        assert_eq!(
            self.direction,
            DataDirection::Input,
            "data bus claimed for output while already driving it"
        );
        self.direction = DataDirection::Output;

        let release = ReleaseOnDrop {
            io,
            data_lines: self.data_lines,
            direction: &mut self.direction,
        };

        for (bit, line) in release.data_lines.into_iter().enumerate() {
            release.io.set_direction(line, LineDirection::Output);
            release.io.write_level(line, value & (1 << bit) != 0);
        }
        tracing::trace!(value = format_args!("{:#04x}", value), "data bus -> output");

        body(&mut *release.io)
        // `release` drops here: lines back to Input, direction flag cleared.
    }

    /// Sample the data bus. The bus must currently be released; driving
    /// and sampling at once is a programming error, not a runtime
    /// condition, so this asserts.
    pub fn read(&self, io: &mut dyn LineIo) -> u8 {
        assert_eq!(
            self.direction,
            DataDirection::Input,
            "data bus sampled while the tester is driving it"
        );
        let mut value = 0u8;
        for (bit, line) in self.data_lines.into_iter().enumerate() {
            if io.read_level(line) {
                value |= 1 << bit;
            }
        }
        value
    }
}

struct ReleaseOnDrop<'a> {
    io: &'a mut dyn LineIo,
    data_lines: [LineId; 8],
    direction: &'a mut DataDirection,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        for line in self.data_lines {
            self.io.set_direction(line, LineDirection::Input);
        }
        *self.direction = DataDirection::Input;
        tracing::trace!("data bus -> input");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingIo {
        directions: HashMap<LineId, LineDirection>,
        levels: HashMap<LineId, bool>,
    }

    impl LineIo for RecordingIo {
        fn set_direction(&mut self, line: LineId, direction: LineDirection) {
            self.directions.insert(line, direction);
        }
        fn write_level(&mut self, line: LineId, high: bool) {
            self.levels.insert(line, high);
        }
        fn read_level(&mut self, line: LineId) -> bool {
            self.levels.get(&line).copied().unwrap_or(false)
        }
        fn hold_for(&mut self, _duration: Duration) {}
    }

    fn all_inputs(io: &RecordingIo) -> bool {
        DATA.iter()
            .all(|l| io.directions.get(l) == Some(&LineDirection::Input))
    }

    #[test]
    fn test_with_output_drives_value_and_releases() {
        let mut guard = BusDirectionGuard::new();
        let mut io = RecordingIo::default();

        let seen = guard
            .with_output(&mut io, 0xA5, |io| {
                let mut v = 0u8;
                for (bit, line) in DATA.into_iter().enumerate() {
                    if io.read_level(line) {
                        v |= 1 << bit;
                    }
                }
                Ok::<_, ()>(v)
            })
            .unwrap();

        assert_eq!(seen, 0xA5);
        assert!(all_inputs(&io));
        assert_eq!(guard.direction(), DataDirection::Input);
    }

    #[test]
    fn test_release_on_body_error() {
        let mut guard = BusDirectionGuard::new();
        let mut io = RecordingIo::default();

        let res: Result<(), &str> = guard.with_output(&mut io, 0xFF, |_| Err("injected"));
        assert!(res.is_err());
        assert!(all_inputs(&io));
        assert_eq!(guard.direction(), DataDirection::Input);
    }

    #[test]
    fn test_release_on_body_panic() {
        let mut guard = BusDirectionGuard::new();
        let mut io = RecordingIo::default();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = guard.with_output(&mut io, 0x01, |_| -> Result<(), ()> {
                panic!("body blew up")
            });
        }));
        assert!(result.is_err());
        assert!(all_inputs(&io));
        assert_eq!(guard.direction(), DataDirection::Input);
    }

    #[test]
    fn test_read_samples_lines() {
        let guard = BusDirectionGuard::new();
        let mut io = RecordingIo::default();
        io.levels.insert(DATA[0], true);
        io.levels.insert(DATA[7], true);
        assert_eq!(guard.read(&mut io), 0x81);
    }

    #[test]
    #[should_panic(expected = "sampled while the tester is driving")]
    fn test_read_while_driving_panics() {
        let mut guard = BusDirectionGuard::new();
        let mut io = RecordingIo::default();
        let _ = guard.with_output(&mut io, 0x00, |io| {
            // Sampling inside an output scope must fail fast.
            let g = BusDirectionGuard {
                data_lines: DATA,
                direction: DataDirection::Output,
            };
            g.read(io);
            Ok::<_, ()>(())
        });
    }
}
