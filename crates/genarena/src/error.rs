//! Arena-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during arena operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The allocator could not provide the requested buffer.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
    },
    /// Reserved for future virtual-memory-backed storage; currently
    /// raised by nothing.
    OutOfVirtualMemory,
    /// `resize` asked for a capacity below the current live count.
    ResizeInvalid {
        /// The capacity requested.
        new_capacity: u32,
        /// The number of live elements, which cannot be discarded.
        len: u32,
    },
    /// A stale, already-released, or forged handle.
    InvalidRef {
        /// The handle's sparse slot index.
        index: u32,
        /// The generation the handle carried.
        generation: u32,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: requested {requested} bytes")
            }
            Self::OutOfVirtualMemory => {
                write!(f, "out of virtual memory")
            }
            Self::ResizeInvalid { new_capacity, len } => {
                write!(
                    f,
                    "invalid resize: new capacity {new_capacity} is below live count {len}"
                )
            }
            Self::InvalidRef { index, generation } => {
                write!(f, "invalid ref: slot {index}, generation {generation}")
            }
        }
    }
}

impl Error for ArenaError {}
