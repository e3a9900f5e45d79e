//! Generational arena: dense storage addressed by small, copyable,
//! generation-checked handles.
//!
//! Values live in a densely packed buffer; callers hold a [`TypedRef`]
//! instead of a pointer. Releasing a slot bumps its generation, so every
//! handle minted before the release fails validation instead of reaching
//! a new occupant. Deletion relocates the last element into the vacated
//! dense position (remove-swap), keeping the live region contiguous for
//! cache-friendly iteration.
//!
//! Three layers:
//!
//! - [`RawArena`] — untyped core with element size and alignment chosen
//!   at construction. This is where all the `unsafe` lives.
//! - [`Arena`] — statically typed facade over a raw arena.
//! - [`PolyArenas`] — a table of raw arenas keyed by a compile-time type
//!   id, with optional subtype-range iteration (`poly-dispatch` feature).
//!
//! ```
//! use genarena::Arena;
//!
//! let mut arena = Arena::<u32>::new();
//! let one = arena.insert(1);
//! let two = arena.insert(2);
//! assert_eq!(arena[one], 1);
//!
//! assert_eq!(arena.release(two), Ok(2));
//! assert!(arena.try_get(two).is_none());
//!
//! // The freed slot is reused under a new generation.
//! let three = arena.insert(3);
//! assert_eq!(three.index(), two.index());
//! assert!(arena.is_valid(three) && !arena.is_valid(two));
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

#[cfg(feature = "log")]
macro_rules! arena_log {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! arena_log {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

pub(crate) use arena_log;

pub mod config;
pub mod error;
pub mod handle;
pub mod key;
pub mod poly;
pub mod raw;
pub mod typed;

pub use config::{DefaultConfig, HandleConfig};
pub use error::ArenaError;
pub use handle::{Ref, TypedRef};
pub use key::TypeKey;
pub use poly::PolyArenas;
pub use raw::RawArena;
pub use typed::Arena;
