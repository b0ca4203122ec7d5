//! fw-core: shared types, errors, configuration, and text primitives.
//!
//! This crate is the foundational dependency for all other fw-* crates,
//! providing the unified error type, engine configuration, job events,
//! timemark parsing, the ordered [`OptionList`] token accumulator and the
//! bounded line-oriented [`Ring`] log buffer.

pub mod config;
pub mod error;
pub mod events;
pub mod options;
pub mod ring;
pub mod timemark;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, ErrorCategory, Result};
pub use events::{InputCodecData, JobEvent, Progress};
pub use options::OptionList;
pub use ring::Ring;
pub use timemark::{timemark_to_seconds, Timemark};
