//! # fw-probe
//!
//! Parser for the flat text report of the `ffprobe` metadata tool.
//!
//! `ffprobe -show_streams -show_format` prints `[STREAM]`, `[CHAPTER]` and
//! `[FORMAT]` blocks of `key=value` lines. [`parse_probe_output`] turns them
//! into a [`ProbeData`], folding legacy `TAG:x` and `DISPOSITION:x` keys into
//! nested maps.
//!
//! ## Quick start
//!
//! ```
//! use fw_probe::parse_probe_output;
//!
//! let data = parse_probe_output("[FORMAT]\nduration=12.5\nTAG:title=demo\n[/FORMAT]\n");
//! assert_eq!(data.duration(), Some(12.5));
//! assert_eq!(data.format.tags.get("title").map(String::as_str), Some("demo"));
//! ```

pub mod parse;
pub mod types;

pub use parse::parse_probe_output;
pub use types::{FieldValue, ProbeBlock, ProbeData};
