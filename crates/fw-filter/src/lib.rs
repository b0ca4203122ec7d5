//! fw-filter: filter-graph specifications and their textual compilation.
//!
//! - [`FilterSpec`] / [`FilterNode`] model a single filter, either as raw
//!   text or as a structured record with options and stream pads.
//! - [`compile`] turns specs into escaped filter tokens; [`join_graph`] and
//!   [`join_chain`] join them into a complex graph or a simple chain.
//! - [`size`] derives the scale/pad filters for a requested output size.

pub mod filter;
pub mod size;

pub use filter::{compile, join_chain, join_graph, stream_label, FilterNode, FilterOptions, FilterSpec};
pub use size::{keep_display_aspect_filters, parse_aspect, size_filters, SizeData};
