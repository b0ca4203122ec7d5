//! Higher-level jobs built from [`crate::Command`], the filter compiler and
//! the metadata probe.

mod merge;
mod screenshots;

pub use screenshots::{ScreenshotConfig, ScreenshotOutput, ScreenshotSize};
