//! Output size filters.
//!
//! The scale/pad filters for an output depend on three independently set
//! values (size, aspect ratio, padding colour). [`size_filters`] rebuilds the
//! whole list from the accumulated [`SizeData`] each time one of them changes.

use std::sync::LazyLock;

use fw_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::filter::{FilterNode, FilterSpec};

static RE_FIXED_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)x([0-9]+)").expect("valid size regex"));
static RE_FIXED_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)x\?").expect("valid width regex"));
static RE_FIXED_HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?x([0-9]+)").expect("valid height regex"));
static RE_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{1,3})%").expect("valid percent regex"));
static RE_ASPECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d+)$").expect("valid aspect regex"));

/// Accumulated size request of one output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeData {
    /// `WxH`, `Wx?`, `?xH` or `NN%`.
    pub size: Option<String>,
    /// Display aspect ratio (width / height).
    pub aspect: Option<f64>,
    /// Padding colour; `None` disables auto-padding.
    pub pad: Option<String>,
}

/// Parse an aspect ratio given as a number (`1.777`) or as `W:H`.
pub fn parse_aspect(aspect: &str) -> Result<f64> {
    let aspect = aspect.trim();
    let value = match aspect.parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => RE_ASPECT.captures(aspect).and_then(|caps| {
            let w: f64 = caps[1].parse().ok()?;
            let h: f64 = caps[2].parse().ok()?;
            Some(w / h)
        }),
    };
    value
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| Error::config(format!("Invalid aspect ratio: {aspect}")))
}

/// Round to the nearest even integer.
fn even(value: f64) -> u64 {
    ((value / 2.0).round() * 2.0).max(0.0) as u64
}

fn number(s: &str) -> f64 {
    s.parse().unwrap_or(0.0)
}

fn scale(w: impl ToString, h: impl ToString) -> FilterSpec {
    FilterNode::new("scale").option("w", w).option("h", h).into()
}

fn scale_and_pad(width: u64, height: u64, aspect: f64, color: &str) -> Vec<FilterSpec> {
    vec![
        scale(
            format!("if(gt(a,{aspect}),{width},trunc({height}*a/2)*2)"),
            format!("if(lt(a,{aspect}),{height},trunc({width}/a/2)*2)"),
        ),
        FilterNode::new("pad")
            .option("w", width)
            .option("h", height)
            .option("x", format!("if(gt(a,{aspect}),0,({width}-iw)/2)"))
            .option("y", format!("if(lt(a,{aspect}),0,({height}-ih)/2)"))
            .option("color", color)
            .into(),
    ]
}

/// Derive the scale/pad filter list for `data`.
///
/// Returns an empty list when no size was requested.
///
/// # Errors
///
/// Returns [`Error::Config`] when the size string matches none of the
/// accepted forms.
pub fn size_filters(data: &SizeData) -> Result<Vec<FilterSpec>> {
    let Some(size) = data.size.as_deref() else {
        return Ok(Vec::new());
    };

    if let Some(caps) = RE_PERCENT.captures(size) {
        let ratio = number(&caps[1]) / 100.0;
        return Ok(vec![scale(
            format!("trunc(iw*{ratio}/2)*2"),
            format!("trunc(ih*{ratio}/2)*2"),
        )]);
    }

    if let Some(caps) = RE_FIXED_SIZE.captures(size) {
        let width = even(number(&caps[1]));
        let height = even(number(&caps[2]));
        return Ok(match data.pad.as_deref() {
            Some(color) => scale_and_pad(width, height, width as f64 / height as f64, color),
            None => vec![scale(width, height)],
        });
    }

    let fixed_width = RE_FIXED_WIDTH.captures(size).map(|c| number(&c[1]));
    let fixed_height = RE_FIXED_HEIGHT.captures(size).map(|c| number(&c[1]));

    match (fixed_width, fixed_height, data.aspect) {
        (None, None, _) => Err(Error::config(format!("Invalid size specified: {size}"))),
        (w, h, Some(aspect)) => {
            let width = even(w.unwrap_or_else(|| (h.unwrap_or(0.0) * aspect).round()));
            let height = even(h.unwrap_or_else(|| (w.unwrap_or(0.0) / aspect).round()));
            Ok(match data.pad.as_deref() {
                Some(color) => scale_and_pad(width, height, aspect, color),
                None => vec![scale(width, height)],
            })
        }
        (Some(w), _, None) => Ok(vec![scale(even(w), "trunc(ow/a/2)*2")]),
        (None, Some(h), None) => Ok(vec![scale("trunc(oh*a/2)*2", even(h))]),
    }
}

/// Filters that scale non-square pixels to square ones, preserving the
/// display aspect ratio.
pub fn keep_display_aspect_filters() -> Vec<FilterSpec> {
    vec![
        scale("if(gt(sar,1),iw*sar,iw)", "if(lt(sar,1),ih/sar,ih)"),
        FilterNode::new("setsar").value(1).into(),
    ]
}
