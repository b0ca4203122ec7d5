//! Block parser for the flat probe report.

use crate::types::{FieldValue, ProbeBlock, ProbeData};

const TAG_PREFIX: &str = "TAG:";
const DISPOSITION_PREFIX: &str = "DISPOSITION:";

/// Parse `ffprobe` default-writer output into a [`ProbeData`].
///
/// Unknown blocks are skipped; an unterminated block ends at the end of
/// input. Malformed lines are ignored.
pub fn parse_probe_output(out: &str) -> ProbeData {
    let mut lines = out
        .split(['\r', '\n'])
        .filter(|l| !l.is_empty());
    let mut data = ProbeData::default();

    while let Some(line) = lines.next() {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("[stream") {
            data.streams.push(parse_block(&mut lines, "stream"));
        } else if lower.starts_with("[chapter") {
            data.chapters.push(parse_block(&mut lines, "chapter"));
        } else if lower == "[format]" {
            data.format = parse_block(&mut lines, "format");
        }
    }

    tracing::trace!(
        streams = data.streams.len(),
        chapters = data.chapters.len(),
        "parsed probe output"
    );
    data
}

fn parse_block<'a>(lines: &mut impl Iterator<Item = &'a str>, name: &str) -> ProbeBlock {
    let end = format!("[/{name}]");
    let mut block = ProbeBlock::default();

    for line in lines.by_ref() {
        if line.eq_ignore_ascii_case(&end) {
            break;
        }
        if line.starts_with('[') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }

        if let Some(tag) = key.strip_prefix(TAG_PREFIX) {
            block.tags.insert(tag.to_string(), value.to_string());
        } else if let Some(disposition) = key.strip_prefix(DISPOSITION_PREFIX) {
            block
                .disposition
                .insert(disposition.to_string(), field_value(value));
        } else {
            block.fields.insert(key.to_string(), field_value(value));
        }
    }

    block
}

/// Plain decimal numbers (`12`, `12.5`) become numbers, everything else
/// (including `N/A`, `1/25`, `-1`) stays text.
fn field_value(value: &str) -> FieldValue {
    let numeric = match value.split_once('.') {
        Some((int, frac)) => is_digits(int) && is_digits(frac),
        None => is_digits(value),
    };
    match value.parse::<f64>() {
        Ok(n) if numeric => FieldValue::Number(n),
        _ => FieldValue::Text(value.to_string()),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
