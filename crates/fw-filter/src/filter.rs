//! Filter specification model and compiler.
//!
//! A compiled filter reads `[in1][in2]name=opt1:opt2[out1][out2]`. Option
//! order is preserved exactly as given since the consuming tool assigns
//! positional options by index.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_STREAM_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[?(.*?)\]?$").expect("valid stream label regex"));

/// Characters that make an option value ambiguous in filter syntax.
const ESCAPED_CHARS: &[char] = &[',', ':', '=', '\'', ' '];

/// Options attached to a structured filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterOptions {
    /// No options: the filter name stands alone.
    #[default]
    None,
    /// A single scalar appended verbatim after `=`.
    Value(String),
    /// Positional options joined by `:`.
    List(Vec<String>),
    /// `key=value` pairs joined by `:`, in insertion order.
    Named(Vec<(String, String)>),
}

impl FilterOptions {
    fn is_empty(&self) -> bool {
        match self {
            FilterOptions::None => true,
            FilterOptions::Value(v) => v.is_empty(),
            FilterOptions::List(l) => l.is_empty(),
            FilterOptions::Named(n) => n.is_empty(),
        }
    }
}

/// A structured filter: name, options and optional input/output pads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterNode {
    pub filter: String,
    #[serde(default)]
    pub options: FilterOptions,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl FilterNode {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Default::default()
        }
    }

    /// Add a named option, converting any previous options to named form.
    pub fn option(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let pair = (key.into(), value.to_string());
        match &mut self.options {
            FilterOptions::Named(pairs) => pairs.push(pair),
            other => *other = FilterOptions::Named(vec![pair]),
        }
        self
    }

    /// Set positional options.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.options = FilterOptions::List(args.into_iter().map(|a| a.to_string()).collect());
        self
    }

    /// Set a single scalar option, appended without escaping.
    pub fn value(mut self, value: impl ToString) -> Self {
        self.options = FilterOptions::Value(value.to_string());
        self
    }

    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.inputs.push(label.into());
        self
    }

    pub fn inputs<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }

    pub fn outputs<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Compile this node into a single filter token.
    pub fn compile(&self) -> String {
        let mut out = String::new();
        for label in &self.inputs {
            out.push_str(&stream_label(label));
        }
        out.push_str(&self.filter);

        if !self.options.is_empty() {
            out.push('=');
            match &self.options {
                FilterOptions::None => {}
                FilterOptions::Value(v) => out.push_str(v),
                FilterOptions::List(values) => {
                    let escaped: Vec<String> = values.iter().map(|v| escape_value(v)).collect();
                    out.push_str(&escaped.join(":"));
                }
                FilterOptions::Named(pairs) => {
                    let escaped: Vec<String> = pairs
                        .iter()
                        .map(|(k, v)| format!("{k}={}", escape_value(v)))
                        .collect();
                    out.push_str(&escaped.join(":"));
                }
            }
        }

        for label in &self.outputs {
            out.push_str(&stream_label(label));
        }
        out
    }
}

/// A filter given either as raw filter text or as a structured node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    Raw(String),
    Graph(FilterNode),
}

impl FilterSpec {
    pub fn compile(&self) -> String {
        match self {
            FilterSpec::Raw(s) => s.clone(),
            FilterSpec::Graph(node) => node.compile(),
        }
    }
}

impl From<&str> for FilterSpec {
    fn from(s: &str) -> Self {
        FilterSpec::Raw(s.to_string())
    }
}

impl From<String> for FilterSpec {
    fn from(s: String) -> Self {
        FilterSpec::Raw(s)
    }
}

impl From<FilterNode> for FilterSpec {
    fn from(node: FilterNode) -> Self {
        FilterSpec::Graph(node)
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compile())
    }
}

/// Compile each spec into one filter token.
pub fn compile(specs: &[FilterSpec]) -> Vec<String> {
    specs.iter().map(FilterSpec::compile).collect()
}

/// Join specs into one complex filter graph (`;`-separated).
pub fn join_graph(specs: &[FilterSpec]) -> String {
    compile(specs).join(";")
}

/// Join specs into one simple filter chain (`,`-separated).
pub fn join_chain(specs: &[FilterSpec]) -> String {
    compile(specs).join(",")
}

/// Normalise a stream specifier to its bracketed form: `0:v` and `[0:v]`
/// both become `[0:v]`.
pub fn stream_label(label: &str) -> String {
    RE_STREAM_LABEL.replace(label, "[$1]").into_owned()
}

/// Single-quote a value containing filter metacharacters. Embedded quotes
/// close the quoted run, are backslash-escaped, and reopen it.
fn escape_value(value: &str) -> String {
    if !value.contains(ESCAPED_CHARS) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_options_in_insertion_order() {
        let node = FilterNode::new("scale").option("w", 100).option("h", 200);
        assert_eq!(node.compile(), "scale=w=100:h=200");

        let node = FilterNode::new("scale").option("h", 200).option("w", 100);
        assert_eq!(node.compile(), "scale=h=200:w=100");
    }

    #[test]
    fn comma_values_are_quoted() {
        let node = FilterNode::new("scale").option("w", "if(gt(a,1),640,-2)");
        assert_eq!(node.compile(), "scale=w='if(gt(a,1),640,-2)'");
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        let node = FilterNode::new("drawtext").option("text", "it's");
        assert_eq!(node.compile(), r"drawtext=text='it'\''s'");
    }

    #[test]
    fn positional_and_scalar_options() {
        assert_eq!(FilterNode::new("pad").args([640, 480]).compile(), "pad=640:480");
        assert_eq!(
            FilterNode::new("drawtext").args(["text=a b"]).compile(),
            "drawtext='text=a b'"
        );
        // scalars are passed through verbatim
        assert_eq!(FilterNode::new("split").value(3).compile(), "split=3");
        assert_eq!(FilterNode::new("null").compile(), "null");
    }

    #[test]
    fn pads_are_normalised() {
        let node = FilterNode::new("overlay")
            .inputs(["0:v", "[1:v]"])
            .option("x", 10)
            .output("out");
        assert_eq!(node.compile(), "[0:v][1:v]overlay=x=10[out]");
    }

    #[test]
    fn stream_label_forms() {
        assert_eq!(stream_label("a"), "[a]");
        assert_eq!(stream_label("[a]"), "[a]");
        assert_eq!(stream_label("[a"), "[a]");
    }

    #[test]
    fn raw_specs_pass_through() {
        let specs: Vec<FilterSpec> = vec![
            "[0:v]split=2[a][b]".into(),
            FilterNode::new("scale").option("w", 10).option("h", 10).into(),
        ];
        assert_eq!(compile(&specs), ["[0:v]split=2[a][b]", "scale=w=10:h=10"]);
        assert_eq!(join_graph(&specs), "[0:v]split=2[a][b];scale=w=10:h=10");
        assert_eq!(join_chain(&specs), "[0:v]split=2[a][b],scale=w=10:h=10");
        // compiling twice yields the same tokens
        assert_eq!(compile(&specs), compile(&specs));
    }

    #[test]
    fn deserialize_from_json() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{"filter": "concat", "options": [["n", "2"], ["v", "1"]], "outputs": ["v"]}"#,
        )
        .unwrap();
        assert_eq!(spec.compile(), "concat=n=2:v=1[v]");

        let raw: FilterSpec = serde_json::from_str(r#""hflip""#).unwrap();
        assert_eq!(raw, FilterSpec::Raw("hflip".into()));
    }
}
