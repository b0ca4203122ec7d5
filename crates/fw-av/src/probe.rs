//! Metadata probing of job inputs with ffprobe.

use fw_core::{Error, Result};
use fw_probe::{parse_probe_output, ProbeData};
use tracing::Instrument;

use crate::command::ToolCommand;
use crate::job::{Command, InputSource};

impl Command {
    /// Run ffprobe on an input and parse its report.
    ///
    /// `index` selects the input; `None` means the most recently added one.
    /// `extra` options are passed before the source. A stream input is
    /// consumed by probing it.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when there is no such input.
    /// - [`Error::ToolNotFound`] when ffprobe cannot be found.
    /// - [`Error::Probe`] when ffprobe fails.
    pub async fn probe(&mut self, index: Option<usize>, extra: &[&str]) -> Result<ProbeData> {
        let span = self.span.clone();
        async move {
            let source = match index {
                Some(i) => self.inputs.get(i).ok_or_else(|| Error::config("Invalid input index"))?,
                None => self
                    .inputs
                    .last()
                    .ok_or_else(|| Error::config("No input specified"))?,
            }
            .source
            .clone();

            let mut cmd = ToolCommand::new(self.tools.ffprobe_path()?);
            cmd.args(["-show_streams", "-show_format"])
                .args(extra.iter().copied())
                .arg(source.as_arg());
            if let InputSource::Stream = source {
                let reader = self
                    .input_stream
                    .take()
                    .ok_or_else(|| Error::config("Input stream was consumed by a previous run"))?;
                cmd.stdin(reader);
            }
            if let Some(timeout) = self.timeout {
                cmd.timeout(timeout);
            }

            tracing::debug!("Probing {}", source.as_arg());
            let out = cmd.output().await?;
            if !out.status.success() {
                let message = match out.status.code() {
                    Some(code) => format!("ffprobe exited with code {code}\n{}", out.stderr.trim_end()),
                    None => "ffprobe was killed by a signal".to_string(),
                };
                return Err(Error::Probe(message));
            }
            Ok(parse_probe_output(&out.stdout))
        }
        .instrument(span)
        .await
    }
}
