use fw_core::{Error, Result};
use fw_filter::FilterNode;
use tracing::Instrument;

use crate::job::{Command, JobOutput};

impl Command {
    /// Concatenate every input, in order, into `target` with the `concat`
    /// filter.
    ///
    /// The first input is probed to decide whether audio and video streams
    /// are concatenated. Stream inputs cannot be merged.
    pub async fn merge(&mut self, target: impl Into<String>) -> Result<JobOutput> {
        let target = target.into();
        let span = self.span.clone();
        async move {
            if self.inputs.is_empty() {
                return Err(Error::config("No input specified"));
            }
            if self.inputs.iter().any(|i| i.source.is_stream()) {
                return Err(Error::config(
                    "Cannot merge stream inputs, only files and URLs can be concatenated",
                ));
            }

            let data = self.probe(Some(0), &[]).await?;
            let concat = FilterNode::new("concat")
                .option("n", self.inputs.len())
                .option("v", u8::from(data.has_video()))
                .option("a", u8::from(data.has_audio()));
            tracing::info!("Merging {} inputs into {target}", self.inputs.len());

            self.output(target)
                .complex_filter([concat], Vec::<String>::new());
            self.run().await
        }
        .instrument(span)
        .await
    }
}
