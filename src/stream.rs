//! Streaming research reports: emit text as the oracle produces it.
//!
//! [`ResearchAssistant::research_report`] returns only after the whole
//! report is written and cleaned. [`ResearchAssistant::stream_research_report`]
//! instead yields raw chunks of the single underlying completion, so callers
//! can show text as it arrives. Chunks are not cleaned; pass the
//! concatenation to [`ResearchAssistant::finish_stream`] (or
//! [`collect_report`]) to get the same result the eager call returns.
//!
//! Dropping the stream abandons the completion.

use crate::error::{DocGenError, OracleFailure};
use crate::oracle::ChunkStream;
use crate::research::{GeneratedReport, ResearchAssistant};
use tokio_stream::StreamExt;
use tracing::{debug, info};

impl ResearchAssistant {
    /// Start a research report and return its chunk stream.
    ///
    /// Input validation happens before the oracle is called, so an empty
    /// query fails here rather than inside the stream.
    pub async fn stream_research_report(
        &self,
        query: &str,
        word_count_target: Option<usize>,
    ) -> Result<ChunkStream, DocGenError> {
        let req = self.report_request(query, word_count_target)?;
        debug!("stream_research_report: opening stream on {}", self.model());
        let stream = self.oracle().complete_stream(req).await?;
        Ok(stream)
    }

    /// Clean a fully accumulated stream into a report.
    pub fn finish_stream(&self, accumulated: &str) -> GeneratedReport {
        self.finish_report(accumulated)
    }
}

/// Drain `stream`, concatenating chunks. Stops at the first failed chunk.
pub async fn collect_chunks(mut stream: ChunkStream) -> Result<String, OracleFailure> {
    let mut text = String::new();
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
        chunks += 1;
    }
    info!("Stream finished: {} chunks, {} chars", chunks, text.len());
    Ok(text)
}

/// Stream a report to completion and clean it.
pub async fn collect_report(
    assistant: &ResearchAssistant,
    query: &str,
    word_count_target: Option<usize>,
) -> Result<GeneratedReport, DocGenError> {
    let stream = assistant.stream_research_report(query, word_count_target).await?;
    let text = collect_chunks(stream).await?;
    Ok(assistant.finish_stream(&text))
}
