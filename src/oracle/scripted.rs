//! A completion oracle that replays canned responses.
//!
//! Used by the test suites and handy for running the pipeline offline.
//! Responses are served in order; once exhausted the last one repeats.

use crate::error::OracleFailure;
use crate::oracle::{ChunkStream, CompletionOracle, CompletionRequest};
use futures::future::BoxFuture;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct ScriptedOracle {
    responses: Vec<Result<String, OracleFailure>>,
    requests: Mutex<Vec<CompletionRequest>>,
    chunk_chars: usize,
}

impl ScriptedOracle {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(|s| Ok(s.into())).collect(),
            requests: Mutex::new(Vec::new()),
            chunk_chars: 16,
        }
    }

    /// An oracle whose every call fails with `failure`.
    pub fn failing(failure: OracleFailure) -> Self {
        Self {
            responses: vec![Err(failure)],
            ..Self::default()
        }
    }

    /// Size of the chunks `complete_stream` cuts responses into.
    pub fn chunk_chars(mut self, n: usize) -> Self {
        self.chunk_chars = n.max(1);
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next(&self, request: CompletionRequest) -> Result<String, OracleFailure> {
        let mut seen = self
            .requests
            .lock()
            .map_err(|_| OracleFailure::Unknown {
                detail: "scripted oracle lock poisoned".into(),
            })?;
        let idx = seen.len().min(self.responses.len().saturating_sub(1));
        seen.push(request);
        match self.responses.get(idx) {
            Some(r) => r.clone(),
            None => Err(OracleFailure::Unknown {
                detail: "scripted oracle has no responses".into(),
            }),
        }
    }
}

impl CompletionOracle for ScriptedOracle {
    fn model(&self) -> String {
        "scripted".into()
    }

    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<String, OracleFailure>> {
        let result = self.next(request);
        Box::pin(async move { result })
    }

    fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<ChunkStream, OracleFailure>> {
        let result = self.next(request);
        let size = self.chunk_chars.max(1);
        Box::pin(async move {
            let text = result?;
            let chars: Vec<char> = text.chars().collect();
            let chunks: Vec<Result<String, OracleFailure>> = chars
                .chunks(size)
                .map(|c| Ok(c.iter().collect::<String>()))
                .collect();
            Ok(Box::pin(tokio_stream::iter(chunks)) as ChunkStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn replays_in_order_then_repeats_last() {
        let oracle = ScriptedOracle::new(["one", "two"]);
        let req = CompletionRequest::new("s", "u");
        assert_eq!(oracle.complete(req.clone()).await.unwrap(), "one");
        assert_eq!(oracle.complete(req.clone()).await.unwrap(), "two");
        assert_eq!(oracle.complete(req).await.unwrap(), "two");
        assert_eq!(oracle.requests().len(), 3);
    }

    #[tokio::test]
    async fn streams_in_chunks() {
        let oracle = ScriptedOracle::new(["abcdefghij"]).chunk_chars(4);
        let mut stream = oracle.complete_stream(CompletionRequest::new("s", "u")).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[tokio::test]
    async fn failing_oracle_fails() {
        let oracle = ScriptedOracle::failing(OracleFailure::Timeout { elapsed_ms: 10 });
        let err = oracle.complete(CompletionRequest::new("s", "u")).await.unwrap_err();
        assert!(matches!(err, OracleFailure::Timeout { .. }));
    }
}
