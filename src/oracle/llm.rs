//! Completion oracle backed by an `edgequake_llm` provider.
//!
//! This module is intentionally thin: prompts live in [`crate::prompts`],
//! orchestration in [`crate::research`]. It only builds the chat messages,
//! applies the optional timeout and classifies failures into
//! [`OracleFailure`]. Failures are returned as-is; retry policy belongs to
//! the caller.
//!
//! Streaming forwards content deltas as the provider sends them. Providers
//! without streaming support answer with one chunk holding the full text.

use crate::config::DocGenConfig;
use crate::error::OracleFailure;
use crate::oracle::{ChunkStream, CompletionOracle, CompletionRequest};
use edgequake_llm::traits::StreamChunk;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// [`CompletionOracle`] over any [`LLMProvider`].
pub struct ProviderOracle {
    provider: Arc<dyn LLMProvider>,
    provider_name: String,
    model: String,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ProviderOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOracle")
            .field("provider", &"<dyn LLMProvider>")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderOracle {
    pub fn new(provider: Arc<dyn LLMProvider>, provider_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            provider_name: provider_name.into(),
            model: model.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve a provider from the config and environment.
    pub fn from_config(config: &DocGenConfig) -> Result<Self, OracleFailure> {
        let (provider, name) = resolve_provider(config)?;
        let model = config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let mut oracle = Self::new(provider, name, model);
        if let Some(secs) = config.api_timeout_secs {
            oracle = oracle.with_timeout(Duration::from_secs(secs));
        }
        Ok(oracle)
    }

    fn messages(request: &CompletionRequest) -> (Vec<ChatMessage>, CompletionOptions) {
        let messages = vec![
            ChatMessage::system(request.system.as_str()),
            ChatMessage::user(request.user.as_str()),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };
        (messages, options)
    }

    /// Await `call` under the configured timeout.
    async fn timed<T>(
        &self,
        start: Instant,
        call: impl std::future::Future<Output = edgequake_llm::Result<T>>,
    ) -> Result<T, OracleFailure> {
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(r) => r,
                Err(_) => {
                    warn!("Completion timed out after {:?}", limit);
                    return Err(OracleFailure::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
            },
            None => call.await,
        };
        result.map_err(|e| classify_failure(&self.provider_name, &e.to_string(), start))
    }

    async fn chat(&self, request: CompletionRequest) -> Result<String, OracleFailure> {
        let (messages, options) = Self::messages(&request);
        let start = Instant::now();
        let response = self
            .timed(start, self.provider.chat(&messages, Some(&options)))
            .await?;
        debug!(
            "Completion: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream, OracleFailure> {
        let start = Instant::now();
        let name = self.provider_name.clone();

        if self.provider.supports_tool_streaming() {
            let (messages, options) = Self::messages(&request);
            let deltas = self
                .timed(
                    start,
                    self.provider
                        .chat_with_tools_stream(&messages, &[], None, Some(&options)),
                )
                .await?;
            debug!("Streaming chat from {} after {:?}", name, start.elapsed());
            let stream = deltas.filter_map(move |item| {
                let chunk = match item {
                    Ok(StreamChunk::Content(text)) if !text.is_empty() => Some(Ok(text)),
                    Ok(_) => None,
                    Err(e) => Some(Err(classify_failure(&name, &e.to_string(), start))),
                };
                futures::future::ready(chunk)
            });
            return Ok(Box::pin(stream));
        }

        if self.provider.supports_streaming() {
            let prompt = format!("{}\n\n{}", request.system, request.user);
            let deltas = self.timed(start, self.provider.stream(&prompt)).await?;
            debug!("Streaming prompt from {} after {:?}", name, start.elapsed());
            let stream = deltas.filter_map(move |item| {
                let chunk = match item {
                    Ok(text) if text.is_empty() => None,
                    Ok(text) => Some(Ok(text)),
                    Err(e) => Some(Err(classify_failure(&name, &e.to_string(), start))),
                };
                futures::future::ready(chunk)
            });
            return Ok(Box::pin(stream));
        }

        debug!("Provider {} does not stream; sending one chunk", name);
        let text = self.chat(request).await?;
        Ok(Box::pin(tokio_stream::once(Ok::<_, OracleFailure>(text))))
    }
}

fn classify_failure(provider: &str, message: &str, start: Instant) -> OracleFailure {
    warn!("Completion failed: {}", message);
    match OracleFailure::from_message(provider, message) {
        OracleFailure::Timeout { .. } => OracleFailure::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        },
        other => other,
    }
}

impl CompletionOracle for ProviderOracle {
    fn model(&self) -> String {
        self.model.clone()
    }

    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<String, OracleFailure>> {
        Box::pin(self.chat(request))
    }

    fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<ChunkStream, OracleFailure>> {
        Box::pin(self.stream(request))
    }
}

/// Resolve the LLM provider from config, in priority order:
///
/// 1. **Explicit provider** (`config.provider`), used as-is
/// 2. **Named provider** (`config.provider_name` + `config.model`)
/// 3. **`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`**, when both are set
/// 4. **`OPENAI_API_KEY`**: OpenAI with the configured or default model
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
///
/// A provider that cannot be constructed is reported as
/// [`OracleFailure::Auth`]: in practice it is always a missing key.
pub fn resolve_provider(
    config: &DocGenConfig,
) -> Result<(Arc<dyn LLMProvider>, String), OracleFailure> {
    if let Some(ref provider) = config.provider {
        let name = config.provider_name.clone().unwrap_or_else(|| "custom".into());
        return Ok((Arc::clone(provider), name));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (provider, _embedding) = ProviderFactory::from_env().map_err(|e| OracleFailure::Auth {
        provider: "auto".to_string(),
        detail: format!(
            "No LLM provider could be auto-detected from environment. \
Set OPENAI_API_KEY or configure a provider. Error: {}",
            e
        ),
    })?;
    Ok((provider, "auto".to_string()))
}

fn create_provider(
    name: &str,
    model: &str,
) -> Result<(Arc<dyn LLMProvider>, String), OracleFailure> {
    debug!("Creating provider '{}' with model '{}'", name, model);
    ProviderFactory::create_llm_provider(name, model)
        .map(|p| (p, name.to_string()))
        .map_err(|e| OracleFailure::Auth {
            provider: name.to_string(),
            detail: format!("{e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::collect_chunks;
    use async_trait::async_trait;
    use edgequake_llm::{LLMResponse, LlmError, ToolChoice, ToolDefinition};
    use futures::stream::BoxStream;

    /// Provider that answers `chat` in full and streams a fixed delta script.
    struct Deltas {
        streaming: bool,
        script: fn() -> Vec<edgequake_llm::Result<StreamChunk>>,
    }

    fn three_deltas() -> Vec<edgequake_llm::Result<StreamChunk>> {
        vec![
            Ok(StreamChunk::Content("1. Intro".into())),
            Ok(StreamChunk::Content(String::new())),
            Ok(StreamChunk::Content("duction\n".into())),
            Ok(StreamChunk::Content("Body.".into())),
            Ok(StreamChunk::Finished {
                reason: "stop".into(),
                ttft_ms: None,
            }),
        ]
    }

    fn broken_after_one() -> Vec<edgequake_llm::Result<StreamChunk>> {
        vec![
            Ok(StreamChunk::Content("1. Intro".into())),
            Err(LlmError::RateLimited("429 slow down".into())),
        ]
    }

    #[async_trait]
    impl LLMProvider for Deltas {
        fn name(&self) -> &str {
            "deltas"
        }
        fn model(&self) -> &str {
            "deltas-1"
        }
        fn max_context_length(&self) -> usize {
            8192
        }
        async fn complete(&self, _: &str) -> edgequake_llm::Result<LLMResponse> {
            Ok(LLMResponse::new("whole answer", "deltas-1"))
        }
        async fn complete_with_options(
            &self,
            _: &str,
            _: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            Ok(LLMResponse::new("whole answer", "deltas-1"))
        }
        async fn chat(
            &self,
            _: &[ChatMessage],
            _: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            Ok(LLMResponse::new("whole answer", "deltas-1"))
        }
        async fn chat_with_tools_stream(
            &self,
            _: &[ChatMessage],
            _: &[ToolDefinition],
            _: Option<ToolChoice>,
            _: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<BoxStream<'static, edgequake_llm::Result<StreamChunk>>> {
            Ok(futures::stream::iter((self.script)()).boxed())
        }
        fn supports_tool_streaming(&self) -> bool {
            self.streaming
        }
    }

    fn oracle(streaming: bool, script: fn() -> Vec<edgequake_llm::Result<StreamChunk>>) -> ProviderOracle {
        ProviderOracle::new(Arc::new(Deltas { streaming, script }), "deltas", "deltas-1")
    }

    #[tokio::test]
    async fn stream_forwards_each_content_delta() {
        let mut stream = oracle(true, three_deltas)
            .complete_stream(CompletionRequest::new("s", "u"))
            .await
            .unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        assert_eq!(chunks, vec!["1. Intro", "duction\n", "Body."]);
    }

    #[tokio::test]
    async fn stream_error_is_classified() {
        let stream = oracle(true, broken_after_one)
            .complete_stream(CompletionRequest::new("s", "u"))
            .await
            .unwrap();
        match collect_chunks(stream).await {
            Err(OracleFailure::RateLimited { provider, .. }) => assert_eq!(provider, "deltas"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_streaming_provider_sends_one_chunk() {
        let mut stream = oracle(false, three_deltas)
            .complete_stream(CompletionRequest::new("s", "u"))
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "whole answer");
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn request_builder_sets_limits() {
        let r = CompletionRequest::new("sys", "user").temperature(0.3).max_tokens(1000);
        assert_eq!(r.temperature, 0.3);
        assert_eq!(r.max_tokens, 1000);
        assert_eq!(r.system, "sys");
    }

    #[test]
    fn unknown_named_provider_is_auth_failure() {
        let config = DocGenConfig::builder()
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        match resolve_provider(&config) {
            Err(OracleFailure::Auth { provider, .. }) => {
                assert_eq!(provider, "definitely-not-a-provider")
            }
            Err(other) => panic!("unexpected failure: {other:?}"),
            Ok(_) => panic!("unknown provider should not resolve"),
        }
    }
}
