use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::debug;

use delver_core::config::{ModelConfig, ModelsConfig};
use delver_core::error::Result;
use delver_core::traits::LlmClient;
use delver_core::types::*;

use crate::prompt::PromptTemplate;
use crate::retry::RetryingClient;

/// A model client bound to the configuration it should be called with.
#[derive(Clone)]
pub struct TierBinding {
    pub client: Arc<dyn LlmClient>,
    pub config: ModelConfig,
}

/// Text generation over two model tiers.
///
/// Nodes pick a tier, a prompt and its variables; the gateway renders the
/// prompt as a single user message and returns the concatenated reply.
#[derive(Clone)]
pub struct LlmGateway {
    fast: TierBinding,
    quality: TierBinding,
}

impl LlmGateway {
    pub fn new(fast: TierBinding, quality: TierBinding) -> Self {
        Self { fast, quality }
    }

    /// Use the same client for both tiers. Mostly useful in tests.
    pub fn single(client: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        let binding = TierBinding { client, config };
        Self {
            fast: binding.clone(),
            quality: binding,
        }
    }

    /// Build both tiers from configuration, wrapping a client in
    /// [`RetryingClient`] when it has retry settings or fallbacks.
    pub fn from_config(models: &ModelsConfig) -> Result<Self> {
        Ok(Self {
            fast: bind_tier(models, ModelTier::Fast)?,
            quality: bind_tier(models, ModelTier::Quality)?,
        })
    }

    pub fn model_for(&self, tier: ModelTier) -> &ModelConfig {
        &self.binding(tier).config
    }

    fn binding(&self, tier: ModelTier) -> &TierBinding {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Quality => &self.quality,
        }
    }

    /// Render `template` with `vars` and generate a completion on `tier`.
    pub async fn generate(
        &self,
        tier: ModelTier,
        template: &PromptTemplate,
        vars: &[(&str, &str)],
    ) -> Result<String> {
        let prompt = template.render(vars)?;
        debug!(tier = %tier, prompt = template.name(), chars = prompt.len(), "Generating");
        self.complete(tier, vec![ChatMessage::user(prompt)]).await
    }

    /// Run a chat completion and collect the streamed text.
    pub async fn complete(&self, tier: ModelTier, messages: Vec<ChatMessage>) -> Result<String> {
        let binding = self.binding(tier);
        let started = Instant::now();

        let mut stream = binding.client.chat_stream(&binding.config, messages).await?;
        let mut text = String::new();
        let mut output_tokens = 0;

        while let Some(delta) = stream.next().await {
            match delta? {
                StreamDelta::TextDelta(t) => text.push_str(&t),
                StreamDelta::Usage { output_tokens: n, .. } => output_tokens = n,
                StreamDelta::Stop(_) => {}
            }
        }

        debug!(
            tier = %tier,
            model = %binding.config.model_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            output_tokens,
            "Generation complete"
        );

        Ok(text)
    }
}

fn bind_tier(models: &ModelsConfig, tier: ModelTier) -> Result<TierBinding> {
    let config = models.for_tier(tier).clone();
    let primary = crate::create_client(&config)?;

    let fallbacks = models
        .fallbacks_for(tier)
        .map(|fb| Ok((fb.clone(), crate::create_client(fb)?)))
        .collect::<Result<Vec<_>>>()?;

    let client: Arc<dyn LlmClient> = if config.retry.is_some() || !fallbacks.is_empty() {
        let retry = config.retry.clone().unwrap_or_default();
        Arc::new(RetryingClient::new(primary, fallbacks, retry))
    } else {
        Arc::from(primary)
    };

    Ok(TierBinding { client, config })
}
