use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use delver_core::config::ModelConfig;
use delver_core::error::{DelverError, Result};
use delver_core::traits::LlmClient;
use delver_core::types::*;

#[derive(Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// An LLM client that answers by matching the prompt against scripted rules.
///
/// Rules are checked in the order they were added; the first rule whose
/// needle occurs in the prompt wins. Every prompt is recorded, so tests can
/// assert which calls happened.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    rules: Arc<Mutex<Vec<(String, Reply)>>>,
    fallback: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub prompt: String,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `response` to prompts containing `needle`.
    pub fn on(self, needle: &str, response: &str) -> Self {
        self.push(needle, Reply::Text(response.to_string()))
    }

    /// Fail prompts containing `needle` with an `LlmRequest` error.
    pub fn fail_on(self, needle: &str, message: &str) -> Self {
        self.push(needle, Reply::Fail(message.to_string()))
    }

    /// Reply used when no rule matches. Without one, unmatched prompts fail.
    pub fn otherwise(self, response: &str) -> Self {
        *self.fallback.lock().unwrap() = Some(response.to_string());
        self
    }

    fn push(self, needle: &str, reply: Reply) -> Self {
        self.rules.lock().unwrap().push((needle.to_string(), reply));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// How many recorded prompts contain `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.prompt.contains(needle))
            .count()
    }

    fn reply_for(&self, prompt: &str) -> Reply {
        let rules = self.rules.lock().unwrap();
        rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.fallback.lock().unwrap().clone().map(Reply::Text))
            .unwrap_or_else(|| Reply::Fail(format!("no scripted reply for prompt: {}", prompt)))
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.lock().unwrap().push(Call {
            model: config.model_id.clone(),
            prompt: prompt.clone(),
        });
        let reply = self.reply_for(&prompt);

        Box::pin(async move {
            match reply {
                Reply::Fail(message) => Err(DelverError::LlmRequest(message)),
                Reply::Text(text) => {
                    // Split the reply so callers exercise delta collection.
                    let mid = text
                        .char_indices()
                        .nth(text.chars().count() / 2)
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    let (head, tail) = text.split_at(mid);
                    let deltas = vec![
                        Ok(StreamDelta::TextDelta(head.to_string())),
                        Ok(StreamDelta::TextDelta(tail.to_string())),
                        Ok(StreamDelta::Stop(StopReason::EndTurn)),
                    ];
                    Ok(Box::pin(futures::stream::iter(deltas)) as BoxStream<'_, Result<StreamDelta>>)
                }
            }
        })
    }
}
