use std::collections::HashMap;

/// A named provider preset for OpenAI-compatible APIs.
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub needs_api_key: bool,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

/// Look up a provider preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    let preset = |default_base_url, needs_api_key| ProviderPreset {
        default_base_url,
        needs_api_key,
        extra_headers: &[],
    };
    match provider {
        "openai" => Some(preset("https://api.openai.com/v1/chat/completions", true)),
        "groq" => Some(preset("https://api.groq.com/openai/v1/chat/completions", true)),
        "ollama" => Some(preset("http://localhost:11434/v1/chat/completions", false)),
        "openrouter" => Some(ProviderPreset {
            default_base_url: "https://openrouter.ai/api/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[("X-Title", "Delver")],
        }),
        "together" => Some(preset("https://api.together.xyz/v1/chat/completions", true)),
        "fireworks" => Some(preset("https://api.fireworks.ai/inference/v1/chat/completions", true)),
        "mistral" => Some(preset("https://api.mistral.ai/v1/chat/completions", true)),
        "deepseek" => Some(preset("https://api.deepseek.com/v1/chat/completions", true)),
        _ => None,
    }
}

/// Build extra headers from a preset + user config overrides.
pub fn build_extra_headers(
    preset: Option<&ProviderPreset>,
    user_headers: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = preset
        .map(|p| p.extra_headers)
        .unwrap_or(&[])
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for (k, v) in user_headers {
        // User overrides take precedence
        if let Some(pos) = headers.iter().position(|(hk, _)| hk.eq_ignore_ascii_case(k)) {
            headers[pos].1 = v.clone();
        } else {
            headers.push((k.clone(), v.clone()));
        }
    }

    headers
}

/// List all known preset provider names.
pub fn all_preset_names() -> &'static [&'static str] {
    &[
        "openai",
        "groq",
        "ollama",
        "openrouter",
        "together",
        "fireworks",
        "mistral",
        "deepseek",
    ]
}
