use delver_core::config::{AppConfig, ModelConfig};
use delver_core::types::ModelTier;
use delver_llm::providers::presets;

pub(crate) struct CheckResult {
    pub label: String,
    pub ok: bool,
    pub detail: String,
}

pub fn run_doctor(config: &AppConfig) {
    let checks = collect_checks(config);

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
}

pub(crate) fn collect_checks(config: &AppConfig) -> Vec<CheckResult> {
    vec![
        check_model(ModelTier::Fast, &config.models.fast),
        check_model(ModelTier::Quality, &config.models.quality),
        check_search(config),
        check_graph(config),
        check_database(config),
    ]
}

fn has_key(key: &Option<String>) -> bool {
    key.as_ref()
        .map_or(false, |k| !k.trim().is_empty() && !k.starts_with("${"))
}

fn check_model(tier: ModelTier, model: &ModelConfig) -> CheckResult {
    let label = format!("Model ({})", tier);
    let provider = model.provider.as_str();

    if delver_llm::create_client(model).is_err() {
        return CheckResult {
            label,
            ok: false,
            detail: format!("Unknown provider '{}' and no base_url", provider),
        };
    }

    let needs_key = match provider {
        "gemini" | "google" => true,
        p => presets::get_preset(p).map_or(false, |preset| preset.needs_api_key),
    };

    if needs_key && !has_key(&model.api_key) {
        CheckResult {
            label,
            ok: false,
            detail: format!("No API key set for provider '{}'", provider),
        }
    } else {
        CheckResult {
            label,
            ok: true,
            detail: format!("{} ({})", model.model_id, provider),
        }
    }
}

fn check_search(config: &AppConfig) -> CheckResult {
    let provider = config.search.provider.as_str();
    if !matches!(provider, "serper" | "tavily") {
        return CheckResult {
            label: "Search".into(),
            ok: false,
            detail: format!("Unknown search provider '{}'", provider),
        };
    }
    if !has_key(&config.search.api_key) {
        return CheckResult {
            label: "Search".into(),
            ok: false,
            detail: format!("No API key set for '{}'", provider),
        };
    }
    CheckResult {
        label: "Search".into(),
        ok: true,
        detail: format!("{} ({} results per query)", provider, config.search.max_results),
    }
}

fn check_graph(config: &AppConfig) -> CheckResult {
    // The longest path through the research graph runs six nodes.
    let steps = config.graph.max_steps;
    CheckResult {
        label: "Graph".into(),
        ok: steps >= 6,
        detail: format!("max_steps = {}", steps),
    }
}

fn check_database(config: &AppConfig) -> CheckResult {
    let db_path = config.database_path();
    match delver_memory::SqliteStore::open(&db_path) {
        Ok(_) => CheckResult {
            label: "Database".into(),
            ok: true,
            detail: format!("{}", db_path.display()),
        },
        Err(e) => CheckResult {
            label: "Database".into(),
            ok: false,
            detail: format!("{}: {}", db_path.display(), e),
        },
    }
}
