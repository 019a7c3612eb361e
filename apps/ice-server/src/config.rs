//! `ServerConfig`: every environment variable iceOS recognizes, read once
//! at startup and exposed immutably thereafter.

use std::env;

/// Which operating mode the server was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    /// Full persistence and budget enforcement.
    Production,
    /// Persistence on, budgets relaxed for local iteration.
    Development,
    /// No Redis required; everything runs in-memory.
    Demo,
}

impl RuntimeMode {
    fn parse(raw: &str) -> Self {
        match raw {
            "production" => Self::Production,
            "development" => Self::Development,
            _ => Self::Demo,
        }
    }
}

/// Where per-model pricing comes from, for the builder's cost estimator.
#[derive(Debug, Clone)]
pub enum PricingSource {
    /// A literal JSON document passed inline via `ICE_PRICING_JSON`.
    Inline(String),
    /// A path to a JSON file, via `ICE_PRICING_FILE`.
    File(String),
}

/// Every environment variable recognized at startup, loaded once into an
/// immutable struct. Nothing in this process re-reads the environment
/// after [`ServerConfig::from_env`] returns.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `REDIS_URL` — when set, the server persists drafts and events to
    /// Redis instead of keeping them in-process only.
    pub redis_url: Option<String>,
    /// `ICE_RUNTIME_MODE`, default `demo`.
    pub runtime_mode: RuntimeMode,
    /// `ORG_BUDGET_USD`.
    pub org_budget_usd: Option<f64>,
    /// `ICE_MAX_TOKENS`.
    pub max_tokens: Option<u64>,
    /// `ICE_MAX_DEPTH`, default 10.
    pub max_depth: Option<u32>,
    /// `BUDGET_FAIL_OPEN` — if true, a budget read failure does not abort
    /// the run. Default false (fail closed).
    pub budget_fail_open: bool,
    /// `ICE_WS_BEARER` — the bearer token every MCP request must present.
    pub bearer_token: String,
    /// `ICE_DEFAULT_LLM_PROVIDER`, default `openai`.
    pub default_llm_provider: String,
    /// `ICE_DEFAULT_LLM_MODEL`, default `gpt-4o-mini`.
    pub default_llm_model: String,
    /// `ICE_PRICING_JSON` or `ICE_PRICING_FILE`.
    pub pricing_source: Option<PricingSource>,
    /// `ICEOS_OPTIONAL_PACKS`, comma-separated.
    pub optional_packs: Vec<String>,
}

impl ServerConfig {
    /// Read the recognized environment variables once, applying the
    /// documented defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let pricing_source = env::var("ICE_PRICING_JSON")
            .ok()
            .map(PricingSource::Inline)
            .or_else(|| env::var("ICE_PRICING_FILE").ok().map(PricingSource::File));

        Self {
            redis_url: env::var("REDIS_URL").ok(),
            runtime_mode: env::var("ICE_RUNTIME_MODE")
                .ok()
                .as_deref()
                .map(RuntimeMode::parse)
                .unwrap_or(RuntimeMode::Demo),
            org_budget_usd: env::var("ORG_BUDGET_USD").ok().and_then(|v| v.parse().ok()),
            max_tokens: env::var("ICE_MAX_TOKENS").ok().and_then(|v| v.parse().ok()),
            max_depth: env::var("ICE_MAX_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(Some(10)),
            budget_fail_open: env::var("BUDGET_FAIL_OPEN")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            bearer_token: env::var("ICE_WS_BEARER").unwrap_or_else(|_| "development-token".to_owned()),
            default_llm_provider: env::var("ICE_DEFAULT_LLM_PROVIDER").unwrap_or_else(|_| "openai".to_owned()),
            default_llm_model: env::var("ICE_DEFAULT_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_owned()),
            pricing_source,
            optional_packs: env::var("ICEOS_OPTIONAL_PACKS")
                .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect())
                .unwrap_or_default(),
        }
    }
}
