pub mod analysis;
pub mod domain;
pub mod error;
pub mod llm;
pub mod prompt;

pub mod config {
    use crate::analysis::AnalysisMode;
    use anyhow::Context;

    const DEFAULT_INPUT_COST_PER_MTOK: f64 = 3.0;
    const DEFAULT_OUTPUT_COST_PER_MTOK: f64 = 15.0;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub analysis_mode: AnalysisMode,
        pub input_cost_per_mtok: f64,
        pub output_cost_per_mtok: f64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let analysis_mode = match std::env::var("ANALYSIS_MODE").ok() {
                Some(raw) => raw
                    .parse::<AnalysisMode>()
                    .with_context(|| format!("invalid ANALYSIS_MODE={raw}"))?,
                None => AnalysisMode::default(),
            };

            Ok(Self {
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                analysis_mode,
                input_cost_per_mtok: env_f64("ANTHROPIC_INPUT_COST_PER_MTOK")
                    .unwrap_or(DEFAULT_INPUT_COST_PER_MTOK),
                output_cost_per_mtok: env_f64("ANTHROPIC_OUTPUT_COST_PER_MTOK")
                    .unwrap_or(DEFAULT_OUTPUT_COST_PER_MTOK),
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        /// Prices token usage in USD with the configured per-million-token rates.
        pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
            (input_tokens as f64 * self.input_cost_per_mtok
                + output_tokens as f64 * self.output_cost_per_mtok)
                / 1_000_000.0
        }
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                anthropic_api_key: None,
                sentry_dsn: None,
                analysis_mode: AnalysisMode::default(),
                input_cost_per_mtok: DEFAULT_INPUT_COST_PER_MTOK,
                output_cost_per_mtok: DEFAULT_OUTPUT_COST_PER_MTOK,
            }
        }
    }

    fn env_f64(key: &str) -> Option<f64> {
        std::env::var(key)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    }

}
