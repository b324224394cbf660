use std::collections::HashMap;

/// Context window applied when the model name resolves to nothing
pub const DEFAULT_CONTEXT_WINDOW: u64 = 400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub prefix: &'static str,
    pub context_window: u64,
}

impl ModelSpec {
    pub const fn new(prefix: &'static str, context_window: u64) -> Self {
        Self {
            prefix,
            context_window,
        }
    }
}

const MODEL_SPECS: &[ModelSpec] = &[
    ModelSpec::new("gpt-5.2", 400_000),
    ModelSpec::new("gpt-5.1-codex-max", 400_000),
    ModelSpec::new("gpt-5.1-codex", 400_000),
    ModelSpec::new("gpt-5.1", 400_000),
    ModelSpec::new("gpt-5-codex", 400_000),
    ModelSpec::new("gpt-5", 400_000),
];

/// Returns model prefix → context window limit mapping
pub fn get_model_limits() -> HashMap<&'static str, u64> {
    MODEL_SPECS
        .iter()
        .map(|spec| (spec.prefix, spec.context_window))
        .collect()
}
