use std::collections::HashMap;

/// Context window applied when the result payload carries no per-model data
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

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
    // Claude 4.5 series
    ModelSpec::new("claude-sonnet-4-5", 200_000),
    ModelSpec::new("claude-haiku-4-5", 200_000),
    ModelSpec::new("claude-opus-4-5", 200_000),
    // Claude 4 series
    ModelSpec::new("claude-sonnet-4", 200_000),
    ModelSpec::new("claude-opus-4", 200_000),
    // Claude 3.x fallbacks
    ModelSpec::new("claude-3-5", 200_000),
    ModelSpec::new("claude-3", 200_000),
];

/// Returns model prefix → context window limit mapping
pub fn get_model_limits() -> HashMap<&'static str, u64> {
    MODEL_SPECS
        .iter()
        .map(|spec| (spec.prefix, spec.context_window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_no_duplicate_prefixes() {
        let prefixes: Vec<&str> = MODEL_SPECS.iter().map(|spec| spec.prefix).collect();
        let unique: HashSet<&str> = prefixes.iter().copied().collect();
        assert_eq!(prefixes.len(), unique.len());
    }
}
