use crate::claude::models as claude_models;
use crate::codex::models as codex_models;
use crate::gemini::models as gemini_models;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub context_window: u64,
}

/// Resolve a model's context-window limit by longest prefix matching.
///
/// Vendors release dated minor versions constantly; prefix tables mean a
/// "claude-sonnet-4-5-20250929" resolves through "claude-sonnet-4-5" without
/// a table update, and an unknown model resolves to None rather than a
/// wrong number.
pub fn resolve_model_limit(model_name: &str) -> Option<ModelSpec> {
    let all_limits: HashMap<&str, u64> = [
        claude_models::get_model_limits(),
        codex_models::get_model_limits(),
        gemini_models::get_model_limits(),
    ]
    .into_iter()
    .flat_map(|map| map.into_iter())
    .collect();

    let mut best_match: Option<u64> = None;
    let mut best_len = 0;

    for (prefix, &limit) in &all_limits {
        if model_name.starts_with(prefix) && prefix.len() > best_len {
            best_match = Some(limit);
            best_len = prefix.len();
        }
    }

    best_match.map(|context_window| ModelSpec { context_window })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_models() {
        assert_eq!(
            resolve_model_limit("claude-sonnet-4-5"),
            Some(ModelSpec {
                context_window: 200_000
            })
        );
        // Dated minor version resolves through the prefix
        assert_eq!(
            resolve_model_limit("claude-sonnet-4-5-20250929"),
            Some(ModelSpec {
                context_window: 200_000
            })
        );
    }

    #[test]
    fn test_codex_models() {
        assert_eq!(
            resolve_model_limit("gpt-5-codex"),
            Some(ModelSpec {
                context_window: 400_000
            })
        );
    }

    #[test]
    fn test_gemini_models() {
        assert_eq!(
            resolve_model_limit("gemini-2.5-pro"),
            Some(ModelSpec {
                context_window: 1_048_576
            })
        );
    }

    #[test]
    fn test_unknown_model() {
        assert_eq!(resolve_model_limit("unknown-model"), None);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let spec = resolve_model_limit("gpt-5.1-codex-max-2025");
        assert_eq!(
            spec,
            Some(ModelSpec {
                context_window: 400_000
            })
        );
    }
}
