use agor_types::{ModelConfig, ThinkingMode};

/// Resolved extended-thinking allowance for one prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingBudget {
    Disabled,
    Tokens(u32),
}

impl ThinkingBudget {
    pub fn tokens(&self) -> Option<u32> {
        match self {
            ThinkingBudget::Disabled => None,
            ThinkingBudget::Tokens(t) => Some(*t),
        }
    }
}

// Tiered budgets keyed by the strongest trigger phrase found in the prompt.
// Ordered strongest-first; matching is case-insensitive substring search.
const TIERS: &[(&str, u32)] = &[
    ("ultrathink", 63_999),
    ("think harder", 31_999),
    ("think hard", 10_000),
    ("think", 4_000),
];

/// Resolve the thinking budget for a prompt.
///
/// `auto` scans the prompt for trigger phrases; `manual` takes the
/// configured token count; `off` disables thinking entirely.
pub fn resolve_thinking_budget(config: &ModelConfig, prompt: &str) -> ThinkingBudget {
    match config.thinking_mode {
        ThinkingMode::Off => ThinkingBudget::Disabled,
        ThinkingMode::Manual => match config.manual_thinking_tokens {
            Some(tokens) if tokens > 0 => ThinkingBudget::Tokens(tokens),
            _ => ThinkingBudget::Disabled,
        },
        ThinkingMode::Auto => {
            let lowered = prompt.to_lowercase();
            for (phrase, budget) in TIERS {
                if lowered.contains(phrase) {
                    return ThinkingBudget::Tokens(*budget);
                }
            }
            ThinkingBudget::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto() -> ModelConfig {
        ModelConfig {
            thinking_mode: ThinkingMode::Auto,
            ..Default::default()
        }
    }

    #[test]
    fn test_auto_tiers() {
        assert_eq!(
            resolve_thinking_budget(&auto(), "please think about this"),
            ThinkingBudget::Tokens(4_000)
        );
        assert_eq!(
            resolve_thinking_budget(&auto(), "Think hard before answering"),
            ThinkingBudget::Tokens(10_000)
        );
        assert_eq!(
            resolve_thinking_budget(&auto(), "think harder"),
            ThinkingBudget::Tokens(31_999)
        );
        assert_eq!(
            resolve_thinking_budget(&auto(), "ultrathink: redesign this"),
            ThinkingBudget::Tokens(63_999)
        );
    }

    #[test]
    fn test_auto_no_trigger() {
        assert_eq!(
            resolve_thinking_budget(&auto(), "fix the bug"),
            ThinkingBudget::Disabled
        );
    }

    #[test]
    fn test_manual_budget() {
        let config = ModelConfig {
            thinking_mode: ThinkingMode::Manual,
            manual_thinking_tokens: Some(12_345),
            ..Default::default()
        };
        assert_eq!(
            resolve_thinking_budget(&config, "anything"),
            ThinkingBudget::Tokens(12_345)
        );
    }

    #[test]
    fn test_off_ignores_triggers() {
        let config = ModelConfig {
            thinking_mode: ThinkingMode::Off,
            ..Default::default()
        };
        assert_eq!(
            resolve_thinking_budget(&config, "ultrathink"),
            ThinkingBudget::Disabled
        );
    }
}
