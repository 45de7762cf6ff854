// src/evaluator/heuristics.rs — Zero-cost checks run before any LLM call

use super::utils::normalize;
use crate::infra::config::ValidationConfig;

/// Characters that plausibly end complete output.
const TERMINAL_CHARS: &[char] = &[
    '.', '!', '?', ';', ':', ')', ']', '}', '>', '"', '\'', '`', '*', '|',
];

/// Shortest prompt opening worth checking for an echo.
const ECHO_MIN_CHARS: usize = 20;
const ECHO_PREFIX_CHARS: usize = 60;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeuristicReport {
    /// Set when the content fails outright; no LLM call is made.
    pub hard_failure: Option<String>,
    /// Issues folded into the LLM verdict with a score penalty.
    pub soft_issues: Vec<String>,
}

impl HeuristicReport {
    pub fn is_hard_failure(&self) -> bool {
        self.hard_failure.is_some()
    }
}

pub fn check(prompt: &str, content: &str, config: &ValidationConfig) -> HeuristicReport {
    let mut report = HeuristicReport::default();
    let trimmed = content.trim();
    let len = trimmed.chars().count();

    if len < config.min_chars {
        report.hard_failure = Some(format!(
            "output too short ({len} chars, minimum {})",
            config.min_chars
        ));
        return report;
    }

    if looks_truncated(trimmed, config.truncation_min_chars) {
        report
            .soft_issues
            .push("output appears truncated (no terminal punctuation)".into());
    }

    if echoes_prompt(prompt, trimmed) {
        report
            .soft_issues
            .push("output repeats the prompt verbatim".into());
    }

    report
}

fn looks_truncated(content: &str, min_chars: usize) -> bool {
    if content.chars().count() <= min_chars {
        return false;
    }
    match content.chars().last() {
        Some(c) => !TERMINAL_CHARS.contains(&c),
        None => false,
    }
}

fn echoes_prompt(prompt: &str, content: &str) -> bool {
    let opening: String = normalize(prompt).chars().take(ECHO_PREFIX_CHARS).collect();
    if opening.chars().count() < ECHO_MIN_CHARS {
        return false;
    }
    normalize(content).starts_with(&opening)
}
