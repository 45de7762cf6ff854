// src/evaluator/parser.rs — Strict decode of the judge's JSON verdict

use serde::Deserialize;

use super::utils::extract_json_block;
use crate::infra::errors::GoalForgeError;

/// Verdict the rubric model must return.
///
/// ```text
/// {"passed": true, "score": 85, "issues": ["..."], "corrected": null}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Verdict {
    pub passed: bool,
    pub score: u8,
    pub issues: Vec<String>,
    #[serde(default)]
    pub corrected: Option<String>,
}

pub fn parse_verdict(response: &str) -> Result<Verdict, GoalForgeError> {
    let json = extract_json_block(response)
        .ok_or_else(|| GoalForgeError::Validation("verdict contains no JSON object".into()))?;
    let verdict: Verdict = serde_json::from_str(json)
        .map_err(|e| GoalForgeError::Validation(format!("malformed verdict: {e}")))?;
    if verdict.score > 100 {
        return Err(GoalForgeError::Validation(format!(
            "verdict score {} is out of range",
            verdict.score
        )));
    }
    Ok(verdict)
}
