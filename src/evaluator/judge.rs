// src/evaluator/judge.rs — LLM rubric pass

use std::time::Duration;

use super::parser::{parse_verdict, Verdict};
use super::utils::truncate_for_eval;
use crate::infra::errors::GoalForgeError;
use crate::provider::{CompletionRequest, ModelProvider};

const JUDGE_SYSTEM: &str = "You are a strict reviewer of AI-generated work. \
Reply with a single JSON object and nothing else.";

const JUDGE_MAX_TOKENS: u32 = 1_500;

pub struct JudgeRequest<'a> {
    pub model_id: &'a str,
    pub prompt: &'a str,
    pub content: &'a str,
    pub max_content_chars: usize,
    pub attempt_fix: bool,
    pub timeout: Duration,
}

pub fn rubric_prompt(prompt: &str, content: &str, attempt_fix: bool) -> String {
    let corrected_rule = if attempt_fix {
        "If the output is fixable, put a complete corrected version in \"corrected\"; otherwise null."
    } else {
        "Always set \"corrected\" to null."
    };
    format!(
        "Evaluate whether the output fully and correctly accomplishes the task.\n\n\
         ## Task\n{prompt}\n\n\
         ## Output\n{content}\n\n\
         Score 0-100 for correctness, completeness and safety. \
         List concrete issues. {corrected_rule}\n\n\
         Respond with exactly:\n\
         {{\"passed\": <bool>, \"score\": <0-100>, \"issues\": [<string>], \"corrected\": <string or null>}}"
    )
}

/// One rubric call under an absolute timeout.
pub async fn run_judge(
    provider: &dyn ModelProvider,
    req: JudgeRequest<'_>,
) -> Result<Verdict, GoalForgeError> {
    let content = truncate_for_eval(req.content, req.max_content_chars);
    let request = CompletionRequest::new(
        req.model_id,
        rubric_prompt(req.prompt, content, req.attempt_fix),
    )
    .with_system(JUDGE_SYSTEM)
    .with_max_tokens(JUDGE_MAX_TOKENS)
    .with_temperature(0.0);

    let response = tokio::time::timeout(req.timeout, provider.execute(request))
        .await
        .map_err(|_| GoalForgeError::Timeout {
            provider: provider.id().to_string(),
            after_ms: req.timeout.as_millis() as u64,
        })??;

    parse_verdict(&response.completion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rubric_prompt_mentions_fix_rule() {
        assert!(rubric_prompt("t", "o", true).contains("corrected version"));
        assert!(rubric_prompt("t", "o", false).contains("null"));
        assert!(rubric_prompt("Write docs", "Docs.", false).contains("## Task\nWrite docs"));
    }
}
