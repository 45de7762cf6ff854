// src/core/planner.rs — Decompose a goal into a task graph
//
// Two strategies: keyword heuristics (always available) and an LLM plan
// decoded against a strict schema. Any LLM failure falls back to heuristics.

use serde::Deserialize;

use super::graph::TaskGraph;
use super::routing::RoutingPolicy;
use super::types::{Complexity, CostSensitivity, Goal, RoutingContext, TaskNode, TaskType};
use crate::evaluator::utils::extract_json_block;
use crate::infra::config::PlannerConfig;
use crate::infra::errors::GoalForgeError;
use crate::provider::{CompletionRequest, ModelRef, ProviderRegistry};

/// Per-request tweaks on top of config.
#[derive(Debug, Clone, Default)]
pub struct PlanOverrides {
    pub max_tasks: Option<usize>,
    pub use_llm: Option<bool>,
    pub allow_expensive: Option<bool>,
    /// Route every task to this model.
    pub force_model: Option<ModelRef>,
}

/// A task before it is routed and placed in the graph. Dependencies are
/// indices into the same plan and always point backwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTask {
    pub title: String,
    pub task_type: TaskType,
    pub high_risk: bool,
    pub complexity: Complexity,
    pub dependencies: Vec<usize>,
}

pub struct Planner {
    config: PlannerConfig,
    routing: RoutingPolicy,
    providers: ProviderRegistry,
}

impl Planner {
    pub fn new(config: PlannerConfig, routing: RoutingPolicy, providers: ProviderRegistry) -> Self {
        Self {
            config,
            routing,
            providers,
        }
    }

    pub async fn plan(
        &self,
        goal: &Goal,
        overrides: &PlanOverrides,
    ) -> Result<TaskGraph, GoalForgeError> {
        let text = goal.text.trim();
        if text.is_empty() {
            return Err(GoalForgeError::planning("goal is empty"));
        }
        let max_tasks = overrides.max_tasks.unwrap_or(self.config.max_tasks).max(1);
        let use_llm = overrides.use_llm.unwrap_or(self.config.use_llm);

        let tasks = if use_llm {
            match self.plan_with_llm(goal, max_tasks).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    tracing::warn!("LLM planning failed, using heuristic plan: {}", e);
                    decompose(text, max_tasks)
                }
            }
        } else {
            decompose(text, max_tasks)
        };

        self.build_graph(goal, tasks, overrides)
    }

    /// Heuristic plan only. Never calls a provider.
    pub fn plan_heuristic(
        &self,
        goal: &Goal,
        overrides: &PlanOverrides,
    ) -> Result<TaskGraph, GoalForgeError> {
        let text = goal.text.trim();
        if text.is_empty() {
            return Err(GoalForgeError::planning("goal is empty"));
        }
        let max_tasks = overrides.max_tasks.unwrap_or(self.config.max_tasks).max(1);
        self.build_graph(goal, decompose(text, max_tasks), overrides)
    }

    async fn plan_with_llm(
        &self,
        goal: &Goal,
        max_tasks: usize,
    ) -> Result<Vec<PlannedTask>, GoalForgeError> {
        let model = ModelRef::parse(&self.config.model).ok_or_else(|| {
            GoalForgeError::Config(format!("invalid planner model '{}'", self.config.model))
        })?;
        let provider = self.providers.get(&model.provider)?;
        let request = CompletionRequest::new(&model.model, planning_prompt(goal, max_tasks))
            .with_system("You break goals into small, ordered engineering tasks. Reply with JSON only.")
            .with_max_tokens(2_000)
            .with_temperature(0.0);
        let response = provider.execute(request).await?;
        decode_llm_plan(&response.completion, max_tasks)
    }

    fn build_graph(
        &self,
        goal: &Goal,
        tasks: Vec<PlannedTask>,
        overrides: &PlanOverrides,
    ) -> Result<TaskGraph, GoalForgeError> {
        if tasks.is_empty() {
            return Err(GoalForgeError::planning("decomposition produced no tasks"));
        }
        let routing = match overrides.allow_expensive {
            Some(allow) => self.routing.clone().with_allow_expensive(allow),
            None => self.routing.clone(),
        };

        let mut graph = TaskGraph::for_new_goal();
        for (i, task) in tasks.iter().enumerate() {
            let context = RoutingContext::for_task(
                task.task_type,
                task.high_risk,
                sensitivity_for(task.complexity),
            );
            let routing = routing.route(context, task.complexity, overrides.force_model.as_ref());
            let deps = task.dependencies.iter().map(|&d| task_id(d));
            let node = TaskNode::new(task_id(i), &task.title, routing)
                .with_dependencies(deps)
                .with_prompt(&task.title);
            graph.add_task(node)?;
        }

        tracing::info!(
            goal_id = graph.goal_id(),
            tasks = graph.len(),
            mode = ?goal.mode,
            "Plan created"
        );
        Ok(graph)
    }
}

fn task_id(index: usize) -> String {
    format!("task-{}", index + 1)
}

fn sensitivity_for(complexity: Complexity) -> CostSensitivity {
    match complexity {
        Complexity::Trivial | Complexity::Simple => CostSensitivity::High,
        Complexity::Moderate => CostSensitivity::Medium,
        Complexity::Complex => CostSensitivity::Low,
    }
}

fn planning_prompt(goal: &Goal, max_tasks: usize) -> String {
    let context = goal
        .context
        .as_deref()
        .map(|c| format!("\n## Context\n{c}\n"))
        .unwrap_or_default();
    format!(
        "## Goal\n{}\n{context}\n\
         Split the goal into at most {max_tasks} tasks. Each task has a type from: \
         research, analysis, code_gen, file_write, deploy, validate, summarize. \
         A task may only depend on tasks listed before it. Complexity is one of \
         trivial, simple, moderate, complex.\n\n\
         Respond with exactly:\n\
         {{\"tasks\": [{{\"id\": \"t1\", \"title\": \"...\", \"type\": \"code_gen\", \
         \"dependencies\": [], \"high_risk\": false, \"complexity\": \"simple\"}}]}}",
        goal.text.trim()
    )
}

// ─── LLM plan decoding ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmPlan {
    tasks: Vec<LlmTask>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmTask {
    id: String,
    title: String,
    #[serde(rename = "type")]
    task_type: String,
    dependencies: Vec<String>,
    high_risk: bool,
    complexity: String,
}

/// Decode and check a model-produced plan.
pub fn decode_llm_plan(
    response: &str,
    max_tasks: usize,
) -> Result<Vec<PlannedTask>, GoalForgeError> {
    let json = extract_json_block(response)
        .ok_or_else(|| GoalForgeError::planning("plan response contains no JSON object"))?;
    let plan: LlmPlan = serde_json::from_str(json)
        .map_err(|e| GoalForgeError::planning(format!("malformed plan: {e}")))?;
    if plan.tasks.is_empty() {
        return Err(GoalForgeError::planning("plan has no tasks"));
    }

    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for task in plan.tasks.into_iter().take(max_tasks) {
        let id = task.id.trim().to_string();
        if id.is_empty() || seen.contains(&id) {
            return Err(GoalForgeError::planning(format!(
                "duplicate or empty task id '{id}'"
            )));
        }
        let task_type = TaskType::from_label(&task.task_type).ok_or_else(|| {
            GoalForgeError::planning(format!("unknown task type '{}'", task.task_type))
        })?;
        let complexity = Complexity::from_label(&task.complexity).ok_or_else(|| {
            GoalForgeError::planning(format!("unknown complexity '{}'", task.complexity))
        })?;
        let mut dependencies = Vec::new();
        for dep in &task.dependencies {
            let idx = seen.iter().position(|s| s == dep.trim()).ok_or_else(|| {
                GoalForgeError::planning(format!(
                    "task '{id}' depends on '{dep}', which is not an earlier task"
                ))
            })?;
            if !dependencies.contains(&idx) {
                dependencies.push(idx);
            }
        }
        let high_risk = task.high_risk || task_type == TaskType::Deploy;
        let title = task.title.trim().to_string();
        if title.is_empty() {
            return Err(GoalForgeError::planning(format!("task '{id}' has no title")));
        }
        out.push(PlannedTask {
            title,
            task_type,
            high_risk,
            complexity: at_least_moderate_if(high_risk, complexity),
            dependencies,
        });
        seen.push(id);
    }
    Ok(out)
}

// ─── Heuristic decomposition ───────────────────────────────────

const CONNECTIVES: &[&[&str]] = &[&["and", "then"], &["after", "that"], &["then"], &["finally"]];
const LEADING_FILLER: &[&str] = &["first", "firstly"];

const DEPLOY_WORDS: &[&str] = &["deploy", "release", "ship", "publish"];
const RESEARCH_WORDS: &[&str] = &["research", "investigat", "compare", "find"];
const ANALYSIS_WORDS: &[&str] = &["analy", "review", "audit"];
const FILE_WRITE_WORDS: &[&str] = &["save", "export"];
const VALIDATE_WORDS: &[&str] = &["test", "verif", "validat", "check"];
const SUMMARIZE_WORDS: &[&str] = &["summar", "report", "document"];

/// Matched as word prefixes.
const RISK_PREFIXES: &[&str] = &[
    "delete",
    "production",
    "payment",
    "billing",
    "migrat",
    "credential",
    "secret",
];
/// Matched as whole words.
const RISK_WORDS: &[&str] = &["drop", "drops", "prod"];

const COMPLEX_WORDS: &[&str] = &["architect", "refactor", "integrat", "system", "end-to-end"];

/// One step extracted from the goal text.
#[derive(Debug, Clone, PartialEq)]
struct Step {
    text: String,
    /// Introduced by a sequencing connective or a numbered item.
    sequenced: bool,
}

/// Deterministic keyword decomposition.
pub fn decompose(goal_text: &str, max_tasks: usize) -> Vec<PlannedTask> {
    let mut steps = split_steps(goal_text);
    if steps.len() > max_tasks {
        tracing::warn!(
            steps = steps.len(),
            max_tasks,
            "Goal has more steps than allowed, dropping the tail"
        );
        steps.truncate(max_tasks);
    }

    let mut tasks: Vec<PlannedTask> = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let words = words_of(&step.text);
        let task_type = classify(&words);
        let high_risk = task_type == TaskType::Deploy || is_high_risk(&words);
        let complexity = at_least_moderate_if(high_risk, complexity_of(&words));

        let mut deps: Vec<usize> = match task_type {
            TaskType::CodeGen | TaskType::FileWrite => (0..i)
                .filter(|&j| tasks[j].task_type.is_discovery())
                .collect(),
            TaskType::Validate => (0..i).filter(|&j| tasks[j].task_type.is_build()).collect(),
            TaskType::Deploy | TaskType::Summarize => (0..i).collect(),
            TaskType::Research | TaskType::Analysis => Vec::new(),
        };
        if step.sequenced && i > 0 && !deps.contains(&(i - 1)) {
            deps.push(i - 1);
        }
        deps.sort_unstable();

        tasks.push(PlannedTask {
            title: capitalize(&step.text),
            task_type,
            high_risk,
            complexity,
            dependencies: deps,
        });
    }
    tasks
}

fn split_steps(text: &str) -> Vec<Step> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let items: Vec<Step> = lines
        .iter()
        .filter_map(|line| list_item(line))
        .filter(|s| !s.text.is_empty())
        .collect();
    if !items.is_empty() {
        return items;
    }

    let mut steps = Vec::new();
    for sentence in split_sentences(text) {
        steps.extend(split_clauses(&sentence));
    }
    steps
}

/// `- item`, `* item`, `• item`, `1. item`, `2) item`.
fn list_item(line: &str) -> Option<Step> {
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(Step {
                text: clean_clause(rest),
                sequenced: false,
            });
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(Step {
        text: clean_clause(rest),
        sequenced: true,
    })
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let boundary = match c {
            ';' | '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |n| n.is_whitespace()),
            _ => false,
        };
        if boundary {
            if !current.trim().is_empty() {
                sentences.push(current.trim().to_string());
            }
            current.clear();
        } else {
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences
}

fn split_clauses(sentence: &str) -> Vec<Step> {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    let mut steps = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut sequenced = false;
    let mut i = 0;
    while i < words.len() {
        if let Some(len) = connective_at(&words[i..]) {
            if !current.is_empty() {
                steps.push(Step {
                    text: clean_clause(&current.join(" ")),
                    sequenced,
                });
                current.clear();
            }
            sequenced = true;
            i += len;
            continue;
        }
        current.push(words[i]);
        i += 1;
    }
    if !current.is_empty() {
        steps.push(Step {
            text: clean_clause(&current.join(" ")),
            sequenced,
        });
    }
    steps.retain(|s| !s.text.is_empty());
    steps
}

fn connective_at(words: &[&str]) -> Option<usize> {
    CONNECTIVES.iter().find_map(|pattern| {
        if words.len() < pattern.len() {
            return None;
        }
        let matches = pattern
            .iter()
            .zip(words)
            .all(|(p, w)| bare(w).eq_ignore_ascii_case(p));
        matches.then_some(pattern.len())
    })
}

fn bare(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
}

fn clean_clause(text: &str) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    while let Some(first) = words.first() {
        if LEADING_FILLER.iter().any(|f| bare(first).eq_ignore_ascii_case(f)) {
            words.remove(0);
        } else {
            break;
        }
    }
    words
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == '.' || c == ';' || c.is_whitespace())
        .to_string()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn words_of(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| bare(w).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Type of the earliest keyword in the clause; code_gen when none match.
fn classify(words: &[String]) -> TaskType {
    let writes_file = words.iter().any(|w| w.starts_with("write"))
        && words.iter().any(|w| w.starts_with("file") || w == "disk");

    for word in words {
        let w = word.as_str();
        if DEPLOY_WORDS.iter().any(|k| w.starts_with(k)) {
            return TaskType::Deploy;
        }
        if RESEARCH_WORDS.iter().any(|k| w.starts_with(k)) {
            return TaskType::Research;
        }
        if ANALYSIS_WORDS.iter().any(|k| w.starts_with(k)) {
            return TaskType::Analysis;
        }
        if FILE_WRITE_WORDS.iter().any(|k| w.starts_with(k)) || (writes_file && w.starts_with("write")) {
            return TaskType::FileWrite;
        }
        if VALIDATE_WORDS.iter().any(|k| w.starts_with(k)) {
            return TaskType::Validate;
        }
        if SUMMARIZE_WORDS.iter().any(|k| w.starts_with(k)) {
            return TaskType::Summarize;
        }
    }
    TaskType::CodeGen
}

fn is_high_risk(words: &[String]) -> bool {
    words.iter().any(|w| {
        RISK_PREFIXES.iter().any(|k| w.starts_with(k)) || RISK_WORDS.contains(&w.as_str())
    })
}

fn complexity_of(words: &[String]) -> Complexity {
    if words.len() > 25 || words.iter().any(|w| COMPLEX_WORDS.iter().any(|k| w.starts_with(k))) {
        Complexity::Complex
    } else if words.len() <= 2 {
        Complexity::Trivial
    } else if words.len() <= 8 {
        Complexity::Simple
    } else {
        Complexity::Moderate
    }
}

fn at_least_moderate_if(high_risk: bool, complexity: Complexity) -> Complexity {
    if high_risk {
        complexity.max(Complexity::Moderate)
    } else {
        complexity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::RoutingConfig;
    use pretty_assertions::assert_eq;

    fn planner() -> Planner {
        Planner::new(
            PlannerConfig::default(),
            RoutingPolicy::new(&RoutingConfig::default()),
            ProviderRegistry::new(),
        )
    }

    #[test]
    fn test_single_clause_goal() {
        let tasks = decompose("add a footer", 8);
        assert_eq!(
            tasks,
            vec![PlannedTask {
                title: "Add a footer".into(),
                task_type: TaskType::CodeGen,
                high_risk: false,
                complexity: Complexity::Simple,
                dependencies: vec![],
            }]
        );
    }

    #[test]
    fn test_connectives_split_and_sequence() {
        let tasks = decompose("Research pricing pages, then build a pricing table and then add tests", 8);
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Research pricing pages", "Build a pricing table", "Add tests"]);
        assert_eq!(tasks[0].task_type, TaskType::Research);
        assert_eq!(tasks[1].task_type, TaskType::CodeGen);
        assert_eq!(tasks[2].task_type, TaskType::Validate);
        assert_eq!(tasks[1].dependencies, vec![0]);
        assert_eq!(tasks[2].dependencies, vec![1]);
    }

    #[test]
    fn test_sentences_without_connectives_are_independent_unless_typed() {
        let tasks = decompose("Add a footer. Add a header.", 8);
        assert_eq!(tasks.len(), 2);
        assert!(tasks[1].dependencies.is_empty());
    }

    #[test]
    fn test_numbered_list_is_sequenced() {
        let goal = "1. Investigate the flaky login test\n2. Fix the race in the session store\n3. Write a summary for the team";
        let tasks = decompose(goal, 8);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].task_type, TaskType::Research);
        assert_eq!(tasks[1].dependencies, vec![0]);
        assert_eq!(tasks[2].task_type, TaskType::Summarize);
        assert_eq!(tasks[2].dependencies, vec![0, 1]);
    }

    #[test]
    fn test_bullets_use_type_rules() {
        let goal = "- compare auth libraries\n- implement login\n- verify login flow\n- deploy to staging";
        let tasks = decompose(goal, 8);
        assert_eq!(tasks[1].dependencies, vec![0]);
        assert_eq!(tasks[2].task_type, TaskType::Validate);
        assert_eq!(tasks[2].dependencies, vec![1]);
        assert_eq!(tasks[3].task_type, TaskType::Deploy);
        assert_eq!(tasks[3].dependencies, vec![0, 1, 2]);
        assert!(tasks[3].high_risk);
        assert!(tasks[3].complexity >= Complexity::Moderate);
    }

    #[test]
    fn test_high_risk_keywords() {
        let tasks = decompose("drop the legacy billing table", 8);
        assert!(tasks[0].high_risk);
        assert_eq!(tasks[0].complexity, Complexity::Moderate);
        assert!(!decompose("add a product dropdown", 8)[0].high_risk);
    }

    #[test]
    fn test_file_write_detection() {
        assert_eq!(decompose("export the results as csv", 8)[0].task_type, TaskType::FileWrite);
        assert_eq!(decompose("write the config file", 8)[0].task_type, TaskType::FileWrite);
        assert_eq!(decompose("write a parser", 8)[0].task_type, TaskType::CodeGen);
    }

    #[test]
    fn test_complexity_levels() {
        assert_eq!(decompose("fix typo", 8)[0].complexity, Complexity::Trivial);
        assert_eq!(decompose("refactor the module", 8)[0].complexity, Complexity::Complex);
        assert_eq!(
            decompose("add a small banner to the top of the landing page for visitors", 8)[0].complexity,
            Complexity::Moderate
        );
    }

    #[test]
    fn test_max_tasks_caps_plan() {
        let goal = "- a one\n- b two\n- c three\n- d four";
        assert_eq!(decompose(goal, 2).len(), 2);
    }

    #[test]
    fn test_decode_llm_plan() {
        let response = r#"```json
{"tasks": [
  {"id": "t1", "title": "Research options", "type": "research", "dependencies": [], "high_risk": false, "complexity": "simple"},
  {"id": "t2", "title": "Ship it", "type": "deploy", "dependencies": ["t1"], "high_risk": false, "complexity": "trivial"}
]}
```"#;
        let tasks = decode_llm_plan(response, 8).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].dependencies, vec![0]);
        assert!(tasks[1].high_risk);
        assert_eq!(tasks[1].complexity, Complexity::Moderate);
    }

    #[test]
    fn test_decode_rejects_forward_dependency() {
        let response = r#"{"tasks": [
  {"id": "a", "title": "A", "type": "code_gen", "dependencies": ["b"], "high_risk": false, "complexity": "simple"},
  {"id": "b", "title": "B", "type": "code_gen", "dependencies": [], "high_risk": false, "complexity": "simple"}
]}"#;
        assert!(decode_llm_plan(response, 8).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert!(decode_llm_plan(r#"{"tasks": []}"#, 8).is_err());
        assert!(decode_llm_plan("not json", 8).is_err());
        let unknown_type = r#"{"tasks": [{"id": "a", "title": "A", "type": "dance", "dependencies": [], "high_risk": false, "complexity": "simple"}]}"#;
        assert!(decode_llm_plan(unknown_type, 8).is_err());
        let extra_field = r#"{"tasks": [{"id": "a", "title": "A", "type": "research", "dependencies": [], "high_risk": false, "complexity": "simple", "owner": "me"}]}"#;
        assert!(decode_llm_plan(extra_field, 8).is_err());
        let dup = r#"{"tasks": [
  {"id": "a", "title": "A", "type": "research", "dependencies": [], "high_risk": false, "complexity": "simple"},
  {"id": "a", "title": "B", "type": "research", "dependencies": [], "high_risk": false, "complexity": "simple"}
]}"#;
        assert!(decode_llm_plan(dup, 8).is_err());
    }

    #[test]
    fn test_empty_goal_is_planning_error() {
        let err = planner()
            .plan_heuristic(&Goal::new("   "), &PlanOverrides::default())
            .unwrap_err();
        assert!(matches!(err, GoalForgeError::Planning { .. }));
    }

    #[test]
    fn test_graph_routing_follows_risk() {
        let graph = planner()
            .plan_heuristic(
                &Goal::new("implement the payment webhook then deploy to production"),
                &PlanOverrides::default(),
            )
            .unwrap();
        let first = graph.get("task-1").unwrap();
        assert!(first.routing.high_risk());
        assert!(first.routing.requires_validation());
        let deploy = graph.get("task-2").unwrap();
        assert_eq!(deploy.task_type(), TaskType::Deploy);
        assert_eq!(deploy.dependencies, vec!["task-1"]);
    }

    #[test]
    fn test_force_model_override() {
        let overrides = PlanOverrides {
            force_model: Some(ModelRef::new("openai", "gpt-4.1")),
            ..Default::default()
        };
        let graph = planner()
            .plan_heuristic(&Goal::new("add a footer"), &overrides)
            .unwrap();
        assert_eq!(graph.get("task-1").unwrap().routing.key(), "openai/gpt-4.1");
    }

    #[tokio::test]
    async fn test_llm_planning_falls_back_without_provider() {
        let overrides = PlanOverrides {
            use_llm: Some(true),
            ..Default::default()
        };
        let graph = planner()
            .plan(&Goal::new("add a footer"), &overrides)
            .await
            .unwrap();
        assert_eq!(graph.len(), 1);
    }
}
