// benches/benchmarks.rs — Performance benchmarks (criterion)
//
// Hot paths that run once per goal or once per task:
//   1. Heuristic decomposition of goal text
//   2. Plan-to-graph construction with routing
//   3. Cost calculation and ledger charging
//   4. Verdict parsing and output heuristics

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use goalforge::core::cost::{estimate_tokens, CostLedger, CostPolicy};
use goalforge::core::planner::{decompose, PlanOverrides, Planner};
use goalforge::core::routing::RoutingPolicy;
use goalforge::core::types::{Complexity, Goal};
use goalforge::evaluator::heuristics;
use goalforge::evaluator::parser::parse_verdict;
use goalforge::infra::config::{PlannerConfig, RoutingConfig, ValidationConfig};
use goalforge::provider::ProviderRegistry;

// ─── Helpers ────────────────────────────────────────────────────────────────

const SHORT_GOAL: &str = "add a footer";

const LIST_GOAL: &str = "\
1. Research how competitors structure their pricing pages
2. Analyze our current conversion funnel for drop-off points
3. Build a responsive pricing table component
4. Write the pricing copy to pricing.md file
5. Test the component across breakpoints
6. Summarize the changes for the team
7. Deploy the new page to production";

fn prose_goal() -> String {
    "Investigate the flaky checkout test, then refactor the payment retry logic. \
     After that verify the integration end-to-end; finally document the fix and release it. "
        .repeat(4)
}

// ─── Benchmark: Planning ────────────────────────────────────────────────────

fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");
    let prose = prose_goal();

    group.bench_function("decompose_short", |b| {
        b.iter(|| decompose(black_box(SHORT_GOAL), 8))
    });

    group.bench_function("decompose_numbered_list", |b| {
        b.iter(|| decompose(black_box(LIST_GOAL), 8))
    });

    group.bench_function("decompose_prose", |b| {
        b.iter(|| decompose(black_box(&prose), 8))
    });

    group.bench_function("plan_heuristic_graph", |b| {
        let planner = Planner::new(
            PlannerConfig::default(),
            RoutingPolicy::new(&RoutingConfig::default()),
            ProviderRegistry::new(),
        );
        let goal = Goal::new(LIST_GOAL);
        let overrides = PlanOverrides::default();
        b.iter(|| planner.plan_heuristic(black_box(&goal), &overrides))
    });

    group.finish();
}

// ─── Benchmark: Cost & routing ──────────────────────────────────────────────

fn bench_cost(c: &mut Criterion) {
    let mut group = c.benchmark_group("cost");
    let policy = CostPolicy::default();

    group.bench_function("calculate_cost_catalog", |b| {
        b.iter(|| policy.calculate_cost(black_box("openai/gpt-4o-mini"), 3_000, 1_000))
    });

    group.bench_function("calculate_cost_unknown_model", |b| {
        b.iter(|| policy.calculate_cost(black_box("acme/custom-7b"), 3_000, 1_000))
    });

    group.bench_function("select_cheapest_model", |b| {
        let routing = RoutingPolicy::new(&RoutingConfig::default());
        b.iter(|| routing.select_cheapest_model(black_box(Complexity::Moderate)))
    });

    group.bench_function("ledger_charge_100_tasks", |b| {
        let decision = policy.calculate_cost("groq/llama-3.1-8b-instant", 2_000, 500);
        b.iter(|| {
            let mut ledger = CostLedger::new();
            for i in 0..100 {
                let task = format!("task-{i}");
                ledger.charge(&task, 1, black_box(&decision));
                // Replayed charge is ignored.
                ledger.charge(&task, 1, &decision);
            }
            ledger.total_credits()
        })
    });

    let long = "fn main() { println!(\"hello\"); }\n".repeat(2_000);
    group.bench_function("estimate_tokens_64k_chars", |b| {
        b.iter(|| estimate_tokens(black_box(&long)))
    });

    group.finish();
}

// ─── Benchmark: Validation ──────────────────────────────────────────────────

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");
    let config = ValidationConfig::default();

    let fenced = "Here is my review:\n```json\n{\"passed\": false, \"score\": 62, \
                  \"issues\": [\"missing error handling\", \"no tests\"], \
                  \"corrected\": \"fn main() {}\"}\n```";
    group.bench_function("parse_verdict_fenced", |b| {
        b.iter(|| parse_verdict(black_box(fenced)))
    });

    let content = "The footer renders the company name and the current year. ".repeat(80);
    group.bench_function("heuristics_long_output", |b| {
        b.iter(|| heuristics::check(black_box("Add a footer to every page"), black_box(&content), &config))
    });

    group.finish();
}

// ─── Main ───────────────────────────────────────────────────────────────────

criterion_group!(benches, bench_planning, bench_cost, bench_validation);
criterion_main!(benches);
