//! Benchmark runs against an in-process chat backend.
//!
//! The fake client answers from a lookup keyed by model and clue text, with a
//! per-clue delay so completion order differs from clue order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use grading::export::{load_results, save_json};
use grading::{BenchmarkResults, Clue, ModelRunSummary, PriceEntry, PriceTable, TokenUsage};

use cryptic_bench::{
    finalize, ChatClient, ChatRequest, ChatResponse, ClientError, ClueSolver, Orchestrator,
    OutputOptions, RunSettings, SolveOptions,
};

type Responder = dyn Fn(&str, &str) -> Result<ChatResponse, ClientError> + Send + Sync;

struct FakeClient {
    respond: Box<Responder>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeClient {
    fn new(
        respond: impl Fn(&str, &str) -> Result<ChatResponse, ClientError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn clue_text(request: &ChatRequest) -> String {
    let prompt = &request.messages[1].content;
    let start = prompt.find("Clue: ").map(|i| i + "Clue: ".len()).unwrap_or(0);
    prompt[start..].lines().next().unwrap_or_default().to_string()
}

#[async_trait]
impl ChatClient for FakeClient {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let clue = clue_text(request);
        self.calls
            .lock()
            .unwrap()
            .push((request.model.clone(), clue.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Uneven latency derived from the clue text.
        let jitter = clue.bytes().map(u64::from).sum::<u64>() % 17;
        tokio::time::sleep(Duration::from_millis(2 + jitter)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.respond)(&request.model, &clue)
    }
}

fn json_answer(answer: &str, usage: Option<TokenUsage>) -> Result<ChatResponse, ClientError> {
    Ok(ChatResponse {
        content: format!("{{\"answer\":\"{answer}\",\"reasoning\":\"...\"}}"),
        usage,
    })
}

/// Clue `i` has text `clue number {i} (5)` and answer `WORD{i}`.
fn numbered_clues(n: usize) -> Vec<Clue> {
    (0..n)
        .map(|i| Clue {
            id: format!("c{i}"),
            clue: format!("clue number {i} (5)"),
            answer: format!("WORD{i}"),
            notes: None,
        })
        .collect()
}

fn expected_for(clue: &str) -> String {
    let n: String = clue.chars().filter(|c| c.is_ascii_digit()).collect();
    // drop the trailing enumeration digit
    format!("WORD{}", &n[..n.len() - 1])
}

#[tokio::test]
async fn solve_all_keeps_clue_order_under_concurrency() {
    let client = FakeClient::new(|_, clue| {
        let expected = expected_for(clue);
        let number: usize = expected[4..].parse().unwrap();
        if number % 2 == 0 {
            json_answer(&expected, Some(TokenUsage::new(20, 5)))
        } else {
            json_answer("WRONG", Some(TokenUsage::new(20, 5)))
        }
    });

    let prices = PriceTable::new().with_entry("fake/model", PriceEntry::per_million(1.0, 2.0));
    let solver = ClueSolver::new(client.clone(), Arc::new(prices), SolveOptions::new("fake/model"));
    let clues = Arc::new(numbered_clues(10));

    let results = solver.solve_all(clues.clone(), 3).await;

    assert_eq!(results.len(), 10);
    for (i, (result, clue)) in results.iter().zip(clues.iter()).enumerate() {
        assert_eq!(result.clue_id, clue.id, "slot {i} holds the wrong clue");
        assert_eq!(result.model, "fake/model");
        assert_eq!(result.pass, i % 2 == 0, "clue {i}");
        assert_eq!(result.tokens, Some(25));
        assert_eq!(result.cost, Some((20.0 * 1.0 + 5.0 * 2.0) / 1_000_000.0));
    }

    // every clue requested exactly once, never more than 3 at a time
    assert_eq!(client.call_count(), 10);
    let distinct: HashSet<String> = client
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, clue)| clue.clone())
        .collect();
    assert_eq!(distinct.len(), 10);
    assert!(client.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn request_error_becomes_failure_record() {
    let client = FakeClient::new(|_, clue| {
        if clue.starts_with("clue number 1 ") {
            Err(ClientError::Status {
                status: 429,
                body: "rate limited".into(),
            })
        } else {
            json_answer(&expected_for(clue), None)
        }
    });

    let solver = ClueSolver::new(
        client.clone(),
        Arc::new(PriceTable::new()),
        SolveOptions::new("fake/model"),
    );
    let results = solver.solve_all(Arc::new(numbered_clues(3)), 2).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].pass);
    assert!(results[2].pass);

    let failed = &results[1];
    assert_eq!(failed.clue_id, "c1");
    assert!(!failed.pass);
    assert_eq!(failed.score, 0.0);
    assert_eq!(failed.answer, "");
    assert!(failed.raw.contains("429"));
    assert!(failed.raw.contains("rate limited"));
    assert_eq!(failed.tokens, Some(0));
    assert_eq!(failed.cost, Some(0.0));
}

#[tokio::test]
async fn missing_usage_is_estimated_from_response_text() {
    let client = FakeClient::new(|_, _| {
        Ok(ChatResponse {
            content: "```json\n{\"answer\":\"ARGON\"}\n```".into(),
            usage: None,
        })
    });
    let solver = ClueSolver::new(
        client,
        Arc::new(PriceTable::new()),
        SolveOptions::new("unknown/model"),
    );
    let clue = Clue {
        id: "1".into(),
        clue: "Gas found in bargain, on reflection (5)".into(),
        answer: "ARGON".into(),
        notes: None,
    };

    let result = solver.solve(0, 1, &clue).await;

    assert!(result.pass);
    assert_eq!(result.answer, "ARGON");
    assert_eq!(result.raw, "{\"answer\":\"ARGON\"}");
    let expected = TokenUsage::estimate_from_text("```json\n{\"answer\":\"ARGON\"}\n```");
    assert_eq!(result.tokens, Some(expected.total_tokens));
    assert_eq!(result.prompt_tokens, Some(expected.prompt_tokens));
    assert_eq!(result.completion_tokens, Some(expected.completion_tokens));
    // unknown model → zero cost
    assert_eq!(result.cost, Some(0.0));
}

#[tokio::test]
async fn request_carries_solve_options() {
    let seen = Arc::new(Mutex::new(None));
    let seen_in_client = seen.clone();

    struct Capture(Arc<Mutex<Option<ChatRequest>>>);

    #[async_trait]
    impl ChatClient for Capture {
        async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
            *self.0.lock().unwrap() = Some(request.clone());
            json_answer("X", None)
        }
    }

    let options = SolveOptions {
        model: "openai/gpt-4o".into(),
        temperature: 0.3,
        max_tokens: 64,
        verbose: true,
    };
    let solver = ClueSolver::new(
        Arc::new(Capture(seen_in_client)),
        Arc::new(PriceTable::builtin()),
        options,
    );
    solver.solve(0, 1, &numbered_clues(1)[0]).await;

    let request = seen.lock().unwrap().clone().unwrap();
    assert_eq!(request.model, "openai/gpt-4o");
    assert_eq!(request.max_tokens, 64);
    assert_eq!(request.temperature, 0.3);
    assert!(!request.stream);
    assert_eq!(request.messages.len(), 2);
    assert!(request.messages[1].content.contains("clue number 0 (5)"));
}

#[tokio::test]
async fn orchestrator_runs_every_model_over_every_clue() {
    let client = FakeClient::new(|model, clue| match model {
        "good/model" => json_answer(&expected_for(clue), Some(TokenUsage::new(10, 2))),
        "half/model" if clue.starts_with("clue number 0 ") => {
            json_answer(&expected_for(clue), Some(TokenUsage::new(10, 2)))
        }
        _ => json_answer("NOPE", Some(TokenUsage::new(10, 2))),
    });

    let settings = RunSettings {
        clue_concurrency: 2,
        model_concurrency: 2,
        ..RunSettings::default()
    };
    let orchestrator = Orchestrator::new(client.clone(), PriceTable::new(), numbered_clues(4), settings);
    let models = vec![
        "good/model".to_string(),
        "half/model".to_string(),
        "bad/model".to_string(),
    ];

    let results = orchestrator.run(&models).await;

    assert_eq!(results.len(), 3);
    assert_eq!(client.call_count(), 12);

    let good = results.get("good/model").unwrap();
    assert_eq!((good.total, good.pass_count), (4, 4));
    assert_eq!(good.pass_rate, 1.0);

    let half = results.get("half/model").unwrap();
    assert_eq!(half.pass_count, 1);
    assert_eq!(half.pass_rate, 0.25);
    assert!(half.results.iter().all(|r| r.model == "half/model"));

    let bad = results.get("bad/model").unwrap();
    assert_eq!(bad.pass_count, 0);
    assert_eq!(bad.total_tokens(), 48);

    let ranking: Vec<String> = results.ranking().into_iter().map(|r| r.model).collect();
    assert_eq!(ranking, vec!["good/model", "half/model", "bad/model"]);
}

fn summary_for(model: &str, passes: &[bool]) -> ModelRunSummary {
    ModelRunSummary::from_results(
        passes
            .iter()
            .enumerate()
            .map(|(i, &pass)| {
                let mut r = grading::ModelResult::failure(model, &format!("c{i}"), "");
                r.pass = pass;
                r.score = if pass { 1.0 } else { 0.0 };
                r
            })
            .collect(),
    )
}

#[test]
fn finalize_merges_into_previous_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results.json");

    let mut previous = BenchmarkResults::new();
    previous.insert("a/model", summary_for("a/model", &[true, false]));
    previous.insert("b/model", summary_for("b/model", &[true, true]));
    save_json(&out, &previous).unwrap();
    let b_before = serde_json::to_string(previous.get("b/model").unwrap()).unwrap();

    let mut fresh = BenchmarkResults::new();
    fresh.insert("a/model", summary_for("a/model", &[true, true]));

    let output = OutputOptions {
        out: Some(out.clone()),
        snapshot_dir: None,
        fresh: false,
    };
    let merged = finalize(fresh, &numbered_clues(2), &output, Utc::now());

    assert_eq!(merged.len(), 2);
    let on_disk = load_results(&out).unwrap();
    assert_eq!(on_disk, merged);
    assert_eq!(on_disk.get("a/model").unwrap().pass_count, 2);
    let b_after = serde_json::to_string(on_disk.get("b/model").unwrap()).unwrap();
    assert_eq!(b_before, b_after);
}

#[test]
fn finalize_keeps_untouched_entries_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results.json");

    // As written by an older run: whole-number floats and a reasoning field.
    let previous = r#"{
  "A": {"total": 1, "passCount": 0, "passRate": 0, "results": []},
  "B": {
    "total": 1,
    "passCount": 1,
    "passRate": 1,
    "results": [
      {"model": "B", "clueId": "c0", "answer": "ARGON", "reasoning": "noble gas",
       "raw": "{\"answer\":\"ARGON\"}", "score": 1, "pass": true}
    ]
  },
  "C": {"total": "not a number"}
}"#;
    std::fs::write(&out, previous).unwrap();
    let before: serde_json::Value = serde_json::from_str(previous).unwrap();

    let mut fresh = BenchmarkResults::new();
    fresh.insert("A", summary_for("A", &[true]));

    let output = OutputOptions {
        out: Some(out.clone()),
        ..OutputOptions::default()
    };
    let merged = finalize(fresh, &numbered_clues(1), &output, Utc::now());

    let after: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(after["B"], before["B"]);
    assert_eq!(
        serde_json::to_string(&after["B"]).unwrap(),
        serde_json::to_string(&before["B"]).unwrap()
    );
    assert_eq!(after["C"], before["C"]);
    assert_eq!(after["A"]["passCount"], 1);

    // the malformed entry stays on disk but is left out of the ranking
    assert_eq!(merged.len(), 2);
    assert!(merged.get("C").is_none());
    assert_eq!(merged.get("B").unwrap().pass_rate, 1.0);
}

#[test]
fn finalize_fresh_overwrites_and_writes_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results.json");
    let snapshots = dir.path().join("data");

    let mut previous = BenchmarkResults::new();
    previous.insert("old/model", summary_for("old/model", &[true]));
    save_json(&out, &previous).unwrap();

    let mut fresh = BenchmarkResults::new();
    fresh.insert("new/model", summary_for("new/model", &[false]));

    let output = OutputOptions {
        out: Some(out.clone()),
        snapshot_dir: Some(snapshots.clone()),
        fresh: true,
    };
    let finished_at = Utc.with_ymd_and_hms(2025, 12, 26, 11, 43, 37).unwrap();
    finalize(fresh.clone(), &numbered_clues(1), &output, finished_at);

    assert_eq!(load_results(&out).unwrap(), fresh);
    let snapshot = snapshots.join("results-2025-12-26T11-43-37-000Z.json");
    assert_eq!(load_results(&snapshot).unwrap(), fresh);
}

#[test]
fn finalize_writes_csv_without_merging() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("results.CSV");

    let mut fresh = BenchmarkResults::new();
    fresh.insert("m/model", summary_for("m/model", &[true, false]));

    let output = OutputOptions {
        out: Some(out.clone()),
        ..OutputOptions::default()
    };
    finalize(fresh, &numbered_clues(2), &output, Utc::now());

    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("model,"));
    assert!(lines[1].starts_with("m/model,c0,"));
}
