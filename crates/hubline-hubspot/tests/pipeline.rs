//! End-to-end pulls against a scripted HubSpot and the in-memory warehouse
//!
//! Run with: cargo test -p hubline-hubspot --test pipeline

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hubline_core::{CancelToken, Cancelled, HttpError, Pause, ProgressContext, SharedProgress};
use hubline_hubspot::{
    Config, Outcome, Pipeline, PullState, RawResponse, Resource, RunSummary, Transport, run,
};
use hubline_warehouse::{ColumnType, MemoryWarehouse};
use serde_json::{Value, json};
use tempfile::TempDir;

const BASE: &str = "https://api.example.test";

/// Serves canned responses per endpoint prefix, so parallel workers each
/// see their own script regardless of interleaving.
#[derive(Default)]
struct RoutedTransport {
    routes: Mutex<Vec<(String, VecDeque<RawResponse>)>>,
    requests: Mutex<Vec<String>>,
}

impl RoutedTransport {
    fn route(&self, prefix: &str, status: u16, retry_after: Option<&str>, body: Value) -> &Self {
        let response = RawResponse {
            status,
            retry_after: retry_after.map(str::to_string),
            body: body.to_string(),
        };
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, queue)) => queue.push_back(response),
            None => routes.push((prefix.to_string(), VecDeque::from([response]))),
        }
        self
    }

    fn page(&self, prefix: &str, body: Value) -> &Self {
        self.route(prefix, 200, None, body)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn requests_for(&self, prefix: &str) -> Vec<String> {
        let full = format!("{BASE}{prefix}");
        self.requests()
            .into_iter()
            .filter(|u| u.starts_with(&full))
            .collect()
    }
}

impl Transport for RoutedTransport {
    fn get(&self, url: &str, _token: &str) -> Result<RawResponse, HttpError> {
        self.requests.lock().unwrap().push(url.to_string());
        let path = url.strip_prefix(BASE).unwrap_or(url);
        let mut routes = self.routes.lock().unwrap();
        // Longest prefix wins so "/a" and "/a/props" do not shadow each other
        routes
            .iter_mut()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .and_then(|(_, queue)| queue.pop_front())
            .ok_or_else(|| HttpError::Network(format!("no scripted response for {url}")))
    }
}

#[derive(Default)]
struct RecordingPause {
    pauses: Mutex<Vec<Duration>>,
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Cancelled> {
        self.pauses.lock().unwrap().push(duration);
        if cancel.is_cancelled() { Err(Cancelled) } else { Ok(()) }
    }
}

struct Env {
    dir: TempDir,
    transport: Arc<RoutedTransport>,
    warehouse: Arc<MemoryWarehouse>,
    pause: Arc<RecordingPause>,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
            transport: Arc::new(RoutedTransport::default()),
            warehouse: Arc::new(MemoryWarehouse::new()),
            pause: Arc::new(RecordingPause::default()),
        }
    }

    fn state_path(&self) -> std::path::PathBuf {
        self.dir.path().join("hubspot_state.json")
    }

    fn config(&self, resources: Vec<Resource>) -> Config {
        let mut config = Config::new("test-token");
        config.api.base_url = BASE.to_string();
        config.state_path = self.state_path();
        config.resources = resources;
        config
    }

    fn run(&self, config: Config) -> RunSummary {
        let pipeline = Pipeline::new(
            config,
            self.transport.clone(),
            self.warehouse.clone(),
            self.pause.clone(),
            CancelToken::new(),
        );
        let progress: SharedProgress = Arc::new(ProgressContext::with_tty(false));
        run(&pipeline, &progress).expect("run should not error")
    }

    fn state(&self) -> Value {
        let raw = std::fs::read_to_string(self.state_path()).expect("state file");
        serde_json::from_str(&raw).expect("state file is JSON")
    }

    fn write_state(&self, value: &str) {
        std::fs::write(self.state_path(), value).unwrap();
    }
}

fn contacts() -> Resource {
    Resource::new("contacts", "/crm/v3/objects/contacts")
}

fn record(id: &str, updated_at: &str) -> Value {
    json!({
        "id": id,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": updated_at,
        "properties": {"email": format!("{id}@example.com")}
    })
}

fn page(records: Vec<Value>, next: Option<&str>) -> Value {
    match next {
        Some(after) => json!({"results": records, "paging": {"next": {"after": after}}}),
        None => json!({"results": records}),
    }
}

#[test]
fn single_record_page_end_to_end() {
    let env = Env::new();
    env.transport.page(
        "/crm/v3/objects/contacts",
        json!({"results": [{
            "id": "1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "properties": {"email": "a@b.com", "score": 5}
        }]}),
    );

    let summary = env.run(env.config(vec![contacts()]));
    assert_eq!(summary.exit_code(), 0);

    let table = env.warehouse.table("contacts").expect("table created");
    let columns: Vec<(&str, ColumnType)> = table
        .schema
        .columns()
        .iter()
        .map(|c| (c.name.as_str(), c.column_type))
        .collect();
    assert_eq!(
        columns,
        [
            ("id", ColumnType::String),
            ("createdAt", ColumnType::Timestamp),
            ("updatedAt", ColumnType::Timestamp),
            ("email", ColumnType::String),
            ("score", ColumnType::Int64),
        ]
    );

    assert_eq!(table.rows.len(), 1);
    assert_eq!(
        Value::Object(table.rows[0].values.clone()),
        json!({
            "id": "1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "email": "a@b.com",
            "score": 5
        })
    );

    assert_eq!(
        env.state(),
        json!({"contacts": {"after": null, "timestamp": "2024-01-02T00:00:00Z"}})
    );
    assert_eq!(env.transport.requests().len(), 1);
}

#[test]
fn cursor_round_trips_into_next_request() {
    let env = Env::new();
    let cursor = "MTAwMA==";
    env.transport
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("1", "2024-01-01T00:00:00Z")], Some(cursor)),
        )
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("2", "2024-01-02T00:00:00Z")], None),
        );

    let summary = env.run(env.config(vec![contacts()]));
    assert_eq!(summary.resources[0].pages, 2);
    assert_eq!(
        env.transport.requests()[1],
        format!("{BASE}/crm/v3/objects/contacts?after={cursor}")
    );
    // Completed sweep: cursor cleared, watermark kept
    assert_eq!(
        env.state()["contacts"],
        json!({"after": null, "timestamp": "2024-01-02T00:00:00Z"})
    );
}

#[test]
fn watermark_never_decreases() {
    const PRIOR: &str = "2024-06-01T00:00:00Z";
    const FEB: &str = "2024-02-01T00:00:00Z";
    const MAR: &str = "2024-03-01T00:00:00Z";
    const MID_JUN: &str = "2024-06-15T00:00:00Z";
    // 2024-06-30T22:00:00Z, later than MID_JUN despite the smaller string
    const LATEST: &str = "2024-07-01T00:00:00+02:00";

    let cases: Vec<(Vec<Vec<&str>>, &str)> = vec![
        (vec![vec![MAR, LATEST], vec![FEB]], LATEST),
        (vec![vec![LATEST, MAR], vec![FEB]], LATEST),
        (vec![vec![FEB], vec![MAR, LATEST]], LATEST),
        (vec![vec![FEB], vec![LATEST, MAR]], LATEST),
        (vec![vec![MID_JUN], vec![LATEST], vec![MAR]], LATEST),
        (vec![vec![LATEST], vec![MID_JUN], vec![FEB]], LATEST),
        (vec![vec![MAR], vec![MID_JUN, FEB], vec![LATEST]], LATEST),
        (vec![vec![MID_JUN], vec![FEB]], MID_JUN),
        (vec![vec![FEB], vec![MAR]], PRIOR),
    ];

    for (pages, expected) in cases {
        let env = Env::new();
        env.write_state(&format!(
            r#"{{"contacts": {{"after": null, "timestamp": "{PRIOR}"}}}}"#
        ));
        let mut id = 0;
        for (i, stamps) in pages.iter().enumerate() {
            let records = stamps
                .iter()
                .map(|ts| {
                    id += 1;
                    record(&id.to_string(), ts)
                })
                .collect();
            let next = (i + 1 < pages.len()).then(|| format!("p{}", i + 2));
            env.transport
                .page("/crm/v3/objects/contacts", page(records, next.as_deref()));
        }

        let summary = env.run(env.config(vec![contacts()]));
        assert_eq!(summary.resources[0].outcome, Outcome::Done, "{pages:?}");
        assert_eq!(
            env.state()["contacts"]["timestamp"],
            json!(expected),
            "{pages:?}"
        );
        let first = &env.transport.requests()[0];
        assert!(first.ends_with(&format!("?since={PRIOR}")), "{first}");
    }
}

#[test]
fn older_page_keeps_prior_watermark() {
    let env = Env::new();
    env.write_state(r#"{"contacts": {"after": null, "timestamp": "2024-06-01T00:00:00Z"}}"#);
    env.transport.page(
        "/crm/v3/objects/contacts",
        page(vec![record("1", "2024-01-01T00:00:00Z")], None),
    );
    env.run(env.config(vec![contacts()]));
    assert_eq!(env.state()["contacts"]["timestamp"], json!("2024-06-01T00:00:00Z"));
}

#[test]
fn resumes_from_stored_cursor() {
    let env = Env::new();
    env.write_state(r#"{"contacts": {"after": "c5", "timestamp": "2024-01-02T00:00:00Z"}}"#);
    env.transport
        .page("/crm/v3/objects/contacts", page(vec![], None));

    let summary = env.run(env.config(vec![contacts()]));
    assert_eq!(summary.resources[0].outcome, Outcome::Done);
    assert_eq!(
        env.transport.requests(),
        [format!(
            "{BASE}/crm/v3/objects/contacts?since=2024-01-02T00:00:00Z&after=c5"
        )]
    );
    // Nothing loaded, so nothing persisted
    assert_eq!(env.state()["contacts"]["after"], json!("c5"));
}

#[test]
fn invalid_state_file_starts_from_scratch() {
    let env = Env::new();
    env.write_state("{this is not json");
    env.transport.page(
        "/crm/v3/objects/contacts",
        page(vec![record("1", "2024-01-02T00:00:00Z")], None),
    );

    let summary = env.run(env.config(vec![contacts()]));
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(
        env.transport.requests(),
        [format!("{BASE}/crm/v3/objects/contacts")]
    );
    assert_eq!(
        env.state(),
        json!({"contacts": {"after": null, "timestamp": "2024-01-02T00:00:00Z"}})
    );
}

#[test]
fn state_save_failure_does_not_stop_the_pull() {
    let env = Env::new();
    // A regular file where the state directory should be
    let blocker = env.dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    env.transport
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("1", "2024-01-01T00:00:00Z")], Some("p2")),
        )
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("2", "2024-01-02T00:00:00Z")], None),
        );

    let mut config = env.config(vec![contacts()]);
    config.state_path = blocker.join("hubspot_state.json");
    let summary = env.run(config);

    let stats = &summary.resources[0];
    assert_eq!(stats.outcome, Outcome::Done);
    assert_eq!(stats.pages, 2);
    assert_eq!(stats.rows_inserted, 2);
    assert_eq!(stats.watermark.as_deref(), Some("2024-01-02T00:00:00Z"));
    assert_eq!(env.warehouse.rows("contacts").len(), 2);
    assert_eq!(
        env.transport.requests()[1],
        format!("{BASE}/crm/v3/objects/contacts?after=p2")
    );
    assert!(!env.state_path().exists());
}

#[test]
fn table_created_once_across_runs() {
    let env = Env::new();
    env.transport
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("1", "2024-01-01T00:00:00Z")], None),
        )
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("2", "2024-01-02T00:00:00Z")], None),
        );

    env.run(env.config(vec![contacts()]));
    env.run(env.config(vec![contacts()]));

    assert_eq!(env.warehouse.create_calls(), 1);
    assert_eq!(env.warehouse.table_names(), ["contacts"]);
    assert_eq!(env.warehouse.rows("contacts").len(), 2);
}

#[test]
fn failed_batch_does_not_stop_the_pull() {
    let env = Env::new();
    env.transport.page(
        "/crm/v3/objects/contacts",
        page(
            vec![
                record("1", "2024-01-01T00:00:00Z"),
                record("2", "2024-01-02T00:00:00Z"),
                record("3", "2024-01-03T00:00:00Z"),
            ],
            None,
        ),
    );
    env.warehouse.fail_next_insert();

    let mut config = env.config(vec![contacts()]);
    config.batch_size = 1;
    let summary = env.run(config);

    let stats = &summary.resources[0];
    assert_eq!(stats.outcome, Outcome::Done);
    assert_eq!(stats.rows_failed, 1);
    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.rows_inserted, 2);
    assert_eq!(env.warehouse.insert_calls(), 3);
    assert_eq!(env.state()["contacts"]["timestamp"], json!("2024-01-03T00:00:00Z"));
}

#[test]
fn fetch_failure_keeps_last_loaded_state() {
    let env = Env::new();
    env.transport
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("1", "2024-01-01T00:00:00Z")], Some("c1")),
        )
        .route("/crm/v3/objects/contacts", 404, None, json!({"message": "gone"}));

    let summary = env.run(env.config(vec![contacts()]));
    assert_eq!(summary.exit_code(), 1);
    assert!(matches!(summary.resources[0].outcome, Outcome::Failed(_)));
    assert_eq!(
        env.state()["contacts"],
        json!({"after": "c1", "timestamp": "2024-01-01T00:00:00Z"})
    );
}

#[test]
fn first_page_failure_writes_no_state() {
    let env = Env::new();
    env.transport
        .route("/crm/v3/objects/contacts", 401, None, json!({}));

    let summary = env.run(env.config(vec![contacts()]));
    assert_eq!(summary.exit_code(), 1);
    assert!(!env.state_path().exists());
    assert!(env.warehouse.table_names().is_empty());
}

#[test]
fn rate_limit_waits_then_reissues() {
    let env = Env::new();
    env.transport
        .route("/crm/v3/objects/contacts", 429, Some("5"), json!({}))
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("1", "2024-01-01T00:00:00Z")], None),
        );

    let summary = env.run(env.config(vec![contacts()]));
    assert_eq!(summary.exit_code(), 0);
    let requests = env.transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
    let pauses = env.pause.pauses.lock().unwrap().clone();
    assert_eq!(pauses, [Duration::from_secs(5)]);
}

#[test]
fn property_catalogue_requested_first() {
    let env = Env::new();
    env.transport
        .page(
            "/properties/v1/contacts/properties",
            json!([{"name": "email"}, {"name": "firstname"}]),
        )
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("1", "2024-01-01T00:00:00Z")], None),
        );

    env.run(env.config(vec![Resource::contacts()]));
    assert_eq!(
        env.transport.requests(),
        [
            format!("{BASE}/properties/v1/contacts/properties"),
            format!("{BASE}/crm/v3/objects/contacts?properties=email,firstname"),
        ]
    );
}

#[test]
fn resources_pull_in_parallel_without_losing_state() {
    let env = Env::new();
    let companies = Resource::new("companies", "/crm/v3/objects/companies");
    for (prefix, ts) in [
        ("/crm/v3/objects/contacts", "2024-01-0"),
        ("/crm/v3/objects/companies", "2024-02-0"),
    ] {
        env.transport
            .page(
                prefix,
                page(vec![record("1", &format!("{ts}1T00:00:00Z"))], Some("n")),
            )
            .page(
                prefix,
                page(vec![record("2", &format!("{ts}2T00:00:00Z"))], None),
            );
    }

    let summary = env.run(env.config(vec![contacts(), companies]));
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.resources.len(), 2);

    assert_eq!(
        env.state(),
        json!({
            "companies": {"after": null, "timestamp": "2024-02-02T00:00:00Z"},
            "contacts": {"after": null, "timestamp": "2024-01-02T00:00:00Z"}
        })
    );
    assert_eq!(env.warehouse.rows("contacts").len(), 2);
    assert_eq!(env.warehouse.rows("companies").len(), 2);

    // Each resource's pages stay in order
    let companies_requests = env.transport.requests_for("/crm/v3/objects/companies");
    assert_eq!(
        companies_requests,
        [
            format!("{BASE}/crm/v3/objects/companies"),
            format!("{BASE}/crm/v3/objects/companies?after=n"),
        ]
    );
}

#[test]
fn one_failing_resource_does_not_abort_others() {
    let env = Env::new();
    let deals = Resource::new("deals", "/crm/v3/objects/deals");
    env.transport
        .route("/crm/v3/objects/deals", 403, None, json!({"message": "forbidden"}))
        .page(
            "/crm/v3/objects/contacts",
            page(vec![record("1", "2024-01-01T00:00:00Z")], None),
        );

    let summary = env.run(env.config(vec![contacts(), deals]));
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(env.warehouse.rows("contacts").len(), 1);
    assert!(env.state().get("deals").is_none());

    let state: PullState = serde_json::from_value(env.state()["contacts"].clone()).unwrap();
    assert_eq!(state.timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
}
