//! Loader lifecycle tests: preloading, deadlines, caller queries, and full
//! round trips through real loader endpoints.

mod common;

use common::*;
use serde_json::{json, Value};
use xframe_protocol::{
    error_codes, CallArgs, ErrorKind, GetCallerRequest, GetCallerResponse, LoaderPreloadComplete,
    Origin, PluginCallRequest, PluginCallResponse, PluginError, PluginId, PreLoadPluginsRequest,
    PreloadStart, QualifiedPluginId, WireMessage,
};
use xframe_supervisor::testing::MockHost;
use xframe_supervisor::{
    frame_id, ExecContext, ExecError, LoaderEndpoint, Outcome, PluginExecutor,
    ProtocolViolation, RawMessage, SourceKind, Supervisor, SupervisorConfig, SupervisorError, SupervisorEvent,
};

fn preload_starts(sup: &Supervisor<MockHost>, service: &str) -> Vec<PreloadStart> {
    sup.host()
        .posts_to(&frame_id(service))
        .iter()
        .filter_map(|m| PreloadStart::decode(m).ok())
        .collect()
}

fn preload_request(plugins: &[(&str, &str)]) -> Value {
    PreLoadPluginsRequest::new(
        plugins
            .iter()
            .map(|(s, p)| QualifiedPluginId::new(*s, *p))
            .collect(),
    )
    .encode()
    .unwrap()
}

// ============================================================================
// Preload
// ============================================================================

#[test]
fn test_preload_adds_system_plugins_and_skips_host_services() {
    let config = SupervisorConfig {
        system_plugins: vec![QualifiedPluginId::new("accounts", "plugin")],
        ..SupervisorConfig::for_location(SUPERVISOR)
    };
    let mut sup = Supervisor::new(MockHost::new(), config).unwrap();

    let outcome = sup.handle(from_app(preload_request(&[
        ("tokens", "plugin"),
        ("tokens", "ledger"),
        ("wasi", "filesystem"),
        ("host", "common"),
    ])));
    assert_eq!(outcome, Outcome::Handled);

    let mut frames: Vec<String> = sup
        .host()
        .created_frames()
        .into_iter()
        .map(|f| f.service)
        .collect();
    frames.sort();
    assert_eq!(frames, vec!["accounts".to_string(), "tokens".to_string()]);

    // PRELOAD_START waits for the loader to initialize
    assert!(preload_starts(&sup, "tokens").is_empty());
    loader_ready(&mut sup, "tokens");
    loader_ready(&mut sup, "accounts");
    assert_eq!(
        preload_starts(&sup, "tokens"),
        vec![PreloadStart::new(vec!["plugin".to_string(), "ledger".to_string()])]
    );
    assert_eq!(
        preload_starts(&sup, "accounts"),
        vec![PreloadStart::new(vec!["plugin".to_string()])]
    );
}

#[test]
fn test_preload_is_idempotent() {
    let mut sup = supervisor();
    sup.handle(from_app(preload_request(&[("tokens", "plugin")])));
    loader_ready(&mut sup, "tokens");
    sup.handle(from_app(preload_request(&[("tokens", "plugin")])));

    assert_eq!(preload_starts(&sup, "tokens").len(), 1);
    assert_eq!(sup.host().created_frames().len(), 1);

    sup.handle(from_app(preload_request(&[("tokens", "plugin"), ("tokens", "extra")])));
    let starts = preload_starts(&sup, "tokens");
    assert_eq!(starts.len(), 2);
    assert_eq!(starts[1].plugins, vec!["extra".to_string()]);
}

#[test]
fn test_preload_complete_loads_dependencies() {
    let mut sup = supervisor();
    sup.handle(from_app(preload_request(&[("tokens", "plugin")])));
    loader_ready(&mut sup, "tokens");

    let done = LoaderPreloadComplete::new(json!({
        "dependencies": [
            { "service": "accounts", "plugin": "plugin" },
            { "service": "tokens", "plugin": "plugin" },
            { "service": "wasi", "plugin": "io" }
        ]
    }));
    assert_eq!(
        sup.handle(from_loader("tokens", done.encode().unwrap())),
        Outcome::Handled
    );
    assert!(sup.loaders().contains("accounts"));
    assert!(!sup.loaders().contains("wasi"));
    loader_ready(&mut sup, "accounts");
    assert_eq!(preload_starts(&sup, "accounts").len(), 1);
    // Already registered; no second PRELOAD_START
    assert_eq!(preload_starts(&sup, "tokens").len(), 1);
}

#[test]
fn test_preload_complete_without_dependencies_only_logs() {
    let mut sup = supervisor();
    sup.handle(from_app(preload_request(&[("tokens", "plugin")])));
    let done = LoaderPreloadComplete::new(json!({ "plugins": ["plugin"] }));
    assert_eq!(
        sup.handle(from_loader("tokens", done.encode().unwrap())),
        Outcome::Handled
    );
    assert!(sup.host().has_log_containing("Preload complete"));
    assert_eq!(sup.loaders().len(), 1);
}

// ============================================================================
// Deadlines
// ============================================================================

#[test]
fn test_deadline_expiry_discards_loader_and_reports_timeout() {
    let mut sup = supervisor();
    sup.host().set_time(1_000);
    call_ready(&mut sup, "tokens", "credit");
    assert_eq!(sup.next_deadline(), Some(31_000));

    sup.host().set_time(30_999);
    assert_eq!(sup.handle(SupervisorEvent::Tick), Outcome::Ignored);
    assert_eq!(sup.stack_depth(), 1);

    sup.host().set_time(31_000);
    let outcome = sup.handle(SupervisorEvent::Tick);
    assert_eq!(
        outcome,
        Outcome::Aborted(SupervisorError::Timeout {
            service: "tokens".to_string()
        })
    );
    assert!(sup.is_idle());
    assert_eq!(sup.next_deadline(), None);
    assert_eq!(sup.host().removed_frames(), vec![frame_id("tokens")]);
    assert!(!sup.loaders().contains("tokens"));

    let err = PluginError::from_result(&final_responses(&sup)[0].result).unwrap();
    assert_eq!(err.kind, ErrorKind::Unrecoverable);
    assert_eq!(err.code, error_codes::TIMEOUT);

    // The next call gets a fresh loader
    start_call(&mut sup, args("tokens", "credit"));
    assert_eq!(sup.host().created_frames().len(), 2);
}

#[test]
fn test_loader_recreated_after_timeout_is_preloaded_again() {
    let mut sup = supervisor();
    sup.handle(from_app(preload_request(&[("tokens", "plugin")])));
    loader_ready(&mut sup, "tokens");
    assert_eq!(preload_starts(&sup, "tokens").len(), 1);

    start_call(&mut sup, args("tokens", "credit"));
    sup.host().advance_time(40_000);
    assert!(matches!(
        sup.handle(SupervisorEvent::Tick),
        Outcome::Aborted(SupervisorError::Timeout { .. })
    ));
    assert!(!sup.managers().has_service("tokens"));

    sup.handle(from_app(preload_request(&[("tokens", "plugin")])));
    assert_eq!(sup.host().created_frames().len(), 2);
    loader_ready(&mut sup, "tokens");
    // The replacement frame shares the DOM id; the second start went to it
    assert_eq!(
        preload_starts(&sup, "tokens"),
        vec![
            PreloadStart::new(vec!["plugin".to_string()]),
            PreloadStart::new(vec!["plugin".to_string()]),
        ]
    );
}

#[test]
fn test_deadline_covers_uninitialized_loader() {
    let mut sup = supervisor();
    start_call(&mut sup, args("tokens", "credit"));
    sup.host().advance_time(30_000);
    assert!(matches!(
        sup.handle(SupervisorEvent::Tick),
        Outcome::Aborted(SupervisorError::Timeout { .. })
    ));
}

#[test]
fn test_deadline_disabled() {
    let config = SupervisorConfig {
        call_timeout_ms: None,
        ..config()
    };
    let mut sup = Supervisor::new(MockHost::new(), config).unwrap();
    call_ready(&mut sup, "tokens", "credit");
    assert_eq!(sup.next_deadline(), None);
    sup.host().advance_time(u64::MAX / 2);
    assert_eq!(sup.handle(SupervisorEvent::Tick), Outcome::Ignored);
}

#[test]
fn test_nested_call_restarts_deadline() {
    let mut sup = supervisor();
    call_ready(&mut sup, "tokens", "credit");
    sup.host().advance_time(20_000);
    sync_call(&mut sup, "tokens", args("accounts", "get"));
    assert_eq!(sup.next_deadline(), Some(50_000));
    assert_eq!(sup.in_flight().unwrap().service, "accounts");
}

// ============================================================================
// Caller queries
// ============================================================================

#[test]
fn test_active_loader_can_ask_for_its_caller() {
    let mut sup = supervisor();
    call_ready(&mut sup, "tokens", "credit");
    let outcome = sup.handle(from_loader(
        "tokens",
        json!({ "type": "GET_CALLER_REQUEST", "id": "q1" }),
    ));
    assert_eq!(outcome, Outcome::Handled);

    let reply = sup
        .host()
        .posts_to(&frame_id("tokens"))
        .iter()
        .find_map(|m| GetCallerResponse::decode(m).ok())
        .unwrap();
    assert_eq!(reply.id, "q1");
    assert_eq!(reply.caller.origin, Origin::from(APP));
    assert_eq!(reply.caller.app.as_deref(), Some("app"));
}

#[test]
fn test_inactive_loader_cannot_ask_for_its_caller() {
    let mut sup = supervisor();
    call_ready(&mut sup, "tokens", "credit");
    sync_call(&mut sup, "tokens", args("accounts", "get"));
    let outcome = sup.handle(from_loader(
        "tokens",
        json!({ "type": "GET_CALLER_REQUEST", "id": "q1" }),
    ));
    assert_eq!(
        outcome,
        Outcome::Aborted(SupervisorError::Protocol(
            ProtocolViolation::CallerQueryFromInactive {
                service: "tokens".to_string()
            }
        ))
    );
}

// ============================================================================
// Round trips through loader endpoints
// ============================================================================

/// Credits an account after checking its balance with `accounts`.
#[derive(Default)]
struct Tokens {
    runs: usize,
}

impl PluginExecutor for Tokens {
    fn preload(&mut self, _plugins: &[PluginId]) -> Vec<QualifiedPluginId> {
        vec![QualifiedPluginId::new("accounts", "plugin")]
    }

    fn execute(&mut self, args: &CallArgs, ctx: &mut ExecContext<'_>) -> Result<Value, ExecError> {
        self.runs += 1;
        let amount = args.params.get(1).and_then(Value::as_i64).unwrap_or(0);
        let account = ctx.call(CallArgs::new(
            "accounts",
            "plugin",
            "accounts",
            "get_balance",
            vec![args.params[0].clone()],
        ))?;
        let balance = account["balance"].as_i64().unwrap_or(0);
        if balance < amount {
            return Err(PluginError::recoverable(None, "insufficient balance").into());
        }
        Ok(json!({ "ok": true, "remaining": balance - amount }))
    }
}

struct Accounts;

impl PluginExecutor for Accounts {
    fn execute(&mut self, _args: &CallArgs, _ctx: &mut ExecContext<'_>) -> Result<Value, ExecError> {
        Ok(json!({ "balance": 10 }))
    }
}

struct Network {
    sup: Supervisor<MockHost>,
    tokens: LoaderEndpoint<Tokens, MockHost>,
    accounts: LoaderEndpoint<Accounts, MockHost>,
    announced: Vec<String>,
}

impl Network {
    fn new() -> Self {
        Self {
            sup: supervisor(),
            tokens: LoaderEndpoint::new("tokens", SUPERVISOR, Tokens::default(), MockHost::new()),
            accounts: LoaderEndpoint::new("accounts", SUPERVISOR, Accounts, MockHost::new()),
            announced: Vec::new(),
        }
    }

    /// Deliver messages until every window is quiet.
    fn pump(&mut self) {
        let supervisor: Origin = SUPERVISOR.into();
        loop {
            let mut moved = false;

            for frame in self.sup.host().created_frames() {
                if !self.announced.contains(&frame.service) {
                    self.announced.push(frame.service.clone());
                    match frame.service.as_str() {
                        "tokens" => self.tokens.announce().unwrap(),
                        "accounts" => self.accounts.announce().unwrap(),
                        other => panic!("unexpected loader {other}"),
                    }
                }
            }

            for post in self.sup.host().drain_frame_posts() {
                moved = true;
                if post.frame_id == frame_id("tokens") {
                    self.tokens.handle(&supervisor, &post.message).unwrap();
                } else if post.frame_id == frame_id("accounts") {
                    self.accounts.handle(&supervisor, &post.message).unwrap();
                }
            }

            for (service, host) in [("tokens", self.tokens.host()), ("accounts", self.accounts.host())] {
                for post in host.drain_parent_posts() {
                    moved = true;
                    let raw = RawMessage::new(service_origin(service), SourceKind::Child, post.message);
                    self.sup.handle(raw.into());
                }
            }

            if !moved {
                break;
            }
        }
    }
}

#[test]
fn test_round_trip_replays_nested_call() {
    let mut net = Network::new();
    let transfer = CallArgs::new("tokens", "plugin", "transfer", "credit", vec![json!("alice"), json!(4)]);
    start_call(&mut net.sup, transfer.clone());
    net.pump();

    let responses = final_responses(&net.sup);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].args, transfer);
    assert_eq!(responses[0].result, json!({ "ok": true, "remaining": 6 }));
    // First run stops at the balance lookup, second run completes
    assert_eq!(net.tokens.executor().runs, 2);
    assert!(net.tokens.host().has_log_containing("[loader:tokens] Call"));
    assert!(net.sup.is_idle());
}

#[test]
fn test_round_trip_recoverable_error_reaches_app_as_unrecoverable() {
    let mut net = Network::new();
    start_call(
        &mut net.sup,
        CallArgs::new("tokens", "plugin", "transfer", "credit", vec![json!("alice"), json!(50)]),
    );
    net.pump();

    let err = PluginError::from_result(&final_responses(&net.sup)[0].result).unwrap();
    assert_eq!(err.kind, ErrorKind::Unrecoverable);
    assert_eq!(err.message, "insufficient balance");
    assert_eq!(err.producer, Some(QualifiedPluginId::new("tokens", "plugin")));
}

#[test]
fn test_round_trip_preload_follows_dependencies() {
    let mut net = Network::new();
    net.sup.handle(from_app(preload_request(&[("tokens", "plugin")])));
    net.pump();

    assert!(net.sup.loaders().contains("accounts"));
    assert!(net.sup.loaders().get("accounts").unwrap().is_ready());
    assert!(net.sup.managers().contains("accounts", "plugin"));
    assert!(net.accounts.host().has_log_containing("Prepared plugin"));
}

/// Reports who called it.
#[derive(Default)]
struct Whoami {
    runs: usize,
}

impl PluginExecutor for Whoami {
    fn execute(&mut self, _args: &CallArgs, ctx: &mut ExecContext<'_>) -> Result<Value, ExecError> {
        self.runs += 1;
        let caller = ctx.caller()?;
        Ok(json!({ "origin": caller.origin, "app": caller.app }))
    }
}

/// Deliver messages between `sup` and its only loader until both are quiet.
fn pump_single<E: PluginExecutor>(
    sup: &mut Supervisor<MockHost>,
    loader: &mut LoaderEndpoint<E, MockHost>,
) {
    let supervisor: Origin = SUPERVISOR.into();
    loop {
        let mut moved = false;
        for post in sup.host().drain_frame_posts() {
            moved = true;
            loader.handle(&supervisor, &post.message).unwrap();
        }
        for post in loader.host().drain_parent_posts() {
            moved = true;
            let origin = service_origin(loader.service());
            sup.handle(RawMessage::new(origin, SourceKind::Child, post.message).into());
        }
        if !moved {
            break;
        }
    }
}

#[test]
fn test_round_trip_executor_fetches_its_caller() {
    let mut sup = supervisor();
    let mut loader = LoaderEndpoint::new("tokens", SUPERVISOR, Whoami::default(), MockHost::new());
    start_call(&mut sup, args("tokens", "whoami"));
    loader.announce().unwrap();
    pump_single(&mut sup, &mut loader);

    let responses = final_responses(&sup);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].result, json!({ "origin": APP, "app": "app" }));
    // Suspended on the caller, then replayed by the endpoint
    assert_eq!(loader.executor().runs, 2);
    let dispatches = sup
        .host()
        .get_log()
        .iter()
        .filter(|line| line.contains("Dispatched call"))
        .count();
    assert_eq!(dispatches, 1);
    assert!(loader.caller().is_none());
    assert!(sup.is_idle());
}

#[test]
fn test_caller_does_not_leak_into_the_next_call() {
    let supervisor: Origin = SUPERVISOR.into();
    let mut loader = LoaderEndpoint::new("tokens", SUPERVISOR, Whoami::default(), MockHost::new());
    let request = |id: &str| {
        PluginCallRequest::new(id, args("tokens", "whoami"), Vec::new())
            .encode()
            .unwrap()
    };
    let caller_response = |id: &str, origin: &str| {
        json!({
            "type": "GET_CALLER_RESPONSE",
            "id": id,
            "caller": { "app": null, "origin": origin }
        })
    };

    // Unsolicited answers are dropped
    assert!(!loader
        .handle(&supervisor, &caller_response("tokens-caller-0", "https://a.example.com"))
        .unwrap());

    assert!(loader.handle(&supervisor, &request("1")).unwrap());
    let asked = GetCallerRequest::decode(&loader.host().drain_parent_posts()[0].message).unwrap();
    assert_eq!(asked.id, "tokens-caller-1");

    assert!(loader
        .handle(&supervisor, &caller_response(&asked.id, "https://a.example.com"))
        .unwrap());
    let answered = PluginCallResponse::decode(&loader.host().drain_parent_posts()[0].message).unwrap();
    assert_eq!(answered.id, "1");
    assert_eq!(answered.result["origin"], json!("https://a.example.com"));

    // A new call starts without a caller and asks again
    assert!(loader.handle(&supervisor, &request("99")).unwrap());
    let posts = loader.host().drain_parent_posts();
    assert_eq!(posts.len(), 1);
    assert!(PluginCallResponse::decode(&posts[0].message).is_err());
    assert_eq!(
        GetCallerRequest::decode(&posts[0].message).unwrap().id,
        "tokens-caller-2"
    );

    // A late answer for the finished call is not applied to the new one
    assert!(!loader
        .handle(&supervisor, &caller_response(&asked.id, "https://a.example.com"))
        .unwrap());
    assert!(loader.host().parent_posts().is_empty());
}

#[test]
fn test_endpoint_ignores_foreign_origins() {
    let mut loader = LoaderEndpoint::new("accounts", SUPERVISOR, Accounts, MockHost::new());
    let request = json!({
        "type": "PLUGIN_CALL_REQUEST",
        "id": "1",
        "args": args("accounts", "get"),
        "resultCache": []
    });
    assert!(!loader.handle(&Origin::from(APP), &request).unwrap());
    assert!(loader.host().parent_posts().is_empty());
    assert!(loader.handle(&Origin::from(SUPERVISOR), &request).unwrap());
    assert_eq!(loader.host().parent_posts().len(), 1);
}
