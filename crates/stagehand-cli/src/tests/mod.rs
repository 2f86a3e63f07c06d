//! Runtime tests using a scripted worker session.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use stagehand_config::Config;
use stagehand_host::{
    HostError, MonitoringTarget, PositionUpdate, ShutdownOutcome, ShutdownStage,
};
use stagehand_protocol::Response;

use crate::config::ConfigLoader;
use crate::errors::AppError;
use crate::run_with;
use crate::session::{Launcher, Session};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Journal {
    launched: bool,
    forwarded: Vec<String>,
    calls: Vec<(String, Vec<Value>)>,
    watched: Vec<MonitoringTarget>,
    waits: Vec<Duration>,
    closed: bool,
}

struct StaticLoader(Config);

impl ConfigLoader for StaticLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct ScriptedLauncher {
    journal: Rc<RefCell<Journal>>,
    responses: RefCell<VecDeque<Response>>,
    updates: RefCell<VecDeque<PositionUpdate>>,
    refuse: bool,
}

impl ScriptedLauncher {
    fn respond(self, response: Response) -> Self {
        self.responses.borrow_mut().push_back(response);
        self
    }

    fn publish(self, target: &str, result: Result<i64, &str>) -> Self {
        let target: MonitoringTarget = target.parse().expect("valid target");
        self.updates.borrow_mut().push_back(PositionUpdate {
            target,
            result: result.map_err(str::to_owned),
        });
        self
    }

    fn journal(&self) -> std::cell::Ref<'_, Journal> {
        self.journal.borrow()
    }
}

impl Launcher for ScriptedLauncher {
    type Session = ScriptedSession;

    fn launch(&self, _config: &Config, forwarded: &[String]) -> Result<ScriptedSession, AppError> {
        if self.refuse {
            return Err(AppError::Start(HostError::StartupFailed { exit_code: Some(3) }));
        }
        {
            let mut journal = self.journal.borrow_mut();
            journal.launched = true;
            journal.forwarded = forwarded.to_vec();
        }
        Ok(ScriptedSession {
            journal: Rc::clone(&self.journal),
            responses: self.responses.take(),
            updates: self.updates.take(),
        })
    }
}

struct ScriptedSession {
    journal: Rc<RefCell<Journal>>,
    responses: VecDeque<Response>,
    updates: VecDeque<PositionUpdate>,
}

impl Session for ScriptedSession {
    fn call(&mut self, name: &str, args: Vec<Value>) -> Response {
        self.journal.borrow_mut().calls.push((name.to_owned(), args));
        self.responses.pop_front().unwrap_or_else(Response::timeout)
    }

    fn watch(&mut self, target: MonitoringTarget) {
        self.journal.borrow_mut().watched.push(target);
    }

    fn next_update(&mut self, timeout: Duration) -> Option<PositionUpdate> {
        self.journal.borrow_mut().waits.push(timeout);
        self.updates.pop_front()
    }

    fn close(self) -> ShutdownOutcome {
        self.journal.borrow_mut().closed = true;
        ShutdownOutcome {
            stage: ShutdownStage::Cooperative,
            exit_code: Some(0),
        }
    }
}

struct Outcome {
    exit: ExitCode,
    stdout: String,
    stderr: String,
}

fn invoke(launcher: &ScriptedLauncher, args: &[&str]) -> Outcome {
    invoke_with(Config::default(), launcher, args)
}

fn invoke_with(config: Config, launcher: &ScriptedLauncher, args: &[&str]) -> Outcome {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let argv = std::iter::once("stagehand")
        .chain(args.iter().copied())
        .map(OsString::from);
    let exit = run_with(argv, &mut stdout, &mut stderr, &StaticLoader(config), launcher);
    Outcome {
        exit,
        stdout: String::from_utf8(stdout).expect("utf8 stdout"),
        stderr: String::from_utf8(stderr).expect("utf8 stderr"),
    }
}

#[fixture]
fn launcher() -> ScriptedLauncher {
    ScriptedLauncher::default()
}

// ---------------------------------------------------------------------------
// call / devices
// ---------------------------------------------------------------------------

#[rstest]
fn call_prints_the_payload_and_stops_the_worker(launcher: ScriptedLauncher) {
    let launcher = launcher.respond(Response::success(1200));

    let outcome = invoke(&launcher, &["call", "get_position", "97251312", "1"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert_eq!(outcome.stdout, "1200\n");
    let journal = launcher.journal();
    assert_eq!(
        journal.calls,
        vec![("get_position".to_owned(), vec![json!(97_251_312), json!(1)])]
    );
    assert!(journal.closed);
}

#[rstest]
fn call_arguments_keep_negative_numbers_and_strings(launcher: ScriptedLauncher) {
    let launcher = launcher.respond(Response::success("Jog complete"));

    let outcome = invoke(&launcher, &["call", "jog", "SN-1", "1", "-1", "[100]"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert_eq!(outcome.stdout, "\"Jog complete\"\n");
    assert_eq!(
        launcher.journal().calls,
        vec![(
            "jog".to_owned(),
            vec![json!("SN-1"), json!(1), json!(-1), json!("[100]")]
        )]
    );
}

#[rstest]
fn error_responses_fail_with_the_worker_message(launcher: ScriptedLauncher) {
    let launcher = launcher.respond(Response::error(
        "Failed to connect to device 97251312: device not found",
    ));

    let outcome = invoke(&launcher, &["call", "get_position", "97251312", "1"]);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stdout.is_empty());
    assert!(
        outcome
            .stderr
            .contains("Failed to connect to device 97251312"),
        "stderr: {}",
        outcome.stderr
    );
    assert!(launcher.journal().closed);
}

#[rstest]
#[case(Response::timeout(), "'move_to' timed out")]
#[case(Response::unavailable(), "the worker is unavailable")]
fn synthesised_responses_are_reported(
    launcher: ScriptedLauncher,
    #[case] response: Response,
    #[case] expected: &str,
) {
    let launcher = launcher.respond(response);

    let outcome = invoke(&launcher, &["call", "move_to", "97251312", "1", "10"]);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stderr.contains(expected), "stderr: {}", outcome.stderr);
}

#[rstest]
fn devices_lists_through_the_worker(launcher: ScriptedLauncher) {
    let launcher = launcher.respond(Response::success(json!(["97251312"])));

    let outcome = invoke(&launcher, &["devices"]);

    assert_eq!(outcome.stdout, "[\"97251312\"]\n");
    assert_eq!(
        launcher.journal().calls,
        vec![("list_devices".to_owned(), Vec::new())]
    );
}

#[rstest]
fn configuration_flags_are_forwarded_to_the_worker(launcher: ScriptedLauncher) {
    let launcher = launcher.respond(Response::success(json!([])));

    let outcome = invoke(
        &launcher,
        &["--config-path", "bench.toml", "--log-filter=debug", "devices"],
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert_eq!(
        launcher.journal().forwarded,
        vec!["--config-path", "bench.toml", "--log-filter=debug"]
    );
}

// ---------------------------------------------------------------------------
// monitor
// ---------------------------------------------------------------------------

#[rstest]
fn monitor_prints_updates_until_every_target_reports(launcher: ScriptedLauncher) {
    let launcher = launcher
        .publish("97251312:1", Ok(1200))
        .publish("97251312:2", Err("timeout"))
        .publish("97251312:1", Ok(1210))
        .publish("97251312:2", Ok(40))
        .publish("97251312:1", Ok(1220));

    let outcome = invoke(
        &launcher,
        &["monitor", "97251312:1", "97251312:2", "--cycles", "2"],
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    let lines: Vec<Value> = outcome
        .stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(
        lines,
        vec![
            json!({"target": "97251312:1", "position": 1200}),
            json!({"target": "97251312:2", "error": "timeout"}),
            json!({"target": "97251312:1", "position": 1210}),
            json!({"target": "97251312:2", "position": 40}),
        ]
    );
    let journal = launcher.journal();
    assert_eq!(journal.watched.len(), 2);
    assert!(journal.closed);
}

#[rstest]
fn monitor_waits_long_enough_for_slow_targets(launcher: ScriptedLauncher) {
    let launcher = launcher.publish("97251312:1", Ok(5));
    let config = Config {
        poll_period_ms: 200,
        poll_timeout_ms: 500,
        ..Config::default()
    };

    let outcome = invoke_with(config, &launcher, &["monitor", "97251312:1"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert_eq!(launcher.journal().waits, vec![Duration::from_millis(1_700)]);
}

#[rstest]
fn monitor_fails_when_updates_stop(launcher: ScriptedLauncher) {
    let outcome = invoke(&launcher, &["monitor", "97251312:1"]);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.contains("no position update within"),
        "stderr: {}",
        outcome.stderr
    );
    assert!(launcher.journal().closed);
}

// ---------------------------------------------------------------------------
// usage and startup
// ---------------------------------------------------------------------------

#[rstest]
#[case(&["monitor", "97251312"])]
#[case(&["monitor", "97251312:1", "--cycles", "0"])]
#[case(&["call"])]
#[case(&[])]
fn usage_errors_never_start_the_worker(launcher: ScriptedLauncher, #[case] args: &[&str]) {
    let outcome = invoke(&launcher, args);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stderr.starts_with("stagehand: "));
    assert!(!launcher.journal().launched);
}

#[rstest]
fn help_goes_to_stdout(launcher: ScriptedLauncher) {
    let outcome = invoke(&launcher, &["--help"]);

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert!(outcome.stdout.contains("Usage"), "stdout: {}", outcome.stdout);
}

#[rstest]
fn startup_failures_are_reported() {
    let launcher = ScriptedLauncher {
        refuse: true,
        ..ScriptedLauncher::default()
    };

    let outcome = invoke(&launcher, &["devices"]);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome
            .stderr
            .contains("failed to start the worker: worker exited during startup with code 3"),
        "stderr: {}",
        outcome.stderr
    );
}
