//! Unit and behavioural tests for the worker.


use mockall::mock;
use mockall::predicate::eq;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use stagehand_protocol::{Command, Response};

use crate::provider::{ChannelSettings, DeviceError, MotionProvider};
use crate::session::ConnectionState;
use crate::{DispatchSettings, Dispatcher, STARTED_BANNER, STOPPED_BANNER, SimulatedProvider, run};

mock! {
    Provider {}
    impl MotionProvider for Provider {
        fn list_devices(&mut self) -> Result<Vec<String>, DeviceError>;
        fn connect(&mut self, device: &str) -> Result<(), DeviceError>;
        fn disconnect(&mut self, device: &str) -> Result<(), DeviceError>;
        fn configure_channel(
            &mut self,
            device: &str,
            channel: u8,
            settings: ChannelSettings,
        ) -> Result<(), DeviceError>;
        fn move_to(&mut self, device: &str, channel: u8, position: i64) -> Result<(), DeviceError>;
        fn position(&mut self, device: &str, channel: u8) -> Result<i64, DeviceError>;
        fn set_zero(&mut self, device: &str, channel: u8) -> Result<(), DeviceError>;
    }
}

const DEVICE: &str = "97251312";

/// A provider whose connect and configure calls always succeed.
fn connected_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider.expect_connect().returning(|_| Ok(()));
    provider
        .expect_configure_channel()
        .returning(|_, _, _| Ok(()));
    provider
}

fn command(name: &str, args: Vec<Value>) -> Command {
    Command::new(name, args)
}

fn dispatch(provider: MockProvider, command: &Command) -> Response {
    Dispatcher::new(provider, DispatchSettings::default()).dispatch(command)
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[rstest]
fn connection_failure_names_the_device() {
    let mut provider = MockProvider::new();
    provider
        .expect_connect()
        .with(eq(DEVICE))
        .once()
        .returning(|device| {
            Err(DeviceError::NotFound {
                device: device.to_owned(),
            })
        });
    let mut dispatcher = Dispatcher::new(provider, DispatchSettings::default());

    let response = dispatcher.dispatch(&command("get_position", vec![json!(DEVICE), json!(1)]));

    assert!(!response.is_success());
    assert_eq!(
        response.message(),
        "Failed to connect to device 97251312: device 97251312 not found"
    );
    assert_eq!(
        dispatcher.sessions().state(DEVICE),
        ConnectionState::Disconnected
    );
}

#[rstest]
fn channels_are_configured_once_per_connection() {
    let mut provider = MockProvider::new();
    provider.expect_connect().once().returning(|_| Ok(()));
    provider
        .expect_configure_channel()
        .withf(|device, channel, settings| {
            device == DEVICE
                && *channel == 2
                && *settings
                    == ChannelSettings {
                        step_rate: 500,
                        step_acceleration: 100_000,
                    }
        })
        .once()
        .returning(|_, _, _| Ok(()));
    provider.expect_position().times(2).returning(|_, _| Ok(1200));
    let mut dispatcher = Dispatcher::new(provider, DispatchSettings::default());
    let read = command("get_position", vec![json!(DEVICE), json!(2)]);

    let first = dispatcher.dispatch(&read);
    let second = dispatcher.dispatch(&read);

    assert_eq!(first.data(), &json!(1200));
    assert_eq!(second.data(), &json!(1200));
    assert_eq!(dispatcher.sessions().state(DEVICE), ConnectionState::Connected);
}

#[rstest]
#[case::clamped_high(65_500, 1, 100, 65_535)]
#[case::clamped_low(30, -1, 100, 0)]
#[case::within_bounds(1_000, -1, 250, 750)]
fn jog_moves_relative_to_current_position(
    #[case] current: i64,
    #[case] direction: i64,
    #[case] step: i64,
    #[case] expected: i64,
) {
    let mut provider = connected_provider();
    provider.expect_position().once().returning(move |_, _| Ok(current));
    provider
        .expect_move_to()
        .with(eq(DEVICE), eq(1_u8), eq(expected))
        .once()
        .returning(|_, _, _| Ok(()));

    let response = dispatch(
        provider,
        &command(
            "jog",
            vec![json!(DEVICE), json!(1), json!(direction), json!(step)],
        ),
    );

    assert_eq!(response, Response::success("Jog complete"));
}

#[rstest]
fn jog_honours_configured_bounds() {
    let mut provider = connected_provider();
    provider.expect_position().returning(|_, _| Ok(900));
    provider
        .expect_move_to()
        .with(eq(DEVICE), eq(1_u8), eq(1_000))
        .once()
        .returning(|_, _, _| Ok(()));
    let settings = DispatchSettings {
        jog_min: -1_000,
        jog_max: 1_000,
        ..DispatchSettings::default()
    };

    let response = Dispatcher::new(provider, settings).dispatch(&command(
        "jog",
        vec![json!(DEVICE), json!(1), json!(1), json!(500)],
    ));

    assert!(response.is_success());
}

#[rstest]
#[case("move_to", vec![json!(DEVICE), json!(1), json!(10)], "Move failed: stalled")]
#[case("set_zero", vec![json!(DEVICE), json!(1)], "Zero failed: stalled")]
#[case("get_position", vec![json!(DEVICE), json!(1)], "Failed to get position: stalled")]
fn provider_failures_become_error_responses(
    #[case] name: &str,
    #[case] args: Vec<Value>,
    #[case] expected: &str,
) {
    let mut provider = connected_provider();
    provider
        .expect_move_to()
        .returning(|_, _, _| Err(DeviceError::driver("stalled")));
    provider
        .expect_set_zero()
        .returning(|_, _| Err(DeviceError::driver("stalled")));
    provider
        .expect_position()
        .returning(|_, _| Err(DeviceError::driver("stalled")));

    let response = dispatch(provider, &command(name, args));

    assert_eq!(response, Response::error(expected));
}

#[rstest]
fn unknown_commands_are_rejected_with_their_id() {
    let response = dispatch(MockProvider::new(), &command("spin", Vec::new()).with_id(7));

    assert_eq!(response.message(), "Unknown command: spin");
    assert_eq!(response.id(), Some(7));
}

#[rstest]
fn malformed_arguments_never_reach_the_provider() {
    let response = dispatch(
        MockProvider::new(),
        &command("move_to", vec![json!(DEVICE), json!(9), json!(10)]),
    );

    assert_eq!(response.message(), "Invalid channel: 9. Must be 1-4.");
}

#[rstest]
fn disconnect_then_use_reconnects_and_reconfigures() {
    let mut provider = MockProvider::new();
    provider.expect_connect().times(2).returning(|_| Ok(()));
    provider
        .expect_configure_channel()
        .times(2)
        .returning(|_, _, _| Ok(()));
    provider
        .expect_disconnect()
        .with(eq(DEVICE))
        .once()
        .returning(|_| Ok(()));
    provider.expect_set_zero().times(2).returning(|_, _| Ok(()));
    let mut dispatcher = Dispatcher::new(provider, DispatchSettings::default());
    let zero = command("set_zero", vec![json!(DEVICE), json!(3)]);

    assert!(dispatcher.dispatch(&zero).is_success());
    let disconnected = dispatcher.dispatch(&command("disconnect_device", vec![json!(DEVICE)]));
    assert!(dispatcher.dispatch(&zero).is_success());

    assert_eq!(disconnected.data(), &json!("Device 97251312 disconnected"));
}

#[rstest]
fn shutdown_disconnects_and_stops() {
    let mut provider = connected_provider();
    provider.expect_position().returning(|_, _| Ok(0));
    provider.expect_disconnect().once().returning(|_| Ok(()));
    let mut dispatcher = Dispatcher::new(provider, DispatchSettings::default());
    dispatcher.dispatch(&command("get_position", vec![json!(DEVICE), json!(1)]));

    let response = dispatcher.dispatch(&command("shutdown", Vec::new()));

    assert_eq!(response.data(), &json!("Worker shutting down"));
    assert!(!dispatcher.is_running());
    assert!(dispatcher.sessions().connected().is_empty());
}

#[rstest]
fn connected_devices_exclude_failed_connections() {
    let mut provider = MockProvider::new();
    provider.expect_connect().returning(|device| {
        if device == DEVICE {
            Ok(())
        } else {
            Err(DeviceError::driver("busy"))
        }
    });
    provider
        .expect_configure_channel()
        .returning(|_, _, _| Ok(()));
    provider.expect_position().returning(|_, _| Ok(5));
    let mut dispatcher = Dispatcher::new(provider, DispatchSettings::default());
    dispatcher.dispatch(&command("get_position", vec![json!(DEVICE), json!(1)]));
    dispatcher.dispatch(&command("get_position", vec![json!("00000002"), json!(1)]));

    let response = dispatcher.dispatch(&command("get_connected_devices", Vec::new()));

    assert_eq!(response.data(), &json!([DEVICE]));
}

// ---------------------------------------------------------------------------
// Read loop
// ---------------------------------------------------------------------------

#[fixture]
fn simulated() -> Dispatcher<SimulatedProvider> {
    Dispatcher::new(
        SimulatedProvider::with_devices([DEVICE]),
        DispatchSettings::default(),
    )
}

fn run_script(dispatcher: &mut Dispatcher<SimulatedProvider>, input: &str) -> Vec<String> {
    let mut stdin = input.as_bytes();
    let mut stdout = Vec::new();
    run(&mut stdin, &mut stdout, dispatcher).expect("loop succeeds");
    String::from_utf8(stdout)
        .expect("utf-8 output")
        .lines()
        .map(str::to_owned)
        .collect()
}

fn parse(lines: &[String], index: usize) -> Response {
    let line = lines.get(index).expect("line present");
    serde_json::from_str(line).expect("response line")
}

#[rstest]
fn loop_frames_responses_between_banners(mut simulated: Dispatcher<SimulatedProvider>) {
    let input = concat!(
        "{\"command\":\"move_to\",\"args\":[\"97251312\",1,1000],\"id\":1}\n",
        "\n",
        "   \n",
        "{\"command\":\"get_position\",\"args\":[\"97251312\",1],\"id\":2}\n",
    );

    let lines = run_script(&mut simulated, input);

    assert_eq!(lines.len(), 4, "unexpected output: {lines:?}");
    assert_eq!(lines.first().map(String::as_str), Some(STARTED_BANNER));
    assert_eq!(
        parse(&lines, 1),
        Response::success("Move complete").with_id(Some(1))
    );
    assert_eq!(parse(&lines, 2), Response::success(1000).with_id(Some(2)));
    assert_eq!(lines.last().map(String::as_str), Some(STOPPED_BANNER));
}

#[rstest]
fn undecodable_lines_are_answered(mut simulated: Dispatcher<SimulatedProvider>) {
    let input = "{\"command\": \n{\"args\":[],\"id\":4}\nnot json\n";

    let lines = run_script(&mut simulated, input);
    let responses: Vec<Response> = (1..lines.len() - 1).map(|index| parse(&lines, index)).collect();

    assert_eq!(lines.len(), 5, "unexpected output: {lines:?}");
    assert_eq!(responses.len(), 3);
    assert!(
        responses
            .iter()
            .all(|response| response.message().starts_with("Invalid JSON: "))
    );
    assert_eq!(responses.get(1).and_then(Response::id), Some(4));
}

#[rstest]
fn shutdown_ends_the_loop_before_later_commands(mut simulated: Dispatcher<SimulatedProvider>) {
    let input = concat!(
        "{\"command\":\"shutdown\",\"args\":[]}\n",
        "{\"command\":\"list_devices\",\"args\":[]}\n",
    );

    let lines = run_script(&mut simulated, input);

    assert_eq!(lines.len(), 3, "unexpected output: {lines:?}");
    assert_eq!(parse(&lines, 1).data(), &json!("Worker shutting down"));
}

#[rstest]
fn end_of_input_disconnects_devices(mut simulated: Dispatcher<SimulatedProvider>) {
    let input = "{\"command\":\"get_position\",\"args\":[\"97251312\",1]}\n";

    run_script(&mut simulated, input);

    assert!(simulated.sessions().connected().is_empty());
}
