//! End-to-end tests: pumps, keep-alive and the control server wired the way
//! `main` wires them, over in-memory serial lines.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing_subscriber::layer::SubscriberExt;

use desk_bridge::application::ports::{ByteSink, LogLevelControl};
use desk_bridge::application::{
    shutdown, BurstTiming, ControlService, ControllerBus, ControllerPump, DeskBridge, FaultLatch,
    FrameReader, HandsetPump, KeepAlive, PositionCache, ShutdownHandle,
};
use desk_bridge::domain::ControlResponse;
use desk_bridge::infrastructure::control_server;
use desk_bridge::infrastructure::gpio::mock::RecordingLine;
use desk_bridge::infrastructure::serial::mock::{RecordingSink, ScriptedSource};
use desk_bridge::infrastructure::{LogTap, SoftwareWatchdog};
use desk_core::{encode_command, Frame, Position, CONTROLLER_HEADER, HANDSET_HEADER};

const POLL: Duration = Duration::from_millis(10);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Waits for the next text message.
async fn next_reply(ws: &mut Client) -> ControlResponse {
    loop {
        if let Message::Text(reply) = ws.next().await.unwrap().unwrap() {
            return serde_json::from_str(&reply).unwrap();
        }
    }
}

/// Sends one request and waits for the text reply.
async fn ask(ws: &mut Client, text: &str) -> ControlResponse {
    ws.send(Message::Text(text.to_string())).await.unwrap();
    next_reply(ws).await
}

#[derive(Default)]
struct RecordingLogs(Mutex<Vec<String>>);

impl LogLevelControl for RecordingLogs {
    fn set_level(&self, directive: &str) -> Result<(), String> {
        self.0.lock().unwrap().push(directive.to_string());
        Ok(())
    }
}

struct Desk {
    handset_in: ScriptedSource,
    controller_in: ScriptedSource,
    controller_out: RecordingSink,
    handset_out: RecordingSink,
    activity: Arc<RecordingLine>,
    bridge: Arc<DeskBridge>,
    shutdown: ShutdownHandle,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Desk {
    /// Starts both pumps and the keep-alive task.
    fn start(passthrough: bool) -> Self {
        let handset_in = ScriptedSource::new();
        let controller_in = ScriptedSource::new();
        let controller_out = RecordingSink::new();
        let handset_out = RecordingSink::new();
        let activity = Arc::new(RecordingLine::new());
        let watchdog = Arc::new(SoftwareWatchdog::new(Duration::from_secs(10)));
        let (shutdown, signal) = shutdown::channel();

        let bus = Arc::new(ControllerBus::new(
            Box::new(controller_out.clone()),
            activity.clone(),
            BurstTiming::default(),
        ));
        let (keepalive, notifier) = KeepAlive::new(Arc::clone(&bus), Duration::from_secs(900));
        let position = Arc::new(PositionCache::new());
        let faults = Arc::new(FaultLatch::new());

        let handset_pump = HandsetPump::new(
            FrameReader::new(handset_in.clone(), HANDSET_HEADER, POLL),
            Arc::clone(&bus),
            notifier.clone(),
            watchdog.clone(),
        );
        let controller_pump = ControllerPump::new(
            FrameReader::new(controller_in.clone(), CONTROLLER_HEADER, POLL),
            Arc::clone(&position),
            faults.clone(),
            passthrough.then(|| Box::new(handset_out.clone()) as Box<dyn ByteSink>),
            watchdog,
        );
        let bridge = Arc::new(DeskBridge::new(
            bus,
            position,
            faults,
            Arc::new(RecordingLine::new()),
            notifier,
        ));

        let tasks = vec![
            tokio::spawn(handset_pump.run(signal.clone())),
            tokio::spawn(controller_pump.run(signal.clone())),
            tokio::spawn(keepalive.run(signal)),
        ];

        Self {
            handset_in,
            controller_in,
            controller_out,
            handset_out,
            activity,
            bridge,
            shutdown,
            tasks,
        }
    }

    async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            task.await.unwrap();
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_height_from_controller_is_cached_and_relayed() {
    // Arrange
    let desk = Desk::start(true);
    let height = Frame::with_payload(CONTROLLER_HEADER, [0x06, 0x5B, 0x4F]);

    // Act
    desk.controller_in.push_bytes(height.as_bytes());
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Assert
    assert_eq!(desk.bridge.current_position(), Position::new(123, 0));
    assert_eq!(desk.handset_out.frames(), vec![height]);
    desk.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_key_press_reaches_controller_unchanged() {
    // Arrange
    let desk = Desk::start(false);
    let up = Frame::with_payload(HANDSET_HEADER, [0x20, 0x00, 0x00]);

    // Act: the frame arrives split across two reads
    desk.handset_in.push_bytes(&up.as_bytes()[..2]);
    desk.handset_in.push_bytes(&up.as_bytes()[2..]);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Assert: relayed without touching the activity line
    assert_eq!(desk.controller_out.frames(), vec![up]);
    assert!(desk.activity.levels().is_empty());
    assert!(desk.handset_out.frames().is_empty());
    desk.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_preset_command_while_handset_streams() {
    // Arrange: the handset keeps sending an idle frame every 5 ms
    let desk = Desk::start(false);
    let idle = Frame::with_payload(HANDSET_HEADER, [0x00, 0x00, 0x00]);
    let feeder = {
        let source = desk.handset_in.clone();
        tokio::spawn(async move {
            for _ in 0..40 {
                source.push_bytes(idle.as_bytes());
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    };

    // Act
    desk.bridge.move_to(4).await.unwrap();
    feeder.await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Assert: all five command copies are on the wire, in a row
    let command = encode_command(4).unwrap();
    let frames = desk.controller_out.frames();
    let first = frames.iter().position(|f| *f == command).unwrap();
    assert_eq!(&frames[first..first + 5], &[command; 5]);
    assert_eq!(frames.iter().filter(|f| **f == command).count(), 5);
    assert_eq!(desk.activity.levels(), vec![true, false]);
    desk.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_desk_gets_keepalive_burst() {
    let desk = Desk::start(false);

    tokio::time::sleep(Duration::from_secs(901)).await;

    assert_eq!(
        desk.controller_out.frames(),
        vec![desk_core::encode_keepalive(); 5]
    );
    desk.stop().await;
}

#[tokio::test]
async fn test_control_server_round_trip() {
    // Arrange: a real listener on an ephemeral port
    let desk = Desk::start(false);
    desk.controller_in
        .push_bytes(Frame::with_payload(CONTROLLER_HEADER, [0x07, 0xDB, 0x6D]).as_bytes());
    let logs = Arc::new(RecordingLogs::default());
    let service = Arc::new(ControlService::new(
        Arc::clone(&desk.bridge),
        logs.clone(),
        Arc::new(LogTap::new()),
    ));
    let listener = control_server::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (server_shutdown, server_signal) = shutdown::channel();
    let server = tokio::spawn(control_server::serve(listener, service, server_signal));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();

    // Act
    let height = ask(&mut ws, r#"{"type":"get_height"}"#).await;
    let garbage = ask(&mut ws, "not json").await;
    let moved = ask(&mut ws, r#"{"type":"move_to","slot":2}"#).await;
    let level = ask(&mut ws, r#"{"type":"set_log_level","level":"debug"}"#).await;

    // Assert
    assert_eq!(
        height,
        ControlResponse::Height {
            value: Some("72.5".to_string()),
            fault: None
        }
    );
    assert!(matches!(garbage, ControlResponse::Error { .. }));
    assert_eq!(moved, ControlResponse::Ok);
    assert_eq!(
        desk.controller_out.frames(),
        vec![encode_command(2).unwrap(); 5]
    );
    assert_eq!(level, ControlResponse::Ok);
    assert_eq!(*logs.0.lock().unwrap(), vec!["debug".to_string()]);

    server_shutdown.trigger();
    server.await.unwrap();
    desk.stop().await;
}

#[tokio::test]
async fn test_followed_session_receives_log_lines() {
    // Arrange: route this thread's events through a tap
    let tap = LogTap::new();
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(tap.clone()),
    );
    let _guard = tracing::subscriber::set_default(subscriber);
    let desk = Desk::start(false);
    let service = Arc::new(ControlService::new(
        Arc::clone(&desk.bridge),
        Arc::new(RecordingLogs::default()),
        Arc::new(tap),
    ));
    let listener = control_server::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (server_shutdown, server_signal) = shutdown::channel();
    let server = tokio::spawn(control_server::serve(listener, service, server_signal));
    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();

    // Act: follow, then do something that logs
    let followed = ask(&mut ws, r#"{"type":"follow_logs"}"#).await;
    let toggled = ask(&mut ws, r#"{"type":"set_remote","allow":false}"#).await;
    let mut lines = Vec::new();
    let collect = async {
        while lines.len() < 20 {
            let ControlResponse::Log { line } = next_reply(&mut ws).await else {
                continue;
            };
            let done = line.contains("remote control toggled");
            lines.push(line);
            if done {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), collect)
        .await
        .expect("log line never arrived");

    // Assert
    assert_eq!(followed, ControlResponse::Ok);
    assert!(matches!(toggled, ControlResponse::Ok | ControlResponse::Log { .. }));
    assert!(
        lines.iter().any(|l| l.contains("remote control toggled")),
        "{lines:?}"
    );

    server_shutdown.trigger();
    server.await.unwrap();
    desk.stop().await;
}
