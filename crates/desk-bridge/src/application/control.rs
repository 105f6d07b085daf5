//! Translation between control requests and bridge operations.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::application::bridge::DeskBridge;
use crate::application::ports::{LogFeed, LogLevelControl};
use crate::domain::messages::{ControlRequest, ControlResponse};

/// Serves control requests against one bridge.
pub struct ControlService {
    bridge: Arc<DeskBridge>,
    logs: Arc<dyn LogLevelControl>,
    feed: Arc<dyn LogFeed>,
}

impl ControlService {
    pub fn new(
        bridge: Arc<DeskBridge>,
        logs: Arc<dyn LogLevelControl>,
        feed: Arc<dyn LogFeed>,
    ) -> Self {
        Self { bridge, logs, feed }
    }

    /// Parses one JSON text message.
    ///
    /// # Errors
    ///
    /// Returns the error response to send back for malformed input.
    pub fn parse_request(text: &str) -> Result<ControlRequest, ControlResponse> {
        serde_json::from_str::<ControlRequest>(text).map_err(|e| {
            warn!("invalid control message: {e}");
            ControlResponse::error(format!("invalid request: {e}"))
        })
    }

    /// Parses one JSON text message and answers it.
    ///
    /// Malformed input gets an error response rather than an `Err`, so the
    /// connection can stay open.
    pub async fn handle_text(&self, text: &str) -> ControlResponse {
        match Self::parse_request(text) {
            Ok(request) => self.handle(request).await,
            Err(response) => response,
        }
    }

    /// Answers one request.
    ///
    /// `follow_logs` is only acknowledged here; the session that received
    /// it subscribes through [`follow_logs`](Self::follow_logs).
    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        debug!(request = request.kind(), "control request");
        match request {
            ControlRequest::GetHeight => {
                let position = self.bridge.current_position();
                ControlResponse::Height {
                    value: (!position.is_unknown()).then(|| position.to_string()),
                    fault: self.bridge.current_fault().map(|f| f.to_string()),
                }
            }
            ControlRequest::MoveTo { slot } => match self.bridge.move_to(slot).await {
                Ok(()) => ControlResponse::Ok,
                Err(e) => ControlResponse::error(e.to_string()),
            },
            ControlRequest::SetRemote { allow } => {
                self.bridge.set_remote_enabled(allow);
                ControlResponse::Ok
            }
            ControlRequest::SetLogLevel { level } => match self.logs.set_level(&level) {
                Ok(()) => ControlResponse::Ok,
                Err(message) => ControlResponse::Error { message },
            },
            ControlRequest::FollowLogs => ControlResponse::Ok,
        }
    }

    /// Subscribes to the live log output.
    pub fn follow_logs(&self) -> broadcast::Receiver<String> {
        self.feed.subscribe()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bus::{BurstTiming, ControllerBus};
    use crate::application::keepalive::KeepAlive;
    use crate::application::ports::FaultSink;
    use crate::application::position::{FaultLatch, PositionCache};
    use crate::infrastructure::gpio::mock::RecordingLine;
    use crate::infrastructure::serial::mock::RecordingSink;
    use desk_core::{encode_command, ControllerFault, Position};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Feed(broadcast::Sender<String>);

    impl LogFeed for Feed {
        fn subscribe(&self) -> broadcast::Receiver<String> {
            self.0.subscribe()
        }
    }

    #[derive(Default)]
    struct RecordingLogs {
        levels: Mutex<Vec<String>>,
    }

    impl LogLevelControl for RecordingLogs {
        fn set_level(&self, directive: &str) -> Result<(), String> {
            if directive == "bogus[" {
                return Err("invalid filter directive".to_string());
            }
            self.levels.lock().unwrap().push(directive.to_string());
            Ok(())
        }
    }

    struct Rig {
        service: ControlService,
        bridge: Arc<DeskBridge>,
        sink: RecordingSink,
        position: Arc<PositionCache>,
        faults: Arc<FaultLatch>,
        logs: Arc<RecordingLogs>,
        feed: Arc<Feed>,
    }

    fn rig() -> Rig {
        let sink = RecordingSink::new();
        let bus = Arc::new(ControllerBus::new(
            Box::new(sink.clone()),
            Arc::new(RecordingLine::new()),
            BurstTiming::default(),
        ));
        let (_keepalive, notifier) = KeepAlive::new(Arc::clone(&bus), Duration::from_secs(900));
        let position = Arc::new(PositionCache::new());
        let faults = Arc::new(FaultLatch::new());
        let bridge = Arc::new(DeskBridge::new(
            bus,
            Arc::clone(&position),
            Arc::clone(&faults),
            Arc::new(RecordingLine::new()),
            notifier,
        ));
        let logs = Arc::new(RecordingLogs::default());
        let feed = Arc::new(Feed(broadcast::channel(8).0));
        let service = ControlService::new(Arc::clone(&bridge), logs.clone(), feed.clone());
        Rig {
            service,
            bridge,
            sink,
            position,
            faults,
            logs,
            feed,
        }
    }

    #[tokio::test]
    async fn test_get_height_before_first_reading_is_null() {
        let rig = rig();

        let response = rig.service.handle(ControlRequest::GetHeight).await;

        assert_eq!(
            response,
            ControlResponse::Height {
                value: None,
                fault: None
            }
        );
    }

    #[tokio::test]
    async fn test_get_height_renders_position_and_fault() {
        // Arrange
        let rig = rig();
        rig.position.set(Position::new(105, -2));
        rig.faults.raise(ControllerFault::new(7));

        // Act
        let response = rig.service.handle_text(r#"{"type":"get_height"}"#).await;

        // Assert
        assert_eq!(
            response,
            ControlResponse::Height {
                value: Some("1.05".to_string()),
                fault: Some("E07".to_string()),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_to_issues_command() {
        let rig = rig();

        let response = rig
            .service
            .handle_text(r#"{"type":"move_to","slot":1}"#)
            .await;

        assert_eq!(response, ControlResponse::Ok);
        assert_eq!(rig.sink.frames(), vec![encode_command(1).unwrap(); 5]);
    }

    #[tokio::test]
    async fn test_set_remote_false_then_move_to_is_refused() {
        // Arrange
        let rig = rig();
        let disabled = rig
            .service
            .handle(ControlRequest::SetRemote { allow: false })
            .await;

        // Act
        let response = rig.service.handle(ControlRequest::MoveTo { slot: 2 }).await;

        // Assert
        assert_eq!(disabled, ControlResponse::Ok);
        assert!(!rig.bridge.remote_enabled());
        assert_eq!(response, ControlResponse::error("remote control is disabled"));
        assert!(rig.sink.frames().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_slot_is_reported() {
        let rig = rig();

        let response = rig.service.handle(ControlRequest::MoveTo { slot: 9 }).await;

        assert!(matches!(response, ControlResponse::Error { ref message } if message.contains('9')));
    }

    #[tokio::test]
    async fn test_set_log_level_forwards_directive() {
        let rig = rig();

        let ok = rig
            .service
            .handle_text(r#"{"type":"set_log_level","level":"debug"}"#)
            .await;
        let bad = rig
            .service
            .handle(ControlRequest::SetLogLevel {
                level: "bogus[".to_string(),
            })
            .await;

        assert_eq!(ok, ControlResponse::Ok);
        assert_eq!(bad, ControlResponse::error("invalid filter directive"));
        assert_eq!(*rig.logs.levels.lock().unwrap(), vec!["debug".to_string()]);
    }

    #[tokio::test]
    async fn test_follow_logs_is_acknowledged_and_subscribes() {
        // Arrange
        let rig = rig();

        // Act
        let response = rig.service.handle_text(r#"{"type":"follow_logs"}"#).await;
        let mut lines = rig.service.follow_logs();
        rig.feed.0.send("WARN handset frame rejected".to_string()).unwrap();

        // Assert
        assert_eq!(response, ControlResponse::Ok);
        assert_eq!(lines.recv().await.unwrap(), "WARN handset frame rejected");
    }

    #[test]
    fn test_parse_request_separates_requests_from_errors() {
        assert_eq!(
            ControlService::parse_request(r#"{"type":"follow_logs"}"#),
            Ok(ControlRequest::FollowLogs)
        );
        assert!(matches!(
            ControlService::parse_request(r#"{"type":"jump"}"#),
            Err(ControlResponse::Error { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_json_gets_error_response() {
        let rig = rig();

        let response = rig.service.handle_text("{not json").await;

        assert!(matches!(response, ControlResponse::Error { .. }));
    }
}
