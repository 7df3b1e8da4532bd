//! End-to-end session bridge tests.
//!
//! These drive a [`SessionBridge`] over plain channels: a detached
//! upstream handle records every command the bridge issues, and the test
//! feeds server events in as if Voice Live had sent them.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voicelive_bridge::bridge::{
    BridgeTimeouts, ClientEvent, ClientFrame, ClientSender, SessionBridge, SessionParams,
    TranscriptRole,
};
use voicelive_bridge::tools::ToolRegistry;
use voicelive_bridge::upstream::{
    ClientCommand, ItemType, ServerEvent, SessionTool, UpstreamHandle,
};

fn event(json: &str) -> ServerEvent {
    serde_json::from_str(json).expect("test event must parse")
}

fn params() -> SessionParams {
    SessionParams {
        endpoint: "https://r.example.com".to_string(),
        api_key: "key".to_string(),
        model: "gpt-realtime-mini".to_string(),
        voice: "en-US-Emma2:DragonHDLatestNeural".to_string(),
        instructions: "Be helpful.".to_string(),
        transcription_model: "whisper-1".to_string(),
        mcp_servers: vec![SessionTool::Mcp {
            server_label: "microsoft-docs".to_string(),
            server_url: "https://learn.microsoft.com/api/mcp".to_string(),
            require_approval: Some("always".to_string()),
        }],
        timeouts: BridgeTimeouts {
            correlation_wait: Duration::from_millis(200),
            mcp_output_wait: Duration::from_millis(200),
            audio_poll: Duration::from_millis(10),
        },
    }
}

struct Harness {
    bridge: Arc<SessionBridge>,
    runner: JoinHandle<()>,
    events: mpsc::Sender<ServerEvent>,
    commands: mpsc::Receiver<ClientCommand>,
    frames: mpsc::Receiver<ClientFrame>,
}

impl Harness {
    async fn start() -> Self {
        let (client, frames) = ClientSender::channel(64);
        let (upstream, commands) = UpstreamHandle::detached();
        let (event_tx, event_rx) = mpsc::channel(32);

        let bridge = Arc::new(SessionBridge::new(
            params(),
            Arc::new(ToolRegistry::builtin()),
            client,
        ));
        let runner = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.run_with_connection(upstream, event_rx).await })
        };

        // Let the relay tasks come up before the test interacts
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            bridge,
            runner,
            events: event_tx,
            commands,
            frames,
        }
    }

    async fn push(&self, json: &str) {
        self.events.send(event(json)).await.expect("bridge alive");
    }

    /// Close the upstream stream and wait for the session to finish.
    async fn finish(self) -> (mpsc::Receiver<ClientCommand>, Vec<ClientFrame>) {
        drop(self.events);
        self.runner.await.expect("session task must not panic");
        drop(self.bridge);

        let mut frames = Vec::new();
        let mut rx = self.frames;
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        (self.commands, frames)
    }
}

fn terminal_positions(frames: &[ClientFrame]) -> Vec<usize> {
    frames
        .iter()
        .enumerate()
        .filter_map(|(i, frame)| match frame {
            ClientFrame::Event(ClientEvent::CallState { state }) if state == "ended" => Some(i),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_audio_frames_reach_upstream_in_order() {
    let mut harness = Harness::start().await;

    for byte in [1u8, 2, 3] {
        harness.bridge.send_audio(Bytes::from(vec![byte; 8])).await;
    }

    for byte in [1u8, 2, 3] {
        match harness.commands.recv().await.unwrap() {
            ClientCommand::InputAudioBufferAppend { audio } => {
                use base64::prelude::*;
                assert_eq!(BASE64_STANDARD.decode(audio).unwrap(), vec![byte; 8]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    harness.finish().await;
}

#[tokio::test]
async fn test_audio_burst_beyond_queue_capacity_is_not_dropped() {
    let mut harness = Harness::start().await;

    // Far more frames than any internal queue holds; the producer must be
    // backpressured, never short-changed.
    const FRAMES: u32 = 600;
    let feeder = {
        let bridge = harness.bridge.clone();
        tokio::spawn(async move {
            for i in 0..FRAMES {
                bridge.send_audio(Bytes::from(i.to_le_bytes().to_vec())).await;
            }
        })
    };

    for i in 0..FRAMES {
        match harness.commands.recv().await.unwrap() {
            ClientCommand::InputAudioBufferAppend { audio } => {
                use base64::prelude::*;
                assert_eq!(BASE64_STANDARD.decode(audio).unwrap(), i.to_le_bytes());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    feeder.await.unwrap();
    harness.finish().await;
}

#[tokio::test]
async fn test_terminal_event_is_single_and_last() {
    let harness = Harness::start().await;

    harness
        .push(r#"{"type":"input_audio_buffer.speech_started"}"#)
        .await;
    harness
        .push(r#"{"type":"response.audio_transcript.done","transcript":"Hello there."}"#)
        .await;

    let (_commands, frames) = harness.finish().await;
    assert_eq!(terminal_positions(&frames), vec![frames.len() - 1]);
}

#[tokio::test]
async fn test_tool_round_trip() {
    let mut harness = Harness::start().await;

    harness
        .push(
            r#"{"type":"conversation.item.created","item":
                {"type":"function_call","id":"item_1","call_id":"call_1","name":"get_stock_price"}}"#,
        )
        .await;
    harness
        .push(
            r#"{"type":"response.function_call_arguments.done",
                "call_id":"call_1","arguments":"{\"symbol\":\"MSFT\"}"}"#,
        )
        .await;
    harness.push(r#"{"type":"response.done"}"#).await;

    match harness.commands.recv().await.unwrap() {
        ClientCommand::ConversationItemCreate {
            item,
            previous_item_id,
        } => {
            assert_eq!(item.item_type, ItemType::FunctionCallOutput);
            assert_eq!(item.call_id.as_deref(), Some("call_1"));
            assert_eq!(previous_item_id.as_deref(), Some("item_1"));
            let output: serde_json::Value =
                serde_json::from_str(item.output.as_deref().unwrap()).unwrap();
            assert_eq!(output["symbol"], "MSFT");
            assert_eq!(output["price"], 425.30);
        }
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(matches!(
        harness.commands.recv().await.unwrap(),
        ClientCommand::ResponseCreate {}
    ));

    harness.finish().await;
}

#[tokio::test]
async fn test_unknown_tool_submits_error_and_continues() {
    let mut harness = Harness::start().await;

    harness
        .push(
            r#"{"type":"conversation.item.created","item":
                {"type":"function_call","id":"item_1","call_id":"call_1","name":"fly_to_moon"}}"#,
        )
        .await;
    harness
        .push(
            r#"{"type":"response.function_call_arguments.done",
                "call_id":"call_1","arguments":"{}"}"#,
        )
        .await;
    harness.push(r#"{"type":"response.done"}"#).await;

    match harness.commands.recv().await.unwrap() {
        ClientCommand::ConversationItemCreate { item, .. } => {
            assert_eq!(
                item.output.as_deref(),
                Some(r#"{"error":"Unknown tool: fly_to_moon"}"#)
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(matches!(
        harness.commands.recv().await.unwrap(),
        ClientCommand::ResponseCreate {}
    ));

    harness.finish().await;
}

#[tokio::test]
async fn test_mcp_approval_is_auto_accepted() {
    let mut harness = Harness::start().await;

    harness
        .push(
            r#"{"type":"conversation.item.created","item":
                {"type":"mcp_approval_request","id":"item_7","approval_request_id":"req_42"}}"#,
        )
        .await;

    match harness.commands.recv().await.unwrap() {
        ClientCommand::ConversationItemCreate { item, .. } => {
            assert_eq!(item.item_type, ItemType::McpApprovalResponse);
            assert_eq!(item.approval_request_id.as_deref(), Some("req_42"));
            assert_eq!(item.approve, Some(true));
        }
        other => panic!("unexpected command: {other:?}"),
    }

    let (_commands, frames) = harness.finish().await;
    // Approval is silent: only the terminal event reaches the client
    assert_eq!(frames.len(), 1);
    assert_eq!(terminal_positions(&frames), vec![0]);
}

#[tokio::test]
async fn test_tool_timeout_abandons_call_but_not_session() {
    let mut harness = Harness::start().await;

    // Arguments never arrive for this call
    harness
        .push(
            r#"{"type":"conversation.item.created","item":
                {"type":"function_call","id":"item_1","call_id":"call_1","name":"get_weather"}}"#,
        )
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The session must still relay events afterwards
    harness
        .push(r#"{"type":"input_audio_buffer.speech_started"}"#)
        .await;

    let (mut commands, frames) = harness.finish().await;
    assert!(commands.try_recv().is_err(), "abandoned call sent nothing");
    assert!(frames.iter().any(|frame| matches!(
        frame,
        ClientFrame::Event(ClientEvent::SpeechStarted)
    )));
}

#[tokio::test]
async fn test_barge_in_and_transcripts_forwarded() {
    let harness = Harness::start().await;

    harness
        .push(r#"{"type":"input_audio_buffer.speech_started"}"#)
        .await;
    harness
        .push(
            r#"{"type":"conversation.item.input_audio_transcription.completed",
                "transcript":"what is the weather"}"#,
        )
        .await;
    harness
        .push(r#"{"type":"response.audio.delta","delta":"AAEC"}"#)
        .await;
    harness
        .push(r#"{"type":"response.audio_transcript.done","transcript":"It is sunny."}"#)
        .await;

    let (_commands, frames) = harness.finish().await;

    assert!(matches!(
        frames[0],
        ClientFrame::Event(ClientEvent::SpeechStarted)
    ));
    assert!(matches!(
        &frames[1],
        ClientFrame::Event(ClientEvent::Transcript { role: TranscriptRole::User, text })
            if text == "what is the weather"
    ));
    assert!(matches!(&frames[2], ClientFrame::Audio(pcm) if pcm.as_ref() == [0u8, 1, 2]));
    assert!(matches!(
        &frames[3],
        ClientFrame::Event(ClientEvent::Transcript { role: TranscriptRole::Assistant, text })
            if text == "It is sunny."
    ));
}

#[tokio::test]
async fn test_mcp_lifecycle_narrated_to_client() {
    let harness = Harness::start().await;

    harness
        .push(r#"{"type":"mcp_list_tools.completed","tools":[{"name":"search"},{"name":"fetch"}]}"#)
        .await;
    harness
        .push(
            r#"{"type":"conversation.item.created","item":
                {"type":"mcp_call","id":"item_3","name":"search","server_label":"microsoft-docs"}}"#,
        )
        .await;
    harness
        .push(r#"{"type":"response.mcp_call.completed","item_id":"item_3"}"#)
        .await;
    harness
        .push(
            r#"{"type":"response.output_item.done","item":
                {"type":"mcp_call","id":"item_3","name":"search","output":"{\"hits\":3}"}}"#,
        )
        .await;

    // Give the spawned completion flow time to run before shutdown
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The completion flow requests a fresh response
    let (mut commands, frames) = harness.finish().await;
    assert!(matches!(
        commands.recv().await.unwrap(),
        ClientCommand::ResponseCreate {}
    ));

    let statuses: Vec<&str> = frames
        .iter()
        .filter_map(|frame| match frame {
            ClientFrame::Event(ClientEvent::McpStatus { text }) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            "MCP tools available: search, fetch",
            "Calling MCP tool: search on microsoft-docs",
            "MCP tool 'search' returned a result",
        ]
    );
}

#[tokio::test]
async fn test_upstream_error_event_does_not_end_session() {
    let harness = Harness::start().await;

    harness
        .push(r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#)
        .await;
    harness
        .push(r#"{"type":"input_audio_buffer.speech_started"}"#)
        .await;

    let (_commands, frames) = harness.finish().await;
    assert!(matches!(
        frames[0],
        ClientFrame::Event(ClientEvent::SpeechStarted)
    ));
    assert_eq!(terminal_positions(&frames), vec![frames.len() - 1]);
}
