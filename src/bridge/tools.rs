//! Tool-call coordination.
//!
//! When the model requests a local function, the dispatcher observes a
//! `function_call` conversation item and hands the flow to
//! [`run_tool_call`], which walks an explicit state machine:
//!
//! 1. `AwaitingArguments` - wait for the matching arguments-done event and
//!    parse its payload as a JSON object (malformed JSON fails the call)
//! 2. `AwaitingResponseCompletion` - wait for `response.done`; the protocol
//!    forbids submitting tool output while a response is still generating
//! 3. `Dispatched` - invoke the registry handler, or synthesize an
//!    "Unknown tool" error payload (not fatal, the conversation continues)
//! 4. `Submitted` - create the `function_call_output` item anchored to the
//!    originating item, then request a new response
//!
//! A failure at any step aborts only this tool call; the dispatcher keeps
//! processing events.
//!
//! MCP calls never come through here for dispatch: the service executes
//! them itself. [`run_mcp_completion`] only waits for the finished output
//! item, narrates it to the client, and nudges the model to continue.
//! [`approve`] answers an `mcp_approval_request` item, always positively.

use std::sync::Arc;

use thiserror::Error;

use super::correlate::{CorrelationError, EventWaiter};
use super::events::{ClientEvent, ClientSender};
use crate::tools::ToolRegistry;
use crate::upstream::{EventKind, ItemType, ServerEvent, UpstreamError, UpstreamHandle};

/// Where a tool call currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallState {
    AwaitingArguments,
    AwaitingResponseCompletion,
    Dispatched,
    Submitted,
}

/// One in-flight local tool call.
#[derive(Debug)]
pub struct ToolCall {
    /// Correlation ID from the function_call item
    pub call_id: String,
    /// Function name to dispatch
    pub name: String,
    /// Item the output will be anchored after
    pub anchor_item_id: Option<String>,
    /// Current lifecycle state
    pub state: ToolCallState,
}

impl ToolCall {
    pub fn new(call_id: String, name: String, anchor_item_id: Option<String>) -> Self {
        Self {
            call_id,
            name,
            anchor_item_id,
            state: ToolCallState::AwaitingArguments,
        }
    }
}

/// Errors that abort a single tool call.
#[derive(Debug, Error)]
pub enum ToolCallError {
    /// A correlation wait failed
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// The arguments payload was not a JSON object
    #[error("Malformed arguments for tool '{name}': {source}")]
    MalformedArguments {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The upstream connection went away mid-call
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Drive one local tool call from argument wait to submitted output.
///
/// `args_waiter` and `done_waiter` must have been subscribed before the
/// dispatcher resumed reading events, otherwise the replies can race past.
pub async fn run_tool_call(
    mut call: ToolCall,
    args_waiter: EventWaiter,
    done_waiter: EventWaiter,
    registry: Arc<ToolRegistry>,
    upstream: UpstreamHandle,
    deadline: std::time::Duration,
) -> Result<(), ToolCallError> {
    debug_assert_eq!(call.state, ToolCallState::AwaitingArguments);
    let raw_arguments = match args_waiter.wait(deadline).await? {
        ServerEvent::FunctionCallArgumentsDone { arguments, .. } => arguments,
        // subscribe() keys by kind, so this arm is unreachable
        _ => String::new(),
    };
    let arguments: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&raw_arguments).map_err(|source| {
            ToolCallError::MalformedArguments {
                name: call.name.clone(),
                source,
            }
        })?;

    call.state = ToolCallState::AwaitingResponseCompletion;
    done_waiter.wait(deadline).await?;

    call.state = ToolCallState::Dispatched;
    let result = match registry.handler(&call.name) {
        Some(handler) => {
            let result = handler(&arguments);
            tracing::info!(tool = %call.name, %result, "Tool dispatched");
            result
        }
        None => {
            tracing::warn!(tool = %call.name, "No handler for tool");
            serde_json::json!({"error": format!("Unknown tool: {}", call.name)}).to_string()
        }
    };

    call.state = ToolCallState::Submitted;
    upstream
        .submit_tool_output(&call.call_id, call.anchor_item_id.clone(), &result)
        .await?;
    upstream.create_response().await?;
    Ok(())
}

/// Handle an MCP call completion: wait for the finished output item,
/// narrate it, then ask the model to continue with the result the service
/// already fed back.
pub async fn run_mcp_completion(
    output_waiter: EventWaiter,
    upstream: UpstreamHandle,
    client: ClientSender,
    deadline: std::time::Duration,
) -> Result<(), ToolCallError> {
    let event = output_waiter.wait(deadline).await?;
    if let ServerEvent::OutputItemDone { item } = event
        && item.item_type == ItemType::McpCall
    {
        let name = item.name.as_deref().unwrap_or("?");
        let preview: String = item.output.as_deref().unwrap_or("").chars().take(200).collect();
        tracing::info!(tool = %name, output = %preview, "MCP call done");
        client
            .send_event(ClientEvent::McpStatus {
                text: format!("MCP tool '{name}' returned a result"),
            })
            .await;
    }

    upstream.create_response().await?;
    Ok(())
}

/// Auto-approve an MCP approval request. No policy check by design.
pub async fn approve(
    upstream: &UpstreamHandle,
    approval_request_id: &str,
) -> Result<(), UpstreamError> {
    tracing::info!(request_id = %approval_request_id, "Auto-approving MCP approval request");
    upstream.submit_approval(approval_request_id, true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::correlate::EventWaiters;
    use crate::tools::ToolRegistry;
    use crate::upstream::ClientCommand;
    use std::time::Duration;

    fn args_done(call_id: &str, arguments: &str) -> ServerEvent {
        serde_json::from_str(&format!(
            r#"{{"type":"response.function_call_arguments.done","call_id":"{call_id}","arguments":{}}}"#,
            serde_json::to_string(arguments).unwrap()
        ))
        .unwrap()
    }

    fn response_done() -> ServerEvent {
        serde_json::from_str(r#"{"type":"response.done"}"#).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_arguments_abort_the_call() {
        let waiters = EventWaiters::new();
        let args_waiter = waiters.subscribe(EventKind::FunctionCallArgumentsDone);
        let done_waiter = waiters.subscribe(EventKind::ResponseDone);
        let (upstream, mut commands) = UpstreamHandle::detached();

        waiters.offer(&args_done("call_1", "not json"));

        let err = run_tool_call(
            ToolCall::new("call_1".into(), "get_weather".into(), None),
            args_waiter,
            done_waiter,
            Arc::new(ToolRegistry::builtin()),
            upstream,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ToolCallError::MalformedArguments { .. }));
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_tool_submits_error_payload() {
        let waiters = EventWaiters::new();
        let args_waiter = waiters.subscribe(EventKind::FunctionCallArgumentsDone);
        let done_waiter = waiters.subscribe(EventKind::ResponseDone);
        let (upstream, mut commands) = UpstreamHandle::detached();

        waiters.offer(&args_done("call_1", "{}"));
        waiters.offer(&response_done());

        run_tool_call(
            ToolCall::new("call_1".into(), "no_such_tool".into(), Some("item_1".into())),
            args_waiter,
            done_waiter,
            Arc::new(ToolRegistry::builtin()),
            upstream,
            Duration::from_millis(50),
        )
        .await
        .unwrap();

        match commands.recv().await.unwrap() {
            ClientCommand::ConversationItemCreate {
                item,
                previous_item_id,
            } => {
                assert_eq!(previous_item_id.as_deref(), Some("item_1"));
                assert_eq!(
                    item.output.as_deref(),
                    Some(r#"{"error":"Unknown tool: no_such_tool"}"#)
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(matches!(
            commands.recv().await.unwrap(),
            ClientCommand::ResponseCreate {}
        ));
    }
}
