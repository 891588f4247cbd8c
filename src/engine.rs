//! Dialog engine
//!
//! The state machine at the center of the service. Each `step` processes one
//! inbound interaction: it drives model turns, dispatches tool calls, gates
//! ticket booking behind explicit user confirmation, and returns the updated
//! conversation state together with the user-facing reply and a tool trace.
//!
//! The engine works on a clone of the caller's state and only hands back the
//! successor on success, so a failed step commits nothing and the caller may
//! retry the same input.

pub mod state;
mod trace;


pub use trace::TraceEntry;

use crate::llm::{ChatModel, ToolDefinition};
use crate::policy;
use crate::tools::{ToolError, ToolInvoker, ValidationReport};
use serde::Serialize;
use serde_json::Value;
use state::{ConversationState, Message, PendingAction, TicketArgs, ToolArgs, ToolCall, UserIdentity};
use std::time::Duration;
use thiserror::Error;

const CONFIRM_PROMPT: &str = "Please confirm if you would like to book the ticket.";
const NEED_MORE_STEPS_REPLY: &str = "Sorry, need more steps to process this request.";
const SIGN_IN_REQUIRED_REPLY: &str =
    "This action requires you to be signed in. Please log in and then try again.";
const SIGN_IN_TOOL_RESULT: &str = "Not executed: the user must sign in first.";
const DECLINED_TOOL_RESULT: &str = "Booking declined by user; the ticket was not inserted.";
const DECLINE_USER_MESSAGE: &str = "I changed my mind. Decline ticket booking.";
const VERIFIED_TOOL_RESULT: &str = "Flight verified. Awaiting user confirmation before booking.";
const SKIPPED_TOOL_RESULT: &str = "Not executed: a ticket booking is awaiting user confirmation.";

/// Engine tunables, explicit so deployments control loop and retry bounds.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on model-turn/tool-dispatch cycles within one step
    pub max_turns: u32,
    /// Attempts for retryable model errors
    pub model_retries: u32,
    /// Base delay for model retry backoff (doubles per attempt)
    pub retry_delay: Duration,
    /// Timeout applied to each tool invocation
    pub tool_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            model_retries: 3,
            retry_delay: Duration::from_secs(1),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// One inbound interaction.
#[derive(Debug, Clone)]
pub enum StepInput {
    /// A new user message
    User(String),
    /// Explicit approval of the pending booking
    Confirm,
    /// Explicit decline of the pending booking
    Decline,
}

/// Booking awaiting approval, as shown to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PendingConfirmation {
    pub tool: String,
    pub params: Value,
}

/// Outcome of a successful step.
#[derive(Debug)]
pub struct StepResult {
    /// Successor conversation state; the caller commits it.
    pub state: ConversationState,
    /// User-facing reply text
    pub reply: String,
    /// Tool invocations observed during the step
    pub trace: Vec<TraceEntry>,
    /// Set when the step halted awaiting booking confirmation
    pub pending_confirmation: Option<PendingConfirmation>,
}

/// Step-fatal errors. Tool and validation failures are absorbed into the
/// conversation instead and never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model backend unavailable: {0}")]
    ModelUnavailable(String),
    #[error("no action is awaiting confirmation")]
    NoPendingAction,
}

/// The tool-calling conversation state machine.
pub struct DialogEngine<M, T> {
    model: M,
    tools: T,
    config: EngineConfig,
}

impl<M: ChatModel, T: ToolInvoker> DialogEngine<M, T> {
    pub fn new(model: M, tools: T, config: EngineConfig) -> Self {
        Self {
            model,
            tools,
            config,
        }
    }

    /// Process one inbound interaction against a snapshot of the session
    /// state. Returns the successor state; on error nothing is committed.
    pub async fn step(
        &self,
        state: &ConversationState,
        input: StepInput,
    ) -> Result<StepResult, EngineError> {
        let mut state = state.clone();
        let mut trace = Vec::new();

        match input {
            StepInput::User(text) => {
                // A fresh message while a booking is awaiting approval
                // abandons it; confirmation is only granted explicitly.
                if let Some(pending) = state.pending_action.take() {
                    tracing::info!(
                        session = %state.session_id,
                        tool = pending.call.name(),
                        "new user message abandons pending booking"
                    );
                    state.history.push(Message::tool(
                        &pending.call.id,
                        pending.call.name(),
                        DECLINED_TOOL_RESULT,
                    ));
                }
                state.history.push(Message::user(text));
            }
            StepInput::Confirm => {
                let pending = state
                    .pending_action
                    .take()
                    .ok_or(EngineError::NoPendingAction)?;
                // Exactly one execution per confirmation; the slot is already
                // cleared, so even a failing insert is never re-run.
                let results = self
                    .dispatch_calls(std::slice::from_ref(&pending.call), state.user.as_ref())
                    .await;
                for message in absorb_results(&[pending.call], results, &mut trace) {
                    state.history.push(message);
                }
            }
            StepInput::Decline => {
                let pending = state
                    .pending_action
                    .take()
                    .ok_or(EngineError::NoPendingAction)?;
                state.history.push(Message::tool(
                    &pending.call.id,
                    pending.call.name(),
                    DECLINED_TOOL_RESULT,
                ));
                state.history.push(Message::user(DECLINE_USER_MESSAGE));
            }
        }

        self.run_turns(state, trace).await
    }

    /// Drive model turns until a final reply or a confirmation halt, bounded
    /// by `max_turns`.
    async fn run_turns(
        &self,
        mut state: ConversationState,
        mut trace: Vec<TraceEntry>,
    ) -> Result<StepResult, EngineError> {
        let definitions = self.tools.definitions();

        for _ in 0..self.config.max_turns {
            let assistant = self
                .generate_with_retry(&state.history, &definitions)
                .await?;
            state.history.push(assistant.clone());

            if assistant.tool_calls.is_empty() {
                return Ok(StepResult {
                    reply: assistant.text,
                    state,
                    trace,
                    pending_confirmation: None,
                });
            }

            // Sign-in gate: ticket tools need an identity before anything
            // else happens.
            if state.user.is_none()
                && assistant
                    .tool_calls
                    .iter()
                    .any(|c| policy::requires_auth(c.name()))
            {
                for call in &assistant.tool_calls {
                    state
                        .history
                        .push(Message::tool(&call.id, call.name(), SIGN_IN_TOOL_RESULT));
                }
                state.history.push(Message::assistant(SIGN_IN_REQUIRED_REPLY));
                return Ok(StepResult {
                    reply: SIGN_IN_REQUIRED_REPLY.to_string(),
                    state,
                    trace,
                    pending_confirmation: None,
                });
            }

            // Confirmation gate: a booking call halts the turn instead of
            // executing. Only the first such call survives; batch-mates get
            // synthetic results so every call stays answered.
            if let Some(idx) = assistant
                .tool_calls
                .iter()
                .position(|c| policy::requires_confirmation(c.name()))
            {
                let booking = assistant.tool_calls[idx].clone();
                for (i, call) in assistant.tool_calls.iter().enumerate() {
                    if i != idx {
                        state
                            .history
                            .push(Message::tool(&call.id, call.name(), SKIPPED_TOOL_RESULT));
                    }
                }

                match self
                    .validate_booking(&booking, state.user.as_ref(), &mut trace)
                    .await
                {
                    Ok(resolved) => {
                        state.history.push(Message::tool(
                            &booking.id,
                            booking.name(),
                            VERIFIED_TOOL_RESULT,
                        ));
                        let resolved_call = ToolCall::new(
                            uuid::Uuid::new_v4().to_string(),
                            ToolArgs::InsertTicket(resolved),
                        );
                        let pending_confirmation = PendingConfirmation {
                            tool: resolved_call.name().to_string(),
                            params: resolved_call.args.to_value(),
                        };
                        state.history.push(Message::assistant_with_calls(
                            CONFIRM_PROMPT,
                            vec![resolved_call.clone()],
                        ));
                        state.pending_action = Some(PendingAction {
                            call: resolved_call,
                        });
                        return Ok(StepResult {
                            reply: CONFIRM_PROMPT.to_string(),
                            state,
                            trace,
                            pending_confirmation: Some(pending_confirmation),
                        });
                    }
                    Err(reason) => {
                        // Validation found nothing bookable; let the model
                        // relay that and continue the conversation.
                        state
                            .history
                            .push(Message::tool(&booking.id, booking.name(), reason));
                        continue;
                    }
                }
            }

            // Plain dispatch: independent reads fan out concurrently, results
            // reassemble in original call order.
            let results = self
                .dispatch_calls(&assistant.tool_calls, state.user.as_ref())
                .await;
            for message in absorb_results(&assistant.tool_calls, results, &mut trace) {
                state.history.push(message);
            }
        }

        tracing::warn!(
            session = %state.session_id,
            max_turns = self.config.max_turns,
            "turn budget exhausted"
        );
        state.history.push(Message::assistant(NEED_MORE_STEPS_REPLY));
        Ok(StepResult {
            reply: NEED_MORE_STEPS_REPLY.to_string(),
            state,
            trace,
            pending_confirmation: None,
        })
    }

    /// Invoke the model, retrying retryable failures with exponential
    /// backoff. Exhausting the budget is fatal to the step.
    async fn generate_with_retry(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, EngineError> {
        let mut attempt: u32 = 1;
        loop {
            match self.model.generate(history, tools).await {
                Ok(message) => return Ok(message),
                Err(e) if e.kind.is_retryable() && attempt < self.config.model_retries => {
                    let delay = e
                        .retry_after
                        .unwrap_or_else(|| self.config.retry_delay * 2u32.pow(attempt - 1));
                    tracing::warn!(
                        attempt,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "retrying model request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(EngineError::ModelUnavailable(e.to_string())),
            }
        }
    }

    /// Fan out a batch of tool calls; the result vector matches the call
    /// order regardless of completion order.
    async fn dispatch_calls(
        &self,
        calls: &[ToolCall],
        user: Option<&UserIdentity>,
    ) -> Vec<Result<crate::tools::ToolOutcome, ToolError>> {
        futures::future::join_all(calls.iter().map(|call| self.invoke_with_timeout(call, user)))
            .await
    }

    /// Resolve a proposed booking through the validation tool. `Ok` carries
    /// the fully-specified flight the user will confirm; `Err` carries the
    /// sentence recorded for the model to relay.
    async fn validate_booking(
        &self,
        booking: &ToolCall,
        user: Option<&UserIdentity>,
        trace: &mut Vec<TraceEntry>,
    ) -> Result<TicketArgs, String> {
        let proposed = match &booking.args {
            ToolArgs::InsertTicket(ticket) => ticket.clone(),
            other => serde_json::from_value(other.to_value()).unwrap_or_default(),
        };

        let call = ToolCall::new(
            uuid::Uuid::new_v4().to_string(),
            ToolArgs::ValidateTicket(proposed),
        );
        match self.invoke_with_timeout(&call, user).await {
            Ok(outcome) => {
                trace.push(
                    TraceEntry::new(call.name(), outcome.output.clone())
                        .with_query(outcome.query.clone()),
                );
                let report: ValidationReport =
                    serde_json::from_str(&outcome.output).unwrap_or_default();
                match report.flight_info {
                    Some(flight) if flight.is_complete() => Ok(flight),
                    _ => Err(report.error.unwrap_or_else(|| {
                        "Could not validate the requested flight. Ask the user to check the flight information.".to_string()
                    })),
                }
            }
            Err(e) => {
                let text = format!("Error executing tool {}: {e}", call.name());
                trace.push(TraceEntry::new(call.name(), text.clone()));
                Err(text)
            }
        }
    }

    async fn invoke_with_timeout(
        &self,
        call: &ToolCall,
        user: Option<&UserIdentity>,
    ) -> Result<crate::tools::ToolOutcome, ToolError> {
        match tokio::time::timeout(self.config.tool_timeout, self.tools.invoke(call, user)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Failed(format!(
                "tool '{}' timed out",
                call.name()
            ))),
        }
    }
}

/// Turn raw tool results into tool messages, recording each in the trace.
/// Failures become error text the model can react to.
fn absorb_results(
    calls: &[ToolCall],
    results: Vec<Result<crate::tools::ToolOutcome, ToolError>>,
    trace: &mut Vec<TraceEntry>,
) -> Vec<Message> {
    calls
        .iter()
        .zip(results)
        .map(|(call, result)| {
            let text = match result {
                Ok(outcome) => {
                    trace.push(
                        TraceEntry::new(call.name(), outcome.output.clone())
                            .with_query(outcome.query),
                    );
                    outcome.output
                }
                Err(ToolError::UnknownTool(name)) => {
                    let text = format!("Error: Tool '{name}' not found.");
                    trace.push(TraceEntry::new(call.name(), text.clone()));
                    text
                }
                Err(ToolError::Failed(message)) => {
                    let text = format!("Error executing tool {}: {message}", call.name());
                    trace.push(TraceEntry::new(call.name(), text.clone()));
                    text
                }
            };
            Message::tool(&call.id, call.name(), text)
        })
        .collect()
}
