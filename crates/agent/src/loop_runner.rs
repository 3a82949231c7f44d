//! The execution loop: model call, tool dispatch, repeat.

use std::sync::Arc;
use std::time::Duration;

use deckr_core::error::ProviderError;
use deckr_core::message::{ContentBlock, Message, Role};
use deckr_core::provider::{ModelRequest, Provider, ToolDefinition, Usage};
use deckr_core::structured::parse_structured;
use deckr_core::tool::{ToolInvocation, ToolRegistry};
use deckr_providers::retry::{RetryPolicy, with_retry};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::context::assembler::{HistoryAssembler, SideChannelContext};
use crate::context::token;
use crate::executor::ToolExecutor;
use crate::outcome::{
    FailureKind, RunFailure, RunMetadata, RunOutcome, RunStatus, ToolCallRecord,
};
use crate::sanitizer::ResultSanitizer;
use crate::stream_event::{AgentStreamEvent, StreamEmitter, StreamObserver};
use crate::tracker::ThinkingTracker;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Assembling,
    CallingModel,
    InspectingResponse,
    DispatchingTools,
    FoldingResults,
    Done,
    Aborted,
}

impl LoopPhase {
    fn describe(self) -> &'static str {
        match self {
            Self::Assembling => "assembling history",
            Self::CallingModel => "calling the model",
            Self::InspectingResponse => "inspecting the model turn",
            Self::DispatchingTools => "running tools",
            Self::FoldingResults => "folding tool results",
            Self::Done => "finishing",
            Self::Aborted => "aborting",
        }
    }
}

/// Shape expected from the model's final answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// One caller request.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub user_input: String,
    pub prior_history: Vec<Message>,
    pub side_channel: SideChannelContext,
    pub response_format: ResponseFormat,
}

impl RunRequest {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.prior_history = history;
        self
    }

    pub fn with_context(mut self, side_channel: SideChannelContext) -> Self {
        self.side_channel = side_channel;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}

/// Everything one `run` call owns. Never shared between requests.
struct LoopState {
    phase: LoopPhase,
    history: Vec<Message>,
    tool_call_log: Vec<ToolCallRecord>,
    iteration: u32,
    model_calls: u32,
    usage: Usage,
    /// Latest non-empty model text, used as the partial answer on abort.
    last_text: String,
    tracker: ThinkingTracker,
    started: Instant,
}

struct Finished {
    status: RunStatus,
    final_text: String,
    structured: Option<serde_json::Value>,
}

enum Abort {
    Upstream(ProviderError),
    Malformed(String),
    Deadline(Duration),
}

impl Abort {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Upstream(_) => FailureKind::Upstream,
            Self::Malformed(_) => FailureKind::MalformedOutput,
            Self::Deadline(_) => FailureKind::DeadlineExceeded,
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Upstream(err) => err.is_retryable(),
            Self::Malformed(_) => false,
            Self::Deadline(_) => true,
        }
    }

    /// `phase` is where the run was when it stopped.
    fn message(&self, phase: LoopPhase) -> String {
        match self {
            Self::Upstream(err) => err.to_string(),
            Self::Malformed(reason) => reason.clone(),
            Self::Deadline(limit) => format!(
                "request exceeded its {}s deadline while {}",
                limit.as_secs(),
                phase.describe()
            ),
        }
    }
}

/// Drives one request from user input to a final answer.
pub struct ExecutionLoop {
    /// The model provider
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Tools the model may call
    registry: Arc<ToolRegistry>,

    system_framing: String,
    temperature: f32,
    max_tokens: Option<u32>,

    /// Maximum model-call/tool-dispatch rounds per request
    max_iterations: u32,

    retry_policy: RetryPolicy,
    request_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,

    /// Estimated-token ceiling for context size flags
    context_ceiling: usize,

    /// Keep at most this many prior messages
    retention: Option<usize>,
}

impl ExecutionLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            registry,
            system_framing: String::new(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: 10,
            retry_policy: RetryPolicy::default(),
            request_timeout: None,
            tool_timeout: None,
            context_ceiling: 100_000,
            retention: None,
        }
    }

    /// Build a loop with every limit taken from configuration.
    pub fn from_config(
        config: &deckr_config::AppConfig,
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        Self::new(provider, &config.default_model, registry)
            .with_system_framing(&config.prompt.system_framing)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_retry_policy(RetryPolicy::from_config(&config.agent))
            .with_request_timeout(secs(config.agent.request_timeout_secs))
            .with_tool_timeout(secs(config.agent.tool_timeout_secs))
            .with_context_ceiling(config.agent.context_ceiling_tokens)
            .with_retention(config.agent.max_history_messages)
    }

    pub fn with_system_framing(mut self, framing: impl Into<String>) -> Self {
        self.system_framing = framing.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the iteration cap. Values below 1 are raised to 1.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_context_ceiling(mut self, tokens: usize) -> Self {
        self.context_ceiling = tokens;
        self
    }

    pub fn with_retention(mut self, max_messages: Option<usize>) -> Self {
        self.retention = max_messages;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one request to completion.
    ///
    /// Every event goes to `observer` as it happens; exactly one of them is
    /// terminal (`done` or `error`).
    pub async fn run(
        &self,
        request: RunRequest,
        observer: impl StreamObserver + 'static,
    ) -> Result<RunOutcome, RunFailure> {
        let emitter = StreamEmitter::new(Arc::new(observer));
        let assembled = HistoryAssembler::new()
            .with_retention(self.retention)
            .assemble(
                &self.system_framing,
                &request.prior_history,
                &request.side_channel,
                &request.user_input,
            );

        let mut state = LoopState {
            phase: LoopPhase::Assembling,
            history: assembled.messages,
            tool_call_log: Vec::new(),
            iteration: 0,
            model_calls: 0,
            usage: Usage::default(),
            last_text: String::new(),
            tracker: ThinkingTracker::new(emitter.clone()),
            started: Instant::now(),
        };

        let driven = {
            let drive = self.drive(&mut state, &assembled.system, request.response_format);
            match self.request_timeout {
                Some(limit) => tokio::time::timeout(limit, drive)
                    .await
                    .unwrap_or(Err(Abort::Deadline(limit))),
                None => drive.await,
            }
        };

        match driven {
            Ok(finished) => {
                emitter.emit(AgentStreamEvent::Done {
                    status: finished.status,
                    final_text: finished.final_text.clone(),
                    iterations: state.iteration,
                    tool_calls_made: state.tool_call_log.len(),
                });
                Ok(RunOutcome {
                    success: finished.status == RunStatus::Completed,
                    status: finished.status,
                    final_text: finished.final_text,
                    structured: finished.structured,
                    thinking_steps: state.tracker.steps().to_vec(),
                    metadata: RunMetadata {
                        iterations: state.iteration,
                        model_calls: state.model_calls,
                        total_execution_ms: state.started.elapsed().as_millis() as u64,
                        usage: state.usage,
                    },
                    tool_call_log: state.tool_call_log,
                    history: state.history,
                })
            }
            Err(abort) => {
                let failure = RunFailure {
                    kind: abort.kind(),
                    iteration: state.iteration,
                    message: abort.message(state.phase),
                    retryable: abort.retryable(),
                    thinking_steps: state.tracker.steps().to_vec(),
                    tool_call_log: state.tool_call_log,
                };
                emitter.emit(AgentStreamEvent::Error {
                    kind: failure.kind,
                    iteration: failure.iteration,
                    message: failure.message.clone(),
                });
                Err(failure)
            }
        }
    }

    async fn drive(
        &self,
        state: &mut LoopState,
        system: &str,
        format: ResponseFormat,
    ) -> Result<Finished, Abort> {
        let tools = self.registry.list();
        let executor = ToolExecutor::new(self.registry.clone()).with_timeout(self.tool_timeout);
        let sanitizer = ResultSanitizer::new(self.registry.clone());

        loop {
            state.iteration += 1;
            let iteration = state.iteration;
            let emitter = state.tracker.emitter().clone();

            // ── Model call ──
            state.phase = LoopPhase::CallingModel;
            emitter.emit(AgentStreamEvent::IterationStarted { iteration });
            emitter.emit(AgentStreamEvent::ContextEstimate {
                iteration,
                breakdown: self.estimate_context(iteration, system, &tools, &state.history),
            });

            let request = ModelRequest {
                model: self.model.clone(),
                system: system.to_string(),
                messages: state.history.clone(),
                tools: tools.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            let mut attempts = 0;
            let response = with_retry(&self.retry_policy, || {
                attempts += 1;
                self.provider.complete(request.clone())
            })
            .await;
            state.model_calls += attempts;
            let response = response.map_err(Abort::Upstream)?;
            if let Some(usage) = &response.usage {
                state.usage.add(usage);
            }

            // ── Inspect ──
            state.phase = LoopPhase::InspectingResponse;
            let turn = response.message;
            validate_turn(&turn).map_err(Abort::Malformed)?;

            let text = turn.text();
            if !text.trim().is_empty() {
                state.last_text = text.clone();
            }
            let invocations: Vec<ToolInvocation> =
                turn.invocations().filter_map(ToolInvocation::from_block).collect();

            if invocations.is_empty() {
                state.history.push(turn);
                let structured = match format {
                    ResponseFormat::Text => None,
                    ResponseFormat::Json => Some(
                        parse_structured::<serde_json::Value>(&text)
                            .map_err(|e| Abort::Malformed(e.to_string()))?,
                    ),
                };
                state.phase = LoopPhase::Done;
                return Ok(Finished {
                    status: RunStatus::Completed,
                    final_text: text,
                    structured,
                });
            }

            // ── Dispatch ──
            state.phase = LoopPhase::DispatchingTools;
            let executed = executor
                .execute_all(&mut state.tracker, iteration, invocations)
                .await;

            // ── Fold ──
            state.phase = LoopPhase::FoldingResults;
            let mut outputs = Vec::with_capacity(executed.len());
            for call in executed {
                let clean = sanitizer.sanitize(&call.invocation.name, &call.result);
                outputs.push(ContentBlock::ToolOutput {
                    invocation_id: call.invocation.id.clone(),
                    name: call.invocation.name.clone(),
                    payload: clean.to_payload(),
                });
                state.tool_call_log.push(ToolCallRecord {
                    invocation: call.invocation,
                    result: call.result,
                });
            }
            state.history.push(turn);
            state.history.push(Message::tool_outputs(outputs));

            if iteration >= self.max_iterations {
                state.phase = LoopPhase::Aborted;
                let marker = format!("[iteration limit reached after {iteration} iterations]");
                let final_text = if state.last_text.is_empty() {
                    marker
                } else {
                    format!("{}\n\n{marker}", state.last_text)
                };
                return Ok(Finished {
                    status: RunStatus::IterationLimit,
                    final_text,
                    structured: None,
                });
            }
        }
    }

    fn estimate_context(
        &self,
        iteration: u32,
        system: &str,
        tools: &[ToolDefinition],
        history: &[Message],
    ) -> token::ContextBreakdown {
        let mut components = vec![
            ("system".to_string(), token::estimate_tokens(system)),
            ("tool_declarations".to_string(), token::estimate_tools(tools)),
        ];
        components.extend(history.iter().enumerate().map(|(i, message)| {
            let kind = if message.is_tool_output() {
                "tool_outputs"
            } else if message.role == Role::Model {
                "model"
            } else {
                "user"
            };
            (format!("turn[{i}] ({kind})"), token::estimate_message(message))
        }));
        let components: Vec<(&str, usize)> = components
            .iter()
            .map(|(name, tokens)| (name.as_str(), *tokens))
            .collect();

        token::log_breakdown(
            &format!("iteration {iteration}"),
            &components,
            self.context_ceiling,
        )
    }
}

/// Reject model turns the loop cannot act on safely.
fn validate_turn(turn: &Message) -> Result<(), String> {
    if turn.role != Role::Model {
        return Err(format!("model turn has role {:?}", turn.role));
    }
    if turn.invocations().next().is_none() && turn.text().trim().is_empty() {
        return Err("model turn has neither text nor tool invocations".into());
    }
    let mut seen = std::collections::HashSet::new();
    for block in turn.invocations() {
        if let ContentBlock::ToolInvocation { id, name, .. } = block {
            if name.trim().is_empty() {
                return Err(format!("tool invocation '{id}' has no tool name"));
            }
            if !seen.insert(id.as_str()) {
                return Err(format!("duplicate tool invocation id '{id}'"));
            }
        }
    }
    Ok(())
}
