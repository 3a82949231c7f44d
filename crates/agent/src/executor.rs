//! Concurrent tool dispatch for one iteration.
//!
//! Every invocation in a batch runs on its own task. Results come back in
//! the order the model issued the invocations, whatever order they finish
//! in. A failing, timed-out or panicking tool only affects its own result.

use crate::tracker::ThinkingTracker;
use deckr_core::error::ToolError;
use deckr_core::thinking::StepCategory;
use deckr_core::tool::{ProgressReporter, Tool, ToolErrorKind, ToolInvocation, ToolRegistry, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// An invocation together with how it settled.
#[derive(Debug, Clone)]
pub struct ExecutedCall {
    pub invocation: ToolInvocation,
    pub result: ToolResult,
    pub step_id: String,
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    tool_timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tool_timeout: None,
        }
    }

    /// Per-tool deadline. `None` lets tools run as long as the request allows.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Unique within a run, even when one tool is invoked twice in a batch.
    pub fn step_id(iteration: u32, index: usize, tool_name: &str) -> String {
        format!("step-{iteration}-{index}-{tool_name}")
    }

    /// Run every invocation concurrently and return results in input order.
    ///
    /// Dropping the returned future aborts every tool still running.
    pub async fn execute_all(
        &self,
        tracker: &mut ThinkingTracker,
        iteration: u32,
        invocations: Vec<ToolInvocation>,
    ) -> Vec<ExecutedCall> {
        let count = invocations.len();
        let mut results: Vec<Option<ToolResult>> = vec![None; count];
        let mut step_ids = Vec::with_capacity(count);
        let mut task_index = HashMap::with_capacity(count);
        let mut set = JoinSet::new();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(usize, String)>();

        for (index, invocation) in invocations.iter().enumerate() {
            let step_id = Self::step_id(iteration, index, &invocation.name);

            match self.registry.lookup(&invocation.name) {
                Ok(tool) => {
                    tracker.start(
                        &step_id,
                        tool.step_title(&invocation.arguments),
                        tool.category(),
                    );
                    let tx = progress_tx.clone();
                    let progress = ProgressReporter::new(move |line| {
                        let _ = tx.send((index, line.to_string()));
                    });
                    let arguments = invocation.arguments.clone();
                    let timeout = self.tool_timeout;
                    let handle = set.spawn(async move {
                        (index, run_tool(tool, arguments, progress, timeout).await)
                    });
                    task_index.insert(handle.id(), index);
                }
                Err(err) => {
                    warn!(tool = %invocation.name, "Model requested an unknown tool");
                    tracker.start(
                        &step_id,
                        format!("Unknown tool {}", invocation.name),
                        StepCategory::General,
                    );
                    results[index] = Some(ToolResult::from_error(&err));
                    tracker.complete(&step_id);
                }
            }
            step_ids.push(step_id);
        }
        drop(progress_tx);

        debug!(iteration, spawned = set.len(), total = count, "Tools dispatched");

        loop {
            tokio::select! {
                biased;
                Some((index, line)) = progress_rx.recv() => {
                    tracker.update(&step_ids[index], &line);
                }
                joined = set.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    // Apply anything the task reported before it finished.
                    while let Ok((index, line)) = progress_rx.try_recv() {
                        tracker.update(&step_ids[index], &line);
                    }
                    let (index, result) = match joined {
                        Ok((_, settled)) => settled,
                        Err(join_err) => {
                            let Some(&index) = task_index.get(&join_err.id()) else {
                                warn!(error = %join_err, "Lost track of a tool task");
                                continue;
                            };
                            let name = &invocations[index].name;
                            warn!(tool = %name, error = %join_err, "Tool task panicked");
                            (index, panicked(join_err))
                        }
                    };
                    results[index] = Some(result);
                    tracker.complete(&step_ids[index]);
                }
            }
        }

        invocations
            .into_iter()
            .zip(step_ids)
            .zip(results)
            .map(|((invocation, step_id), result)| ExecutedCall {
                result: result.unwrap_or_else(|| {
                    ToolResult::failure(
                        ToolErrorKind::ExecutionFailed,
                        format!("tool '{}' did not report a result", invocation.name),
                    )
                }),
                invocation,
                step_id,
            })
            .collect()
    }
}

async fn run_tool(
    tool: Arc<dyn Tool>,
    arguments: serde_json::Value,
    progress: ProgressReporter,
    timeout: Option<Duration>,
) -> ToolResult {
    let started = Instant::now();
    let name = tool.name().to_string();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, tool.execute(arguments, progress)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolError::Timeout {
                tool_name: name.clone(),
                timeout_secs: limit.as_secs(),
            }),
        },
        None => tool.execute(arguments, progress).await,
    };

    let mut result = match outcome {
        Ok(result) => result,
        Err(err) => {
            debug!(tool = %name, error = %err, "Tool failed");
            ToolResult::from_error(&err)
        }
    };
    result.metadata.execution_time_ms = started.elapsed().as_millis() as u64;
    result
}

fn panicked(err: tokio::task::JoinError) -> ToolResult {
    let message = if err.is_panic() {
        let payload = err.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "tool panicked".to_string())
    } else {
        "tool task was cancelled".to_string()
    };
    ToolResult::failure(ToolErrorKind::Panicked, message)
}
