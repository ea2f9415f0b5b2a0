//! DAG Runner - sequential node execution over a remote invoker
//!
//! One run:
//! 1. order nodes once (fatal on cycle / unknown start node)
//! 2. for each node in order: resolve → invoke → extract → validate,
//!    retrying with a corrective prompt while the budget lasts
//! 3. record every node's outcome as data; the run itself never fails
//!    after ordering succeeds
//!
//! Nodes run strictly one at a time so downstream nodes always see a
//! consistent set of upstream outputs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::ast::{TaskNode, WorkNode, WorkflowGraph};
use crate::binding::substitute;
use crate::config::RelayConfig;
use crate::dag::execution_order;
use crate::error::{RelayError, Result};
use crate::event::{EventKind, EventLog};
use crate::remote::{ProviderRegistry, RemoteInvoker};
use crate::store::OutputMap;

use super::context::{AttemptRecord, ExecutionContext, NodeResult, ResultEntry, RunReport, RunStatus};
use super::extract::extract_with;
use super::state::NodeRunState;
use super::validate::{build_retry_prompt, validate, DEFAULT_RETRY_OUTPUT_LIMIT};

/// Key of the diagnostic output recorded for skipped and failed nodes
pub const ERROR_OUTPUT_KEY: &str = "error";

/// Run-wide defaults; work nodes may override retries and timeout
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub max_retries: u32,
    pub timeout: Duration,
    pub retry_output_limit: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout: Duration::from_millis(120_000),
            retry_output_limit: DEFAULT_RETRY_OUTPUT_LIMIT,
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            max_retries: config.runner.max_retries,
            timeout: config.timeout(),
            retry_output_limit: config.runner.retry_output_limit,
        }
    }
}

/// Executes one workflow graph; at most one run at a time
pub struct Runner {
    graph: Arc<WorkflowGraph>,
    invoker: Arc<RemoteInvoker>,
    registry: Arc<dyn ProviderRegistry>,
    settings: RunSettings,
    start_node: Option<String>,
    running: AtomicBool,
}

impl Runner {
    pub fn new(
        graph: impl Into<Arc<WorkflowGraph>>,
        invoker: Arc<RemoteInvoker>,
        registry: Arc<dyn ProviderRegistry>,
    ) -> Self {
        Self {
            graph: graph.into(),
            invoker,
            registry,
            settings: RunSettings::default(),
            start_node: None,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Only run the nodes reachable from `node_id`
    pub fn with_start_node(mut self, node_id: impl Into<String>) -> Self {
        self.start_node = Some(node_id.into());
        self
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the graph to completion
    ///
    /// Errors only for configuration problems (cycle, unknown start node) or
    /// an overlapping run; node failures are reported in the `RunReport`.
    pub async fn run(&self, input: &str) -> Result<RunReport> {
        self.run_with_cancel(input, CancellationToken::new()).await
    }

    /// Run until complete or until `cancel` fires
    ///
    /// Cancelling mid-invoke drops the in-flight invocation, deregistering
    /// its listener.
    #[instrument(skip(self, input, cancel), fields(nodes = self.graph.len()))]
    pub async fn run_with_cancel(&self, input: &str, cancel: CancellationToken) -> Result<RunReport> {
        let _guard = RunGuard::acquire(&self.running)?;
        let run_start = Instant::now();

        let order = execution_order(&self.graph, self.start_node.as_deref())?;
        let run_id = Uuid::new_v4().to_string();
        let events = EventLog::new();
        let mut ctx = ExecutionContext::new(input, &order, events.clone());

        events.emit(EventKind::RunStarted {
            run_id: run_id.clone(),
            node_count: order.len(),
            start_node: self.start_node.as_deref().map(Arc::from),
        });
        info!(%run_id, nodes = order.len(), "run started");

        for node_id in &order {
            ctx.transition(node_id, NodeRunState::Waiting);
        }

        let mut nodes = Vec::with_capacity(order.len());
        let mut status = RunStatus::Complete;

        for node_id in &order {
            if cancel.is_cancelled() {
                status = RunStatus::Cancelled;
                events.emit(EventKind::RunCancelled {
                    run_id: run_id.clone(),
                    interrupted: None,
                });
                break;
            }

            let Some(node) = self.graph.node(node_id) else {
                continue;
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.execute_node(node, node_id, &mut ctx) => Some(result),
            };

            match outcome {
                Some(result) => nodes.push(result),
                None => {
                    status = RunStatus::Cancelled;
                    let mut interrupted = NodeResult::new(Arc::clone(node_id), node.display_label());
                    interrupted.status = ctx.state(node_id);
                    interrupted.error = Some("Cancelled".to_string());
                    nodes.push(interrupted);
                    events.emit(EventKind::RunCancelled {
                        run_id: run_id.clone(),
                        interrupted: Some(Arc::clone(node_id)),
                    });
                    warn!(%run_id, node_id = %node_id, "run cancelled mid-node");
                    break;
                }
            }
        }

        if status == RunStatus::Complete {
            let (succeeded, failed, skipped) = ctx.tally();
            let total_duration_ms = run_start.elapsed().as_millis() as u64;
            events.emit(EventKind::RunCompleted {
                run_id: run_id.clone(),
                succeeded,
                failed,
                skipped,
                total_duration_ms,
            });
            info!(%run_id, succeeded, failed, skipped, total_duration_ms, "run complete");
        }

        let results = nodes
            .iter()
            .filter(|n| matches!(self.graph.node(&n.node_id), Some(TaskNode::Work(_))))
            .filter(|n| n.status.is_terminal())
            .map(|n| ResultEntry {
                label: n.label.clone(),
                response: n.response.clone(),
                output: n.extracted_output.clone().unwrap_or(Value::Null),
            })
            .collect();

        Ok(RunReport {
            run_id,
            status,
            nodes,
            results,
            outputs: ctx.outputs.to_value(),
            history: std::mem::take(&mut ctx.history),
            events,
        })
    }

    async fn execute_node(&self, node: &TaskNode, node_id: &Arc<str>, ctx: &mut ExecutionContext) -> NodeResult {
        match node {
            TaskNode::Work(work) => self.execute_work(work, node_id, ctx).await,
            TaskNode::Start(_) | TaskNode::Terminal(_) => {
                ctx.transition(node_id, NodeRunState::Running);
                ctx.transition(node_id, NodeRunState::Success);
                let mut result = NodeResult::new(Arc::clone(node_id), node.display_label());
                result.status = NodeRunState::Success;
                result
            }
        }
    }

    #[instrument(skip_all, fields(node_id = %node_id))]
    async fn execute_work(&self, work: &WorkNode, node_id: &Arc<str>, ctx: &mut ExecutionContext) -> NodeResult {
        let mut result = NodeResult::new(Arc::clone(node_id), work.label.as_deref().unwrap_or(&work.id));

        let provider = match self.capability(work) {
            Ok(provider) => provider,
            Err(reason) => return self.skip(node_id, reason, result, ctx),
        };

        let max_retries = work.max_retries.unwrap_or(self.settings.max_retries);
        let timeout = work
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.settings.timeout);

        let original_prompt = substitute(&work.template, &work.static_bindings, &ctx.input, &ctx.outputs).into_owned();
        result.resolved_prompt = Some(original_prompt.clone());
        ctx.events().emit(EventKind::PromptResolved {
            node_id: Arc::clone(node_id),
            attempt: 1,
            template: work.template.clone(),
            prompt: original_prompt.clone(),
        });

        ctx.transition(node_id, NodeRunState::Running);
        let mut prompt = original_prompt.clone();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            result.attempts = attempt;

            ctx.events().emit(EventKind::ProviderInvoked {
                node_id: Arc::clone(node_id),
                provider_id: provider.to_string(),
                attempt,
                timeout_ms: timeout.as_millis() as u64,
            });
            let started = Instant::now();

            let response = match self.invoker.invoke(provider, &prompt, timeout).await {
                Ok(response) => response,
                Err(e) => {
                    // Transport failures end the node without retrying
                    let text = e.node_output_text();
                    warn!(error = %e, attempt, "invocation failed");
                    ctx.events().emit(EventKind::ProviderFailed {
                        node_id: Arc::clone(node_id),
                        provider_id: provider.to_string(),
                        attempt,
                        error: e.to_string(),
                    });
                    ctx.history.push(AttemptRecord {
                        node_id: Arc::clone(node_id),
                        attempt,
                        prompt,
                        response: None,
                        error: Some(text.clone()),
                        validation: None,
                    });
                    let outputs = error_output(&text);
                    ctx.record_outputs(node_id, outputs.clone());
                    ctx.transition(node_id, NodeRunState::Error);
                    result.status = NodeRunState::Error;
                    result.extracted_output = Some(Value::Object(outputs));
                    result.error = Some(text);
                    return self.finish(node_id, result, ctx);
                }
            };

            ctx.events().emit(EventKind::ProviderResponded {
                node_id: Arc::clone(node_id),
                provider_id: provider.to_string(),
                attempt,
                response_len: response.len(),
                duration_ms: started.elapsed().as_millis() as u64,
            });

            let extracted = extract_with(&response, &work.extraction);
            let validation = validate(&response, work.output_type, work.output_schema.as_ref());
            let valid = validation.valid;

            ctx.history.push(AttemptRecord {
                node_id: Arc::clone(node_id),
                attempt,
                prompt: std::mem::take(&mut prompt),
                response: Some(response.clone()),
                error: None,
                validation: Some(validation.clone()),
            });
            result.response = Some(response.clone());

            if valid {
                let mut outputs = OutputMap::new();
                outputs.insert(work.extraction.output_name.clone(), extracted.clone());
                ctx.record_outputs(node_id, outputs);
                ctx.transition(node_id, NodeRunState::Success);
                result.status = NodeRunState::Success;
                result.extracted_output = Some(extracted);
                debug!(attempt, "node succeeded");
                return self.finish(node_id, result, ctx);
            }

            ctx.events().emit(EventKind::ValidationFailed {
                node_id: Arc::clone(node_id),
                attempt,
                errors: validation.errors.clone(),
            });

            if attempt > max_retries {
                // Budget exhausted: keep the last output as a best-effort value
                let err = RelayError::ValidationFailed {
                    node_id: node_id.to_string(),
                    attempts: attempt,
                    errors: validation.errors,
                };
                warn!(error = %err, "retries exhausted");
                let mut outputs = OutputMap::new();
                outputs.insert(work.extraction.output_name.clone(), extracted.clone());
                ctx.record_outputs(node_id, outputs);
                ctx.transition(node_id, NodeRunState::Error);
                result.status = NodeRunState::Error;
                result.extracted_output = Some(extracted);
                result.error = Some(err.to_string());
                return self.finish(node_id, result, ctx);
            }

            debug!(attempt, errors = validation.errors.len(), "validation failed, retrying");
            ctx.transition(node_id, NodeRunState::Retrying);
            prompt = build_retry_prompt(
                &original_prompt,
                &response,
                work.output_type,
                work.output_schema.as_ref(),
                &validation,
                self.settings.retry_output_limit,
            );
            ctx.events().emit(EventKind::PromptResolved {
                node_id: Arc::clone(node_id),
                attempt: attempt + 1,
                template: work.template.clone(),
                prompt: prompt.clone(),
            });
            ctx.transition(node_id, NodeRunState::Running);
        }
    }

    /// Provider to invoke, or the reason the node must be skipped
    fn capability<'w>(&self, work: &'w WorkNode) -> std::result::Result<&'w str, String> {
        let unavailable = |provider_id: Option<&str>| {
            RelayError::ProviderUnavailable {
                node_id: work.id.clone(),
                provider_id: provider_id.map(str::to_string),
            }
            .to_string()
        };

        match work.provider.as_deref() {
            None => Err(unavailable(None)),
            Some(p) if !self.registry.is_available(p) => Err(unavailable(Some(p))),
            Some(_) if !work.has_template() => Err(format!("Node '{}' has no template to resolve", work.id)),
            Some(p) => Ok(p),
        }
    }

    fn skip(&self, node_id: &Arc<str>, reason: String, mut result: NodeResult, ctx: &mut ExecutionContext) -> NodeResult {
        warn!(node_id = %node_id, %reason, "skipping node");
        let outputs = error_output(&reason);
        ctx.record_outputs(node_id, outputs.clone());
        ctx.transition(node_id, NodeRunState::Skipped);
        result.status = NodeRunState::Skipped;
        result.extracted_output = Some(Value::Object(outputs));
        result.error = Some(reason);
        self.finish(node_id, result, ctx)
    }

    fn finish(&self, node_id: &Arc<str>, result: NodeResult, ctx: &ExecutionContext) -> NodeResult {
        let output = ctx
            .outputs
            .get(node_id)
            .map(|m| Value::Object((*m).clone()))
            .unwrap_or_else(|| json!({}));
        ctx.events().emit(EventKind::NodeFinished {
            node_id: Arc::clone(node_id),
            state: result.status,
            attempts: result.attempts,
            output: Arc::new(output),
        });
        result
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("nodes", &self.graph.len())
            .field("start_node", &self.start_node)
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish()
    }
}

fn error_output(text: &str) -> OutputMap {
    let mut outputs = OutputMap::new();
    outputs.insert(ERROR_OUTPUT_KEY.to_string(), Value::String(text.to_string()));
    outputs
}

/// Rejects overlapping runs; released on drop
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| RelayError::RunInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
