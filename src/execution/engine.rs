//! Pipeline runner - orchestrates a brick pipeline run

use crate::bricks::{BrickOptions, BrickRegistry, PipelineInvoker, RunMeta};
use crate::core::config::ModComponent;
use crate::core::context::{RunContext, INPUT_KEY, MOD_KEY, OPTIONS_KEY};
use crate::core::pipeline::BrickPipeline;
use crate::core::state::{ExecutionStatus, RunState, StepState};
use crate::core::step::OnError;
use crate::error::{BrickError, PipelineError};
use crate::execution::executor::{StepExecutor, StepResult};
use crate::execution::trace::{RunCounter, RunTrace, StepTrace};
use crate::execution::{AbortReason, AbortSignal};
use crate::logging::{BrickLogger, MessageContext};
use crate::platform::{ElementRef, Platform};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Sub-pipelines nested deeper than this fail instead of recursing further
pub const MAX_NESTING_DEPTH: usize = 64;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        run_number: u64,
        mod_id: Option<String>,
        component_id: Option<String>,
        total_steps: usize,
    },
    StepStarted {
        run_id: Uuid,
        depth: usize,
        index: usize,
        brick_id: String,
        label: String,
    },
    StepSkipped {
        run_id: Uuid,
        depth: usize,
        index: usize,
        brick_id: String,
        reason: String,
    },
    StepCompleted {
        run_id: Uuid,
        depth: usize,
        index: usize,
        brick_id: String,
        output: Value,
    },
    StepFailed {
        run_id: Uuid,
        depth: usize,
        index: usize,
        brick_id: String,
        label: String,
        error: BrickError,
        continued: bool,
    },
    RunAborted {
        run_id: Uuid,
        /// Index of the first top-level step that did not complete
        index: usize,
    },
    RunCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Per-run parameters
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bound as `@input`
    pub input: Value,

    /// Mod options, bound as `@options`
    pub options: Map<String, Value>,

    /// Mod variables, bound as `@mod`
    pub variables: Map<String, Value>,

    pub mod_id: Option<String>,
    pub component_id: Option<String>,

    /// Context key holding the run's result; the last output otherwise
    pub output_key: Option<String>,

    /// Skip impure steps
    pub dry_run: bool,

    /// Cancels the run when fired
    pub abort_signal: AbortSignal,

    /// Abort the run after this long
    pub timeout: Option<Duration>,

    /// Root element the run starts from
    pub root: Option<ElementRef>,

    /// Configured services, each bound as `@<key>`
    pub services: Map<String, Value>,
}

impl RunOptions {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }

    /// Options for running a component of a mod definition
    pub fn for_component(component: &ModComponent, input: Value) -> Self {
        Self {
            input,
            mod_id: Some(component.mod_id.clone()),
            component_id: Some(component.id.clone()),
            output_key: component.output.clone(),
            ..Default::default()
        }
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = signal;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_services(mut self, services: Map<String, Value>) -> Self {
        self.services = services;
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    fn initial_context(&self) -> RunContext {
        RunContext::new().extend([
            (INPUT_KEY, self.input.clone()),
            (OPTIONS_KEY, Value::Object(self.options.clone())),
            (MOD_KEY, Value::Object(self.variables.clone())),
        ])
        .extend(self.services.iter().map(|(key, value)| (key.as_str(), value.clone())))
    }
}

/// Result of a run that was not halted by a failing step
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    pub run_number: u64,

    /// `None` when the run was cancelled
    pub result: Option<Value>,

    /// Context after the last step
    pub context: RunContext,

    /// Every step reached, including nested ones
    pub steps: Vec<StepTrace>,
}

impl RunOutcome {
    pub fn run_id(&self) -> Uuid {
        self.state.run_id
    }

    pub fn status(&self) -> ExecutionStatus {
        self.state.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.status == ExecutionStatus::Cancelled
    }

    /// Traces of the top-level steps
    pub fn top_level_steps(&self) -> Vec<&StepTrace> {
        self.steps.iter().filter(|step| step.call == 0).collect()
    }
}

/// A failing step, before it is reported
struct StepFailure {
    index: usize,
    brick_id: String,
    label: String,
    error: BrickError,
}

/// Output of a pipeline invocation
struct Completed {
    last: Value,
    context: RunContext,
}

/// Executes brick pipelines
#[derive(Clone)]
pub struct PipelineRunner {
    executor: Arc<StepExecutor>,
    platform: Platform,
    logger: BrickLogger,
    run_counter: Arc<RunCounter>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl PipelineRunner {
    pub fn new(registry: Arc<BrickRegistry>, platform: Platform) -> Self {
        Self {
            executor: Arc::new(StepExecutor::new(registry)),
            platform,
            logger: BrickLogger::default(),
            run_counter: Arc::new(RunCounter::new()),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Logger every brick logger derives from
    pub fn with_logger(mut self, logger: BrickLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn registry(&self) -> &BrickRegistry {
        self.executor.registry()
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Run a pipeline
    ///
    /// An intentional cancellation ends the run with status `Cancelled`; a
    /// timeout, or a step failure that is not continued, is an error.
    pub async fn run(&self, pipeline: &BrickPipeline, options: RunOptions) -> Result<RunOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let counter_key = format!(
            "{}/{}",
            options.mod_id.as_deref().unwrap_or_default(),
            options.component_id.as_deref().unwrap_or_default()
        );
        let run_number = self.run_counter.next(&counter_key);
        let abort = match options.timeout {
            Some(timeout) => options.abort_signal.with_timeout(timeout),
            None => options.abort_signal.clone(),
        };

        let scope = Arc::new(RunScope {
            runner: self.clone(),
            run_id,
            run_number,
            dry_run: options.dry_run,
            trace: RunTrace::new(),
            logger: self.logger.child(MessageContext {
                mod_id: options.mod_id.clone(),
                mod_component_id: options.component_id.clone(),
                run_id: Some(run_id),
                ..Default::default()
            }),
        });

        let mut state = RunState::new(run_id);
        state.start(pipeline.len());
        info!("Starting run {} (#{}) with {} steps", run_id, run_number, pipeline.len());
        for key in pipeline.duplicate_output_keys() {
            warn!("Output key @{} is bound by more than one step; the last binding wins", key);
        }
        self.emit_event(ExecutionEvent::RunStarted {
            run_id,
            run_number,
            mod_id: options.mod_id.clone(),
            component_id: options.component_id.clone(),
            total_steps: pipeline.len(),
        })
        .await;

        let meta = RunMeta {
            mod_id: options.mod_id.clone(),
            mod_component_id: options.component_id.clone(),
            ..RunMeta::new(run_id, run_number)
        };
        let base = BrickOptions::new(
            options.initial_context(),
            self.platform.clone(),
            abort.clone(),
            meta,
            Arc::new(NestedInvoker { scope: scope.clone() }),
        )
        .with_root(options.root.clone())
        .with_logger(scope.logger.clone());

        let result = scope.invoke(pipeline, base).await;
        for step in scope.trace.call_steps(0) {
            state.record(&step.state);
        }

        match result {
            Ok(completed) => {
                state.finish(ExecutionStatus::Completed);
                let result = match &options.output_key {
                    Some(key) => completed.context.get(key).cloned().unwrap_or(Value::Null),
                    None => completed.last,
                };
                info!("Run {} completed", run_id);
                self.emit_event(ExecutionEvent::RunCompleted {
                    run_id,
                    status: ExecutionStatus::Completed,
                })
                .await;
                Ok(RunOutcome {
                    state,
                    run_number,
                    result: Some(result),
                    context: completed.context,
                    steps: scope.trace.steps(),
                })
            }
            Err(failure) if failure.error.is_abort() => {
                self.emit_event(ExecutionEvent::RunAborted {
                    run_id,
                    index: failure.index,
                })
                .await;

                if let Some(AbortReason::Timeout(timeout)) = abort.reason() {
                    state.finish(ExecutionStatus::Failed);
                    error!("Run {} timed out at step {}", run_id, failure.index);
                    self.emit_event(ExecutionEvent::RunCompleted {
                        run_id,
                        status: ExecutionStatus::Failed,
                    })
                    .await;
                    return Err(PipelineError {
                        step_index: failure.index,
                        label: failure.label,
                        brick_id: failure.brick_id,
                        mod_id: options.mod_id.clone(),
                        source: BrickError::business(format!(
                            "Run did not finish in {} milliseconds",
                            timeout.as_millis()
                        )),
                    });
                }

                state.finish(ExecutionStatus::Cancelled);
                info!("Run {} cancelled at step {}", run_id, failure.index);
                self.emit_event(ExecutionEvent::RunCompleted {
                    run_id,
                    status: ExecutionStatus::Cancelled,
                })
                .await;
                Ok(RunOutcome {
                    state,
                    run_number,
                    result: None,
                    context: RunContext::new(),
                    steps: scope.trace.steps(),
                })
            }
            Err(failure) => {
                state.finish(ExecutionStatus::Failed);
                error!("Run {} failed at step {}: {}", run_id, failure.index, failure.error);
                self.emit_event(ExecutionEvent::RunCompleted {
                    run_id,
                    status: ExecutionStatus::Failed,
                })
                .await;
                Err(PipelineError {
                    step_index: failure.index,
                    label: failure.label,
                    brick_id: failure.brick_id,
                    mod_id: options.mod_id,
                    source: failure.error,
                })
            }
        }
    }

    /// Run a mod component's pipeline
    pub async fn run_component(&self, component: &ModComponent, options: RunOptions) -> Result<RunOutcome, PipelineError> {
        self.run(&component.pipeline, options).await
    }
}

/// State shared by every pipeline invocation of one run
struct RunScope {
    runner: PipelineRunner,
    run_id: Uuid,
    run_number: u64,
    dry_run: bool,
    trace: RunTrace,
    logger: BrickLogger,
}

impl RunScope {
    /// Run the steps of one pipeline invocation in order
    ///
    /// `base` carries the invocation's context, root, signal and call number.
    async fn invoke(&self, pipeline: &BrickPipeline, base: BrickOptions) -> Result<Completed, StepFailure> {
        let call = base.meta.call;
        let depth = base.meta.depth;
        for (index, step) in pipeline.iter().enumerate() {
            self.trace.add(call, depth, index, &step.id, &step.label);
        }

        let mut ctxt = base.ctxt.clone();
        let mut last = Value::Null;

        for (index, step) in pipeline.iter().enumerate() {
            if base.abort_signal.is_aborted() {
                info!("Run {} aborted before step {}", self.run_id, step.label);
                self.abort_remaining(call, index, pipeline.len());
                return Err(StepFailure {
                    index,
                    brick_id: step.id.clone(),
                    label: step.label.clone(),
                    error: BrickError::Aborted,
                });
            }

            let started_at = Utc::now();
            self.trace.update(call, index, StepState::Running { started_at });
            self.runner
                .emit_event(ExecutionEvent::StepStarted {
                    run_id: self.run_id,
                    depth,
                    index,
                    brick_id: step.id.clone(),
                    label: step.label.clone(),
                })
                .await;

            let mut options = base.clone();
            options.ctxt = ctxt.clone();
            options.meta.step_index = index;
            options.logger = self.logger.child(MessageContext {
                brick_id: Some(step.id.clone()),
                step_index: Some(index),
                label: Some(step.label.clone()),
                ..Default::default()
            });

            match self.runner.executor.execute(step, options, self.dry_run).await {
                Ok(StepResult::Completed(output)) => {
                    if let Some(key) = &step.output_key {
                        ctxt = ctxt.bind(key, output.clone());
                    }
                    self.trace.update(
                        call,
                        index,
                        StepState::Completed {
                            output: output.clone(),
                            started_at,
                            completed_at: Utc::now(),
                        },
                    );
                    self.runner
                        .emit_event(ExecutionEvent::StepCompleted {
                            run_id: self.run_id,
                            depth,
                            index,
                            brick_id: step.id.clone(),
                            output: output.clone(),
                        })
                        .await;
                    last = output;
                }
                Ok(StepResult::Skipped(reason)) => {
                    self.trace.update(call, index, StepState::Skipped { reason: reason.clone() });
                    self.runner
                        .emit_event(ExecutionEvent::StepSkipped {
                            run_id: self.run_id,
                            depth,
                            index,
                            brick_id: step.id.clone(),
                            reason,
                        })
                        .await;
                }
                Err(error) if error.is_abort() => {
                    info!("Step {} aborted", step.label);
                    self.abort_remaining(call, index, pipeline.len());
                    return Err(StepFailure {
                        index,
                        brick_id: step.id.clone(),
                        label: step.label.clone(),
                        error,
                    });
                }
                Err(error) => {
                    let continued = step.on_error == OnError::Continue;
                    self.trace.update(
                        call,
                        index,
                        StepState::Failed {
                            error: error.to_string(),
                            kind: error.kind(),
                            failed_at: Utc::now(),
                        },
                    );
                    self.runner
                        .emit_event(ExecutionEvent::StepFailed {
                            run_id: self.run_id,
                            depth,
                            index,
                            brick_id: step.id.clone(),
                            label: step.label.clone(),
                            error: error.clone(),
                            continued,
                        })
                        .await;

                    if !continued {
                        return Err(StepFailure {
                            index,
                            brick_id: step.id.clone(),
                            label: step.label.clone(),
                            error,
                        });
                    }
                    warn!("Step {} failed, continuing: {}", step.label, error);
                }
            }
        }

        Ok(Completed { last, context: ctxt })
    }

    fn abort_remaining(&self, call: u64, from: usize, len: usize) {
        for index in from..len {
            self.trace.update(call, index, StepState::Aborted);
        }
    }
}

/// Runs sub-pipelines inside the run that owns the calling brick
struct NestedInvoker {
    scope: Arc<RunScope>,
}

#[async_trait]
impl PipelineInvoker for NestedInvoker {
    async fn run_nested(&self, pipeline: &BrickPipeline, options: &BrickOptions) -> Result<Value, BrickError> {
        if options.meta.depth > MAX_NESTING_DEPTH {
            return Err(BrickError::business(format!(
                "Pipelines nested more than {} levels deep",
                MAX_NESTING_DEPTH
            )));
        }

        let mut nested = options.clone();
        nested.meta.call = self.scope.trace.next_call();
        info!(
            "Run {} (#{}) entering nested pipeline call {} at depth {}",
            self.scope.run_id, self.scope.run_number, nested.meta.call, nested.meta.depth
        );

        // Each invocation is polled as its own task so nesting does not grow the caller's stack
        let scope = self.scope.clone();
        let pipeline = pipeline.clone();
        let task = NestedTask(tokio::spawn(async move {
            scope
                .invoke(&pipeline, nested)
                .await
                .map(|completed| completed.last)
                .map_err(|failure| failure.error)
        }));
        task.join().await
    }
}

/// Nested invocation task, aborted if the caller stops waiting for it
struct NestedTask(JoinHandle<Result<Value, BrickError>>);

impl NestedTask {
    async fn join(mut self) -> Result<Value, BrickError> {
        match (&mut self.0).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(BrickError::Aborted),
            Err(e) => Err(BrickError::unexpected(format!("Nested pipeline panicked: {}", e))),
        }
    }
}

impl Drop for NestedTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bricks::builtin::testing::headless_platform;
    use crate::bricks::{Brick, BrickArgs, BrickMetadata, Transformer};
    use crate::core::pipeline::PipelineExpression;
    use crate::core::step::BrickConfig;
    use serde_json::json;

    /// Runs a pipeline containing itself
    struct Recurse {
        metadata: BrickMetadata,
    }

    #[async_trait]
    impl Transformer for Recurse {
        fn metadata(&self) -> &BrickMetadata {
            &self.metadata
        }

        async fn transform(&self, _args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
            let body = PipelineExpression::new(BrickPipeline::new(vec![BrickConfig::new("@test/recurse")]));
            options.run_pipeline(&body, Vec::<(&str, Value)>::new()).await
        }
    }

    /// Recurses until it reaches `@input.depth`, then returns that depth
    struct Descend {
        metadata: BrickMetadata,
    }

    #[async_trait]
    impl Transformer for Descend {
        fn metadata(&self) -> &BrickMetadata {
            &self.metadata
        }

        async fn transform(&self, _args: &BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
            let target = options.ctxt.get("@input").and_then(|input| input["depth"].as_u64()).unwrap_or(0);
            if options.meta.depth as u64 >= target {
                return Ok(json!(options.meta.depth));
            }
            let body = PipelineExpression::new(BrickPipeline::new(vec![BrickConfig::new("@test/descend")]));
            options.run_pipeline(&body, Vec::<(&str, Value)>::new()).await
        }
    }

    fn runner() -> PipelineRunner {
        let registry = Arc::new(BrickRegistry::with_builtins());
        registry.register([
            Brick::transformer(Recurse {
                metadata: BrickMetadata::new("@test/recurse", "Recurse"),
            }),
            Brick::transformer(Descend {
                metadata: BrickMetadata::new("@test/descend", "Descend"),
            }),
        ]);
        PipelineRunner::new(registry, headless_platform())
    }

    #[tokio::test]
    async fn test_runaway_nesting_is_capped() {
        let pipeline = BrickPipeline::new(vec![BrickConfig::new("@test/recurse")]);
        let error = runner().run(&pipeline, RunOptions::default()).await.unwrap_err();
        assert_eq!(
            error.source,
            BrickError::business(format!("Pipelines nested more than {} levels deep", MAX_NESTING_DEPTH))
        );
        assert_eq!(error.step_index, 0);
    }

    #[tokio::test]
    async fn test_deep_nesting_below_cap_completes() {
        let pipeline = BrickPipeline::new(vec![BrickConfig::new("@test/descend")]);
        let outcome = runner()
            .run(&pipeline, RunOptions::new(json!({"depth": 60})))
            .await
            .unwrap();
        assert_eq!(outcome.result, Some(json!(60)));
        assert_eq!(outcome.steps.iter().filter(|step| step.depth == 60).count(), 1);
    }

    #[tokio::test]
    async fn test_events_follow_step_lifecycle() {
        let runner = runner();
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = events.clone();
        runner
            .add_event_handler(move |event| {
                let name = match event {
                    ExecutionEvent::RunStarted { total_steps, .. } => format!("run:{}", total_steps),
                    ExecutionEvent::StepStarted { index, .. } => format!("start:{}", index),
                    ExecutionEvent::StepSkipped { index, .. } => format!("skip:{}", index),
                    ExecutionEvent::StepCompleted { index, .. } => format!("done:{}", index),
                    ExecutionEvent::StepFailed { index, .. } => format!("fail:{}", index),
                    ExecutionEvent::RunAborted { .. } => "aborted".to_string(),
                    ExecutionEvent::RunCompleted { status, .. } => format!("{:?}", status),
                };
                sink.lock().unwrap().push(name);
            })
            .await;

        let pipeline = BrickPipeline::from_value(json!([
            {"id": "@pixiebrix/identity", "if": "{{ @input.skip }}"},
            {"id": "@pixiebrix/identity", "outputKey": "value", "config": {"a": 1}},
        ]))
        .unwrap();
        let outcome = runner.run(&pipeline, RunOptions::new(json!({"skip": ""}))).await.unwrap();

        assert_eq!(outcome.result, Some(json!({"a": 1})));
        assert_eq!(
            *events.lock().unwrap(),
            vec!["run:2", "start:0", "skip:0", "start:1", "done:1", "Completed"]
        );
    }

    #[tokio::test]
    async fn test_later_binding_shadows_earlier() {
        let pipeline = BrickPipeline::from_value(json!([
            {"id": "@pixiebrix/identity", "outputKey": "value", "config": {"n": 1}},
            {"id": "@pixiebrix/identity", "outputKey": "value", "config": {"n": 2}},
        ]))
        .unwrap();
        let outcome = runner()
            .run(&pipeline, RunOptions::new(Value::Null).with_output_key("value"))
            .await
            .unwrap();
        assert_eq!(outcome.result, Some(json!({"n": 2})));
    }
}
