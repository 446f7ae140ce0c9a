//! Test utilities for brick pipeline scenarios

use async_trait::async_trait;
use brick_runtime::bricks::{Brick, BrickArgs, BrickMetadata, BrickOptions, BrickRegistry, Effect, Transformer};
use brick_runtime::core::{BrickPipeline, RuntimeConfig};
use brick_runtime::error::{BrickError, PipelineError};
use brick_runtime::execution::{AbortSignal, ExecutionEvent, PipelineRunner, RunOptions, RunOutcome};
use brick_runtime::platform::{
    local_platform, Document, ExecutionContext, HandlerTable, PageAdapter, Platform, PlatformCapability, StaticPage,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One recorded brick invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub brick_id: String,
    pub args: Value,
    pub started: Instant,
    pub finished: Instant,
}

/// Shared log of invocations across recording bricks
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, invocation: Invocation) {
        self.calls.lock().unwrap().push(invocation);
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn brick_ids(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.brick_id).collect()
    }

    pub fn count(&self, brick_id: &str) -> usize {
        self.calls().iter().filter(|call| call.brick_id == brick_id).count()
    }

    pub fn args_of(&self, brick_id: &str) -> Option<Value> {
        self.calls()
            .into_iter()
            .find(|call| call.brick_id == brick_id)
            .map(|call| call.args)
    }
}

/// Transformer that records its arguments and returns `output`, or its arguments
pub struct RecordingTransformer {
    metadata: BrickMetadata,
    recorder: Recorder,
    output: Option<Value>,
    delay: Option<Duration>,
}

impl RecordingTransformer {
    pub fn new(id: &str, recorder: &Recorder) -> Self {
        Self {
            metadata: BrickMetadata::new(id, id),
            recorder: recorder.clone(),
            output: None,
            delay: None,
        }
    }

    pub fn returning(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.metadata = self.metadata.with_input_schema(schema);
        self
    }
}

#[async_trait]
impl Transformer for RecordingTransformer {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn is_pure(&self) -> bool {
        true
    }

    async fn transform(&self, args: &BrickArgs, _options: &BrickOptions) -> Result<Value, BrickError> {
        let started = Instant::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.recorder.push(Invocation {
            brick_id: self.metadata.id.clone(),
            args: args.to_value(),
            started,
            finished: Instant::now(),
        });
        Ok(self.output.clone().unwrap_or_else(|| args.to_value()))
    }
}

/// Effect that records its arguments, optionally firing an abort signal while it runs
pub struct RecordingEffect {
    metadata: BrickMetadata,
    recorder: Recorder,
    fire: Option<AbortSignal>,
    capabilities: Vec<PlatformCapability>,
}

impl RecordingEffect {
    pub fn new(id: &str, recorder: &Recorder) -> Self {
        Self {
            metadata: BrickMetadata::new(id, id),
            recorder: recorder.clone(),
            fire: None,
            capabilities: Vec::new(),
        }
    }

    /// Abort `signal` from inside the effect, then finish normally
    pub fn aborting(mut self, signal: AbortSignal) -> Self {
        self.fire = Some(signal);
        self
    }

    pub fn requiring(mut self, capability: PlatformCapability) -> Self {
        self.capabilities.push(capability);
        self
    }
}

#[async_trait]
impl Effect for RecordingEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn required_capabilities(&self, _args: &BrickArgs) -> Vec<PlatformCapability> {
        self.capabilities.clone()
    }

    async fn effect(&self, args: &BrickArgs, _options: &BrickOptions) -> Result<(), BrickError> {
        let started = Instant::now();
        if let Some(signal) = &self.fire {
            signal.abort();
        }
        self.recorder.push(Invocation {
            brick_id: self.metadata.id.clone(),
            args: args.to_value(),
            started,
            finished: Instant::now(),
        });
        Ok(())
    }
}

/// Effect that always raises a business error
pub struct FailingEffect {
    metadata: BrickMetadata,
    message: String,
}

impl FailingEffect {
    pub fn new(id: &str, message: &str) -> Self {
        Self {
            metadata: BrickMetadata::new(id, id),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Effect for FailingEffect {
    fn metadata(&self) -> &BrickMetadata {
        &self.metadata
    }

    async fn effect(&self, _args: &BrickArgs, _options: &BrickOptions) -> Result<(), BrickError> {
        Err(BrickError::business(self.message.clone()))
    }
}

/// Platform without a page and with an empty background context
pub fn headless_platform() -> Platform {
    local_platform(None, &RuntimeConfig::default(), HandlerTable::new(ExecutionContext::Background))
}

/// Platform attached to `document`
pub fn page_platform(document: Arc<StaticPage>) -> Platform {
    let page: Arc<dyn PageAdapter> = document;
    local_platform(Some(page), &RuntimeConfig::default(), HandlerTable::new(ExecutionContext::Background))
}

pub fn static_page(url: &str, title: &str) -> Arc<StaticPage> {
    Arc::new(StaticPage::new(Document::new(url, title)))
}

/// Outcome of a scenario run plus every event the runner emitted
pub struct ScenarioResult {
    pub result: Result<RunOutcome, PipelineError>,
    pub events: Vec<ExecutionEvent>,
}

impl ScenarioResult {
    pub fn outcome(&self) -> &RunOutcome {
        match &self.result {
            Ok(outcome) => outcome,
            Err(e) => panic!("run failed: {}", e),
        }
    }

    pub fn error(&self) -> &PipelineError {
        match &self.result {
            Ok(outcome) => panic!("run succeeded with {:?}", outcome.result),
            Err(e) => e,
        }
    }

    pub fn started_steps(&self) -> Vec<(usize, String)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::StepStarted {
                    depth: 0,
                    index,
                    brick_id,
                    ..
                } => Some((*index, brick_id.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Run a YAML pipeline on `platform` with builtins plus `bricks` registered
pub async fn run_pipeline_with_bricks(
    bricks: Vec<Brick>,
    platform: Platform,
    yaml: &str,
    options: RunOptions,
) -> ScenarioResult {
    let registry = Arc::new(BrickRegistry::with_builtins());
    registry.register(bricks);
    let runner = PipelineRunner::new(registry, platform);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    runner
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let pipeline = BrickPipeline::from_yaml(yaml).unwrap();
    let result = runner.run(&pipeline, options).await;
    let events = events.lock().unwrap().clone();
    ScenarioResult { result, events }
}
