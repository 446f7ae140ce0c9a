//! Per-invocation options handed to a brick

use crate::core::context::RunContext;
use crate::core::expression::ConfigTree;
use crate::core::pipeline::{BrickPipeline, PipelineExpression};
use crate::error::BrickError;
use crate::execution::AbortSignal;
use crate::logging::BrickLogger;
use crate::platform::{ElementRef, Platform};
use crate::templating;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifies the run a brick invocation belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct RunMeta {
    pub mod_id: Option<String>,
    pub mod_component_id: Option<String>,
    pub run_id: Uuid,

    /// Sequence number of the run within its engine
    pub run_number: u64,

    /// Index of the step within its pipeline
    pub step_index: usize,

    /// Pipeline invocation within the run; 0 for the top-level pipeline
    pub call: u64,

    /// Nesting depth; 0 for the top-level pipeline
    pub depth: usize,
}

impl RunMeta {
    pub fn new(run_id: Uuid, run_number: u64) -> Self {
        Self {
            mod_id: None,
            mod_component_id: None,
            run_id,
            run_number,
            step_index: 0,
            call: 0,
            depth: 0,
        }
    }
}

/// Runs sub-pipelines on behalf of control-flow bricks
#[async_trait]
pub trait PipelineInvoker: Send + Sync {
    /// Run `pipeline` with the context, root, signal and platform of `options`
    async fn run_nested(&self, pipeline: &BrickPipeline, options: &BrickOptions) -> Result<Value, BrickError>;
}

/// Everything a brick receives besides its arguments
#[derive(Clone)]
pub struct BrickOptions {
    /// Context the step's arguments were rendered against
    pub ctxt: RunContext,

    /// Root element for root-aware bricks
    pub root: Option<ElementRef>,

    pub logger: BrickLogger,
    pub platform: Platform,
    pub abort_signal: AbortSignal,
    pub meta: RunMeta,
    invoker: Arc<dyn PipelineInvoker>,
}

impl BrickOptions {
    pub fn new(
        ctxt: RunContext,
        platform: Platform,
        abort_signal: AbortSignal,
        meta: RunMeta,
        invoker: Arc<dyn PipelineInvoker>,
    ) -> Self {
        Self {
            ctxt,
            root: None,
            logger: BrickLogger::default(),
            platform,
            abort_signal,
            meta,
            invoker,
        }
    }

    pub fn with_root(mut self, root: Option<ElementRef>) -> Self {
        self.root = root;
        self
    }

    pub fn with_logger(mut self, logger: BrickLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Run a sub-pipeline with extra context bindings
    ///
    /// The sub-pipeline inherits this invocation's context, root and abort
    /// signal. Its result is the output of its last step.
    pub async fn run_pipeline<I, K>(&self, expression: &PipelineExpression, bindings: I) -> Result<Value, BrickError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.run_pipeline_with(expression, bindings, self.abort_signal.clone())
            .await
    }

    /// [`run_pipeline`](Self::run_pipeline) under a different abort signal
    pub async fn run_pipeline_with<I, K>(
        &self,
        expression: &PipelineExpression,
        bindings: I,
        abort_signal: AbortSignal,
    ) -> Result<Value, BrickError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        if abort_signal.is_aborted() {
            return Err(BrickError::Aborted);
        }
        let mut nested = self.clone();
        nested.ctxt = self.ctxt.extend(bindings);
        nested.abort_signal = abort_signal;
        nested.meta.depth += 1;
        self.invoker.run_nested(&expression.pipeline, &nested).await
    }

    /// Render a deferred expression with extra context bindings
    pub async fn render_deferred<I, K>(&self, tree: &ConfigTree, bindings: I) -> Result<Value, BrickError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let ctxt = self.ctxt.extend(bindings);
        templating::render_value(tree, &ctxt, &self.platform, &self.abort_signal).await
    }
}

impl fmt::Debug for BrickOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrickOptions")
            .field("ctxt", &self.ctxt)
            .field("root", &self.root)
            .field("platform", &self.platform)
            .field("meta", &self.meta)
            .finish()
    }
}
