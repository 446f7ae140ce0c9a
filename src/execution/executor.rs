//! Step executor - runs one brick step through its phases
//!
//! `PENDING → TEMPLATING → CAPABILITY_CHECK → DISPATCHING → RUNNING`, ending
//! in `COMPLETED`, `SKIPPED`, `FAILED` or `ABORTED`.

use crate::bricks::{Brick, BrickArgs, BrickOptions, BrickRegistry};
use crate::core::context::RunContext;
use crate::core::state::StepPhase;
use crate::core::step::{BrickConfig, RootMode, WindowTarget};
use crate::error::BrickError;
use crate::execution::AbortSignal;
use crate::platform::{ElementRef, ExecutionContext, PageAdapter, Platform};
use crate::templating::{evaluate_condition, render_args};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Successful end of a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// The brick ran and produced an output (`null` for effects)
    Completed(Value),
    /// The brick was not invoked
    Skipped(String),
}

/// Tracks a step's phase, refusing backward moves
struct PhaseTracker<'a> {
    brick_id: &'a str,
    phase: StepPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(brick_id: &'a str) -> Self {
        Self {
            brick_id,
            phase: StepPhase::Pending,
        }
    }

    fn enter(&mut self, next: StepPhase) {
        if self.phase.can_transition_to(next) {
            debug!("Step {}: {:?} -> {:?}", self.brick_id, self.phase, next);
            self.phase = next;
        } else {
            warn!("Step {}: ignored transition {:?} -> {:?}", self.brick_id, self.phase, next);
        }
    }
}

/// Executes single steps against a registry
pub struct StepExecutor {
    registry: Arc<BrickRegistry>,
}

impl StepExecutor {
    pub fn new(registry: Arc<BrickRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BrickRegistry {
        &self.registry
    }

    /// Run one step
    ///
    /// `options` carries the run's context, platform, signal and inherited
    /// root; the root actually passed to the brick is chosen from the step's
    /// `rootMode`.
    pub async fn execute(
        &self,
        step: &BrickConfig,
        options: BrickOptions,
        dry_run: bool,
    ) -> Result<StepResult, BrickError> {
        let mut phase = PhaseTracker::new(&step.id);
        let ctxt = options.ctxt.clone();
        let platform = options.platform.clone();
        let abort = options.abort_signal.clone();

        if abort.is_aborted() {
            return Err(BrickError::Aborted);
        }

        if let Some(condition) = &step.condition {
            if !evaluate_condition(condition, &ctxt, &platform, &abort).await? {
                info!("Skipping step {}: condition is falsy", step.label);
                return Ok(StepResult::Skipped("condition".to_string()));
            }
        }

        let brick = self.registry.lookup(&step.id)?;

        if dry_run && !brick.is_pure().await {
            info!("Skipping impure step {} in dry run", step.label);
            return Ok(StepResult::Skipped("dry run".to_string()));
        }

        phase.enter(StepPhase::Templating);
        let args = prepare_args(&self.registry, &brick, step, &ctxt, &platform, &abort).await?;

        phase.enter(StepPhase::CapabilityCheck);
        if !brick.is_available(&platform).await {
            return Err(BrickError::business(format!(
                "{} is not available on this page",
                brick.metadata().name
            )));
        }
        let capabilities = brick.required_capabilities(&args).await;
        platform.check_capabilities(&capabilities)?;

        phase.enter(StepPhase::Dispatching);
        let root = if brick.is_root_aware().await {
            select_root(step, &options)?
        } else {
            Some(ElementRef::Document)
        };
        let options = options.with_root(root);

        if abort.is_aborted() {
            return Err(BrickError::Aborted);
        }

        phase.enter(StepPhase::Running);
        let output = match step.window {
            WindowTarget::Current => brick.run(&args, &options).await?,
            WindowTarget::Top => {
                let target = top_platform(&platform)?;
                brick.run(&args, &options.with_platform(target)).await?
            }
            WindowTarget::Broadcast => {
                let mut outputs = Vec::new();
                for target in broadcast_platforms(&platform) {
                    outputs.push(brick.run(&args, &options.clone().with_platform(target)).await?);
                }
                Value::Array(outputs)
            }
        };

        phase.enter(StepPhase::Completed);
        Ok(StepResult::Completed(output))
    }
}

/// Render, coerce and validate a step's arguments
async fn prepare_args(
    registry: &BrickRegistry,
    brick: &Brick,
    step: &BrickConfig,
    ctxt: &RunContext,
    platform: &Platform,
    abort: &AbortSignal,
) -> Result<BrickArgs, BrickError> {
    let mut args = render_args(&step.config, ctxt, platform, abort).await?;
    let validated = registry.validate_input(brick, args.to_value())?;
    if let Value::Object(values) = validated {
        args.set_values(values);
    }
    Ok(args)
}

/// Root element for a root-aware brick
fn select_root(step: &BrickConfig, options: &BrickOptions) -> Result<Option<ElementRef>, BrickError> {
    match step.root_mode {
        RootMode::Inherit => Ok(options.root.clone()),
        RootMode::Document => Ok(Some(ElementRef::Document)),
        RootMode::Element => {
            let selector = step.root.as_deref().unwrap_or_default();
            let inherited = options.root.clone().unwrap_or(ElementRef::Document);
            let document = options.platform.dom()?.document();
            document
                .resolve(&inherited, selector)
                .map(Some)
                .ok_or_else(|| BrickError::business(format!("No element found for selector: {}", selector)))
        }
    }
}

/// Platform attached to the top-level frame
fn top_platform(platform: &Platform) -> Result<Platform, BrickError> {
    let Some(page) = platform.page() else {
        return Ok(platform.clone());
    };
    if !page.document().is_frame() {
        return Ok(platform.clone());
    }
    match page.top() {
        Some(top) => Ok(platform.with_page(top)),
        None => Err(BrickError::ContextUnreachable {
            context: ExecutionContext::ContentScript,
            reason: "the top-level frame is not reachable from this frame".to_string(),
        }),
    }
}

/// This frame followed by every reachable child frame
fn broadcast_platforms(platform: &Platform) -> Vec<Platform> {
    let frames: Vec<Arc<dyn PageAdapter>> = platform.page().map(|page| page.frames()).unwrap_or_default();
    std::iter::once(platform.clone())
        .chain(frames.into_iter().map(|frame| platform.with_page(frame)))
        .collect()
}
