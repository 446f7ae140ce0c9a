use anyhow::{Context, Result};
use brick_runtime::bricks::service::SERVICE_MARKER;
use brick_runtime::bricks::{BrickArgs, BrickFactory, BrickRegistry};
use brick_runtime::cli::commands::{BricksCommand, RunCommand, ValidateCommand};
use brick_runtime::cli::output::*;
use brick_runtime::cli::{Cli, Command, LogFormat};
use brick_runtime::core::{ModDefinition, RuntimeConfig};
use brick_runtime::execution::{AbortSignal, ExecutionEvent, PipelineRunner, RunOptions};
use brick_runtime::logging::{BrickLogger, LogBuffer};
use brick_runtime::platform::handlers::background_handlers;
use brick_runtime::platform::{local_platform, Document, PageAdapter, PageFixture, StaticPage};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = match cli.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    let runtime_config = RuntimeConfig::load(cli.runtime_config.as_deref()).context("Failed to load runtime config")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_component(cmd, &runtime_config).await?,
        Command::Validate(cmd) => validate_mod(cmd)?,
        Command::Bricks(cmd) => list_bricks(cmd).await?,
    }

    Ok(())
}

async fn run_component(cmd: &RunCommand, runtime_config: &RuntimeConfig) -> Result<()> {
    let definition = ModDefinition::from_file(&cmd.file).context("Failed to load mod definition")?;
    let component = definition.component(cmd.component.as_deref())?;

    println!(
        "{} Loaded mod: {} ({})",
        INFO,
        style(definition.metadata.name.as_deref().unwrap_or(&definition.metadata.id)).bold(),
        style(&component.label).cyan()
    );

    let mut options = definition.options.clone();
    for (key, value) in &cmd.option {
        options.insert(key.clone(), parse_option_value(value));
        println!("{} Option override: {} = {}", INFO, style(key).cyan(), style(value).dim());
    }

    let input = match &cmd.input {
        Some(raw) => serde_json::from_str(raw).context("--input is not valid JSON")?,
        None => definition.input.clone(),
    };

    let page: Option<Arc<dyn PageAdapter>> = match &cmd.page {
        Some(path) => {
            let fixture = PageFixture::from_file(path)
                .with_context(|| format!("Failed to load page fixture {}", path.display()))?;
            Some(Arc::new(StaticPage::new(Document::from_fixture(fixture))))
        }
        None => None,
    };

    let registry = Arc::new(BrickRegistry::with_builtins());
    let factory = BrickFactory::new();
    for path in &cmd.definition {
        registry.register_package(factory.load_file(path)?);
    }
    let services = registry
        .configure_services(&definition.services, &runtime_config.services)
        .map_err(|e| anyhow::anyhow!("Failed to configure services: {}", e))?;
    for (key, value) in &services {
        let id = value[SERVICE_MARKER].as_str().unwrap_or_default();
        println!("{} Service: @{} = {}", INFO, style(key).cyan(), style(id).dim());
    }

    let background = background_handlers(Duration::from_millis(runtime_config.http_timeout_ms))?;
    let platform = local_platform(page, runtime_config, background);
    let buffer = LogBuffer::new();
    let runner = PipelineRunner::new(registry, platform).with_logger(BrickLogger::default().with_buffer(buffer.clone()));

    let progress = create_progress_bar(component.pipeline.len());
    let bar = progress.clone();
    runner
        .add_event_handler(move |event| {
            bar.println(format_execution_event(&event));
            match &event {
                ExecutionEvent::StepStarted { depth: 0, label, .. } => bar.set_message(label.clone()),
                ExecutionEvent::StepSkipped { depth: 0, .. }
                | ExecutionEvent::StepCompleted { depth: 0, .. }
                | ExecutionEvent::StepFailed { depth: 0, .. } => bar.inc(1),
                _ => {}
            }
        })
        .await;

    let abort = AbortSignal::new();
    let on_interrupt = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, aborting run");
            on_interrupt.abort();
        }
    });

    let mut run_options = RunOptions::for_component(&component, input)
        .with_options(options)
        .with_variables(definition.variables.clone())
        .with_services(services)
        .with_dry_run(cmd.dry_run)
        .with_abort_signal(abort);
    if let Some(timeout_ms) = cmd.timeout_ms {
        run_options = run_options.with_timeout(Duration::from_millis(timeout_ms));
    }

    println!();
    let result = runner.run_component(&component, run_options).await;
    progress.finish_and_clear();

    if cmd.show_logs && !buffer.is_empty() {
        println!("\n{} Brick logs:", INFO);
        for entry in buffer.entries() {
            println!("  {}", format_log_entry(&entry));
        }
    }

    match result {
        Ok(outcome) => {
            if cmd.trace {
                println!("\n{} Trace:\n{}", INFO, format_trace(&outcome.steps));
            }
            match &outcome.result {
                Some(value) => {
                    println!(
                        "\n{} {} completed {}",
                        CHECK,
                        style(&component.label).bold(),
                        style("successfully").green()
                    );
                    println!("{}", format_result(value, 40));
                }
                None => println!("\n{} {} {}", WARN, style(&component.label).bold(), format_status(outcome.status())),
            }
            Ok(())
        }
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&component.label).bold(),
                style("failed").red()
            );
            println!("  {}", e.user_message());
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// `--option` values are JSON when they parse as JSON, strings otherwise
fn parse_option_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn validate_mod(cmd: &ValidateCommand) -> Result<()> {
    let definition = match ModDefinition::from_file(&cmd.file) {
        Ok(definition) => definition,
        Err(e) => {
            if cmd.json {
                println!("{}", json!({"valid": false, "error": format!("{:#}", e)}));
            } else {
                println!("{} Mod definition is invalid:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            std::process::exit(1);
        }
    };

    let warnings = definition.warnings();
    if cmd.json {
        let components: Vec<Value> = definition
            .components
            .iter()
            .map(|component| {
                json!({
                    "id": component.id,
                    "steps": component.pipeline.iter().map(|step| step.id.clone()).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "valid": true,
                "id": definition.metadata.id,
                "components": components,
                "warnings": warnings,
            }))?
        );
        return Ok(());
    }

    println!("{} Mod definition is valid!", CHECK);
    println!("  Id: {}", style(&definition.metadata.id).bold());
    println!("  Options: {}", style(definition.options.len()).cyan());
    for component in &definition.components {
        println!(
            "\n  {} {}",
            style(&component.id).bold(),
            style(format!("({} steps)", component.pipeline.len())).dim()
        );
        for (index, step) in component.pipeline.iter().enumerate() {
            let output = step
                .output_key
                .as_deref()
                .map(|key| format!(" → @{}", key))
                .unwrap_or_default();
            println!("    {}. {}{}", index + 1, style(&step.id).cyan(), style(output).dim());
        }
    }
    for warning in warnings {
        println!("{} {}", WARN, style(warning).yellow());
    }

    Ok(())
}

async fn list_bricks(cmd: &BricksCommand) -> Result<()> {
    let registry = BrickRegistry::with_builtins();
    let factory = BrickFactory::new();
    for path in &cmd.definition {
        registry.register_package(factory.load_file(path)?);
    }

    let mut rows = Map::new();
    for brick in registry.all() {
        let metadata = brick.metadata();
        let capabilities: Vec<String> = brick
            .required_capabilities(&BrickArgs::default())
            .await
            .iter()
            .map(|capability| capability.to_string())
            .collect();
        rows.insert(
            metadata.id.clone(),
            json!({
                "name": metadata.name,
                "kind": brick.kind().to_string(),
                "description": metadata.description,
                "pure": brick.is_pure().await,
                "rootAware": brick.is_root_aware().await,
                "capabilities": capabilities,
            }),
        );
    }

    for service in registry.services() {
        rows.insert(
            service.id.clone(),
            json!({
                "name": service.name,
                "kind": "service",
                "description": service.description,
                "capabilities": [],
            }),
        );
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{} {} registered bricks and services\n", INFO, style(rows.len()).cyan());
    for (id, row) in &rows {
        let capabilities = row["capabilities"]
            .as_array()
            .map(|caps| caps.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        println!(
            "  {} {} {}",
            style(id).bold(),
            style(row["kind"].as_str().unwrap_or_default()).cyan(),
            style(capabilities).dim()
        );
        match row["description"].as_str() {
            Some(description) if !description.is_empty() => println!("      {}", description),
            _ => {}
        }
    }

    Ok(())
}
