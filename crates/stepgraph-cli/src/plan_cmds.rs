//! CLI handlers for `stepgraph plan` subcommands.
//!
//! Implements:
//! - `stepgraph plan generate <request>` -- ask the model and print the plan
//! - `stepgraph plan parse <file|->`     -- build a plan from a saved response
//! - `stepgraph plan prompt <request>`   -- print the prompt without sending it

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::SecondsFormat;
use tracing::debug;

use stepgraph_core::Planner;
use stepgraph_core::plan::{PromptContext, TaskPlan, build_plan, build_prompt};
use stepgraph_core::source::OllamaSource;

use crate::PlanCommands;
use crate::config::{CliOverrides, StepgraphConfig};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(command: PlanCommands, cli: CliOverrides<'_>) -> Result<()> {
    match command {
        PlanCommands::Generate {
            request,
            json,
            output,
            require_reasoning,
        } => {
            let config = StepgraphConfig::resolve(&CliOverrides {
                require_reasoning,
                ..cli
            })?;
            cmd_generate(&config, &request, json, output.as_deref()).await
        }
        PlanCommands::Parse {
            file,
            request,
            json,
            require_reasoning,
        } => {
            let config = StepgraphConfig::resolve(&CliOverrides {
                require_reasoning,
                ..cli
            })?;
            cmd_parse(&config, &file, &request, json)
        }
        PlanCommands::Prompt { request } => {
            let config = StepgraphConfig::resolve(&cli)?;
            cmd_prompt(&config, &request)
        }
    }
}

// -----------------------------------------------------------------------
// stepgraph plan generate <request>
// -----------------------------------------------------------------------

async fn cmd_generate(
    config: &StepgraphConfig,
    request: &str,
    json: bool,
    output: Option<&str>,
) -> Result<()> {
    let source =
        OllamaSource::new(config.source.clone()).context("failed to create model client")?;
    let mut planner = Planner::new(Box::new(source), config.policy);
    if let Some(cwd) = current_dir() {
        planner = planner.with_workspace(cwd);
    }

    if !planner.is_available().await {
        bail!(
            "model backend at {} is not reachable\nStart it, or point --model-url at a running server.",
            config.source.base_url
        );
    }

    let plan = planner
        .generate_plan(request)
        .await
        .context("failed to generate plan")?;

    if let Some(path) = output {
        let contents = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;
        std::fs::write(path, contents + "\n")
            .with_context(|| format!("failed to write plan to {path}"))?;
        if !json {
            println!("Plan written to {path}");
            println!();
        }
    }

    emit(&plan, json)
}

// -----------------------------------------------------------------------
// stepgraph plan parse <file|->
// -----------------------------------------------------------------------

/// Run the pipeline offline over a response saved to disk (or piped in).
fn cmd_parse(config: &StepgraphConfig, file: &str, request: &str, json: bool) -> Result<()> {
    let text = read_response(file)?;
    debug!(bytes = text.len(), "read saved response");

    let plan = build_plan(request, &text, &config.policy)
        .with_context(|| format!("failed to build plan from {file}"))?;
    emit(&plan, json)
}

/// Read a response file, or stdin when `file` is `-`.
fn read_response(file: &str) -> Result<String> {
    if file == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read response from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(Path::new(file))
        .with_context(|| format!("failed to read response file: {file}"))
}

// -----------------------------------------------------------------------
// stepgraph plan prompt <request>
// -----------------------------------------------------------------------

fn cmd_prompt(config: &StepgraphConfig, request: &str) -> Result<()> {
    let prompt = build_prompt(&PromptContext {
        request: request.to_string(),
        workspace: current_dir(),
        max_steps: config.policy.max_steps,
        require_reasoning: config.policy.require_reasoning,
    });
    print!("{prompt}");
    Ok(())
}

// -----------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------

fn emit(plan: &TaskPlan, json: bool) -> Result<()> {
    if json {
        let contents = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
        println!("{contents}");
    } else {
        print!("{}", render_summary(plan));
    }
    Ok(())
}

/// Human-readable plan summary.
pub fn render_summary(plan: &TaskPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!("Plan: {}\n", plan.task_id));
    out.push_str(&format!("  Request:          {}\n", plan.user_request.trim()));
    out.push_str(&format!(
        "  Generated:        {}\n",
        plan.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!("  Steps:            {}\n", plan.steps.len()));
    out.push_str(&format!("  Dependency edges: {}\n", plan.edge_count()));

    let reasoning = plan.reasoning.trim();
    if !reasoning.is_empty() {
        out.push_str("  Reasoning:\n");
        for line in reasoning.lines().take(10) {
            out.push_str(&format!("    {line}\n"));
        }
        if reasoning.lines().count() > 10 {
            out.push_str("    ...(truncated)\n");
        }
    }

    out.push('\n');

    let num_w = plan.steps.len().to_string().len().max(1);
    let id_w = plan.steps.iter().map(|s| s.id.len()).max().unwrap_or(2).max(2);
    let action_w = 6;
    out.push_str(&format!(
        "{:>num_w$}  {:<id_w$}  {:<action_w$}  PATH\n",
        "#", "ID", "ACTION",
    ));
    for step in &plan.steps {
        out.push_str(&format!(
            "{:>num_w$}  {:<id_w$}  {:<action_w$}  {}\n",
            step.step_number,
            step.id,
            step.action.as_str(),
            step.path,
        ));
        out.push_str(&format!("{:num_w$}  {}\n", "", step.description));
        if !step.depends_on.is_empty() {
            out.push_str(&format!(
                "{:num_w$}  depends on: {}\n",
                "",
                step.depends_on.join(", ")
            ));
        }
    }

    out
}

fn current_dir() -> Option<String> {
    std::env::current_dir()
        .ok()
        .map(|p| p.to_string_lossy().to_string())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
