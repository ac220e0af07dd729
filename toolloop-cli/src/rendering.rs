// toolloop-cli/src/rendering.rs
use colored::*;
use serde_json::{Map, Value};
use toolloop_core::utils::one_line;
use toolloop_core::{ToolExecutionResult, ToolExecutionStatus, ToolRegistry};

const PREVIEW_CHARS: usize = 120;

/// One summary line per tool call, without colour.
pub fn format_tool_line(result: &ToolExecutionResult) -> String {
    let marker = match result.status {
        ToolExecutionStatus::Success => "ok",
        ToolExecutionStatus::Failure => "failed",
    };
    let args = match &result.input {
        Value::Object(map) if map.is_empty() => String::new(),
        Value::Null => String::new(),
        other => format!(" {}", other),
    };
    format!(
        "[round {}] {}{} {} -> {}",
        result.round,
        result.tool_name,
        args,
        marker,
        one_line(&result.output, PREVIEW_CHARS)
    )
}

pub fn print_tool_summary(results: &[ToolExecutionResult]) {
    if results.is_empty() {
        return;
    }
    println!("{}", "Tool calls:".cyan().bold());
    for result in results {
        let line = format_tool_line(result);
        match result.status {
            ToolExecutionStatus::Success => println!("  {}", line.dimmed()),
            ToolExecutionStatus::Failure => println!("  {}", line.yellow()),
        }
    }
    println!();
}

pub fn print_final_answer(text: &str) {
    println!("{}", text);
}

pub fn print_structured(record: &Map<String, Value>) -> anyhow::Result<()> {
    println!();
    println!("{}", "Structured:".cyan().bold());
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

/// Lists the declared tools with their parameters.
pub fn format_tool_list(registry: &ToolRegistry) -> Vec<String> {
    registry
        .definitions()
        .iter()
        .map(|def| {
            let params: Vec<String> = def
                .parameters
                .properties
                .iter()
                .map(|(name, param)| {
                    let optional = if def.parameters.required.contains(name) { "" } else { "?" };
                    format!("{}{}: {}", name, optional, param.param_type.as_str())
                })
                .collect();
            format!("{}({}) - {}", def.name, params.join(", "), def.description)
        })
        .collect()
}
