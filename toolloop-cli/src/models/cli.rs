use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// ToolLoop: ask a weather question and let the model call tools to answer it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a ToolLoop.toml. Defaults to the nearest one in the current
    /// directory or its parents.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Identifies the requesting user to the location tool.
    /// Falls back to the TOOLLOOP_USER_ID environment variable.
    #[arg(short, long, value_name = "ID")]
    pub user_id: Option<String>,

    /// Use this provider instead of `default_provider`.
    #[arg(short, long, value_name = "ID")]
    pub provider: Option<String>,

    /// Override `loop.max_rounds`.
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<usize>,

    /// Also coerce the answer into a structured weather report.
    #[arg(short, long)]
    pub structured: bool,

    /// Print the available tools and exit.
    #[arg(long)]
    pub list_tools: bool,

    /// The question to ask. Read from stdin when omitted.
    /// Options may appear anywhere; put words starting with `-` after `--`.
    #[arg(value_name = "PROMPT")]
    pub prompt: Vec<String>,
}

impl Cli {
    pub fn prompt_text(&self) -> Option<String> {
        let joined = self.prompt.join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
