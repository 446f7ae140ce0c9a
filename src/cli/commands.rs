//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a component of a mod definition
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the mod definition YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Component to run; defaults to the first one
    #[arg(short, long)]
    pub component: Option<String>,

    /// Pipeline input as JSON; overrides the definition's input
    #[arg(long)]
    pub input: Option<String>,

    /// Page fixture YAML the DOM bricks run against
    #[arg(long)]
    pub page: Option<PathBuf>,

    /// External brick or service definitions to load before running
    #[arg(long)]
    pub definition: Vec<PathBuf>,

    /// Mod option overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub option: Vec<(String, String)>,

    /// Skip impure steps
    #[arg(long)]
    pub dry_run: bool,

    /// Abort the run after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Print the messages bricks logged
    #[arg(long)]
    pub show_logs: bool,

    /// Print the per-step run trace
    #[arg(long)]
    pub trace: bool,
}

/// Validate a mod definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the mod definition YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List registered bricks and services
#[derive(Debug, Args, Clone)]
pub struct BricksCommand {
    /// External brick or service definitions to load as well
    #[arg(long)]
    pub definition: Vec<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
    }
}
