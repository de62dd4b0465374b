use clap::{Args, Parser, Subcommand};
use gauntlet_core::orchestrator::StrategyKind;
use std::path::PathBuf;

fn parse_strategy(input: &str) -> Result<StrategyKind, String> {
    input.trim().parse().map_err(|_| {
        format!(
            "unknown strategy '{input}' (expected sequential, parallel, optimized or dependency-aware)"
        )
    })
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit a single JSON summary object to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "gauntlet",
    author,
    version,
    about = "Dependency-aware test orchestrator with a concurrent load engine",
    long_about = "gauntlet runs load-test suites as units of a dependency graph.\n\nA YAML plan lists suites (or a single list of scenarios). Each suite simulates concurrent virtual users against a chat/search/login HTTP API and passes when its scenarios meet the configured thresholds.",
    after_help = "Examples:\n  gauntlet run plan.yaml\n  gauntlet run plan.yaml --strategy dependency-aware\n  gauntlet run plan.yaml --target http://127.0.0.1:8080 --seed 42 --output json\n  gauntlet run plan.yaml --dry-run"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a test plan
    #[command(
        long_about = "Load a YAML plan, register one unit per suite and execute them with the chosen strategy.\n\nCLI flags override values from the plan."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the plan (.yaml)
    pub plan: PathBuf,

    /// Execution strategy (sequential, parallel, optimized, dependency-aware)
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<StrategyKind>,

    /// Override the base URL of every suite
    #[arg(long, value_name = "URL")]
    pub target: Option<String>,

    /// Seed for reproducible user behavior
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the execution order and phases, then exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strategy_accepts_aliases() {
        assert_eq!(parse_strategy("parallel"), Ok(StrategyKind::Parallel));
        assert_eq!(parse_strategy("resource-optimized"), Ok(StrategyKind::Optimized));
        assert_eq!(parse_strategy("Dependency-Strict"), Ok(StrategyKind::DependencyAware));
        assert!(parse_strategy("fastest").is_err());
    }

    #[test]
    fn cli_parses_run_with_overrides() {
        let parsed = Cli::try_parse_from([
            "gauntlet",
            "run",
            "plan.yaml",
            "--strategy",
            "sequential",
            "--target",
            "http://127.0.0.1:8080",
            "--seed",
            "7",
            "--output",
            "json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        let Command::Run(args) = cli.command;
        assert_eq!(args.plan, PathBuf::from("plan.yaml"));
        assert_eq!(args.strategy, Some(StrategyKind::Sequential));
        assert_eq!(args.target.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(args.seed, Some(7));
        assert!(!args.dry_run);
        assert!(matches!(args.output, OutputFormat::Json));
    }

    #[test]
    fn cli_defaults() {
        let parsed = Cli::try_parse_from(["gauntlet", "run", "plan.yaml", "--dry-run"]);
        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        let Command::Run(args) = cli.command;
        assert_eq!(args.strategy, None);
        assert_eq!(args.seed, None);
        assert!(args.dry_run);
        assert!(matches!(args.output, OutputFormat::HumanReadable));
    }

    #[test]
    fn cli_rejects_unknown_strategy() {
        let parsed = Cli::try_parse_from(["gauntlet", "run", "plan.yaml", "--strategy", "fastest"]);
        assert!(parsed.is_err());
    }
}
