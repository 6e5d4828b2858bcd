//! Command-line interface for the benchmark harness

use crate::adapter::FixtureSet;
use crate::config::BenchConfig;
use crate::question::QuestionBank;
use crate::report::Reporter;
use crate::runner::BenchRunner;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// NL-to-query benchmark harness
#[derive(Parser)]
#[command(name = "nlqbench")]
#[command(about = "Benchmarks NL-to-query systems against golden query results")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a benchmark suite
    Run {
        /// Question file or directory of question files
        #[arg(value_name = "QUESTIONS")]
        questions: PathBuf,

        /// Fixture file with golden results and recorded SUT responses
        #[arg(short, long, value_name = "FILE")]
        fixtures: PathBuf,

        /// Maximum number of questions to run
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Load, validate and print the configuration
    CheckConfig,

    /// List the loaded question bank
    Questions {
        /// Question file or directory of question files
        #[arg(value_name = "QUESTIONS")]
        questions: PathBuf,

        /// Show full question details
        #[arg(long)]
        detailed: bool,
    },
}

/// Initialize logging from the `-v` count
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<BenchConfig> {
    let config = match path {
        Some(path) => BenchConfig::load_from_file(path)
            .with_context(|| format!("loading config {:?}", path))?,
        None => BenchConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            questions,
            fixtures,
            limit,
        } => run_suite(config, &questions, &fixtures, limit).await,
        Commands::CheckConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            log::info!("configuration is valid");
            Ok(())
        }
        Commands::Questions {
            questions,
            detailed,
        } => list_questions(&questions, detailed),
    }
}

async fn run_suite(
    config: BenchConfig,
    questions: &Path,
    fixtures: &Path,
    limit: Option<usize>,
) -> Result<()> {
    let mut bank = QuestionBank::load_path(questions)?;
    if let Some(limit) = limit {
        bank.truncate(limit);
    }
    if bank.is_empty() {
        anyhow::bail!("no questions loaded from {:?}", questions);
    }

    let fixture_set = FixtureSet::load_from_file(fixtures)?;
    let (database, sut) = fixture_set.into_adapters(config.environment.sut_name.clone());

    let reporter = Reporter::new(&config.reporting);
    let mut runner = BenchRunner::new(config, Arc::new(database), Arc::new(sut));
    let report = runner.run_suite(&bank).await?;
    reporter.emit(&report)?;

    if report.passed < report.total_questions {
        anyhow::bail!(
            "{} of {} questions failed",
            report.total_questions - report.passed,
            report.total_questions
        );
    }
    Ok(())
}

fn list_questions(path: &Path, detailed: bool) -> Result<()> {
    let bank = QuestionBank::load_path(path)?;
    println!("{} questions:", bank.len());
    for question in bank.iter() {
        if detailed {
            println!("\n--- {} ---", question.id);
            println!("Domain: {}", question.domain);
            println!("Complexity: {}", question.complexity);
            println!("Tier: {}", question.tier);
            println!("Question: {}", question.text);
            println!("Golden query: {}", question.golden_query);
            if !question.tags.is_empty() {
                println!("Tags: {}", question.tags.join(", "));
            }
        } else {
            println!(
                "  {} [{} / {}] {}",
                question.id, question.complexity, question.tier, question.text
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from([
            "nlqbench",
            "-vv",
            "run",
            "questions/",
            "--fixtures",
            "fixtures.yaml",
            "--limit",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                questions,
                fixtures,
                limit,
            } => {
                assert_eq!(questions, PathBuf::from("questions/"));
                assert_eq!(fixtures, PathBuf::from("fixtures.yaml"));
                assert_eq!(limit, Some(5));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parses_check_config() {
        let cli =
            Cli::try_parse_from(["nlqbench", "--config", "bench.yaml", "check-config"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("bench.yaml")));
        assert!(matches!(cli.command, Commands::CheckConfig));
    }

    #[test]
    fn run_requires_fixtures() {
        assert!(Cli::try_parse_from(["nlqbench", "run", "questions/"]).is_err());
    }
}
