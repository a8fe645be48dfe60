use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};
use wiki2kindle::pipeline::split_urls;
use wiki2kindle::terminal::{self, SpinnerReporter};
use wiki2kindle::{Config, EpubBuilder, Pipeline, SmtpMailer, WikiFetcher};

#[derive(Parser)]
#[command(name = "wiki2kindle", version)]
#[command(about = "Send Wikipedia articles to your Kindle.")]
struct CommandLine {
    /// Comma-separated list of Wikipedia URLs
    urls: String,

    /// Env file with SMTP settings (default: ~/.kindle-wikipedia-cli.env)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Leave images out of the generated books
    #[arg(long)]
    no_images: bool,

    /// Also save each EPUB into this directory
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = CommandLine::parse();
    terminal::init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: CommandLine) -> anyhow::Result<ExitCode> {
    let urls = split_urls(&cli.urls);
    if urls.is_empty() {
        eprintln!("Usage: wiki2kindle <url1>[,url2,...]");
        return Ok(ExitCode::from(2));
    }

    // Fail before any network traffic if settings are incomplete.
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            terminal::config_error(&e);
            return Ok(ExitCode::FAILURE);
        }
    };
    tracing::debug!(?config, "configuration loaded");

    let fetcher = WikiFetcher::new()
        .context("failed to initialise HTTP client")?
        .with_images(!cli.no_images);
    let pipeline = Pipeline::new(fetcher, EpubBuilder::new(), SmtpMailer::new(config))
        .with_output_dir(cli.output_dir);

    let mut reporter = SpinnerReporter::new();
    let summary = pipeline.run(&urls, &mut reporter);

    if summary.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::info!(
            failed = summary.failures().count(),
            succeeded = summary.success_count(),
            "run finished with failures"
        );
        Ok(ExitCode::FAILURE)
    }
}
