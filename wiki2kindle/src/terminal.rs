use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use crate::pipeline::{ArticleOutcome, Reporter, Stage};

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wiki2kindle={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Shows a spinner while an article is in flight and one ✓/✗ line once
/// it is done.
#[derive(Default)]
pub struct SpinnerReporter {
    spinner: Option<ProgressBar>,
}

impl SpinnerReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner(&mut self) -> &ProgressBar {
        self.spinner.get_or_insert_with(|| {
            let pb = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        })
    }
}

impl Reporter for SpinnerReporter {
    fn stage(&mut self, url: &str, stage: Stage<'_>) {
        self.spinner().set_message(stage_message(url, stage));
    }

    fn finished(&mut self, outcome: &ArticleOutcome) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        println!("{}", outcome_line(outcome));
    }
}

pub fn stage_message(url: &str, stage: Stage<'_>) -> String {
    match stage {
        Stage::Fetching => format!("Fetching {}...", url),
        Stage::Building { title } => format!("Creating EPUB for '{}'...", title),
        Stage::Saving { title } => format!("Saving '{}'...", title),
        Stage::Sending { title } => format!("Sending '{}' to Kindle...", title),
    }
}

pub fn outcome_line(outcome: &ArticleOutcome) -> String {
    match &outcome.result {
        Ok(title) => format!(
            "{} Successfully sent '{}' to Kindle.",
            "✓".green(),
            title.as_str().bold()
        ),
        Err(e) => format!("{} Failed to process {}: {}", "✗".red(), outcome.url, e),
    }
}

pub fn config_error(message: &dyn std::fmt::Display) {
    eprintln!("{} {}", "Configuration Error:".red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn stage_messages_name_the_article() {
        assert_eq!(
            stage_message("https://x", Stage::Fetching),
            "Fetching https://x..."
        );
        assert_eq!(
            stage_message("https://x", Stage::Sending { title: "HAL Tejas" }),
            "Sending 'HAL Tejas' to Kindle..."
        );
    }

    #[test]
    fn outcome_lines() {
        colored::control::set_override(false);

        let ok = ArticleOutcome {
            url: "https://en.wikipedia.org/wiki/HAL_Tejas".into(),
            result: Ok("HAL Tejas".into()),
        };
        assert_eq!(outcome_line(&ok), "✓ Successfully sent 'HAL Tejas' to Kindle.");

        let failed = ArticleOutcome {
            url: "https://example.com".into(),
            result: Err(FetchError::NotWikipedia("https://example.com".into()).into()),
        };
        assert_eq!(
            outcome_line(&failed),
            "✗ Failed to process https://example.com: Not a Wikipedia article URL: https://example.com"
        );
    }
}
