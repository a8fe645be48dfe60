//! Per-article Fetch → Build → Send orchestration.
//!
//! Articles are handled one at a time, in input order. A failure is
//! recorded against its URL and the run moves on to the next one.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::article::{Article, Document};
use crate::epub::EpubBuilder;
use crate::error::{BuildError, FetchError, PipelineError, SendError};
use crate::fetcher::WikiFetcher;
use crate::mailer::SmtpMailer;

/// Turns a URL into an [`Article`].
pub trait ArticleSource {
    fn fetch(&self, url: &str) -> Result<Article, FetchError>;
}

/// Turns an [`Article`] into a [`Document`].
pub trait DocumentBuilder {
    fn build(&self, article: &Article) -> Result<Document, BuildError>;
}

/// Delivers a [`Document`].
pub trait DocumentSender {
    fn send(&self, document: &Document) -> Result<(), SendError>;
}

impl<T: ArticleSource + ?Sized> ArticleSource for &T {
    fn fetch(&self, url: &str) -> Result<Article, FetchError> {
        (**self).fetch(url)
    }
}

impl<T: DocumentBuilder + ?Sized> DocumentBuilder for &T {
    fn build(&self, article: &Article) -> Result<Document, BuildError> {
        (**self).build(article)
    }
}

impl<T: DocumentSender + ?Sized> DocumentSender for &T {
    fn send(&self, document: &Document) -> Result<(), SendError> {
        (**self).send(document)
    }
}

impl ArticleSource for WikiFetcher {
    fn fetch(&self, url: &str) -> Result<Article, FetchError> {
        WikiFetcher::fetch(self, url)
    }
}

impl DocumentBuilder for EpubBuilder {
    fn build(&self, article: &Article) -> Result<Document, BuildError> {
        EpubBuilder::build(self, article)
    }
}

impl DocumentSender for SmtpMailer {
    fn send(&self, document: &Document) -> Result<(), SendError> {
        SmtpMailer::send(self, document)
    }
}

/// Where an article currently is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage<'a> {
    Fetching,
    Building { title: &'a str },
    Saving { title: &'a str },
    Sending { title: &'a str },
}

/// Receives progress and results as the run goes.
pub trait Reporter {
    fn stage(&mut self, url: &str, stage: Stage<'_>);
    fn finished(&mut self, outcome: &ArticleOutcome);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn stage(&mut self, _url: &str, _stage: Stage<'_>) {}
    fn finished(&mut self, _outcome: &ArticleOutcome) {}
}

/// Result for one input URL. `Ok` carries the article title.
#[derive(Debug)]
pub struct ArticleOutcome {
    pub url: String,
    pub result: Result<String, PipelineError>,
}

impl ArticleOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a whole run, in input order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<ArticleOutcome>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(ArticleOutcome::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArticleOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }
}

/// Split the CLI argument on commas, trimming and dropping empty entries.
pub fn split_urls(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(String::from)
        .collect()
}

pub struct Pipeline<S, B, M> {
    source: S,
    builder: B,
    sender: M,
    output_dir: Option<PathBuf>,
}

impl<S, B, M> Pipeline<S, B, M>
where
    S: ArticleSource,
    B: DocumentBuilder,
    M: DocumentSender,
{
    pub fn new(source: S, builder: B, sender: M) -> Self {
        Pipeline {
            source,
            builder,
            sender,
            output_dir: None,
        }
    }

    /// Also write each document into `dir` before sending it.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    /// Process every URL. Never stops early.
    pub fn run(&self, urls: &[String], reporter: &mut dyn Reporter) -> RunSummary {
        let mut summary = RunSummary::default();

        for url in urls {
            let result = self.process(url, reporter);
            match &result {
                Ok(title) => info!(%url, %title, "article delivered"),
                Err(e) => warn!(%url, error = %e, "article failed"),
            }

            let outcome = ArticleOutcome {
                url: url.clone(),
                result,
            };
            reporter.finished(&outcome);
            summary.outcomes.push(outcome);
        }

        summary
    }

    fn process(&self, url: &str, reporter: &mut dyn Reporter) -> Result<String, PipelineError> {
        reporter.stage(url, Stage::Fetching);
        let article = self.source.fetch(url)?;

        reporter.stage(url, Stage::Building { title: &article.title });
        let document = self.builder.build(&article)?;
        drop(article);

        if let Some(dir) = &self.output_dir {
            reporter.stage(url, Stage::Saving { title: &document.title });
            let path = dir.join(&document.filename);
            std::fs::create_dir_all(dir)
                .and_then(|_| std::fs::write(&path, &document.content))
                .map_err(|source| PipelineError::Save { path, source })?;
        }

        reporter.stage(url, Stage::Sending { title: &document.title });
        self.sender.send(&document)?;

        Ok(document.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims_urls() {
        assert_eq!(
            split_urls(" https://a ,https://b,, ,https://c "),
            vec!["https://a", "https://b", "https://c"]
        );
        assert!(split_urls(" , ").is_empty());
    }

    #[test]
    fn summary_reports_failure_when_any_article_fails() {
        let mut summary = RunSummary::default();
        summary.outcomes.push(ArticleOutcome {
            url: "a".into(),
            result: Ok("A".into()),
        });
        assert!(summary.all_succeeded());

        summary.outcomes.push(ArticleOutcome {
            url: "b".into(),
            result: Err(FetchError::NotFound("B".into()).into()),
        });
        assert!(!summary.all_succeeded());
        assert_eq!(summary.success_count(), 1);
        assert_eq!(summary.failures().map(|o| o.url.as_str()).collect::<Vec<_>>(), vec!["b"]);
    }
}
