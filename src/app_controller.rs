use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::annotation::{
    AnnotationEngine, CandidateList, MarkupRules, PromptContext, RateLimiter, ReplacedSet,
    RetryPolicy, RetryingCaller, TextBatcher, TokenUsageStats, TranslationResolver,
    VocabularyExtractor,
};
use crate::app_config::Config;
use crate::document::{Document, EpubContainer};
use crate::file_utils::FileManager;
use crate::providers::{self, Provider};
use crate::session::ProgressStore;

// @module: Application controller for book annotation

/// Result of annotating a single chapter
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterOutcome {
    /// Rewritten chapter markup
    pub content: String,
    /// Batches sent for extraction
    pub batches: usize,
    /// Distinct candidate words after exclusion
    pub candidates: usize,
    /// Words actually glossed in the chapter
    pub glossed: usize,
}

/// What a completed run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Where the annotated book was written
    pub output_path: PathBuf,
    /// Chapters in the book
    pub total_chapters: usize,
    /// Chapters restored from an earlier run
    pub resumed_chapters: usize,
    /// Chapters annotated by this run
    pub annotated_chapters: usize,
    /// Words glossed by this run
    pub glossed_words: usize,
    /// Wall-clock duration of the run
    pub duration: Duration,
    /// Remote usage of this run
    pub usage: TokenUsageStats,
}

/// Per-chapter annotation steps: batch, extract, translate, rewrite
#[derive(Debug)]
pub struct ChapterPipeline {
    rules: MarkupRules,
    batch_size: usize,
    exclusions: HashSet<String>,
    extractor: VocabularyExtractor,
    resolver: TranslationResolver,
    engine: AnnotationEngine,
}

impl ChapterPipeline {
    /// Build the pipeline from configuration and the exclusion set
    pub fn new(config: &Config, exclusions: HashSet<String>) -> Result<Self> {
        let context = PromptContext::from_config(config)?;
        let rules = MarkupRules::from(&config.annotation);

        Ok(Self {
            batch_size: config.annotation.batch_size,
            exclusions,
            extractor: VocabularyExtractor::new(context.clone()),
            resolver: TranslationResolver::new(context),
            engine: AnnotationEngine::new(rules.clone()),
            rules,
        })
    }

    /// Annotate one chapter's markup
    pub async fn annotate_chapter(&self, markup: &str, caller: &mut RetryingCaller) -> Result<ChapterOutcome> {
        let batcher = TextBatcher::from_markup(markup, &self.rules, self.batch_size)?;

        let mut candidates = CandidateList::new();
        let mut batches = 0;
        for batch in batcher {
            batches += 1;
            let words = self.extractor.extract(caller, &batch, &self.exclusions).await?;
            candidates.extend(words);
        }

        let translations = self.resolver.resolve(caller, candidates.as_slice()).await?;

        let mut replaced = ReplacedSet::new();
        let content = self.engine.annotate(markup, &translations, &mut replaced)?;

        Ok(ChapterOutcome {
            content,
            batches,
            candidates: candidates.len(),
            glossed: replaced.len(),
        })
    }

    /// Annotate every chapter not yet processed, saving progress after each one
    ///
    /// Returns the number of chapters annotated and words glossed.
    pub async fn annotate_document(
        &self,
        document: &mut Document,
        store: &ProgressStore,
        caller: &mut RetryingCaller,
    ) -> Result<(usize, usize)> {
        let progress_bar = ProgressBar::new(document.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chapters ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));

        let total = document.len();
        let mut annotated = 0;
        let mut glossed = 0;

        for index in 0..total {
            let chapter = &document.chapters()[index];
            if chapter.processed {
                debug!("Skipping processed chapter {}", chapter.id);
                progress_bar.inc(1);
                continue;
            }

            let id = chapter.id.clone();
            progress_bar.set_message(id.clone());

            let outcome = self.annotate_chapter(&chapter.content, caller).await
                .with_context(|| format!("Failed to annotate chapter '{}'", id))?;

            progress_bar.suspend(|| {
                info!("Chapter {} ({}/{}): {} batch(es), {} candidate(s), {} glossed",
                    id, index + 1, total, outcome.batches, outcome.candidates, outcome.glossed);
            });

            let chapter = &mut document.chapters_mut()[index];
            chapter.content = outcome.content;
            chapter.processed = true;
            annotated += 1;
            glossed += outcome.glossed;

            store.save(document)?;
            progress_bar.inc(1);
        }

        progress_bar.finish_and_clear();
        Ok((annotated, glossed))
    }
}

/// Main application controller for book annotation
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    /// Create a new controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self { config })
    }

    /// The configuration in effect
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Annotate `input_file` into `output_file` with the configured provider
    pub async fn run(&self, input_file: &Path, output_file: &Path) -> Result<RunSummary> {
        let provider = providers::create_provider(&self.config.provider);
        self.run_with_provider(input_file, output_file, provider).await
    }

    /// Annotate `input_file` into `output_file` using `provider` for remote calls
    pub async fn run_with_provider(
        &self,
        input_file: &Path,
        output_file: &Path,
        provider: Box<dyn Provider>,
    ) -> Result<RunSummary> {
        let start_time = Instant::now();

        if !FileManager::file_exists(input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        if input_file == output_file {
            return Err(anyhow!("Output file must differ from the input file: {:?}", output_file));
        }

        let exclusions = FileManager::load_word_list(&self.config.vocabulary_path)
            .context("Failed to load exclusion vocabulary")?;
        if exclusions.is_empty() {
            warn!("No exclusion vocabulary loaded from '{}'", self.config.vocabulary_path);
        } else {
            info!("Loaded {} excluded word(s) from '{}'", exclusions.len(), self.config.vocabulary_path);
        }

        let container = EpubContainer::open(input_file)
            .with_context(|| format!("Failed to open EPUB: {:?}", input_file))?;
        let mut document = container.read_document()
            .with_context(|| format!("Failed to read chapters of {:?}", input_file))?;
        info!("📖 {} chapter(s) in {:?}", document.len(), input_file);

        let fingerprint = FileManager::fingerprint(input_file)?;
        let store = ProgressStore::new(&self.config.progress_path).with_fingerprint(fingerprint);
        let resume = store.load(&mut document)?;
        let resumed_chapters = resume.processed_ids().len();

        let model = self.config.provider.get_model();
        info!("🤖 Using {} ({})", provider.name(), model);
        let limiter = RateLimiter::new(self.config.provider.get_rate_limit());
        let mut caller = RetryingCaller::new(provider, limiter, RetryPolicy::from(&self.config.retry))
            .with_model(model);

        let pipeline = ChapterPipeline::new(&self.config, exclusions)?;
        let (annotated_chapters, glossed_words) = pipeline
            .annotate_document(&mut document, &store, &mut caller)
            .await?;

        let bytes = container.to_bytes(&document)
            .context("Failed to assemble the annotated EPUB")?;
        FileManager::write_atomically(output_file, &bytes)
            .with_context(|| format!("Failed to write output file: {:?}", output_file))?;
        store.clear()?;

        let duration = start_time.elapsed();
        info!("✅ Success: {:?} ({} chapter(s) annotated, {} word(s) glossed) in {}",
            output_file, annotated_chapters, glossed_words, Self::format_duration(duration));
        info!("{}", caller.usage().summary());

        Ok(RunSummary {
            output_path: output_file.to_path_buf(),
            total_chapters: document.len(),
            resumed_chapters,
            annotated_chapters,
            glossed_words,
            duration,
            usage: caller.usage().clone(),
        })
    }

    // Format duration in a human-readable format
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
