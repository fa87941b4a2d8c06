// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use epub_gloss::app_config::{self, Config, ProviderKind};
use epub_gloss::app_controller::Controller;

/// CLI Wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    Ollama,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::OpenAI => ProviderKind::OpenAI,
            CliProvider::Anthropic => ProviderKind::Anthropic,
            CliProvider::Ollama => ProviderKind::Ollama,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Annotate an EPUB with vocabulary glosses (default command)
    #[command(alias = "gloss")]
    Annotate(AnnotateArgs),

    /// Generate shell completions for epub-gloss
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// EPUB file to annotate
    #[arg(value_name = "INPUT_FILE")]
    input_file: Option<PathBuf>,

    /// Where to write the annotated EPUB
    #[arg(value_name = "OUTPUT_FILE")]
    output_file: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config: String,

    /// Model provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// API key for the provider
    #[arg(long, env = "EPUB_GLOSS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the provider API
    #[arg(long)]
    base_url: Option<String>,

    /// Model name to use
    #[arg(short, long)]
    model: Option<String>,

    /// Newline-delimited list of words that are never glossed
    #[arg(long)]
    vocab: Option<String>,

    /// Progress file used to resume interrupted runs
    #[arg(long)]
    progress: Option<String>,

    /// Language of the book (e.g., 'en', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Language of the glosses (e.g., 'zh', 'ja')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Characters of prose per extraction request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// epub-gloss - inline vocabulary glosses for e-books
///
/// Picks out difficult words in each chapter with a language model and wraps
/// their first occurrence with a short translation.
#[derive(Parser, Debug)]
#[command(name = "epub-gloss")]
#[command(version)]
#[command(about = "Annotate EPUB books with inline vocabulary glosses")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "epub-gloss asks a language model for the difficult words of every chapter and
wraps their first occurrence with a ruby gloss in the target language.

EXAMPLES:
    epub-gloss book.epub book.glossed.epub                 # Annotate using default config
    epub-gloss -p ollama -m qwen2.5:7b in.epub out.epub    # Use a local model
    epub-gloss -s en -t ja in.epub out.epub                # English book, Japanese glosses
    epub-gloss --vocab known.txt in.epub out.epub          # Never gloss words listed in known.txt
    epub-gloss completions bash > epub-gloss.bash          # Generate bash completions

RESUMING:
    Progress is saved after every chapter (progress.json by default). Rerunning
    the same command after an interruption skips chapters that are already done.

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    annotate: AnnotateArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Initialize the logger once at the most verbose level; the effective
    // level is set with log::set_max_level once options are known
    if let Err(e) = CustomLogger::init(LevelFilter::Trace) {
        eprintln!("Failed to initialize logger: {}", e);
    }
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    let result = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "epub-gloss", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Annotate(args)) => run_annotate(args).await,
        // Default behavior - use top-level args
        None => run_annotate(cli.annotate).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Apply command line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, options: &AnnotateArgs) {
    if let Some(provider) = &options.provider {
        config.provider.provider = provider.clone().into();
    }

    let provider_config = config.provider.active_provider_config_mut();
    if let Some(api_key) = &options.api_key {
        provider_config.api_key = api_key.clone();
    }
    if let Some(base_url) = &options.base_url {
        provider_config.endpoint = base_url.clone();
    }
    if let Some(model) = &options.model {
        provider_config.model = model.clone();
    }

    if let Some(vocab) = &options.vocab {
        config.vocabulary_path = vocab.clone();
    }
    if let Some(progress) = &options.progress {
        config.progress_path = progress.clone();
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(batch_size) = options.batch_size {
        config.annotation.batch_size = batch_size;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

async fn run_annotate(options: AnnotateArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let input_file = options.input_file.clone()
        .ok_or_else(|| anyhow!("INPUT_FILE is required when no subcommand is specified"))?;
    let output_file = options.output_file.clone()
        .ok_or_else(|| anyhow!("OUTPUT_FILE is required"))?;

    let mut config = Config::load_or_create(Path::new(&options.config))?;
    apply_overrides(&mut config, &options);

    // Validate the configuration after loading and overriding
    config.validate()
        .context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if options.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    let controller = Controller::with_config(config)?;
    controller.run(&input_file, &output_file).await?;

    Ok(())
}
