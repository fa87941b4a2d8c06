/*!
 * # epub-gloss - inline vocabulary glosses for e-books
 *
 * A Rust library that annotates the prose of an EPUB with short translations
 * of its difficult words, chosen and translated by a language model.
 *
 * ## Features
 *
 * - Extract candidate vocabulary from chapter prose in size-bounded batches
 * - Translate the words of each chapter using various AI providers:
 *   - OpenAI API (or any compatible endpoint)
 *   - Anthropic API
 *   - Ollama (local LLM)
 * - Wrap the first occurrence of each word per chapter as `<ruby>word<rt>gloss</rt></ruby>`
 * - Leave code, preformatted and math content untouched
 * - Rate-limited, retried remote calls
 * - Resume interrupted runs chapter by chapter
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `annotation`: The annotation pipeline:
 *   - `annotation::rate_limit`: Spacing of remote calls
 *   - `annotation::retry`: Retries with backoff and token usage
 *   - `annotation::batcher`: Batching of chapter prose
 *   - `annotation::vocabulary`: Vocabulary extraction
 *   - `annotation::translation`: Gloss resolution
 *   - `annotation::engine`: Gloss insertion
 * - `document`: In-memory book model and EPUB container
 * - `session`: Progress persistence for resumable runs
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `providers`: Client implementations for various LLM providers
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod annotation;
pub mod app_config;
pub mod app_controller;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod session;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunSummary};
pub use document::{Chapter, Document, EpubContainer};
pub use errors::{AppError, DocumentError, ProviderError};
pub use language_utils::{get_language_name, normalize_to_part2t};
pub use session::ProgressStore;
