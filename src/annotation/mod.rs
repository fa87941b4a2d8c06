/*!
 * The annotation pipeline.
 *
 * This module contains the building blocks the chapter loop ties together:
 * - `rate_limit`: minimum spacing between remote calls
 * - `retry`: retrying caller with exponential backoff and usage totals
 * - `markup`: streaming XHTML walk over paragraph text
 * - `batcher`: size-bounded batches of chapter prose
 * - `vocabulary`: candidate word extraction
 * - `translation`: word to gloss resolution
 * - `engine`: first-occurrence gloss insertion
 */

pub mod batcher;
pub mod engine;
pub mod markup;
pub mod prompts;
pub mod rate_limit;
pub mod retry;
pub mod translation;
pub mod vocabulary;

pub use batcher::TextBatcher;
pub use engine::{AnnotationEngine, ReplacedSet};
pub use markup::{MarkupRules, TextSpan};
pub use prompts::PromptContext;
pub use rate_limit::RateLimiter;
pub use retry::{RetryPolicy, RetryingCaller, TokenUsageStats};
pub use translation::{TranslationMap, TranslationResolver};
pub use vocabulary::{CandidateList, VocabularyExtractor};
