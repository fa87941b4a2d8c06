/*!
 * Tests for the chapter annotation pipeline
 */

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;

use epub_gloss::annotation::{RateLimiter, RetryPolicy, RetryingCaller};
use epub_gloss::app_config::Config;
use epub_gloss::app_controller::ChapterPipeline;
use epub_gloss::errors::ProviderError;
use epub_gloss::providers::mock::MockProvider;
use crate::common;

fn config() -> Config {
    common::test_config(Path::new("."))
}

fn exclusions(words: &[&str]) -> HashSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn caller(provider: &MockProvider) -> RetryingCaller {
    RetryingCaller::new(Box::new(provider.clone()), RateLimiter::unlimited(), RetryPolicy::immediate(3))
}

/// The worked example: only the extracted, non-excluded word is glossed
#[tokio::test]
async fn test_annotateChapter_withVesselExample_shouldWrapOnlyVessel() -> Result<()> {
    let provider = MockProvider::scripted(&[
        "The, vessel",
        r#"[{"word": "vessel", "translation": "船"}]"#,
    ]);
    let pipeline = ChapterPipeline::new(&config(), exclusions(&["the", "a"]))?;
    let markup = common::chapter_xhtml("<p>The ocean is vast and the vessel is small.</p>");

    let outcome = pipeline.annotate_chapter(&markup, &mut caller(&provider)).await?;

    assert_eq!(
        outcome.content,
        common::chapter_xhtml("<p>The ocean is vast and the <ruby>vessel<rt>船</rt></ruby> is small.</p>")
    );
    assert_eq!(outcome.batches, 1);
    assert_eq!(outcome.candidates, 1);
    assert_eq!(outcome.glossed, 1);
    assert_eq!(provider.request_count(), 2);

    // The excluded word never reaches the translation request
    let translation = provider.requests()[1].user_prompt().unwrap_or_default().to_string();
    assert!(translation.ends_with("Words:\nvessel"));
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withExcludedCandidates_shouldNeverGlossThem() -> Result<()> {
    let provider = MockProvider::scripted(&[
        "Ocean, harbor",
        r#"[{"word": "harbor", "translation": "港口"}]"#,
    ]);
    let pipeline = ChapterPipeline::new(&config(), exclusions(&["ocean"]))?;
    let markup = "<p>The ocean reached the harbor.</p>";

    let outcome = pipeline.annotate_chapter(markup, &mut caller(&provider)).await?;

    assert_eq!(outcome.content, "<p>The ocean reached the <ruby>harbor<rt>港口</rt></ruby>.</p>");
    assert!(!outcome.content.contains("<ruby>ocean"));
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withTextAtThreshold_shouldSendOneExtractionBatch() -> Result<()> {
    let provider = MockProvider::scripted(&[""]);
    let mut config = config();
    // "aaaa bbbb" plus the separating space is exactly ten characters
    config.annotation.batch_size = 10;
    let pipeline = ChapterPipeline::new(&config, HashSet::new())?;

    let outcome = pipeline.annotate_chapter("<p>aaaa bbbb</p>", &mut caller(&provider)).await?;

    assert_eq!(outcome.batches, 1);
    assert_eq!(provider.request_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withLongChapter_shouldSplitIntoBatches() -> Result<()> {
    let provider = MockProvider::scripted(&["vessel", "harbor", r#"[{"word":"vessel","translation":"船"},{"word":"harbor","translation":"港口"}]"#]);
    let mut config = config();
    config.annotation.batch_size = 20;
    let pipeline = ChapterPipeline::new(&config, HashSet::new())?;
    let markup = "<p>A vessel sailed out at dawn.</p><p>It reached the harbor.</p>";

    let outcome = pipeline.annotate_chapter(markup, &mut caller(&provider)).await?;

    assert_eq!(outcome.batches, 2);
    assert_eq!(outcome.candidates, 2);
    assert_eq!(
        outcome.content,
        "<p>A <ruby>vessel<rt>船</rt></ruby> sailed out at dawn.</p><p>It reached the <ruby>harbor<rt>港口</rt></ruby>.</p>"
    );
    assert_eq!(provider.request_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withNoCandidates_shouldSkipTranslation() -> Result<()> {
    let provider = MockProvider::scripted(&["the, a"]);
    let pipeline = ChapterPipeline::new(&config(), exclusions(&["the", "a"]))?;
    let markup = "<p>The cat sat on a mat.</p>";

    let outcome = pipeline.annotate_chapter(markup, &mut caller(&provider)).await?;

    assert_eq!(outcome.content, markup);
    assert_eq!(outcome.candidates, 0);
    assert_eq!(provider.request_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withoutProse_shouldMakeNoCalls() -> Result<()> {
    let provider = MockProvider::scripted::<&str>(&[]);
    let pipeline = ChapterPipeline::new(&config(), HashSet::new())?;
    let markup = "<p>   </p><pre>let vessel = 1;</pre>";

    let outcome = pipeline.annotate_chapter(markup, &mut caller(&provider)).await?;

    assert_eq!(outcome.content, markup);
    assert_eq!(outcome.batches, 0);
    assert_eq!(provider.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withRepeatedWord_shouldGlossAtMostOnce() -> Result<()> {
    let provider = MockProvider::scripted(&[
        "vessel, Vessel",
        r#"[{"word": "vessel", "translation": "船"}]"#,
    ]);
    let pipeline = ChapterPipeline::new(&config(), HashSet::new())?;
    let markup = "<p>One vessel.</p><p>Two vessel.</p><p>Vessel three.</p>";

    let outcome = pipeline.annotate_chapter(markup, &mut caller(&provider)).await?;

    assert_eq!(outcome.content.matches("<ruby>").count(), 1);
    assert!(outcome.content.starts_with("<p>One <ruby>vessel<rt>船</rt></ruby>.</p>"));
    assert_eq!(outcome.candidates, 1);
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withExcludedBlocks_shouldLeaveThemByteIdentical() -> Result<()> {
    let provider = MockProvider::scripted(&[
        "vessel",
        r#"[{"word": "vessel", "translation": "船"}]"#,
    ]);
    let pipeline = ChapterPipeline::new(&config(), HashSet::new())?;
    let code = r#"<pre><code class="code">vessel &amp;&amp; vessel</code></pre>"#;
    let formula = r#"<p class="formula">vessel</p>"#;
    let markup = format!("{}{}<p>The vessel &amp; crew.</p>", code, formula);

    let outcome = pipeline.annotate_chapter(&markup, &mut caller(&provider)).await?;

    assert!(outcome.content.starts_with(&format!("{}{}", code, formula)));
    assert!(outcome.content.ends_with("<p>The <ruby>vessel<rt>船</rt></ruby> &amp; crew.</p>"));
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_whenRetriesExhausted_shouldFail() -> Result<()> {
    let provider = MockProvider::failing();
    let pipeline = ChapterPipeline::new(&config(), HashSet::new())?;

    let error = pipeline
        .annotate_chapter("<p>The vessel.</p>", &mut caller(&provider))
        .await
        .unwrap_err();

    assert!(matches!(
        error.downcast_ref::<ProviderError>(),
        Some(ProviderError::RetriesExhausted { attempts: 3, .. })
    ));
    assert_eq!(provider.request_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withTransientFailure_shouldRecover() -> Result<()> {
    let provider = MockProvider::scripted::<&str>(&[]);
    provider.push_failure(429);
    provider.push_reply("vessel");
    provider.push_failure(503);
    provider.push_reply(r#"[{"word": "vessel", "translation": "船"}]"#);
    let pipeline = ChapterPipeline::new(&config(), HashSet::new())?;
    let mut caller = caller(&provider);

    let outcome = pipeline.annotate_chapter("<p>The vessel.</p>", &mut caller).await?;

    assert_eq!(outcome.glossed, 1);
    assert_eq!(provider.request_count(), 4);
    assert_eq!(caller.usage().calls, 2);
    assert_eq!(caller.usage().failed_attempts, 2);
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withObjectMapReply_shouldGlossByWord() -> Result<()> {
    let provider = MockProvider::scripted(&[
        "harbor, vessel",
        r#"{"vessel": "船", "harbor": "港口"}"#,
    ]);
    let pipeline = ChapterPipeline::new(&config(), HashSet::new())?;

    let outcome = pipeline.annotate_chapter("<p>The vessel left the harbor.</p>", &mut caller(&provider)).await?;

    assert_eq!(
        outcome.content,
        "<p>The <ruby>vessel<rt>船</rt></ruby> left the <ruby>harbor<rt>港口</rt></ruby>.</p>"
    );
    assert_eq!(outcome.glossed, 2);
    Ok(())
}

#[tokio::test]
async fn test_annotateChapter_withBareStringArrayReply_shouldInsertNoJsonFragments() -> Result<()> {
    let provider = MockProvider::scripted(&[
        "vessel, harbor",
        r#"["船", "港口"]"#,
    ]);
    let pipeline = ChapterPipeline::new(&config(), HashSet::new())?;
    let markup = "<p>The vessel left the harbor.</p>";

    let outcome = pipeline.annotate_chapter(markup, &mut caller(&provider)).await?;

    assert_eq!(outcome.content, markup);
    assert_eq!(outcome.glossed, 0);
    Ok(())
}
