use tracing::{info, warn};

use crate::llm::{
    build_article_analysis_prompt, build_cross_paragraph_prompt, invoke_text, LanguageModel,
    Prompt,
};
use crate::models::Document;

/// Whole-article analysis consumed by the development stage
///
/// Returns an empty string when the call fails or yields nothing.
pub async fn build_article_analysis(llm: &dyn LanguageModel, document: &Document) -> String {
    analyze(llm, document, "Article analysis", build_article_analysis_prompt).await
}

/// Cross-paragraph analysis consumed by the content stage
pub async fn build_cross_paragraph_analysis(
    llm: &dyn LanguageModel,
    document: &Document,
) -> String {
    analyze(llm, document, "Cross-paragraph analysis", build_cross_paragraph_prompt).await
}

async fn analyze(
    llm: &dyn LanguageModel,
    document: &Document,
    label: &str,
    build: fn(&Document) -> Prompt,
) -> String {
    if document.article_text().is_empty() {
        info!("{}: document has no text, skipping", label);
        return String::new();
    }

    match invoke_text(llm, &build(document)).await {
        Ok(text) if !text.trim().is_empty() => {
            info!("{}: {} chars", label, text.len());
            text.trim().to_string()
        }
        Ok(_) => {
            warn!("{}: model returned nothing", label);
            String::new()
        }
        Err(e) => {
            warn!("{} failed, continuing without it: {:#}", label, e);
            String::new()
        }
    }
}
