//! Enrichment subsystem: AI summaries, tags and link suggestions
//!
//! Summaries and tags come from the configured `LanguageModel`. A failed
//! call leaves the corresponding field as it was.

use anyhow::Result;
use pkos_core::{LanguageModel, LlmConfig, Note, NoteUpdate, PkosConfig};
use uuid::Uuid;

use crate::state::AppState;
use crate::subsystems::{audit, notes};

pub const MAX_TAGS: usize = 5;

pub fn summary_prompt(text: &str) -> String {
    format!("Please summarize the following text in a concise paragraph:\n\n{text}")
}

pub fn tags_prompt(text: &str) -> String {
    format!(
        "Extract 3-5 relevant keywords or tags from this text as a comma-separated list (no explanations):\n\n{text}"
    )
}

/// Split a comma-separated model reply into normalised tags.
///
/// Each tag is trimmed, lower-cased and has spaces replaced by `_`; empty
/// entries are dropped and at most `MAX_TAGS` are kept.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase().replace(' ', "_"))
        .take(MAX_TAGS)
        .collect()
}

/// Build the Gemini chat client from `[gemini]`. `None` without an API key.
pub fn create_llm_from_config(config: &PkosConfig) -> Option<Box<dyn LanguageModel>> {
    let llm_config = LlmConfig {
        api_key: config.gemini.api_key.clone(),
        model: config.gemini.model.clone(),
        max_retries: config.gemini.max_retries,
        retry_delay_ms: config.gemini.retry_delay_ms,
    };

    match pkos_core::GeminiChatClient::new(llm_config) {
        Ok(client) => Some(Box::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Language model unavailable, enrichment disabled");
            None
        }
    }
}

pub async fn generate_summary(llm: &dyn LanguageModel, text: &str) -> Result<String> {
    let summary = llm.complete(&summary_prompt(text)).await?;
    Ok(summary.trim().to_string())
}

pub async fn extract_tags(llm: &dyn LanguageModel, text: &str) -> Result<Vec<String>> {
    let raw = llm.complete(&tags_prompt(text)).await?;
    Ok(parse_tags(&raw))
}

/// Generate summary and tags for note `id` and store them.
///
/// `Ok(None)` when the note does not exist. Without a language model, or
/// when both calls fail, the note is returned unchanged.
pub async fn process_note(state: &AppState, id: Uuid) -> Result<Option<Note>> {
    let Some(note) = state.store.fetch(id).await? else {
        tracing::debug!(id = %id, "Note not found, nothing to process");
        return Ok(None);
    };

    let Some(llm) = state.llm.as_deref() else {
        tracing::warn!(id = %id, "No language model configured, skipping enrichment");
        return Ok(Some(note));
    };

    let mut update = NoteUpdate::default();

    match generate_summary(llm, &note.content).await {
        Ok(summary) if !summary.is_empty() => update.summary = Some(summary),
        Ok(_) => tracing::warn!(id = %id, "Model returned an empty summary"),
        Err(e) => tracing::error!(id = %id, error = %e, "Error generating summary"),
    }

    match extract_tags(llm, &note.content).await {
        Ok(tags) if !tags.is_empty() => update.tags = Some(tags),
        Ok(_) => tracing::warn!(id = %id, "Model returned no usable tags"),
        Err(e) => tracing::error!(id = %id, error = %e, "Error extracting tags"),
    }

    if update.is_empty() {
        return Ok(Some(note));
    }

    notes::apply_update(state, id, &update, audit::ACTION_AI_PROCESS).await
}

/// Up to `linking.related_limit` notes semantically close to `id`,
/// excluding `id` itself. `None` if absent.
pub async fn suggest_links(state: &AppState, id: Uuid) -> Result<Option<Vec<Note>>> {
    let Some(note) = state.store.fetch(id).await? else {
        return Ok(None);
    };

    let limit = state.config.linking.related_limit.max(1) as usize;
    // One extra slot for the note itself, which is usually its own nearest hit.
    let similar = notes::search_notes(state, &note.content, limit as i64 + 1).await?;
    Ok(Some(
        similar
            .into_iter()
            .filter(|n| n.id != id)
            .take(limit)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags_normalises() {
        let tags = parse_tags(" Rust , Async Runtime,TOKIO ");
        assert_eq!(tags, vec!["rust", "async_runtime", "tokio"]);
    }

    #[test]
    fn test_parse_tags_drops_empties_and_caps() {
        let tags = parse_tags("a, ,b,,c,d,e,f,g");
        assert_eq!(tags, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_parse_tags_empty_reply() {
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ,").is_empty());
    }

    #[test]
    fn test_prompts_embed_text() {
        assert!(summary_prompt("hello").ends_with("\n\nhello"));
        assert!(summary_prompt("hello").starts_with("Please summarize"));
        assert!(tags_prompt("hello").contains("comma-separated"));
        assert!(tags_prompt("hello").ends_with("\n\nhello"));
    }

    #[test]
    fn test_llm_disabled_without_key() {
        let mut config = PkosConfig::default();
        config.gemini.api_key.clear();
        assert!(create_llm_from_config(&config).is_none());

        config.gemini.api_key = "test-key".to_string();
        let llm = create_llm_from_config(&config).unwrap();
        assert_eq!(llm.name(), "gemini");
    }
}
