//! pkos-cli: command-line client for the PKOS notes REST API
//!
//! Every subcommand is one HTTP call. Output is a short human-readable
//! listing, or the raw JSON body with `--json`.

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
const DEFAULT_LIMIT: usize = 5;
const PREVIEW_CHARS: usize = 120;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "pkos-cli", version, about = "Personal Knowledge OS command-line client")]
struct Cli {
    /// PKOS HTTP server URL (overrides PKOS_HTTP_URL env var)
    #[arg(long, env = "PKOS_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a note
    Add {
        content: String,

        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Show one note
    Get { id: String },

    /// List notes, pinned first
    List {
        #[arg(long)]
        archived: bool,

        #[arg(long)]
        tag: Option<String>,
    },

    /// Semantic search
    Search {
        query: String,

        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Replace a note's tags
    UpdateTags {
        id: String,

        /// Comma-separated tags
        tags: String,
    },

    /// Delete a note
    Delete { id: String },

    /// Run AI enrichment now
    Process { id: String },

    /// Suggest related notes
    Related { id: String },

    /// Link two notes
    Link { source: String, target: String },

    /// Remove the link between two notes
    Unlink { source: String, target: String },

    /// Show linked notes
    Links { id: String },

    /// Link a note to its nearest neighbours
    AutoLink { id: String },

    /// Show a note's audit history
    History {
        id: String,

        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Show server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditView {
    pub action: String,
    #[serde(default)]
    pub changes: serde_json::Value,
    pub created_at: String,
}

/// Split `a, b ,c` into `["a", "b", "c"]`, dropping empties.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// First line of `content`, capped at `PREVIEW_CHARS`.
pub fn preview(content: &str) -> String {
    let line = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");
    let mut out: String = line.chars().take(PREVIEW_CHARS).collect();
    if line.chars().count() > PREVIEW_CHARS || content.lines().filter(|l| !l.trim().is_empty()).count() > 1 {
        out.push('…');
    }
    out
}

pub fn format_note(note: &NoteView) -> String {
    let mut flags = String::new();
    if note.is_pinned {
        flags.push_str(" [pinned]");
    }
    if note.is_archived {
        flags.push_str(" [archived]");
    }

    let mut out = format!("{}{}\n  {}", note.id, flags, preview(&note.content));
    if !note.tags.is_empty() {
        out.push_str(&format!("\n  tags: {}", note.tags.join(", ")));
    }
    if let Some(summary) = note.summary.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("\n  summary: {}", summary));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
    json: bool,
}

impl Api {
    fn new(server: String, json: bool) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            server,
            json,
        })
    }

    fn call(&self, method: reqwest::Method, path: &str, body: Option<serde_json::Value>) -> serde_json::Value {
        self.call_with_query(method, path, &[], body)
    }

    /// Send and return the JSON body, exiting on transport or HTTP errors.
    fn call_with_query(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> serde_json::Value {
        let url = format!("{}{}", self.server, path);
        let mut req = self.client.request(method, &url).query(query);
        if let Some(b) = body {
            req = req.json(&b);
        }

        let resp = match req.send() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("pkos-cli: connection failed to {}: {}", url, e);
                std::process::exit(1);
            }
        };

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or(text);
            eprintln!("pkos-cli: server returned {}: {}", status, message);
            std::process::exit(1);
        }

        match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("pkos-cli: failed to parse response: {}", e);
                std::process::exit(1);
            }
        }
    }

    /// Print raw JSON in `--json` mode; returns `true` when it did.
    fn print_raw(&self, value: &serde_json::Value) -> anyhow::Result<bool> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(self.json)
    }

    fn print_note(&self, value: serde_json::Value) -> anyhow::Result<()> {
        if self.print_raw(&value)? {
            return Ok(());
        }
        let note: NoteView = serde_json::from_value(value)?;
        println!("{}", format_note(&note));
        Ok(())
    }

    fn print_notes(&self, value: serde_json::Value, empty: &str) -> anyhow::Result<()> {
        if self.print_raw(&value)? {
            return Ok(());
        }
        let notes: Vec<NoteView> = serde_json::from_value(value)?;
        if notes.is_empty() {
            eprintln!("{}", empty);
            return Ok(());
        }
        for note in &notes {
            println!("{}\n", format_note(note));
        }
        Ok(())
    }

    fn print_message(&self, value: serde_json::Value) -> anyhow::Result<()> {
        if self.print_raw(&value)? {
            return Ok(());
        }
        println!("{}", value["message"].as_str().unwrap_or("ok"));
        Ok(())
    }
}

fn do_status(api: &Api) -> anyhow::Result<()> {
    let body = api.call(reqwest::Method::GET, "/health", None);
    if api.print_raw(&body)? {
        return Ok(());
    }
    let field = |k: &str| body[k].as_str().unwrap_or("none").to_string();
    println!("PKOS server: {}", field("status"));
    println!("Version:     {}", field("version"));
    println!("Store:       {}", field("store"));
    println!("Queue:       {}", field("queue"));
    println!("Embedder:    {}", field("embedder"));
    println!("LLM:         {}", field("llm"));
    Ok(())
}

fn do_history(api: &Api, id: &str, limit: usize) -> anyhow::Result<()> {
    let body = api.call_with_query(
        reqwest::Method::GET,
        &format!("/notes/{id}/history"),
        &[("limit", limit.to_string())],
        None,
    );
    if api.print_raw(&body)? {
        return Ok(());
    }
    let entries: Vec<AuditView> = serde_json::from_value(body)?;
    if entries.is_empty() {
        eprintln!("No history for {}", id);
    }
    for e in &entries {
        println!("{}  {:<10} {}", e.created_at, e.action, e.changes);
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn run(cli: Cli) -> anyhow::Result<()> {
    use reqwest::Method;

    let server = cli.server.trim_end_matches('/').to_string();
    let api = Api::new(server, cli.json)?;

    match cli.command {
        Commands::Add { content, tags } => {
            let tags = tags.as_deref().map(split_tags).unwrap_or_default();
            let body = serde_json::json!({ "content": content, "tags": tags });
            api.print_note(api.call(Method::POST, "/notes/", Some(body)))
        }
        Commands::Get { id } => api.print_note(api.call(Method::GET, &format!("/notes/{id}"), None)),
        Commands::List { archived, tag } => {
            let params = list_query(archived, tag);
            api.print_notes(
                api.call_with_query(Method::GET, "/notes/", &params, None),
                "No notes.",
            )
        }
        Commands::Search { query, limit } => {
            let params = [("q", query.clone()), ("limit", limit.to_string())];
            api.print_notes(
                api.call_with_query(Method::GET, "/notes/search/", &params, None),
                &format!("No results found for: {}", query),
            )
        }
        Commands::UpdateTags { id, tags } => {
            let body = serde_json::json!({ "tags": split_tags(&tags) });
            api.print_note(api.call(Method::PUT, &format!("/notes/{id}"), Some(body)))
        }
        Commands::Delete { id } => api.print_message(api.call(Method::DELETE, &format!("/notes/{id}"), None)),
        Commands::Process { id } => {
            api.print_note(api.call(Method::POST, &format!("/notes/{id}/process"), None))
        }
        Commands::Related { id } => api.print_notes(
            api.call(Method::GET, &format!("/notes/{id}/related"), None),
            "No related notes.",
        ),
        Commands::Link { source, target } => api.print_message(api.call(
            Method::POST,
            &format!("/notes/{source}/link/{target}"),
            None,
        )),
        Commands::Unlink { source, target } => api.print_message(api.call(
            Method::DELETE,
            &format!("/notes/{source}/link/{target}"),
            None,
        )),
        Commands::Links { id } => api.print_notes(
            api.call(Method::GET, &format!("/notes/{id}/links"), None),
            "No linked notes.",
        ),
        Commands::AutoLink { id } => api.print_notes(
            api.call(Method::POST, &format!("/notes/{id}/auto-link"), None),
            "No similar notes to link.",
        ),
        Commands::History { id, limit } => do_history(&api, &id, limit),
        Commands::Status => do_status(&api),
    }
}

/// Query pairs for `GET /notes/`; the tag filter is sent only when given.
pub fn list_query(archived: bool, tag: Option<String>) -> Vec<(&'static str, String)> {
    let mut params = vec![("include_archived", archived.to_string())];
    if let Some(tag) = tag.filter(|t| !t.is_empty()) {
        params.push(("tag", tag));
    }
    params
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("pkos-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn note(content: &str) -> NoteView {
        NoteView {
            id: "7b5c24ab-1234-5678-9abc-def012345678".to_string(),
            content: content.to_string(),
            summary: None,
            tags: Vec::new(),
            is_pinned: false,
            is_archived: false,
            created_at: None,
        }
    }

    #[test]
    fn test_split_tags_trims_and_drops_empties() {
        assert_eq!(split_tags(" rust, ,tokio ,"), vec!["rust", "tokio"]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn test_preview_first_nonempty_line() {
        assert_eq!(preview("\n\nFirst line"), "First line");
        assert_eq!(preview("one\ntwo"), "one…");
        assert_eq!(preview(""), "");
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 1);
        assert!(p.ends_with('…'));
    }

    #[test]
    fn test_format_note_includes_flags_tags_and_summary() {
        let mut n = note("Body");
        n.is_pinned = true;
        n.tags = vec!["a".to_string(), "b".to_string()];
        n.summary = Some("Short.".to_string());
        let out = format_note(&n);
        assert!(out.starts_with("7b5c24ab-1234-5678-9abc-def012345678 [pinned]"));
        assert!(out.contains("tags: a, b"));
        assert!(out.contains("summary: Short."));
    }

    #[test]
    fn test_format_note_minimal() {
        let out = format_note(&note("Body"));
        assert!(!out.contains("tags:"));
        assert!(!out.contains("summary:"));
    }

    #[test]
    fn test_note_view_parses_server_json() {
        let value = serde_json::json!({
            "id": "7b5c24ab-1234-5678-9abc-def012345678",
            "title": null,
            "content": "hello",
            "summary": "hi",
            "tags": ["x"],
            "isArchived": false,
            "isPinned": true,
            "metadata": {},
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        });
        let view: NoteView = serde_json::from_value(value).unwrap();
        assert!(view.is_pinned);
        assert_eq!(view.summary.as_deref(), Some("hi"));
        assert_eq!(view.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn test_list_query() {
        assert_eq!(
            list_query(false, None),
            vec![("include_archived", "false".to_string())]
        );
        assert_eq!(
            list_query(true, Some("rust async".to_string())),
            vec![
                ("include_archived", "true".to_string()),
                ("tag", "rust async".to_string()),
            ]
        );
        assert_eq!(list_query(false, Some(String::new())).len(), 1);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["pkos-cli", "--json", "search", "query text", "-n", "3"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Search { query, limit } => {
                assert_eq!(query, "query text");
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["pkos-cli", "update-tags", "abc", "a,b"]).unwrap();
        assert!(matches!(cli.command, Commands::UpdateTags { .. }));
        let cli = Cli::try_parse_from(["pkos-cli", "auto-link", "abc"]).unwrap();
        assert!(matches!(cli.command, Commands::AutoLink { .. }));
    }
}
