//! Content sources — upstream providers of the pipeline's input text.
//!
//! The pipeline treats text acquisition as an opaque step: a source hands
//! back plain text (plus an optional title hint) or fails. Binary formats
//! (HTML readability, PDF, DOC) live behind this trait in external services
//! and are not reimplemented here; the built-in sources cover literal text
//! and UTF-8 files, with markdown flattened to plain prose.

use async_trait::async_trait;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Errors from content acquisition.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("empty source: {0}")]
    Empty(String),
}

/// Plain text extracted from a source, ready for segmentation.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub text: String,
    /// Title declared by the source itself (e.g. frontmatter), preferred
    /// over a generated one.
    pub title_hint: Option<String>,
}

/// A provider of input text for one pipeline run.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Stable identifier used to derive the cache key.
    fn identifier(&self) -> String;

    /// Produce the plain text for this source.
    async fn fetch_text(&self) -> Result<SourceText, SourceError>;
}

/// A literal text source (raw query or pasted document body).
pub struct LiteralSource {
    text: String,
}

impl LiteralSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl ContentSource for LiteralSource {
    fn identifier(&self) -> String {
        self.text.clone()
    }

    async fn fetch_text(&self) -> Result<SourceText, SourceError> {
        Ok(SourceText {
            text: self.text.clone(),
            title_hint: None,
        })
    }
}

/// A UTF-8 file source. Markdown files are flattened to plain prose and a
/// frontmatter `title:` becomes the title hint.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_markdown(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("markdown")
        )
    }
}

#[async_trait]
impl ContentSource for FileSource {
    fn identifier(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    async fn fetch_text(&self) -> Result<SourceText, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        if !Self::is_markdown(&self.path) {
            return Ok(SourceText {
                text: raw,
                title_hint: None,
            });
        }

        let (body, title_hint) = split_frontmatter(&raw);
        Ok(SourceText {
            text: flatten_markdown(body),
            title_hint,
        })
    }
}

/// Strip YAML frontmatter from markdown content, returning the body and a
/// `title:` value when one is declared.
///
/// Frontmatter is delimited by `---` at the start and end. Corrupt YAML is
/// ignored: the frontmatter block is still stripped, but yields no title.
fn split_frontmatter(content: &str) -> (&str, Option<String>) {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("---") {
        return (content, None);
    }

    let after_first = &trimmed[3..];
    let end_pos = match after_first.find("\n---") {
        Some(pos) => pos,
        None => return (content, None),
    };

    let frontmatter_str = &after_first[..end_pos];
    let body = after_first[end_pos + 4..].trim_start_matches(['\r', '\n']);

    let title = serde_yaml::from_str::<serde_yaml::Value>(frontmatter_str)
        .ok()
        .and_then(|yaml| serde_json::to_value(yaml).ok())
        .and_then(|json| match json.get("title") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        });

    (body, title)
}

/// Flatten markdown to plain prose: text and inline code survive, block
/// boundaries become paragraph breaks, markup is dropped.
fn flatten_markdown(content: &str) -> String {
    let parser = Parser::new(content);
    let mut out = String::new();

    for event in parser {
        match event {
            Event::Text(text) => out.push_str(&text),
            Event::Code(code) => out.push_str(&code),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::BlockQuote) => {
                if !out.ends_with("\n\n") {
                    out.push_str("\n\n");
                }
            }
            Event::Start(Tag::Item) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }

    out.trim_end().to_string()
}
