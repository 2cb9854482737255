//! Shallow HTML to Markdown conversion for the text export.
//!
//! Covers the markup article bodies actually use: headings, paragraphs,
//! emphasis, inline code and code blocks, links, images, lists, block
//! quotes and rules. Anything else contributes its text content only.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use tracing::{debug, info, instrument};

use super::error::RenderError;
use super::{RenderJob, TextConverter};
use crate::download::{MARKDOWN_EXTENSION, artifact_path, should_skip, staging_path};

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid")); // Static pattern, safe to panic

#[allow(clippy::expect_used)]
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank line regex is valid")); // Static pattern, safe to panic

/// Writes `<dir>/<title>.md` from the article HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownConverter;

impl MarkdownConverter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextConverter for MarkdownConverter {
    #[instrument(skip(self, job), fields(title = job.title))]
    async fn convert(&self, job: &RenderJob<'_>) -> Result<bool, RenderError> {
        let target = artifact_path(job.dir, job.title, MARKDOWN_EXTENSION);
        if should_skip(&target, job.overwrite) {
            debug!(path = %target.display(), "Markdown already present");
            return Ok(false);
        }

        let body = html_to_markdown(job.html);
        if body.is_empty() && !job.html.trim().is_empty() {
            return Err(RenderError::ConversionEmpty {
                title: job.title.to_string(),
            });
        }
        let document = format!("# {}\n\n{body}\n", job.title.trim());

        let staging = staging_path(&target);
        tokio::fs::write(&staging, document)
            .await
            .map_err(|e| RenderError::io(&staging, e))?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| RenderError::io(&target, e))?;
        info!(path = %target.display(), "Markdown written");
        Ok(true)
    }
}

/// Converts an HTML fragment to Markdown.
///
/// # Examples
///
/// ```
/// use course_downloader::render::html_to_markdown;
///
/// let md = html_to_markdown("<h2>Setup</h2><p>Run <code>cargo</code> first.</p>");
/// assert_eq!(md, "## Setup\n\nRun `cargo` first.");
/// ```
#[must_use]
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let raw = children(fragment.root_element(), 0);
    BLANK_LINES.replace_all(raw.trim(), "\n\n").into_owned()
}

fn children(element: ElementRef<'_>, depth: usize) -> String {
    let mut out = String::new();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&WHITESPACE.replace_all(text, " ")),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    out.push_str(&convert_element(child, depth));
                }
            }
            _ => {}
        }
    }
    out
}

fn convert_element(element: ElementRef<'_>, depth: usize) -> String {
    let name = element.value().name();
    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            let text = children(element, depth);
            format!("\n\n{} {}\n\n", "#".repeat(level), text.trim())
        }
        "p" | "div" | "section" | "article" | "figure" | "table" => {
            format!("\n\n{}\n\n", children(element, depth).trim())
        }
        "br" => "  \n".to_string(),
        "hr" => "\n\n---\n\n".to_string(),
        "strong" | "b" => wrap_inline(&children(element, depth), "**"),
        "em" | "i" => wrap_inline(&children(element, depth), "*"),
        "code" => {
            let text: String = element.text().collect();
            if text.is_empty() { String::new() } else { format!("`{text}`") }
        }
        "pre" => code_block(element),
        "a" => {
            let text = children(element, depth);
            match element.value().attr("href") {
                Some(href) if !href.trim().is_empty() => format!("[{}]({})", text.trim(), href.trim()),
                _ => text,
            }
        }
        "img" => {
            let alt = element.value().attr("alt").unwrap_or_default();
            match element.value().attr("src") {
                Some(src) => format!("![{}]({})", alt.trim(), src.trim()),
                None => String::new(),
            }
        }
        "ul" | "ol" => list(element, name == "ol", depth),
        "blockquote" => {
            let inner = BLANK_LINES.replace_all(children(element, depth).trim(), "\n\n").into_owned();
            let quoted: Vec<String> = inner
                .lines()
                .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {line}") })
                .collect();
            format!("\n\n{}\n\n", quoted.join("\n"))
        }
        "script" | "style" | "video" | "audio" | "source" => String::new(),
        _ => children(element, depth),
    }
}

fn wrap_inline(text: &str, marker: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{marker}{trimmed}{marker}")
    }
}

fn code_block(element: ElementRef<'_>) -> String {
    let language = element
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "code")
        .and_then(|code| {
            code.value()
                .classes()
                .find_map(|class| class.strip_prefix("language-").map(str::to_string))
        })
        .unwrap_or_default();
    let text: String = element.text().collect();
    format!("\n\n```{language}\n{}\n```\n\n", text.trim_end_matches('\n'))
}

fn list(element: ElementRef<'_>, ordered: bool, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let mut out = String::from(if depth == 0 { "\n\n" } else { "\n" });
    let items = element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li");
    for (index, item) in items.enumerate() {
        let marker = if ordered { format!("{}.", index + 1) } else { "-".to_string() };
        let body = children(item, depth + 1);
        out.push_str(&format!("{indent}{marker} {}\n", body.trim()));
    }
    if depth == 0 {
        out.push('\n');
    }
    out
}
