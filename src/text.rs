//! Markdown rendering and the small string transforms shared by every operation.

use anyhow::bail;
use pulldown_cmark::{html, Event, Options, Parser, TagEnd};
use regex::Regex;
use std::sync::LazyLock;

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank-run regex"));
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("space regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("ws regex"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-_. ]").expect("unsafe-char regex"));
static MARKDOWN_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\s*\[.*?\]\(.*?\)|\[.*?\]\(.*?\)|`{1,3}.*?`{1,3}|\*{1,2}|_{1,2}|#{1,6}|- |\* |> ")
        .expect("markdown syntax regex")
});
static HTML_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```html\s*(.*?)\s*```").expect("html fence regex"));
static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("fence regex"));

const DOCTYPE: &str = "<!doctype html>";
const SUMMARY_FALLBACK: &str = "物語の要約";

fn markdown_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Rendered text of a Markdown document with all markup removed.
///
/// Block ends become newlines so paragraph structure survives.
pub fn markdown_to_plain(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    for event in Parser::new_ext(markdown, markdown_options()) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak | Event::Rule => out.push('\n'),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => out.push_str("\n\n"),
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }
    out
}

/// Text for the speech synthesizer: one line, pauses marked with `、`.
pub fn clean_for_tts(markdown: &str) -> String {
    let plain = markdown_to_plain(markdown);
    let collapsed = BLANK_RUNS.replace_all(&plain, "\n");
    let joined = collapsed.trim().replace('\n', "、");
    SPACE_RUNS.replace_all(&joined, " ").into_owned()
}

/// Short caption for a scene card, cut at a word boundary when possible.
pub fn summarize_for_image(markdown: &str, max_chars: usize) -> String {
    let plain = markdown_to_plain(markdown);
    let collapsed = BLANK_RUNS.replace_all(&plain, "\n");
    let text = SPACE_RUNS
        .replace_all(collapsed.trim(), " ")
        .into_owned();

    let text = if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        match head.rfind(' ') {
            Some(idx) => format!("{}...", &head[..idx]),
            None => format!("{head}..."),
        }
    } else {
        text
    };

    if text.is_empty() {
        SUMMARY_FALLBACK.to_string()
    } else {
        text
    }
}

/// `<meta name="description">` value derived from raw Markdown.
pub fn meta_description(markdown: &str, max_chars: usize) -> String {
    let stripped = MARKDOWN_SYNTAX.replace_all(markdown, "");
    let plain = WHITESPACE.replace_all(&stripped, " ");
    let plain = plain.trim();

    let description = if plain.chars().count() > max_chars {
        let head: String = plain.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        plain.to_string()
    };
    description.replace('"', "&quot;")
}

/// File-name-safe stem of a story name.
pub fn safe_stem(name: &str) -> String {
    let stem = name.strip_suffix(".md").unwrap_or(name);
    UNSAFE_CHARS.replace_all(stem, "_").into_owned()
}

pub fn title_from_filename(name: &str) -> String {
    let stem = name
        .strip_suffix(".md")
        .or_else(|| name.strip_suffix(".html"))
        .unwrap_or(name);
    stem.replace('_', " ")
}

pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Pulls the HTML out of a fenced block in a model reply.
pub fn strip_code_fences(text: &str) -> String {
    if let Some(caps) = HTML_FENCE.captures(text) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = ANY_FENCE.captures(text) {
        return caps[1].trim().to_string();
    }
    tracing::warn!("no fenced code block in model reply; using it verbatim");
    text.to_string()
}

/// Drops any preamble the model wrote before the doctype declaration.
pub fn strip_before_doctype(html: &str) -> anyhow::Result<&str> {
    // ASCII lowering keeps byte offsets aligned with the original.
    match html.to_ascii_lowercase().find(DOCTYPE) {
        Some(idx) => Ok(&html[idx..]),
        None => bail!("no <!DOCTYPE html> declaration found"),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
