//! Static HTML output: page templates and the pages built from the collection.

pub mod archive;
pub mod blog;
pub mod convert;
pub mod index;

use anyhow::{bail, Context};
use std::fs;
use std::path::Path;

use crate::text;

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="ja">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="description" content="{description}">
    <title>{title}</title>
    <style>
        body {{ max-width: 46rem; margin: 2rem auto; padding: 0 1rem; line-height: 1.9;
               font-family: "Noto Serif JP", serif; background: #111; color: #ddd; }}
        h1, h2, h3 {{ color: #f5d67b; }}
        hr {{ border: none; border-top: 1px solid #444; margin: 3rem 0; }}
        a {{ color: #8cc8ff; }}
    </style>
</head>
<body>
<main>
<h1>{title}</h1>
{content}
</main>
</body>
</html>
"#;

/// Page shell with `{title}`, `{description}` and `{content}` slots.
///
/// `{{` and `}}` stand for literal braces.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Reads `path`, or falls back to the built-in template when it is absent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "template not found; using built-in");
            return Ok(Self::new(DEFAULT_TEMPLATE));
        }
        let source = fs::read_to_string(path)
            .with_context(|| format!("read template {}", path.display()))?;
        Ok(Self::new(source))
    }

    pub fn render(&self, title: &str, description: &str, content: &str) -> anyhow::Result<String> {
        let title = text::escape_html(title);
        let mut out = String::with_capacity(self.source.len() + content.len());
        let mut rest = self.source.as_str();

        while let Some(idx) = rest.find(['{', '}']) {
            out.push_str(&rest[..idx]);
            let tail = &rest[idx..];

            if tail.starts_with("{{") {
                out.push('{');
                rest = &tail[2..];
            } else if tail.starts_with("}}") {
                out.push('}');
                rest = &tail[2..];
            } else if tail.starts_with('}') {
                bail!("unmatched '}}' in template");
            } else {
                let Some(end) = tail.find('}') else {
                    bail!("unterminated placeholder in template");
                };
                match &tail[1..end] {
                    "title" => out.push_str(&title),
                    "description" => out.push_str(description),
                    "content" => out.push_str(content),
                    other => bail!("unknown template placeholder {{{other}}}"),
                }
                rest = &tail[end + 1..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Renders a Markdown document as a full page.
    pub fn render_markdown(
        &self,
        title: &str,
        markdown: &str,
        description_length: usize,
    ) -> anyhow::Result<String> {
        let description = text::meta_description(markdown, description_length);
        let content = text::markdown_to_html(markdown);
        self.render(title, &description, &content)
    }
}
