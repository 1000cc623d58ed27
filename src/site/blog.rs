use anyhow::{bail, Context};
use std::fs;
use std::path::Path;

use crate::text;

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

fn rfind_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().rfind(needle)
}

/// Inserts `entry` before the footer, else before the last body script,
/// else at the end of the body.
pub fn insert_entry(document: &str, entry: &str) -> anyhow::Result<String> {
    let at = if let Some(idx) = find_ci(document, "<footer") {
        tracing::info!("inserting entry before footer");
        idx
    } else {
        let Some(body_start) = find_ci(document, "<body") else {
            bail!("document has no <body>; cannot place the entry");
        };
        let body_end = rfind_ci(document, "</body>")
            .filter(|end| *end > body_start)
            .unwrap_or(document.len());
        match rfind_ci(&document[body_start..body_end], "<script") {
            Some(offset) => {
                tracing::info!("inserting entry before last script");
                body_start + offset
            }
            None => {
                tracing::info!("inserting entry at end of body");
                body_end
            }
        }
    };

    let mut out = String::with_capacity(document.len() + entry.len() + 2);
    out.push_str(&document[..at]);
    out.push_str(entry.trim_end());
    out.push('\n');
    out.push_str(&document[at..]);
    Ok(out)
}

/// Renders a Markdown entry and splices it into the blog page in place.
pub fn add_entry(blog: &Path, entry_markdown: &str) -> anyhow::Result<()> {
    if !blog.exists() {
        bail!("blog page not found: {}", blog.display());
    }
    let document =
        fs::read_to_string(blog).with_context(|| format!("read {}", blog.display()))?;
    let entry = text::markdown_to_html(entry_markdown);
    let updated = insert_entry(&document, &entry)?;
    fs::write(blog, updated).with_context(|| format!("write {}", blog.display()))?;
    Ok(())
}
