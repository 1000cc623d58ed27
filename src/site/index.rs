//! The "other content" card on the site index, linking every other page.

use anyhow::{bail, Context};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::text;

const CARD_START: &str = "<!-- saga-press:other-content -->";
const CARD_END: &str = "<!-- /saga-press:other-content -->";
const CARD_HEADING: &str = "その他のコンテンツ";
pub const INDEX_FILE: &str = "index.html";

/// Filename → display title overrides. Unreadable or malformed files count as empty.
pub fn load_display_names(path: &Path) -> HashMap<String, String> {
    if !path.exists() {
        return HashMap::new();
    }
    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from));
    match parsed {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring display-name map");
            HashMap::new()
        }
    }
}

/// `*.html` pages in `dir` other than the index, sorted.
pub fn linkable_pages(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut pages = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".html") && name != INDEX_FILE {
            pages.push(name);
        }
    }
    pages.sort();
    Ok(pages)
}

pub fn render_card(pages: &[String], names: &HashMap<String, String>) -> String {
    let mut links = String::new();
    for page in pages {
        let title = names
            .get(page)
            .cloned()
            .unwrap_or_else(|| text::title_from_filename(page));
        links.push_str(&format!(
            "                <p><a href=\"{}\" class=\"card-link\">{}</a></p>\n",
            text::escape_html(page),
            text::escape_html(&title)
        ));
    }

    format!(
        r#"{CARD_START}
<div class="row">
    <div class="col-md-6 mb-4">
        <div class="card h-100">
            <div class="card-body">
                <h2 class="card-title">{CARD_HEADING}</h2>
                <p class="card-text">サイト内に存在する、index.html以外のファイルへのリンクです。</p>
{links}            </div>
        </div>
    </div>
</div>
{CARD_END}"#
    )
}

/// Replaces the existing card, or inserts one before `</main>` / `</body>`.
pub fn splice_card(document: &str, card: &str) -> anyhow::Result<String> {
    if let Some(start) = document.find(CARD_START) {
        let Some(end_offset) = document[start..].find(CARD_END) else {
            bail!("index has an unterminated other-content card");
        };
        let end = start + end_offset + CARD_END.len();
        return Ok(format!("{}{}{}", &document[..start], card, &document[end..]));
    }

    let lower = document.to_ascii_lowercase();
    let Some(at) = lower.rfind("</main>").or_else(|| lower.rfind("</body>")) else {
        bail!("index has neither </main> nor </body>; cannot place the card");
    };
    Ok(format!("{}{}\n{}", &document[..at], card, &document[at..]))
}

/// Refreshes the index page's links to every other page in `public_dir`.
pub fn update_links(public_dir: &Path, display_names: &Path) -> anyhow::Result<usize> {
    let index = public_dir.join(INDEX_FILE);
    if !index.exists() {
        bail!("index page not found: {}", index.display());
    }

    let pages = linkable_pages(public_dir)?;
    if pages.is_empty() {
        bail!("no other pages to link in {}", public_dir.display());
    }

    let names = load_display_names(display_names);
    let card = render_card(&pages, &names);
    let document =
        fs::read_to_string(&index).with_context(|| format!("read {}", index.display()))?;
    let updated = splice_card(&document, &card)?;
    fs::write(&index, updated).with_context(|| format!("write {}", index.display()))?;
    Ok(pages.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_override_derived_titles() {
        let mut names = HashMap::new();
        names.insert("saga.html".to_string(), "サーガ全集".to_string());
        let card = render_card(&["saga.html".into(), "hof_page.html".into()], &names);
        assert!(card.contains(r#"<a href="saga.html" class="card-link">サーガ全集</a>"#));
        assert!(card.contains(r#"<a href="hof_page.html" class="card-link">hof page</a>"#));
    }

    #[test]
    fn card_is_replaced_not_duplicated() {
        let doc = "<body><main><p>x</p></main></body>";
        let first = splice_card(doc, &render_card(&["a.html".into()], &HashMap::new())).unwrap();
        let second =
            splice_card(&first, &render_card(&["b.html".into()], &HashMap::new())).unwrap();

        assert_eq!(second.matches(CARD_START).count(), 1);
        assert!(second.contains("b.html"));
        assert!(!second.contains("a.html"));
        assert!(second.ends_with("</main></body>"));
    }

    #[test]
    fn body_is_used_without_main() {
        let out = splice_card("<body></body>", "CARD").unwrap();
        assert_eq!(out, "<body>CARD\n</body>");
        assert!(splice_card("<p>no body</p>", "CARD").is_err());
    }

    #[test]
    fn update_links_skips_index_and_non_html() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), "<body></body>").unwrap();
        fs::write(dir.path().join("b.html"), "").unwrap();
        fs::write(dir.path().join("a.html"), "").unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();

        let linked = update_links(dir.path(), &dir.path().join("names.json")).unwrap();
        assert_eq!(linked, 2);
        let index = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        let a = index.find("a.html").unwrap();
        let b = index.find("b.html").unwrap();
        assert!(a < b);
        assert!(!index.contains("notes.md"));
    }

    #[test]
    fn malformed_display_names_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_display_names(&path).is_empty());
    }
}
