use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};

use super::Template;
use crate::config::Config;
use crate::story::{Collection, SECTION_BREAK};
use crate::text;

pub const MASTER_TITLE: &str = "ネオワールドサーガ マスターコレクション";
pub const MASTER_FILE: &str = "neo_world_saga.html";
const BUNDLE_PREFIX: &str = "結合された章: ";
const BUNDLE_TITLE_PARTS: usize = 3;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConvertReport {
    pub converted: usize,
    pub failed: usize,
}

/// Empties `dir` except for its `.git` directory, creating it if needed.
pub fn clean_output_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() {
        for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
            let entry = entry?;
            if entry.file_name() == ".git" {
                continue;
            }
            let path = entry.path();
            let removed = if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.with_context(|| format!("remove {}", path.display()))?;
        }
    }
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn convert_one(
    template: &Template,
    source: &Path,
    out_dir: &Path,
    description_length: usize,
) -> anyhow::Result<PathBuf> {
    let name = file_name(source);
    let markdown =
        fs::read_to_string(source).with_context(|| format!("read {}", source.display()))?;
    let page = template.render_markdown(&text::title_from_filename(&name), &markdown, description_length)?;

    let stem = name.strip_suffix(".md").unwrap_or(&name);
    let output = out_dir.join(format!("{stem}.html"));
    fs::write(&output, page).with_context(|| format!("write {}", output.display()))?;
    Ok(output)
}

/// Rebuilds the chapter site: one page per story file.
pub fn convert_all(config: &Config) -> anyhow::Result<ConvertReport> {
    let template = Template::load(&config.paths.template_file)?;
    let out_dir = &config.paths.site_dir;
    let files = Collection::new(&config.paths.collection_root).markdown_files()?;
    if files.is_empty() {
        bail!(
            "no .md files found under {}",
            config.paths.collection_root.display()
        );
    }

    tracing::info!(dir = %out_dir.display(), "cleaning output directory");
    clean_output_dir(out_dir)?;

    let mut report = ConvertReport::default();
    for source in &files {
        match convert_one(&template, source, out_dir, config.homepage.description_length) {
            Ok(output) => {
                tracing::info!(output = %output.display(), "converted");
                report.converted += 1;
            }
            Err(err) => {
                tracing::warn!(source = %source.display(), error = ?err, "conversion failed");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Parses comma-separated 1-based indices, skipping anything out of range.
pub fn parse_selection(input: &str, available: usize) -> Vec<usize> {
    let mut picked = Vec::new();
    for token in input.split(',').map(str::trim) {
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        match token.parse::<usize>() {
            Ok(n) if (1..=available).contains(&n) => picked.push(n - 1),
            _ => tracing::warn!(selection = token, "invalid selection skipped"),
        }
    }
    picked
}

pub fn bundle_title(names: &[String]) -> String {
    let titles: Vec<String> = names
        .iter()
        .take(BUNDLE_TITLE_PARTS)
        .map(|n| text::title_from_filename(n))
        .collect();
    let mut title = format!("{BUNDLE_PREFIX}{}", titles.join(" "));
    if names.len() > BUNDLE_TITLE_PARTS {
        title.push_str(" など");
    }
    title
}

pub fn bundle_file_name(title: &str) -> String {
    format!("{}.html", title.replace(' ', "_").replace(':', ""))
}

/// Joins the selected stories into one page in the site directory.
pub fn bundle(config: &Config, files: &[PathBuf]) -> anyhow::Result<PathBuf> {
    if files.is_empty() {
        bail!("no files selected");
    }

    let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
    let title = bundle_title(&names);
    tracing::info!(title = %title, files = files.len(), "bundling chapters");

    let mut markdown = String::new();
    for path in files {
        let body = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        markdown.push_str(&body);
        markdown.push_str("\n\n");
    }

    let template = Template::load(&config.paths.template_file)?;
    let page = template.render_markdown(&title, &markdown, config.homepage.description_length)?;

    let out_dir = &config.paths.site_dir;
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let output = out_dir.join(bundle_file_name(&title));
    fs::write(&output, page).with_context(|| format!("write {}", output.display()))?;
    Ok(output)
}

/// The whole collection, chapter by chapter, as a single page.
pub fn master_saga(config: &Config) -> anyhow::Result<PathBuf> {
    let files = Collection::new(&config.paths.collection_root).markdown_files()?;
    if files.is_empty() {
        bail!(
            "no .md files found under {}",
            config.paths.collection_root.display()
        );
    }

    let mut markdown = String::new();
    for path in &files {
        let body = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        markdown.push_str(&format!("# {}\n\n", text::title_from_filename(&file_name(path))));
        markdown.push_str(&body);
        markdown.push_str(SECTION_BREAK);
    }
    tracing::info!(chapters = files.len(), "building master saga");

    let template = Template::load(&config.paths.template_file)?;
    let page = template.render_markdown(MASTER_TITLE, &markdown, config.homepage.description_length)?;

    let out_dir = &config.paths.public_dir;
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let output = out_dir.join(MASTER_FILE);
    fs::write(&output, page).with_context(|| format!("write {}", output.display()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_skips_invalid_tokens() {
        assert_eq!(parse_selection("1, 3,x,9,,2", 3), vec![0, 2, 1]);
        assert_eq!(parse_selection("0", 3), Vec::<usize>::new());
        assert!(parse_selection("", 3).is_empty());
    }

    #[test]
    fn bundle_title_uses_first_three_names() {
        let names: Vec<String> = ["a_1.md", "b.md", "c.md", "d.md"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(bundle_title(&names), "結合された章: a 1 b c など");
        assert_eq!(bundle_title(&names[..2]), "結合された章: a 1 b");
    }

    #[test]
    fn bundle_file_name_drops_colons_and_spaces() {
        assert_eq!(
            bundle_file_name("結合された章: a 1 b"),
            "結合された章_a_1_b.html"
        );
    }

    #[test]
    fn clean_keeps_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::create_dir_all(dir.path().join("old")).unwrap();
        fs::write(dir.path().join("stale.html"), "x").unwrap();

        clean_output_dir(dir.path()).unwrap();
        let left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from(".git")]);
    }
}
