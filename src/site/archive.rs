use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};

use crate::text;

/// Removes any model commentary written above the doctype, in place.
pub fn fix_header(page: &Path) -> anyhow::Result<()> {
    if !page.exists() {
        bail!("page not found: {}", page.display());
    }
    let html = fs::read_to_string(page).with_context(|| format!("read {}", page.display()))?;
    let cleaned = text::strip_before_doctype(&html)
        .with_context(|| format!("fix header of {}", page.display()))?;

    if cleaned.len() == html.len() {
        tracing::info!(page = %page.display(), "header already clean");
        return Ok(());
    }
    fs::write(page, cleaned).with_context(|| format!("write {}", page.display()))?;
    tracing::info!(page = %page.display(), removed_bytes = html.len() - cleaned.len(), "header fixed");
    Ok(())
}

/// Copies a page into the hall-of-fame directory as `hof_page_<timestamp>.html`.
pub fn archive_page(page: &Path, hof_dir: &Path) -> anyhow::Result<PathBuf> {
    if !page.exists() {
        bail!("page not found: {}", page.display());
    }
    if !hof_dir.is_dir() {
        bail!("archive directory not found: {}", hof_dir.display());
    }

    let dest = hof_dir.join(format!("hof_page_{}.html", text::timestamp()));
    fs::copy(page, &dest)
        .with_context(|| format!("copy {} to {}", page.display(), dest.display()))?;

    // keep the original modification time like a plain archive copy
    if let Ok(meta) = fs::metadata(page) {
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        let _ = filetime::set_file_mtime(&dest, mtime);
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_header_strips_preamble() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("home.html");
        fs::write(&page, "はい、どうぞ。\n<!DOCTYPE html><html></html>").unwrap();

        fix_header(&page).unwrap();
        assert_eq!(
            fs::read_to_string(&page).unwrap(),
            "<!DOCTYPE html><html></html>"
        );
    }

    #[test]
    fn fix_header_without_doctype_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("home.html");
        fs::write(&page, "<html></html>").unwrap();

        assert!(fix_header(&page).is_err());
        assert_eq!(fs::read_to_string(&page).unwrap(), "<html></html>");
    }

    #[test]
    fn archive_copies_with_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("home.html");
        fs::write(&page, "<html>hof</html>").unwrap();
        let hof = dir.path().join("hof");
        fs::create_dir(&hof).unwrap();

        let dest = archive_page(&page, &hof).unwrap();
        let name = dest.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("hof_page_") && name.ends_with(".html"));
        assert_eq!(fs::read_to_string(dest).unwrap(), "<html>hof</html>");
        assert!(page.exists());
    }

    #[test]
    fn archive_requires_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("home.html");
        fs::write(&page, "x").unwrap();
        assert!(archive_page(&page, &dir.path().join("missing")).is_err());
    }
}
