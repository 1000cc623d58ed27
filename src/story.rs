//! The saga collection: a directory tree of Markdown stories that only ever grows.

use anyhow::{bail, Context};
use rand::seq::SliceRandom;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::gemini::{self, GenerateContentRequest};

pub const SECTION_BREAK: &str = "\n\n---\n\n";

#[derive(Debug, Clone)]
pub struct Story {
    pub path: PathBuf,
    pub name: String,
    pub content: String,
}

impl Story {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read story {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            content,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Collection {
    root: PathBuf,
}

impl Collection {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every `*.md` under the root, sorted by path.
    pub fn markdown_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            bail!("story collection not found: {}", self.root.display());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry =
                entry.with_context(|| format!("walk collection {}", self.root.display()))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("md")
            {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Picks a story uniformly among those larger than `min_bytes`.
    pub fn pick_random(&self, min_bytes: u64) -> anyhow::Result<Story> {
        let files = self.markdown_files()?;
        if files.is_empty() {
            bail!("no story files found under {}", self.root.display());
        }

        let candidates: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| {
                fs::metadata(path)
                    .map(|meta| meta.len() > min_bytes)
                    .unwrap_or(false)
            })
            .collect();

        let mut rng = rand::thread_rng();
        let path = match candidates.choose(&mut rng) {
            Some(path) => path,
            None => bail!("no story file larger than {min_bytes} bytes"),
        };
        tracing::debug!(path = %path.display(), candidates = candidates.len(), "picked story");
        Story::read(path)
    }

    /// Appends a generated continuation below a section break.
    ///
    /// Returns `false` when the continuation is blank and nothing was written.
    pub fn append_continuation(&self, story: &Story, continuation: &str) -> anyhow::Result<bool> {
        if continuation.trim().is_empty() {
            tracing::warn!(story = %story.name, "generated continuation is empty; skipping append");
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&story.path)
            .with_context(|| format!("open {} for append", story.path.display()))?;

        let mut block = String::new();
        if !story.content.ends_with('\n') {
            block.push('\n');
        }
        block.push_str(SECTION_BREAK);
        block.push_str(continuation);

        file.write_all(block.as_bytes())
            .with_context(|| format!("append to {}", story.path.display()))?;
        Ok(true)
    }
}

pub fn continuation_prompt(existing: &str) -> String {
    format!(
        r#"
あなたは卓越したSF作家であり、既存の物語の続きを執筆する専門家です。
以下の「既存の物語」を読み、その文体、登場人物の口調、物語の雰囲気を完全に維持したまま、自然で魅力的な「続きの物語」を執筆してください。

# 指示
- これまでの物語の流れを壊さないように、ごく自然な続きを執筆してください。
- 出力は「続きの物語」の文章本体のみとし、余計な前置きや後書きは一切含めないでください。
- 新しい展開を少しだけ加えて、物語を前に進めてください。

# 既存の物語
{existing}

# 出力（続きの物語）
"#
    )
}

/// Writes the next chapter of a randomly chosen story.
pub fn append_random(config: &Config) -> anyhow::Result<PathBuf> {
    let client = gemini::Client::from_config(config, false).context("prepare gemini client")?;
    let collection = Collection::new(&config.paths.collection_root);
    let story = collection.pick_random(0)?;
    tracing::info!(story = %story.name, "writing continuation");

    let request = GenerateContentRequest::from_prompt(continuation_prompt(&story.content));
    let continuation = client
        .generate_text(&config.gemini.model, &request)
        .with_context(|| format!("generate continuation for {}", story.name))?;

    if collection.append_continuation(&story, &continuation)? {
        tracing::info!(story = %story.name, chars = continuation.chars().count(), "continuation appended");
    }
    Ok(story.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::{point_at, reply, serve};

    fn write(dir: &Path, rel: &str, body: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn lists_markdown_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.md", "b");
        write(dir.path(), "nested/a.md", "a");
        write(dir.path(), "notes.txt", "x");

        let files = Collection::new(dir.path()).markdown_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("b.md"), PathBuf::from("nested/a.md")]);
    }

    #[test]
    fn random_pick_honors_size_threshold() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "short.md", "tiny");
        write(dir.path(), "long.md", &"x".repeat(300));

        let collection = Collection::new(dir.path());
        for _ in 0..10 {
            assert_eq!(collection.pick_random(200).unwrap().name, "long.md");
        }
        assert!(collection.pick_random(1000).is_err());
    }

    #[test]
    fn empty_collection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Collection::new(dir.path()).pick_random(0).is_err());
    }

    #[test]
    fn append_adds_newline_and_section_break() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "s.md", "first line");
        let collection = Collection::new(dir.path());
        let story = Story::read(&path).unwrap();

        assert!(collection.append_continuation(&story, "next").unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "first line\n\n\n---\n\nnext"
        );
    }

    #[test]
    fn blank_continuation_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "s.md", "body\n");
        let collection = Collection::new(dir.path());
        let story = Story::read(&path).unwrap();

        assert!(!collection.append_continuation(&story, "  \n").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "body\n");
    }

    #[test]
    fn append_random_writes_reply_below_section_break() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "stories/only.md", "始まり\n");
        let (base, server) = serve(vec![(200, reply("続きの章"))]);
        let mut config = Config::default();
        config.paths.collection_root = dir.path().join("stories");
        point_at(&mut config, base, dir.path());

        assert_eq!(append_random(&config).unwrap(), path);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "始まり\n\n\n---\n\n続きの章"
        );

        let seen = server.join().unwrap();
        assert!(seen[0]
            .request_line
            .starts_with("POST /gemini-2.5-flash:generateContent?key=test-key "));
        assert!(seen[0].prompt().contains("# 既存の物語\n始まり\n"));
    }
}
