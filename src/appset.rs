//! Named sets of active scripts: toggle scripts between the active and
//! archive directories, save the active set, and restore a saved one.

use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::text;

const ALWAYS_ACTIVE: &str = "menu.sh";
const SET_EXT: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// 0-based index into the active list.
    Active(usize),
    /// 0-based index into the archived list.
    Archived(usize),
}

/// Parses `A1,r2` style keys. Malformed keys are skipped with a warning.
pub fn parse_keys(input: &str) -> Vec<Key> {
    let mut keys = Vec::new();
    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let mut chars = token.chars();
        let kind = chars.next().map(|c| c.to_ascii_uppercase());
        let index = chars.as_str().parse::<usize>().ok().filter(|n| *n >= 1);
        match (kind, index) {
            (Some('A'), Some(n)) => keys.push(Key::Active(n - 1)),
            (Some('R'), Some(n)) => keys.push(Key::Archived(n - 1)),
            _ => tracing::warn!(key = token, "unknown key skipped"),
        }
    }
    keys
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listing {
    pub active: Vec<String>,
    pub archived: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub name: String,
    pub from: PathBuf,
    pub to: PathBuf,
}

impl Move {
    fn between(name: &str, from_dir: &Path, to_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            from: from_dir.join(name),
            to: to_dir.join(name),
        }
    }

    pub fn apply(&self) -> anyhow::Result<()> {
        fs::rename(&self.from, &self.to)
            .with_context(|| format!("move {} to {}", self.from.display(), self.to.display()))
    }
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub archived: usize,
    pub restored: Vec<String>,
    pub missing: Vec<String>,
}

pub struct AppSets {
    scripts_dir: PathBuf,
    archive_dir: PathBuf,
    configs_dir: PathBuf,
}

fn file_names(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

impl AppSets {
    pub fn new(scripts_dir: PathBuf, archive_dir: PathBuf, configs_dir: PathBuf) -> Self {
        Self {
            scripts_dir,
            archive_dir,
            configs_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.paths.scripts_dir.clone(),
            config.paths.archive_dir.clone(),
            config.paths.configs_dir.clone(),
        )
    }

    fn ensure_dirs(&self) -> anyhow::Result<()> {
        for dir in [&self.archive_dir, &self.configs_dir] {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn list(&self) -> anyhow::Result<Listing> {
        self.ensure_dirs()?;
        if !self.scripts_dir.is_dir() {
            bail!("scripts directory not found: {}", self.scripts_dir.display());
        }

        let active: Vec<String> = file_names(&self.scripts_dir)?
            .into_iter()
            .filter(|name| name != ALWAYS_ACTIVE)
            .collect();
        let archived = file_names(&self.archive_dir)?
            .into_iter()
            .filter(|name| !active.contains(name))
            .collect();
        Ok(Listing { active, archived })
    }

    /// Moves that toggling `keys` would make, without touching the disk.
    pub fn plan_toggle(&self, keys: &[Key]) -> anyhow::Result<Vec<Move>> {
        let listing = self.list()?;
        let mut moves = Vec::new();
        for key in keys {
            let planned = match *key {
                Key::Active(i) => listing
                    .active
                    .get(i)
                    .map(|name| Move::between(name, &self.scripts_dir, &self.archive_dir)),
                Key::Archived(i) => listing
                    .archived
                    .get(i)
                    .map(|name| Move::between(name, &self.archive_dir, &self.scripts_dir)),
            };
            match planned {
                Some(m) if !moves.contains(&m) => moves.push(m),
                Some(_) => {}
                None => tracing::warn!(key = ?key, "key out of range skipped"),
            }
        }
        if moves.is_empty() {
            bail!("no valid keys selected");
        }
        Ok(moves)
    }

    /// Applies `moves`, returning how many succeeded. Failures are logged.
    pub fn toggle(&self, moves: &[Move]) -> usize {
        let mut done = 0;
        for m in moves {
            match m.apply() {
                Ok(()) => {
                    tracing::info!(script = %m.name, to = %m.to.display(), "moved");
                    done += 1;
                }
                Err(err) => tracing::warn!(script = %m.name, error = ?err, "move failed"),
            }
        }
        done
    }

    fn set_path(&self, name: &str) -> anyhow::Result<PathBuf> {
        if name.trim().is_empty() {
            bail!("set name is empty");
        }
        Ok(self
            .configs_dir
            .join(format!("{}.{SET_EXT}", text::safe_stem(name.trim()))))
    }

    pub fn save(&self, name: &str) -> anyhow::Result<PathBuf> {
        let path = self.set_path(name)?;
        let listing = self.list()?;
        if listing.active.is_empty() {
            bail!("no active scripts to save");
        }
        let json = serde_json::to_string_pretty(&listing.active)?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn read_set(&self, name: &str) -> anyhow::Result<Vec<String>> {
        let path = self.set_path(name)?;
        if !path.exists() {
            bail!("app set not found: {}", path.display());
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a JSON array of file names", path.display()))
    }

    /// Archives every active script, then restores the scripts named by the set.
    pub fn load(&self, name: &str) -> anyhow::Result<LoadReport> {
        let wanted = self.read_set(name)?;
        let listing = self.list()?;

        let mut report = LoadReport::default();
        for script in &listing.active {
            Move::between(script, &self.scripts_dir, &self.archive_dir).apply()?;
            report.archived += 1;
        }

        for script in wanted {
            let m = Move::between(&script, &self.archive_dir, &self.scripts_dir);
            if m.from.is_file() {
                m.apply()?;
                report.restored.push(script);
            } else {
                tracing::warn!(script = %script, "not found in archive");
                report.missing.push(script);
            }
        }
        Ok(report)
    }

    pub fn sets(&self) -> anyhow::Result<Vec<String>> {
        self.ensure_dirs()?;
        let mut names: Vec<String> = file_names(&self.configs_dir)?
            .into_iter()
            .filter_map(|name| {
                name.strip_suffix(&format!(".{SET_EXT}"))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}
