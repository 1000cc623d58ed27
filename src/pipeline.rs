//! The daily run: grow a story, film it, put it on the homepage, ship it.

use anyhow::{bail, Context};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::config::Config;
use crate::gemini;
use crate::homepage::{self, BriefOverrides, Showcase};
use crate::media::{narration, tool, video, ToolError};
use crate::story::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Append,
    #[value(alias = "narrate")]
    Narration,
    Deploy,
}

#[derive(Debug, Default)]
pub struct DailyReport {
    pub appended: Option<PathBuf>,
    pub story: PathBuf,
    pub audio: Option<PathBuf>,
    pub video: PathBuf,
    pub homepage: PathBuf,
    pub deploy_output: Option<String>,
}

fn existing_bgm(config: &Config) -> Option<PathBuf> {
    config
        .paths
        .bgm_file
        .as_ref()
        .filter(|path| path.is_file())
        .cloned()
}

/// Runs the deploy script with the video path as its only argument.
pub fn deploy(config: &Config, video: &Path) -> anyhow::Result<String> {
    let script = &config.paths.deploy_script;
    if !script.exists() {
        bail!("deploy script not found: {}", script.display());
    }
    // a bare file name would otherwise be looked up on PATH
    let script = std::fs::canonicalize(script)
        .with_context(|| format!("resolve {}", script.display()))?;
    tracing::info!(script = %script.display(), video = %video.display(), "deploying");

    let timeout = Duration::from_secs(config.media.tool_timeout_seconds);
    match tool::run(Command::new(&script).arg(video), None, timeout) {
        Ok(output) => {
            if !output.stderr.trim().is_empty() {
                eprintln!("{}", output.stderr.trim_end());
            }
            Ok(output.stdout)
        }
        Err(ToolError::Failed { stderr, status, .. }) => {
            bail!("deploy script failed with {status}: {}", stderr.trim())
        }
        Err(err) => Err(err).context("run deploy script"),
    }
}

pub fn run_daily(config: &Config, skip: &[Step]) -> anyhow::Result<DailyReport> {
    let mut report = DailyReport::default();

    if skip.contains(&Step::Append) {
        tracing::info!("append step skipped");
    } else {
        match crate::story::append_random(config) {
            Ok(path) => report.appended = Some(path),
            Err(err) => tracing::warn!(error = ?err, "append failed; continuing with existing stories"),
        }
    }

    let story = Collection::new(&config.paths.collection_root)
        .pick_random(config.pipeline.min_story_bytes)
        .context("select story for today")?;
    tracing::info!(story = %story.name, "today's story");
    report.story = story.path.clone();

    report.audio = if config.pipeline.narrate && !skip.contains(&Step::Narration) {
        Some(narration::narrate(config, &story.content, &story.name)?)
    } else {
        existing_bgm(config)
    };
    if report.audio.is_none() {
        tracing::warn!("no narration or background music; the video will be silent");
    }

    report.video = video::assemble(config, &story.content, &story.name, report.audio.as_deref())?;

    let client = gemini::Client::from_config(config, false).context("prepare gemini client")?;
    let brief = BriefOverrides::default().resolve(false);
    let showcase = Showcase {
        story_name: &story.name,
        story: &story.content,
        video: &report.video,
    };
    report.homepage = homepage::generate(config, &client, &brief, Some(&showcase))?;

    if skip.contains(&Step::Deploy) {
        tracing::info!("deploy step skipped");
    } else {
        report.deploy_output = Some(deploy(config, &report.video)?);
    }
    Ok(report)
}
