use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::tool::{self, ToolError};
use crate::config::{Config, NarrationConfig};
use crate::text;

pub fn open_jtalk_command(settings: &NarrationConfig, output: &Path) -> Command {
    let mut cmd = Command::new("open_jtalk");
    cmd.arg("-x")
        .arg(&settings.dictionary)
        .arg("-m")
        .arg(&settings.voice)
        .arg("-ow")
        .arg(output);
    cmd
}

/// Speaks `text` into a WAV file at `output`.
pub fn synthesize(config: &Config, text: &str, output: &Path) -> Result<(), ToolError> {
    let timeout = Duration::from_secs(config.media.tool_timeout_seconds);
    tool::run(
        &mut open_jtalk_command(&config.narration, output),
        Some(text),
        timeout,
    )?;
    Ok(())
}

/// Narrates a story into `<audio_dir>/narration_<name>_<timestamp>.wav`.
pub fn narrate(config: &Config, content: &str, story_name: &str) -> anyhow::Result<PathBuf> {
    let spoken = text::clean_for_tts(content);
    if spoken.trim().is_empty() {
        bail!("story {story_name} has no text to narrate");
    }

    let dir = &config.paths.audio_dir;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let output = dir.join(format!(
        "narration_{}_{}.wav",
        text::safe_stem(story_name),
        text::timestamp()
    ));

    tracing::info!(output = %output.display(), chars = spoken.chars().count(), "synthesizing narration");
    synthesize(config, &spoken, &output).context("open_jtalk narration")?;
    Ok(output)
}
