use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::tool;
use crate::config::{Config, MediaConfig};
use crate::text;

const SUMMARY_CHARS: usize = 150;

/// White text centred on a black full-frame card.
pub fn scene_card_command(media: &MediaConfig, caption: &str, output: &Path) -> Command {
    let mut cmd = Command::new("convert");
    cmd.arg("-size")
        .arg(format!("{}x{}", media.width, media.height))
        .args(["xc:black", "-fill", "white", "-gravity", "center"])
        .arg("-pointsize")
        .arg(media.pointsize.to_string())
        .args(["-interline-spacing", "15"]);
    if let Some(font) = &media.font {
        cmd.arg("-font").arg(font);
    }
    cmd.args(["-annotate", "0"]).arg(caption).arg(output);
    cmd
}

pub fn render_scene_card(config: &Config, caption: &str, output: &Path) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(config.media.tool_timeout_seconds);
    tool::run(
        &mut scene_card_command(&config.media, caption, output),
        None,
        timeout,
    )
    .context("ImageMagick scene card")?;

    if !output.exists() {
        bail!(
            "convert reported success but {} was not written",
            output.display()
        );
    }
    Ok(())
}

/// Renders a summary card into `<image_dir>/scene_<name>_<timestamp>.png`.
pub fn scene_image(config: &Config, content: &str, story_name: &str) -> anyhow::Result<PathBuf> {
    let caption = text::summarize_for_image(content, SUMMARY_CHARS);
    tracing::info!(caption = %caption, "scene caption");

    let dir = &config.paths.image_dir;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let output = dir.join(format!(
        "scene_{}_{}.png",
        text::safe_stem(story_name),
        text::timestamp()
    ));

    render_scene_card(config, &caption, &output)?;
    Ok(output)
}
