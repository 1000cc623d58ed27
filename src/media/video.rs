//! Slideshow videos: one caption card per story line, muxed with an audio track.

use anyhow::{bail, Context};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::tool;
use crate::config::{Config, MediaConfig};
use crate::text;

const MIN_SCENE_SECONDS: f64 = 3.0;
const CHARS_PER_SECOND: f64 = 15.0;
const CAPTION_MARGIN: u32 = 100;

/// Non-empty trimmed lines of the story, one per scene.
pub fn scenes(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Seconds a scene stays on screen, long enough to read it.
pub fn scene_duration(scene: &str) -> f64 {
    (scene.chars().count() as f64 / CHARS_PER_SECOND).max(MIN_SCENE_SECONDS)
}

/// Input list for ffmpeg's concat demuxer.
///
/// The last image is listed a second time so its duration is honored.
pub fn concat_list(entries: &[(PathBuf, f64)]) -> String {
    let mut list = String::new();
    for (path, duration) in entries {
        let _ = writeln!(list, "file '{}'", escape_concat_path(path));
        let _ = writeln!(list, "duration {duration:.3}");
    }
    if let Some((last, _)) = entries.last() {
        let _ = writeln!(list, "file '{}'", escape_concat_path(last));
    }
    list
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

pub fn caption_command(media: &MediaConfig, scene: &str, output: &Path) -> Command {
    let mut cmd = Command::new("convert");
    cmd.args(["-background", "black", "-fill", "white"]);
    if let Some(font) = &media.font {
        cmd.arg("-font").arg(font);
    }
    cmd.arg("-size")
        .arg(format!(
            "{}x{}",
            media.width.saturating_sub(CAPTION_MARGIN),
            media.height.saturating_sub(CAPTION_MARGIN)
        ))
        .args(["-gravity", "center"])
        .arg(format!("caption:{scene}"))
        .arg(output);
    cmd
}

pub fn slideshow_command(media: &MediaConfig, list: &Path, output: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-f", "concat", "-safe", "0", "-i"])
        .arg(list)
        .arg("-vf")
        .arg(format!("fps={},format=yuv420p", media.fps))
        .arg("-y")
        .arg(output);
    cmd
}

/// Adds `audio` to the silent slideshow, trimmed to the shorter stream.
pub fn mux_command(silent: &Path, audio: Option<&Path>, output: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-i").arg(silent);
    match audio {
        Some(audio) => {
            cmd.arg("-i")
                .arg(audio)
                .args(["-c:v", "copy", "-c:a", "aac", "-shortest"]);
        }
        None => {
            cmd.args(["-c", "copy"]);
        }
    }
    cmd.arg("-y").arg(output);
    cmd
}

/// Builds `<video_dir>/assembled_video_<name>_<timestamp>.mp4` from a story.
///
/// Audio that is missing on disk is dropped and the video is left silent.
pub fn assemble(
    config: &Config,
    content: &str,
    story_name: &str,
    audio: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    let scenes = scenes(content);
    if scenes.is_empty() {
        bail!("story {story_name} has no text to put on screen");
    }

    let video_dir = &config.paths.video_dir;
    fs::create_dir_all(video_dir).with_context(|| format!("create {}", video_dir.display()))?;

    let scratch = tempfile::Builder::new()
        .prefix("video_gen_")
        .tempdir()
        .context("create scratch dir")?;
    tracing::debug!(dir = %scratch.path().display(), scenes = scenes.len(), "rendering scenes");

    let timeout = Duration::from_secs(config.media.tool_timeout_seconds);
    let mut entries = Vec::with_capacity(scenes.len());
    for (idx, scene) in scenes.iter().enumerate() {
        let image = scratch.path().join(format!("scene_{idx:03}.png"));
        tool::run(&mut caption_command(&config.media, scene, &image), None, timeout)
            .with_context(|| format!("render scene {}", idx + 1))?;
        entries.push((image, scene_duration(scene)));
    }

    let list = scratch.path().join("ffmpeg_input.txt");
    fs::write(&list, concat_list(&entries)).context("write concat list")?;

    let silent = scratch.path().join("silent_video.mp4");
    tracing::info!(scenes = entries.len(), "encoding slideshow");
    tool::run(&mut slideshow_command(&config.media, &list, &silent), None, timeout)
        .context("ffmpeg slideshow")?;

    let audio = match audio {
        Some(path) if path.exists() => Some(path),
        Some(path) => {
            tracing::warn!(path = %path.display(), "audio track missing; video will be silent");
            None
        }
        None => None,
    };

    let output = video_dir.join(format!(
        "assembled_video_{}_{}.mp4",
        text::safe_stem(story_name),
        text::timestamp()
    ));
    tracing::info!(output = %output.display(), with_audio = audio.is_some(), "muxing video");
    tool::run(&mut mux_command(&silent, audio, &output), None, timeout).context("ffmpeg mux")?;

    Ok(output)
}
