use serde::Serialize;
use std::path::{Path, PathBuf};

/// External programs the media and deploy operations shell out to.
pub const REQUIRED_TOOLS: [&str; 4] = ["ffmpeg", "ffprobe", "convert", "open_jtalk"];

#[derive(Debug, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub tools: Vec<ToolStatus>,
}

pub fn detect() -> SystemInfo {
    let os = std::env::consts::OS.to_string();
    let arch = std::env::consts::ARCH.to_string();

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    let dirs: Vec<PathBuf> = std::env::split_paths(&path_var).collect();
    let tools = REQUIRED_TOOLS
        .iter()
        .map(|name| ToolStatus {
            name: name.to_string(),
            path: find_in(&dirs, name),
        })
        .collect();

    SystemInfo { os, arch, tools }
}

fn find_in(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
