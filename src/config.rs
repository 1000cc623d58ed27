use anyhow::{bail, Context};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
    #[serde(default)]
    pub homepage: HomepageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Every location the operations read from or write to.
///
/// Paths starting with `~/` are resolved against the home directory on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_collection_root")]
    pub collection_root: PathBuf,
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    #[serde(default = "default_site_dir")]
    pub site_dir: PathBuf,
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default = "default_video_dir")]
    pub video_dir: PathBuf,
    #[serde(default = "default_template_file")]
    pub template_file: PathBuf,
    #[serde(default = "default_link_names_file")]
    pub link_names_file: PathBuf,
    #[serde(default = "default_hof_dir")]
    pub hof_dir: PathBuf,
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    #[serde(default = "default_configs_dir")]
    pub configs_dir: PathBuf,
    #[serde(default = "default_proposals_file")]
    pub proposals_file: PathBuf,
    #[serde(default)]
    pub bgm_file: Option<PathBuf>,
    #[serde(default = "default_deploy_script")]
    pub deploy_script: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_proposer_model")]
    pub proposer_model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    #[serde(default = "default_api_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_pointsize")]
    pub pointsize: u32,
    #[serde(default = "default_tool_timeout_seconds")]
    pub tool_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    #[serde(default = "default_dictionary")]
    pub dictionary: PathBuf,
    #[serde(default = "default_voice")]
    pub voice: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomepageConfig {
    #[serde(default = "default_homepage_file")]
    pub file_name: String,
    #[serde(default)]
    pub base_href: Option<String>,
    #[serde(default = "default_rss_url")]
    pub rss_url: String,
    #[serde(default = "default_description_length")]
    pub description_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_min_story_bytes")]
    pub min_story_bytes: u64,
    #[serde(default)]
    pub narrate: bool,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        if let Some(path) = Self::project_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        if let Ok(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        let mut config = Self::default();
        config.apply_defaults();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config at {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parse config at {}", path.display()))?;
        config.apply_defaults();
        Ok(config)
    }

    pub fn init_default() -> anyhow::Result<PathBuf> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config = Self::default();
        fs::write(&path, serde_json::to_string_pretty(&config)?)?;
        Ok(path)
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        let base = BaseDirs::new().context("unable to resolve home directory")?;
        Ok(base.config_dir().join("saga-press").join("config.json"))
    }

    pub fn homepage_path(&self) -> PathBuf {
        self.paths.public_dir.join(&self.homepage.file_name)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.media.width <= 100 || self.media.height <= 100 {
            bail!("media.width and media.height must leave room for the 100px caption margin");
        }

        if self.media.fps == 0 {
            bail!("media.fps must be greater than 0");
        }

        if self.gemini.model.trim().is_empty() {
            bail!("gemini.model must not be empty");
        }

        if self.gemini.proposer_model.trim().is_empty() {
            bail!("gemini.proposer_model must not be empty");
        }

        if self.homepage.description_length == 0 {
            bail!("homepage.description_length must be greater than 0");
        }

        if let Some(bgm) = &self.paths.bgm_file {
            if !bgm.exists() {
                tracing::warn!(path = %bgm.display(), "bgm file not found; videos will be silent");
            }
        }

        Ok(())
    }

    fn apply_defaults(&mut self) {
        let paths = &mut self.paths;
        for path in [
            &mut paths.collection_root,
            &mut paths.public_dir,
            &mut paths.site_dir,
            &mut paths.audio_dir,
            &mut paths.image_dir,
            &mut paths.video_dir,
            &mut paths.template_file,
            &mut paths.link_names_file,
            &mut paths.hof_dir,
            &mut paths.scripts_dir,
            &mut paths.archive_dir,
            &mut paths.configs_dir,
            &mut paths.proposals_file,
            &mut paths.deploy_script,
        ] {
            *path = expand_home(path);
        }

        if let Some(bgm) = paths.bgm_file.as_mut() {
            *bgm = expand_home(bgm);
        }

        if let Some(key_file) = self.gemini.api_key_file.as_mut() {
            *key_file = expand_home(key_file);
        }

        self.narration.dictionary = expand_home(&self.narration.dictionary);
        self.narration.voice = expand_home(&self.narration.voice);
    }

    fn project_path() -> Option<PathBuf> {
        Some(PathBuf::from("saga-press.json"))
    }
}

/// Resolves a leading `~/` against the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match BaseDirs::new() {
        Some(base) => base.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            gemini: GeminiConfig::default(),
            media: MediaConfig::default(),
            narration: NarrationConfig::default(),
            homepage: HomepageConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            collection_root: default_collection_root(),
            public_dir: default_public_dir(),
            site_dir: default_site_dir(),
            audio_dir: default_audio_dir(),
            image_dir: default_image_dir(),
            video_dir: default_video_dir(),
            template_file: default_template_file(),
            link_names_file: default_link_names_file(),
            hof_dir: default_hof_dir(),
            scripts_dir: default_scripts_dir(),
            archive_dir: default_archive_dir(),
            configs_dir: default_configs_dir(),
            proposals_file: default_proposals_file(),
            bgm_file: Some(PathBuf::from("/usr/share/starfighter/music/frozen_jam.ogg")),
            deploy_script: default_deploy_script(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            proposer_model: default_proposer_model(),
            base_url: default_base_url(),
            api_key_file: Some(PathBuf::from("api")),
            timeout_seconds: default_api_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            font: Some("Noto-Sans-JP".to_string()),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            pointsize: default_pointsize(),
            tool_timeout_seconds: default_tool_timeout_seconds(),
        }
    }
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            dictionary: default_dictionary(),
            voice: default_voice(),
        }
    }
}

impl Default for HomepageConfig {
    fn default() -> Self {
        Self {
            file_name: default_homepage_file(),
            base_href: None,
            rss_url: default_rss_url(),
            description_length: default_description_length(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_story_bytes: default_min_story_bytes(),
            narrate: false,
        }
    }
}

fn default_collection_root() -> PathBuf {
    PathBuf::from("~/neo_world_saga_collection")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("/var/www/html/public")
}

fn default_site_dir() -> PathBuf {
    PathBuf::from("~/neo-world-saga-site/public")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("generated_audio")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("generated_images")
}

fn default_video_dir() -> PathBuf {
    PathBuf::from("generated_videos")
}

fn default_template_file() -> PathBuf {
    PathBuf::from("template.html")
}

fn default_link_names_file() -> PathBuf {
    PathBuf::from("link_display_names.json")
}

fn default_hof_dir() -> PathBuf {
    PathBuf::from("~/neo_world_saga_collection/hall_of_fame_pages")
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("archive_scripts")
}

fn default_configs_dir() -> PathBuf {
    PathBuf::from("configs")
}

fn default_proposals_file() -> PathBuf {
    PathBuf::from("feature_proposals.json")
}

fn default_deploy_script() -> PathBuf {
    PathBuf::from("deploy_ai_business_homepage.sh")
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_proposer_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_api_timeout_seconds() -> u64 {
    180
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    20
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_fps() -> u32 {
    24
}

fn default_pointsize() -> u32 {
    40
}

fn default_tool_timeout_seconds() -> u64 {
    600
}

fn default_dictionary() -> PathBuf {
    PathBuf::from("/var/lib/mecab/dic/open-jtalk/naist-jdic")
}

fn default_voice() -> PathBuf {
    PathBuf::from("/usr/share/hts-voice/nitech-jp-atr503-m001/nitech_jp_atr503_m001.htsvoice")
}

fn default_homepage_file() -> String {
    "ai_business_homepage.html".to_string()
}

fn default_rss_url() -> String {
    "https://news.web.nhk/n-data/conf/na/rss/cat0.xml".to_string()
}

fn default_description_length() -> usize {
    160
}

fn default_min_story_bytes() -> u64 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.media.width, 1280);
        assert_eq!(config.pipeline.min_story_bytes, 200);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tilde_paths_expand_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"paths":{"collection_root":"~/stories"}}"#).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert!(!config.paths.collection_root.starts_with("~"));
        assert!(config.paths.collection_root.ends_with("stories"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"cache_dir":"/tmp/c","cache_max_mb":5,"gemini":{"cache":true,"max_retries":1}}"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.gemini.max_retries, 1);
        let shown = serde_json::to_value(&config).unwrap();
        assert!(shown.get("cache_dir").is_none());
        assert!(shown["gemini"].get("cache").is_none());
    }

    #[test]
    fn zero_fps_is_rejected() {
        let mut config = Config::default();
        config.media.fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn absolute_paths_are_untouched() {
        assert_eq!(expand_home(Path::new("/srv/www")), PathBuf::from("/srv/www"));
    }
}
