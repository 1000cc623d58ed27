use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::Step;

#[derive(Parser, Debug)]
#[command(
    name = "saga-press",
    version,
    about = "Grow an AI-written saga and publish it as pages and videos"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append a generated continuation to a random story
    Append,
    /// Narrate a story into a WAV file with open_jtalk
    Narrate(StoryArgs),
    /// Render a caption card for a story with ImageMagick
    SceneImage(StoryArgs),
    /// Assemble a captioned slideshow video for a story
    Assemble(AssembleArgs),
    /// Generate the business homepage
    Homepage(HomepageArgs),
    /// Refresh the homepage around today's news headline
    BrushUp,
    /// Strip model commentary above the homepage doctype
    FixHeader,
    /// Copy the homepage into the hall-of-fame archive
    ArchiveHof,
    /// Rebuild the chapter site from the story collection
    Convert,
    /// Join selected chapters into one page
    Bundle(BundleArgs),
    /// Render the whole collection as a single page
    MasterSaga,
    /// Add a Markdown entry to the blog page
    BlogEntry(BlogEntryArgs),
    /// Refresh the index page's links to every other page
    RichIndex,
    /// Manage sets of active scripts
    #[command(subcommand)]
    Apps(AppsCommand),
    /// Ask for new feature ideas as structured JSON
    ProposeFeatures(ProposeArgs),
    /// Run the whole daily pipeline
    Daily(DailyArgs),
    /// Report which external tools are installed
    Doctor(DoctorArgs),
    /// Show, create, or validate the configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct StoryArgs {
    #[arg(value_name = "STORY", help = "Markdown story file")]
    pub story: PathBuf,

    #[arg(long, help = "Name used in the output file (defaults to the file name)")]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    #[arg(value_name = "STORY", help = "Markdown story file")]
    pub story: PathBuf,

    #[arg(value_name = "AUDIO", help = "Audio track (defaults to the configured BGM)")]
    pub audio: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct HomepageArgs {
    #[arg(long, help = "Business purpose")]
    pub purpose: Option<String>,

    #[arg(long, help = "Target customers")]
    pub customers: Option<String>,

    #[arg(long, help = "Services offered")]
    pub services: Option<String>,

    #[arg(long, help = "Contact information")]
    pub contact: Option<String>,

    #[arg(long, help = "Site title")]
    pub title: Option<String>,

    #[arg(long, help = "Use defaults instead of prompting for missing fields")]
    pub defaults: bool,

    #[arg(long, requires = "video", help = "Story to feature on the page")]
    pub story: Option<PathBuf>,

    #[arg(long, requires = "story", help = "Video to link from the page")]
    pub video: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BundleArgs {
    #[arg(long, value_name = "LIST", help = "Comma-separated 1-based chapter numbers")]
    pub select: Option<String>,
}

#[derive(Args, Debug)]
pub struct BlogEntryArgs {
    #[arg(value_name = "MARKDOWN", help = "Markdown file holding the entry")]
    pub markdown: PathBuf,

    #[arg(long, help = "Blog page (defaults to blog.html in the public dir)")]
    pub blog: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum AppsCommand {
    /// List active and archived scripts with their keys
    List,
    /// List saved sets
    Sets,
    /// Move scripts between active and archive by key (A1, R2, ...)
    Toggle {
        #[arg(value_name = "KEYS")]
        keys: String,
        #[arg(long, short, help = "Skip confirmation")]
        yes: bool,
    },
    /// Save the active scripts as a named set
    Save {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Replace the active scripts with a saved set
    Load {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(long, short, help = "Skip confirmation")]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct ProposeArgs {
    #[arg(long, value_name = "PATH", help = "Where to save the proposals")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DailyArgs {
    #[arg(long, value_enum, value_name = "STEP", help = "Step to skip (repeatable)")]
    pub skip: Vec<Step>,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[arg(long, help = "Show current config as JSON")]
    pub show: bool,

    #[arg(long, help = "Create default config file")]
    pub init: bool,

    #[arg(long, help = "Validate configuration")]
    pub validate: bool,
}
