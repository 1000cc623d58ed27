pub mod appset;
pub mod cli;
pub mod config;
pub mod evolution;
pub mod gemini;
pub mod homepage;
pub mod media;
pub mod pipeline;
pub mod prompt;
pub mod site;
pub mod story;
pub mod system;
pub mod text;

use anyhow::Context;
use cli::{AppsCommand, Cli, Commands};
use config::Config;
use std::path::PathBuf;
use story::{Collection, Story};

pub fn run(cli: Cli) -> anyhow::Result<()> {
    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Append => append(),
        Commands::Narrate(args) => narrate(args),
        Commands::SceneImage(args) => scene_image(args),
        Commands::Assemble(args) => assemble(args),
        Commands::Homepage(args) => homepage_cmd(args),
        Commands::BrushUp => brush_up(),
        Commands::FixHeader => fix_header(),
        Commands::ArchiveHof => archive_hof(),
        Commands::Convert => convert(),
        Commands::Bundle(args) => bundle(args),
        Commands::MasterSaga => master_saga(),
        Commands::BlogEntry(args) => blog_entry(args),
        Commands::RichIndex => rich_index(),
        Commands::Apps(command) => apps(command),
        Commands::ProposeFeatures(args) => propose_features(args),
        Commands::Daily(args) => daily(args),
        Commands::Doctor(args) => doctor(args),
        Commands::Config(args) => config_cmd(args),
    }
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> anyhow::Result<Config> {
    Config::load().context("load config")
}

fn append() -> anyhow::Result<()> {
    let config = load_config()?;
    let path = story::append_random(&config)?;
    println!("Appended continuation to {}", path.display());
    Ok(())
}

fn read_story(path: &std::path::Path, name: Option<String>) -> anyhow::Result<(Story, String)> {
    let story = Story::read(path)?;
    let name = name.unwrap_or_else(|| story.name.clone());
    Ok((story, name))
}

fn narrate(args: cli::StoryArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let (story, name) = read_story(&args.story, args.name)?;
    let output = media::narration::narrate(&config, &story.content, &name)?;
    println!("Narration saved to {}", output.display());
    Ok(())
}

fn scene_image(args: cli::StoryArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let (story, name) = read_story(&args.story, args.name)?;
    let output = media::image::scene_image(&config, &story.content, &name)?;
    println!("Scene image saved to {}", output.display());
    Ok(())
}

fn assemble(args: cli::AssembleArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let story = Story::read(&args.story)?;
    let audio = args.audio.or_else(|| config.paths.bgm_file.clone());
    let output = media::video::assemble(&config, &story.content, &story.name, audio.as_deref())?;
    println!("Video saved to {}", output.display());
    Ok(())
}

fn homepage_cmd(args: cli::HomepageArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let interactive = !args.defaults;
    let client = gemini::Client::from_config(&config, interactive).context("prepare gemini client")?;
    let brief = homepage::BriefOverrides {
        purpose: args.purpose,
        customers: args.customers,
        services: args.services,
        contact: args.contact,
        site_title: args.title,
    }
    .resolve(interactive);

    let featured = match (args.story, args.video) {
        (Some(story), Some(video)) => Some((Story::read(&story)?, video)),
        _ => None,
    };
    let showcase = featured.as_ref().map(|(story, video)| homepage::Showcase {
        story_name: &story.name,
        story: &story.content,
        video: video.as_path(),
    });

    let output = homepage::generate(&config, &client, &brief, showcase.as_ref())?;
    println!("Homepage saved to {}", output.display());
    Ok(())
}

fn brush_up() -> anyhow::Result<()> {
    let config = load_config()?;
    let client = gemini::Client::from_config(&config, false).context("prepare gemini client")?;
    let output = homepage::brush_up(&config, &client)?;
    println!("Homepage refreshed: {}", output.display());
    Ok(())
}

fn fix_header() -> anyhow::Result<()> {
    let config = load_config()?;
    let page = config.homepage_path();
    site::archive::fix_header(&page)?;
    println!("Header checked: {}", page.display());
    Ok(())
}

fn archive_hof() -> anyhow::Result<()> {
    let config = load_config()?;
    let dest = site::archive::archive_page(&config.homepage_path(), &config.paths.hof_dir)?;
    println!("Archived to {}", dest.display());
    Ok(())
}

fn convert() -> anyhow::Result<()> {
    let config = load_config()?;
    let report = site::convert::convert_all(&config)?;
    println!(
        "Converted {} file(s), {} failed, into {}",
        report.converted,
        report.failed,
        config.paths.site_dir.display()
    );
    Ok(())
}

fn bundle(args: cli::BundleArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let files = Collection::new(&config.paths.collection_root).markdown_files()?;
    if files.is_empty() {
        anyhow::bail!("no .md files found under {}", config.paths.collection_root.display());
    }

    let selection = match args.select {
        Some(selection) => selection,
        None => {
            for (idx, path) in files.iter().enumerate() {
                let shown = path.strip_prefix(&config.paths.collection_root).unwrap_or(path);
                println!("{:>3}: {}", idx + 1, shown.display());
            }
            prompt::read_line("Chapters to bundle (e.g. 1,3,5): ").unwrap_or_default()
        }
    };

    let picked: Vec<PathBuf> = site::convert::parse_selection(&selection, files.len())
        .into_iter()
        .map(|idx| files[idx].clone())
        .collect();
    let output = site::convert::bundle(&config, &picked)?;
    println!("Bundle saved to {}", output.display());
    Ok(())
}

fn master_saga() -> anyhow::Result<()> {
    let config = load_config()?;
    let output = site::convert::master_saga(&config)?;
    println!("Master saga saved to {}", output.display());
    Ok(())
}

fn blog_entry(args: cli::BlogEntryArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let markdown = std::fs::read_to_string(&args.markdown)
        .with_context(|| format!("read {}", args.markdown.display()))?;
    let blog = args
        .blog
        .unwrap_or_else(|| config.paths.public_dir.join("blog.html"));
    site::blog::add_entry(&blog, &markdown)?;
    println!("Blog updated: {}", blog.display());
    Ok(())
}

fn rich_index() -> anyhow::Result<()> {
    let config = load_config()?;
    let linked = site::index::update_links(&config.paths.public_dir, &config.paths.link_names_file)?;
    println!("Index links {linked} page(s)");
    Ok(())
}

fn print_listing(listing: &appset::Listing) {
    println!("Active:");
    for (idx, name) in listing.active.iter().enumerate() {
        println!("  A{}: {}", idx + 1, name);
    }
    println!("Archived:");
    for (idx, name) in listing.archived.iter().enumerate() {
        println!("  R{}: {}", idx + 1, name);
    }
}

fn apps(command: AppsCommand) -> anyhow::Result<()> {
    let config = load_config()?;
    let sets = appset::AppSets::from_config(&config);

    match command {
        AppsCommand::List => print_listing(&sets.list()?),
        AppsCommand::Sets => {
            let names = sets.sets()?;
            if names.is_empty() {
                println!("No saved sets");
            }
            for name in names {
                println!("{name}");
            }
        }
        AppsCommand::Toggle { keys, yes } => {
            let moves = sets.plan_toggle(&appset::parse_keys(&keys))?;
            for m in &moves {
                println!("{} -> {}", m.name, m.to.display());
            }
            if !yes && !prompt::confirm("Move these scripts?") {
                println!("Cancelled");
                return Ok(());
            }
            let moved = sets.toggle(&moves);
            println!("Moved {moved} of {} script(s)", moves.len());
        }
        AppsCommand::Save { name } => {
            let path = sets.save(&name)?;
            println!("Saved set to {}", path.display());
        }
        AppsCommand::Load { name, yes } => {
            if !yes && !prompt::confirm(&format!("Archive all active scripts and load '{name}'?")) {
                println!("Cancelled");
                return Ok(());
            }
            let report = sets.load(&name)?;
            println!(
                "Archived {}, restored {}, missing {}",
                report.archived,
                report.restored.len(),
                report.missing.len()
            );
            for missing in &report.missing {
                println!("  missing: {missing}");
            }
        }
    }
    Ok(())
}

fn propose_features(args: cli::ProposeArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    let client = gemini::Client::from_config(&config, false).context("prepare gemini client")?;
    let output = args.output.unwrap_or_else(|| config.paths.proposals_file.clone());
    let proposals = evolution::propose(&config, &client, &output)?;

    println!("Proposed features:");
    for proposal in &proposals {
        println!("{proposal}");
    }
    println!("Saved to {}", output.display());
    Ok(())
}

fn daily(args: cli::DailyArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    config.validate()?;
    let report = pipeline::run_daily(&config, &args.skip)?;

    if let Some(appended) = &report.appended {
        println!("Appended: {}", appended.display());
    }
    println!("Story: {}", report.story.display());
    match &report.audio {
        Some(audio) => println!("Audio: {}", audio.display()),
        None => println!("Audio: none"),
    }
    println!("Video: {}", report.video.display());
    println!("Homepage: {}", report.homepage.display());
    if let Some(output) = &report.deploy_output {
        print!("{output}");
    }
    Ok(())
}

fn doctor(args: cli::DoctorArgs) -> anyhow::Result<()> {
    let info = system::detect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("OS: {}", info.os);
    println!("Arch: {}", info.arch);
    for tool in &info.tools {
        match &tool.path {
            Some(path) => println!("- {} ({})", tool.name, path.display()),
            None => println!("- {} (missing)", tool.name),
        }
    }
    Ok(())
}

fn config_cmd(args: cli::ConfigArgs) -> anyhow::Result<()> {
    if args.init {
        let path = Config::init_default()?;
        println!("Initialized config at {}", path.display());
        return Ok(());
    }

    if args.show {
        let config = load_config()?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if args.validate {
        let config = load_config()?;
        config.validate()?;
        println!("Config OK");
        return Ok(());
    }

    let path = Config::default_path()?;
    println!("{}", path.display());
    Ok(())
}
