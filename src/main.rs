use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = saga_press::cli::Cli::parse();
    saga_press::run(cli)
}
