use clap::Parser;
use msicall::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{classify, extract, model},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Extract(_) => "extract",
        Command::Model(_) => "model",
        Command::Classify(_) => "classify",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Extract(args) => extract::extract(args)?,
        Command::Model(args) => model::model(args)?,
        Command::Classify(args) => classify::classify(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
