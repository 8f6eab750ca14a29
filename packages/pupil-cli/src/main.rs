use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;
mod prompt;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let exit_code = match cli.command {
        cli::Command::Process(args) => commands::process::execute(&cli.pipeline, args),
        cli::Command::Subjects(args) => commands::subjects::execute(&cli.pipeline, args),
        cli::Command::Inspect(args) => commands::inspect::execute(&cli.pipeline, args),
        cli::Command::Behavior(args) => commands::behavior::execute(&cli.pipeline, args),
    };

    std::process::exit(exit_code);
}
