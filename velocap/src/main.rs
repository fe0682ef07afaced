use clap::Parser;
use miette::Result;
use velocap::Cli;

fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    log::info!("velocap {} starting", velocap::VERSION);
    velocap::run(args)
}
