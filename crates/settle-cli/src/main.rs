use clap::Parser;
use settle_cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Run(args) => commands::run::handle(args),
        Commands::Mutate {
            periods,
            events,
            out,
            config,
        } => commands::mutate::handle(periods, events, out.as_deref(), config.as_deref()),
        Commands::CheckMasterData {
            responsibilities,
            periods,
        } => commands::check::handle(responsibilities.as_deref(), periods.as_deref()),
    };

    if let Err(err) = result {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
