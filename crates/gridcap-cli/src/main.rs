use clap::Parser;
use gridcap_cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Headroom {
            config,
            violations_as_warnings,
            out_dir,
            no_print,
        } => commands::headroom::handle(
            config,
            *violations_as_warnings,
            out_dir.as_deref(),
            *no_print,
        ),
        Commands::Scenario {
            case,
            contingency_limits,
            full_newton,
            out,
        } => commands::scenario::handle(
            case,
            contingency_limits.as_deref(),
            *full_newton,
            out.as_deref(),
        ),
        Commands::Check {
            case,
            limits,
            full_newton,
        } => commands::check::handle(case, limits.as_deref(), *full_newton),
        Commands::Export { case, out_dir } => commands::export::handle(case, out_dir.as_deref()),
    };

    if let Err(err) = result {
        error!("{:?}", err);
        std::process::exit(1);
    }
}
