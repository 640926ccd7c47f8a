//! fba-margin — entry point.

use clap::Parser;

use fba_margin_cli::cli::{dispatch, Cli};
use fba_margin_cli::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level_for(&cli.log_level, cli.quiet), cli.log_json);

    let out = cli.output();
    let result = dispatch(cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        out.report_error(e);
        std::process::exit(1);
    }
    result
}
