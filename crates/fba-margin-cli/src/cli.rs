//! Command-line surface.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::commands::{doctor, list_cmd, run_cmd, search_cmd};
use crate::config::{load_settings, Config, Settings};
use crate::output::Output;

#[derive(Parser, Debug)]
#[command(
    name = "fba-margin",
    about = "Look up Amazon FBA net profit margins for a sheet of ASINs",
    version,
    after_help = "Run 'fba-margin <command> --help' for details on each command.\nRun 'fba-margin' with no command to enter interactive mode."
)]
pub struct Cli {
    /// Config file (default: ./fba-margin.json, then ~/.fba-margin/config.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-essential output.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Output results as JSON (machine-readable).
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where to read ASINs and how to reach the calculator.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Google Sheet URL or spreadsheet id.
    #[arg(long, global = true, conflicts_with = "xlsx")]
    pub sheet: Option<String>,

    /// Local .xlsx workbook instead of a Google Sheet.
    #[arg(long, global = true)]
    pub xlsx: Option<PathBuf>,

    /// Worksheet holding the ASIN column [default: ASINs].
    #[arg(long, global = true)]
    pub worksheet: Option<String>,

    /// Column receiving the margin, as a letter or number [default: C].
    #[arg(long, global = true)]
    pub column: Option<String>,

    /// Service account key file.
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Cookie export (JSON) injected before the first page load.
    #[arg(long, global = true)]
    pub cookies: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long, global = true)]
    pub headed: bool,
}

impl SourceArgs {
    /// The flag layer of the configuration.
    pub fn to_config(&self) -> Config {
        Config {
            sheet: self.sheet.clone(),
            xlsx: self.xlsx.clone(),
            worksheet: self.worksheet.clone(),
            column: self.column.clone(),
            credentials: self.credentials.clone(),
            cookies: self.cookies.clone(),
            headed: self.headed.then_some(true),
            calculator_url: None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Look up every ASIN and write its margin to the sheet
    Run,
    /// Print the ASIN rows a run would process
    List,
    /// Scrape an Amazon UK search results page
    Search {
        /// Search terms
        #[arg(required = true)]
        query: Vec<String>,
        /// Print results only, do not write to the sheet
        #[arg(long)]
        print: bool,
        /// Worksheet receiving the results
        #[arg(long, default_value = fba_margin::search::SEARCH_WORKSHEET)]
        target: String,
        /// Skip the randomised delay before the request
        #[arg(long)]
        no_delay: bool,
    },
    /// Check environment and configuration
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
    /// Launch interactive REPL mode
    Repl,
}

impl Cli {
    pub fn output(&self) -> Output {
        Output::new(self.json, self.quiet)
    }

    pub fn settings(&self) -> Result<Settings> {
        load_settings(self.config.as_deref(), self.source.to_config())
    }
}

/// Run the parsed command line.
pub async fn dispatch(cli: Cli) -> Result<()> {
    let out = cli.output();

    match &cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "fba-margin", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Run) => run_cmd::run(&cli.settings()?, out).await.map(|_| ()),
        Some(Commands::List) => list_cmd::run(&cli.settings()?, out).await.map(|_| ()),
        Some(Commands::Search {
            query,
            print,
            target,
            no_delay,
        }) => {
            let args = search_cmd::SearchArgs {
                query: query.join(" "),
                print_only: *print,
                target: target.clone(),
                no_delay: *no_delay,
            };
            search_cmd::run(&cli.settings()?, &args, out)
                .await
                .map(|_| ())
        }
        Some(Commands::Doctor) => doctor::run(&cli.settings()?, out).await,
        // No subcommand → interactive REPL
        Some(Commands::Repl) | None => crate::repl::run(cli.settings()?, out).await,
    }
}
