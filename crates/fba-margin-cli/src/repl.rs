//! Interactive REPL.
//!
//! Launch with `fba-margin` (or `fba-margin repl`). Type `/help` for
//! available commands, Tab for completion.

use std::path::PathBuf;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use crate::commands::{doctor, list_cmd, run_cmd, search_cmd};
use crate::config::{SheetSource, Settings};
use crate::output::Output;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/run", "Look up every ASIN and write margins"),
    ("/list", "Show the ASIN rows a run would process"),
    ("/search", "Scrape Amazon UK search results: /search <query>"),
    ("/sheet", "Use a Google Sheet URL/id or .xlsx path"),
    ("/doctor", "Check environment and configuration"),
    ("/config", "Show the effective settings"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
#[derive(Default)]
struct MarginHelper;

impl Completer for MarginHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<12} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        // .xlsx file completion
        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        if cmd == "/sheet" {
            let mut files: Vec<String> = std::fs::read_dir(".")
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| e.path())
                        .filter(|p| p.extension().is_some_and(|e| e == "xlsx"))
                        .filter_map(|p| p.file_name().and_then(|s| s.to_str()).map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            files.sort();
            let prefix_start = input.len() - args.len();
            let matches: Vec<Pair> = files
                .into_iter()
                .filter(|f| f.starts_with(args.trim()))
                .map(|f| Pair {
                    display: f.clone(),
                    replacement: format!("{f} "),
                })
                .collect();
            return Ok((prefix_start, matches));
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for MarginHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            return COMMANDS
                .iter()
                .find(|(cmd, _)| cmd.starts_with(line) && *cmd != line)
                .map(|(cmd, _)| cmd[line.len()..].to_string());
        }
        None
    }
}

impl Highlighter for MarginHelper {}
impl Validator for MarginHelper {}
impl Helper for MarginHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Interpret `/sheet` arguments: workbook paths by extension, everything
/// else as a Google Sheet reference.
pub fn parse_source(arg: &str) -> Option<SheetSource> {
    let arg = arg.trim();
    if arg.is_empty() {
        return None;
    }
    let lower = arg.to_ascii_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xlsm") {
        Some(SheetSource::Xlsx(PathBuf::from(arg)))
    } else {
        Some(SheetSource::Google(arg.to_string()))
    }
}

fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fba-margin")
        .join("history")
}

/// Run the interactive REPL.
pub async fn run(mut settings: Settings, out: Output) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mfba-margin v{}\x1b[0m \x1b[90m FBA profit margins for your ASINs\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<MarginHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(MarginHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let hist_path = history_path();
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mfba>\x1b[0m ";

    loop {
        // readline blocks; keep the runtime's other workers free.
        let line = tokio::task::block_in_place(|| rl.readline(prompt));
        match line {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
                let args = args.trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "config" => cmd_config(&settings),
                    "sheet" => cmd_sheet(args, &mut settings),
                    "run" => report(run_cmd::run(&settings, out).await.map(|_| ())),
                    "list" => report(list_cmd::run(&settings, out).await.map(|_| ())),
                    "search" => {
                        if args.is_empty() {
                            eprintln!("  Usage: /search <query>");
                        } else {
                            let args = search_cmd::SearchArgs::new(args);
                            report(search_cmd::run(&settings, &args, out).await.map(|_| ()));
                        }
                    }
                    "doctor" => report(doctor::run(&settings, out).await),
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    if let Some(parent) = hist_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&hist_path);

    Ok(())
}

/// Commands inside the REPL report errors and keep going.
fn report(result: anyhow::Result<()>) {
    if let Err(e) = result {
        eprintln!("  Error: {e:#}");
    }
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<12} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completes commands and .xlsx files for /sheet.");
    eprintln!();
}

fn cmd_config(settings: &Settings) {
    let show = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    eprintln!();
    match &settings.source {
        Some(source) => eprintln!("  Sheet:       {source}"),
        None => eprintln!("  Sheet:       - (use /sheet)"),
    }
    eprintln!("  Worksheet:   {}", settings.worksheet);
    eprintln!(
        "  Column:      {}",
        fba_margin::sheet::column_letter(settings.margin_column)
    );
    eprintln!("  Credentials: {}", show(&settings.credentials));
    eprintln!("  Cookies:     {}", show(&settings.cookies));
    eprintln!("  Browser:     {}", if settings.headed { "headed" } else { "headless" });
    eprintln!("  Config file: {}", show(&settings.config_file));
    eprintln!();
}

fn cmd_sheet(args: &str, settings: &mut Settings) {
    match parse_source(args) {
        Some(source) => {
            eprintln!("  Using {source}");
            settings.source = Some(source);
        }
        None => eprintln!("  Usage: /sheet <google-sheet-url | id | file.xlsx>"),
    }
}
