//! Output mode shared by all commands.

use serde::Serialize;

/// How results are printed: human text on stdout, or one JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }

    /// Progress bars only make sense for a human watching a terminal.
    pub fn show_progress(&self) -> bool {
        !self.json && !self.quiet
    }

    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print the error the way the binary reports a failed command.
    pub fn report_error(&self, err: &anyhow::Error) {
        if self.json {
            let body = serde_json::json!({
                "error": true,
                "message": format!("{err:#}"),
            });
            println!("{body}");
        } else if !self.quiet {
            eprintln!("Error: {err:#}");
        }
    }
}
