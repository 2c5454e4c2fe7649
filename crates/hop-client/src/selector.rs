//! Interactive host selector.
//!
//! A readline prompt over the host catalog. Commands:
//! - empty line: redraw the host list
//! - `-n` / `-p`: next / previous page
//! - `-g [group]`: filter by group (no group shows all)
//! - `-h`: usage guide
//! - anything else: a host name or page number to connect to

use std::io::{self, Write};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use hop_core::catalog::{Browser, render_screen};
use hop_core::session::{Establish, LocalTerminal};
use hop_core::{Error, Result};

use crate::session::Bridge;

const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// One parsed line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Redraw,
    NextPage,
    PrevPage,
    Group(&'a str),
    Help,
    Select(&'a str),
}

pub fn parse_command(line: &str) -> Command<'_> {
    let text = line.trim();
    match text {
        "" => Command::Redraw,
        "-n" => Command::NextPage,
        "-p" => Command::PrevPage,
        "-h" => Command::Help,
        _ => match text.strip_prefix("-g") {
            Some(group) => Command::Group(group.trim()),
            None => Command::Select(text),
        },
    }
}

/// The prompt loop and the bridge it hands selections to.
pub struct Selector<E, T> {
    browser: Browser,
    bridge: Bridge<E, T>,
    term_type: String,
    colored: bool,
}

impl<E: Establish, T: LocalTerminal> Selector<E, T> {
    pub fn new(browser: Browser, bridge: Bridge<E, T>, term_type: String, colored: bool) -> Self {
        Self {
            browser,
            bridge,
            term_type,
            colored,
        }
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn bridge(&self) -> &Bridge<E, T> {
        &self.bridge
    }

    pub fn prompt(&self) -> String {
        match self.browser.group() {
            Some(group) => format!("hop [{}] >> ", group),
            None => "hop >> ".to_string(),
        }
    }

    pub fn screen(&self) -> String {
        render_screen(&self.browser, self.colored)
    }

    /// Apply one line of input and return what should be printed.
    ///
    /// A host selection runs a whole session before returning.
    pub async fn execute(&mut self, line: &str) -> String {
        match parse_command(line) {
            Command::Redraw => self.screen(),
            Command::NextPage => {
                self.browser.next_page();
                self.screen()
            }
            Command::PrevPage => {
                self.browser.prev_page();
                self.screen()
            }
            Command::Group(group) => {
                self.browser.set_group(group);
                self.screen()
            }
            Command::Help => self.usage(),
            Command::Select(input) => self.connect(input).await,
        }
    }

    async fn connect(&mut self, input: &str) -> String {
        let (name, target) = match self.browser.select(input) {
            Ok(host) => {
                // Fallback size only; the bridge asks the terminal first.
                let target = host.to_target(&self.term_type, Default::default());
                (host.display_name().to_string(), target)
            }
            Err(e) => return self.error_line(&e.to_string()),
        };

        info!(server = %name, addr = %target.address(), "Selected server");
        let outcome = self.bridge.run(&target).await;
        debug!(server = %name, outcome = ?outcome, "Returned to selector");

        let mut out = String::new();
        if self.browser.catalog().auto_clear {
            out.push_str(CLEAR_SCREEN);
        }
        out.push_str(&self.screen());
        if let Some(diagnostic) = outcome.diagnostic() {
            out.push_str(&self.error_line(&format!(
                "Handle server {} error: {}",
                name, diagnostic
            )));
        }
        out
    }

    fn error_line(&self, message: &str) -> String {
        if self.colored {
            format!("{}ERROR{} {}\r\n", RED, RESET, message)
        } else {
            format!("ERROR {}\r\n", message)
        }
    }

    fn usage(&self) -> String {
        let mut lines = vec![
            "Usage:".to_string(),
            "  <enter>          show the host list".to_string(),
            "  <name> | <num>   connect by host name or page number".to_string(),
            "  -n               next page".to_string(),
            "  -p               previous page".to_string(),
            "  -g [group]       filter by group, no group shows all".to_string(),
            "  -h               show this guide".to_string(),
            "  Ctrl-D           quit".to_string(),
        ];
        let groups: Vec<String> = self
            .browser
            .groups()
            .into_iter()
            .map(|(name, count)| format!("{}({})", name, count))
            .collect();
        if !groups.is_empty() {
            lines.push(format!("Groups: {}", groups.join(" ")));
        }
        lines.join("\r\n") + "\r\n"
    }

    /// Prompt until Ctrl-D.
    pub async fn run(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new().map_err(|e| Error::TerminalUnavailable {
            message: format!("failed to create readline: {}", e),
        })?;

        emit(&self.screen());
        loop {
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        let _ = rl.add_history_entry(trimmed);
                    }
                    let out = self.execute(&line).await;
                    emit(&out);
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C discards the line.
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    emit("Bye~\r\n");
                    return Ok(());
                }
                Err(e) => {
                    return Err(Error::Io(io::Error::other(format!("readline failed: {}", e))));
                }
            }
        }
    }
}

fn emit(text: &str) {
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(parse_command(""), Command::Redraw);
        assert_eq!(parse_command("   "), Command::Redraw);
        assert_eq!(parse_command("-n"), Command::NextPage);
        assert_eq!(parse_command(" -p "), Command::PrevPage);
        assert_eq!(parse_command("-h"), Command::Help);
        assert_eq!(parse_command("-g web"), Command::Group("web"));
        assert_eq!(parse_command("-g"), Command::Group(""));
        assert_eq!(parse_command("-gdb"), Command::Group("db"));
        assert_eq!(parse_command("api-1"), Command::Select("api-1"));
        assert_eq!(parse_command("3"), Command::Select("3"));
    }
}
