use std::io::IsTerminal as _;

use anyhow::Context as _;
use colored::Colorize as _;
use dialoguer::Select;
use dialoguer::console::Term;

use crate::filter::{ScreenDecision, Screener};
use crate::formats::Record;
use crate::report::{format_comment_box, plural};

/// Menu entries, in the order of [`decision_for`].
const CHOICES: [&str; 4] = [
    "yes: export this record",
    "no: skip this record",
    "auto: export this and all remaining records",
    "quit: skip remaining records and quit",
];

/// Screens records on the controlling terminal with a `dialoguer` menu.
/// Escape (or `q`) in the menu counts as quit.
#[derive(Debug)]
pub struct DialogScreener {
    term: Term,
}

impl DialogScreener {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    /// Menus need both ends of the conversation on a terminal.
    pub fn is_available(&self) -> bool {
        self.term.is_term() && std::io::stdin().is_terminal()
    }
}

impl Default for DialogScreener {
    fn default() -> Self {
        Self::new()
    }
}

impl Screener for DialogScreener {
    fn ask(&mut self, record: &Record) -> anyhow::Result<ScreenDecision> {
        self.term
            .write_str(&describe(record))
            .context("show record comments")?;

        let picked = Select::new()
            .with_prompt("Export associated record?")
            .items(&CHOICES)
            .default(0)
            .interact_on_opt(&self.term)
            .context("read screening answer")?;
        let decision = picked.map_or(ScreenDecision::Quit, decision_for);

        self.term
            .write_line(&outcome_note(record, decision))
            .context("show screening result")?;
        Ok(decision)
    }
}

fn decision_for(index: usize) -> ScreenDecision {
    match index {
        0 => ScreenDecision::Yes,
        1 => ScreenDecision::No,
        2 => ScreenDecision::Auto,
        _ => ScreenDecision::Quit,
    }
}

/// Header line plus one box per comment.
fn describe(record: &Record) -> String {
    let count = record.comments.len();
    let mut text = format!(
        "\n{} {} found on {}\n\n",
        format!("> {count}").bold(),
        plural(count, "comment"),
        record.url.cyan()
    );
    for comment in &record.comments {
        text.push_str(&format_comment_box(comment, false));
        text.push('\n');
    }
    text
}

fn outcome_note(record: &Record, decision: ScreenDecision) -> String {
    match decision {
        ScreenDecision::Yes => {
            let count = record.comments.len();
            format!("> Exporting {count} {}", plural(count, "comment"))
        }
        ScreenDecision::No => "> Record skipped".to_owned(),
        ScreenDecision::Auto => "> Exporting this and all remaining records".to_owned(),
        ScreenDecision::Quit => "> Skipping remaining records".to_owned(),
    }
}
