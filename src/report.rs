use std::io::Write;
use std::sync::LazyLock;

use colored::Colorize as _;
use regex::Regex;

use crate::formats::Comment;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<]+?>").expect("tag pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent {
    Imported,
    Skipped,
    Screening,
}

/// Receives accept/skip decisions as they are made. Never feeds back into
/// control flow.
pub trait RecordObserver {
    fn record_event(&mut self, event: RecordEvent, url: &str, comments: &[Comment], echo: bool);
}

/// Logs record events through `tracing` and, when asked to echo, writes the
/// comment text to a terminal stream.
#[derive(Debug)]
pub struct Reporter<W> {
    out: W,
}

impl Reporter<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> RecordObserver for Reporter<W> {
    fn record_event(&mut self, event: RecordEvent, url: &str, comments: &[Comment], echo: bool) {
        let count = comments.len();
        let noun = plural(count, "comment");
        match event {
            RecordEvent::Imported if count == 0 => {
                tracing::info!(url, "no comments found; keeping record")
            }
            RecordEvent::Skipped if count == 0 => tracing::debug!(url, "no comments found"),
            RecordEvent::Imported => tracing::info!(url, count, "importing {count} {noun}"),
            RecordEvent::Skipped => tracing::debug!(url, count, "skipping {count} {noun}"),
            RecordEvent::Screening => tracing::warn!(url, count, "{count} {noun} found"),
        }

        if !echo {
            return;
        }
        let muted = event == RecordEvent::Skipped;
        let mut text = String::new();
        for comment in comments {
            text.push_str(&format_comment_box(comment, muted));
            text.push('\n');
        }
        if let Err(err) = self.out.write_all(text.as_bytes()) {
            tracing::debug!(?err, "echo comments");
        }
    }
}

pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        noun.to_owned()
    } else {
        format!("{noun}s")
    }
}

/// Markup-free text of a comment fragment.
pub fn plain_text(markup: &str) -> String {
    let stripped = TAG.replace_all(markup, "");
    html_escape::decode_html_entities(stripped.trim()).into_owned()
}

/// Boxed terminal rendering of one comment, indented by reply depth.
/// Muted boxes (comments being skipped) are dimmed and italic.
pub fn format_comment_box(comment: &Comment, muted: bool) -> String {
    let indent = " ".repeat(4 + 2 * comment.depth as usize);
    let rule = if muted { '┆' } else { '│' };

    let mut lines = vec![format!("{indent}┌─ {}", plain_text(&comment.subject))];
    for line in plain_text(&comment.body).lines() {
        lines.push(format!("{indent}{rule} {line}"));
    }
    lines.push(format!("{indent}└─ {}", plain_text(&comment.byline)));

    let mut out = String::new();
    for line in lines {
        if muted {
            out.push_str(&line.dimmed().italic().to_string());
        } else {
            out.push_str(&line);
        }
        out.push('\n');
    }
    out
}
