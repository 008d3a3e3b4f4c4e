use std::sync::LazyLock;

use regex::Regex;

use crate::formats::Comment;

/// Horizontal indent the site uses per reply level.
pub const INDENT_UNITS_PER_LEVEL: u32 = 25;

static MOVE_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\AMoved from .+\.\s*\z").expect("move comment pattern is valid")
});

impl Comment {
    /// A comment is highlighted unless it is nothing more than an editor's
    /// automated "Moved from ___." notice.
    pub fn highlight(&self) -> bool {
        !is_move_comment(&self.body)
    }

    /// The site fills a blank subject with the opening characters of the body.
    pub fn subject_is_redundant(&self) -> bool {
        self.body.starts_with(&self.subject)
    }
}

pub fn is_move_comment(body: &str) -> bool {
    MOVE_COMMENT.is_match(body)
}

pub fn depth_from_indent(raw_indent: Option<u32>) -> u32 {
    raw_indent.map_or(0, |units| units / INDENT_UNITS_PER_LEVEL)
}
