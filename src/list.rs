use std::fmt::Write as _;
use std::path::Path;

use crate::cli::ListArgs;
use crate::formats::Snapshot;
use crate::report::plural;
use crate::snapshot_store::{SnapshotStore, read_snapshot};

/// Thumbnails per listing page on the site.
const RECORDS_PER_PAGE: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub name: String,
    pub most_recent: String,
    pub oldest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub header: String,
    pub snapshot_date: String,
    pub start_url: String,
    pub total_records: usize,
    pub approx_pages: usize,
    pub with_comments: usize,
    pub sections: Vec<SectionSpan>,
}

pub fn summarize(snapshot: &Snapshot) -> SnapshotSummary {
    let mut total_records = 0;
    let mut with_comments = 0;
    let mut sections = Vec::new();

    for section in &snapshot.sections {
        total_records += section.records.len();
        with_comments += section
            .records
            .iter()
            .filter(|r| !r.comments.is_empty())
            .count();
        if let (Some(first), Some(last)) = (section.records.first(), section.records.last()) {
            sections.push(SectionSpan {
                name: format!("{} {}", section.rank, section.taxon),
                most_recent: first.url.clone(),
                oldest: last.url.clone(),
            });
        }
    }

    SnapshotSummary {
        header: snapshot.header.plain.trim().to_owned(),
        snapshot_date: snapshot.snapshot_date.clone(),
        start_url: snapshot.start_url.clone(),
        total_records,
        approx_pages: total_records.div_ceil(RECORDS_PER_PAGE),
        with_comments,
        sections,
    }
}

pub fn format_summary(path: &Path, summary: &SnapshotSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Snapshot: {}", path.display());
    let _ = writeln!(out, "  {}", summary.header);
    let _ = writeln!(
        out,
        "  Start point on {}: {}",
        summary.snapshot_date, summary.start_url
    );
    let _ = writeln!(
        out,
        "  {} total {} scanned (about {} {}), {} with comments",
        summary.total_records,
        plural(summary.total_records, "record"),
        summary.approx_pages,
        plural(summary.approx_pages, "page"),
        summary.with_comments
    );
    if !summary.sections.is_empty() {
        let _ = writeln!(out, "  Sections:");
    }
    for span in &summary.sections {
        let _ = writeln!(out, "  * {}", span.name);
        let _ = writeln!(out, "     - Most recent record: {}", span.most_recent);
        let _ = writeln!(out, "     - Oldest record:      {}", span.oldest);
    }
    out
}

pub fn run(args: ListArgs) -> anyhow::Result<()> {
    let store = SnapshotStore::new(&args.data_dir);
    let files = store.list()?;
    if files.is_empty() {
        tracing::info!(dir = %store.dir().display(), "no snapshots found");
        return Ok(());
    }

    for path in files {
        match read_snapshot(&path) {
            Ok(snapshot) => println!("{}", format_summary(&path, &summarize(&snapshot))),
            Err(err) => tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "unreadable snapshot"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Comment, Header, Record, Section};

    fn record(id: u32, comments: usize) -> Record {
        Record {
            url: format!("https://bugguide.net/node/view/{id}"),
            image_url: String::new(),
            title: String::new(),
            metadata: String::new(),
            remarks: None,
            byline: String::new(),
            comments: (0..comments)
                .map(|_| Comment {
                    subject: String::new(),
                    body: "hi".to_owned(),
                    byline: String::new(),
                    depth: 0,
                })
                .collect(),
        }
    }

    fn snapshot() -> Snapshot {
        let section = |taxon: &str, records: Vec<Record>| Section {
            title: taxon.to_owned(),
            rank: "species".to_owned(),
            taxon: taxon.to_owned(),
            own_page: String::new(),
            parent_page: String::new(),
            records,
        };
        let mut many: Vec<Record> = (10..35).map(|id| record(id, 0)).collect();
        many[0].comments = record(0, 2).comments;
        Snapshot {
            snapshot_date: "2024-05-01 10:00:00".to_owned(),
            header: Header {
                html: "Genus <i>Anax</i>".to_owned(),
                plain: " Genus Anax ".to_owned(),
            },
            parent_rank: "genus".to_owned(),
            start_url: "https://bugguide.net/node/view/1/bgimage".to_owned(),
            sections: vec![
                section("junius", vec![record(1, 1), record(2, 0), record(3, 3)]),
                section("empty", Vec::new()),
                section("walsinghami", many),
            ],
        }
    }

    #[test]
    fn counts_records_pages_and_commented_records() {
        let summary = summarize(&snapshot());
        assert_eq!(summary.header, "Genus Anax");
        assert_eq!(summary.total_records, 28);
        assert_eq!(summary.approx_pages, 2);
        assert_eq!(summary.with_comments, 3);
    }

    #[test]
    fn spans_cover_only_sections_with_records() {
        let summary = summarize(&snapshot());
        assert_eq!(
            summary.sections,
            vec![
                SectionSpan {
                    name: "species junius".to_owned(),
                    most_recent: "https://bugguide.net/node/view/1".to_owned(),
                    oldest: "https://bugguide.net/node/view/3".to_owned(),
                },
                SectionSpan {
                    name: "species walsinghami".to_owned(),
                    most_recent: "https://bugguide.net/node/view/10".to_owned(),
                    oldest: "https://bugguide.net/node/view/34".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn singular_counts_read_naturally() {
        let mut one = snapshot();
        one.sections.truncate(1);
        one.sections[0].records.truncate(1);
        let text = format_summary(Path::new("data/Anax.json"), &summarize(&one));
        assert!(text.contains("1 total record scanned (about 1 page), 1 with comments"));
        assert!(text.contains("Snapshot: data/Anax.json"));
    }
}
