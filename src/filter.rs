use crate::cancel::CancelFlag;
use crate::cli::IgnoreMoves;
use crate::formats::{Record, Snapshot};
use crate::report::{RecordEvent, RecordObserver};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub ignore_moves: IgnoreMoves,
    pub screen: bool,
    pub verbose: bool,
}

/// Answer to "export this record?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenDecision {
    Yes,
    No,
    /// Keep this record and stop asking.
    Auto,
    Quit,
}

/// Human-in-the-loop approval of a record's surviving comments.
pub trait Screener {
    fn ask(&mut self, record: &Record) -> anyhow::Result<ScreenDecision>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Kept(Record),
    Discarded,
    /// Kept; screening is now off for the rest of the run.
    AutoAcceptRest(Record),
    AbortExport,
}

/// Applies the move-comment policy. Returns `None` when the record has
/// nothing left to export.
pub fn apply_policy<O: RecordObserver>(
    mut record: Record,
    policy: IgnoreMoves,
    observer: &mut O,
    echo: bool,
) -> Option<Record> {
    if record.comments.is_empty() {
        observer.record_event(RecordEvent::Skipped, &record.url, &[], echo);
        return None;
    }

    let (marked, unmarked): (Vec<_>, Vec<_>) = record
        .comments
        .iter()
        .cloned()
        .partition(|comment| comment.highlight());

    if marked.is_empty() {
        observer.record_event(RecordEvent::Skipped, &record.url, &record.comments, echo);
        return None;
    }

    match policy {
        // Both keep the full thread so replies keep their conversational context.
        IgnoreMoves::None | IgnoreMoves::Nochat => {}
        IgnoreMoves::Always => {
            if !unmarked.is_empty() {
                observer.record_event(RecordEvent::Skipped, &record.url, &unmarked, echo);
            }
            record.comments = marked;
        }
    }

    Some(record)
}

/// Policy filtering followed by optional interactive screening.
#[derive(Debug)]
pub struct FilterPipeline<S, O> {
    options: FilterOptions,
    screener: S,
    observer: O,
}

impl<S: Screener, O: RecordObserver> FilterPipeline<S, O> {
    pub fn new(options: FilterOptions, screener: S, observer: O) -> Self {
        Self {
            options,
            screener,
            observer,
        }
    }

    pub fn options(&self) -> FilterOptions {
        self.options
    }

    pub fn filter(&mut self, record: Record) -> anyhow::Result<FilterOutcome> {
        let verbose = self.options.verbose;
        let Some(record) =
            apply_policy(record, self.options.ignore_moves, &mut self.observer, verbose)
        else {
            return Ok(FilterOutcome::Discarded);
        };

        if !self.options.screen {
            self.observer
                .record_event(RecordEvent::Imported, &record.url, &record.comments, verbose);
            return Ok(FilterOutcome::Kept(record));
        }

        // The screener shows the comments itself.
        self.observer
            .record_event(RecordEvent::Screening, &record.url, &record.comments, false);
        let outcome = match self.screener.ask(&record)? {
            ScreenDecision::Yes => {
                self.observer
                    .record_event(RecordEvent::Imported, &record.url, &record.comments, false);
                FilterOutcome::Kept(record)
            }
            ScreenDecision::No => {
                self.observer
                    .record_event(RecordEvent::Skipped, &record.url, &record.comments, false);
                FilterOutcome::Discarded
            }
            ScreenDecision::Auto => {
                self.options.screen = false;
                self.options.verbose = false;
                self.observer
                    .record_event(RecordEvent::Imported, &record.url, &record.comments, false);
                FilterOutcome::AutoAcceptRest(record)
            }
            ScreenDecision::Quit => FilterOutcome::AbortExport,
        };
        Ok(outcome)
    }
}

#[derive(Debug)]
pub struct FilteredSnapshot {
    pub snapshot: Snapshot,
    pub aborted: bool,
    /// Set when screening failed; the snapshot then holds what was accepted
    /// before the failure.
    pub failure: Option<anyhow::Error>,
}

/// Runs every record of every section through the pipeline, in order.
///
/// On quit, interrupt or a screening failure, the section being filtered
/// keeps only the records already accepted (or is dropped if there are none)
/// and every later section is dropped.
pub fn filter_snapshot<S: Screener, O: RecordObserver>(
    mut snapshot: Snapshot,
    pipeline: &mut FilterPipeline<S, O>,
    cancel: &CancelFlag,
) -> FilteredSnapshot {
    let sections = std::mem::take(&mut snapshot.sections);

    for mut section in sections {
        let records = std::mem::take(&mut section.records);
        let mut aborted = false;
        let mut failure = None;

        for record in records {
            if cancel.is_cancelled() {
                tracing::warn!(section = %section.title, "export interrupted");
                aborted = true;
                break;
            }
            match pipeline.filter(record) {
                Ok(FilterOutcome::Kept(record) | FilterOutcome::AutoAcceptRest(record)) => {
                    section.records.push(record);
                }
                Ok(FilterOutcome::Discarded) => {}
                Ok(FilterOutcome::AbortExport) => {
                    tracing::info!(section = %section.title, "export stopped by user");
                    aborted = true;
                    break;
                }
                Err(err) => {
                    tracing::warn!(section = %section.title, error = %format!("{err:#}"), "screening failed");
                    failure = Some(err);
                    aborted = true;
                    break;
                }
            }
        }

        if aborted {
            if !section.records.is_empty() {
                snapshot.sections.push(section);
            }
            return FilteredSnapshot {
                snapshot,
                aborted: true,
                failure,
            };
        }
        snapshot.sections.push(section);
    }

    FilteredSnapshot {
        snapshot,
        aborted: false,
        failure: None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::formats::{Comment, Header, Section};
    use crate::report::testing::EventLog;

    const MOVE: &str = "Moved from Dragonflies.";

    fn comment(body: &str) -> Comment {
        Comment {
            subject: String::new(),
            body: body.to_owned(),
            byline: "by someone".to_owned(),
            depth: 0,
        }
    }

    fn record(url: &str, bodies: &[&str]) -> Record {
        Record {
            url: url.to_owned(),
            image_url: format!("{url}.jpg"),
            title: "Anax junius".to_owned(),
            metadata: String::new(),
            remarks: None,
            byline: String::new(),
            comments: bodies.iter().map(|b| comment(b)).collect(),
        }
    }

    fn bodies(record: &Record) -> Vec<&str> {
        record.comments.iter().map(|c| c.body.as_str()).collect()
    }

    /// Screener that replays canned answers and records what it was shown.
    #[derive(Debug, Default)]
    struct Scripted {
        answers: VecDeque<ScreenDecision>,
        asked: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[ScreenDecision]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                asked: Vec::new(),
            }
        }
    }

    impl Screener for Scripted {
        fn ask(&mut self, record: &Record) -> anyhow::Result<ScreenDecision> {
            self.asked.push(record.url.clone());
            self.answers
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted answer left"))
        }
    }

    fn pipeline(
        ignore_moves: IgnoreMoves,
        screen: bool,
        answers: &[ScreenDecision],
    ) -> FilterPipeline<Scripted, EventLog> {
        let options = FilterOptions {
            ignore_moves,
            screen,
            verbose: true,
        };
        FilterPipeline::new(options, Scripted::new(answers), EventLog::default())
    }

    #[test]
    fn records_without_comments_are_discarded_under_every_policy() -> anyhow::Result<()> {
        for policy in [IgnoreMoves::None, IgnoreMoves::Always, IgnoreMoves::Nochat] {
            let mut pipeline = pipeline(policy, false, &[]);
            let outcome = pipeline.filter(record("r", &[]))?;
            assert_eq!(outcome, FilterOutcome::Discarded, "policy={policy:?}");
            assert_eq!(
                pipeline.observer.events,
                vec![(RecordEvent::Skipped, "r".to_owned(), 0, true)],
                "policy={policy:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn move_only_threads_are_discarded_under_every_policy() -> anyhow::Result<()> {
        for policy in [IgnoreMoves::None, IgnoreMoves::Always, IgnoreMoves::Nochat] {
            let mut pipeline = pipeline(policy, false, &[]);
            let outcome = pipeline.filter(record("r", &[MOVE, "Moved from Odonata."]))?;
            assert_eq!(outcome, FilterOutcome::Discarded, "policy={policy:?}");
            assert_eq!(pipeline.observer.events[0].0, RecordEvent::Skipped);
        }
        Ok(())
    }

    #[test]
    fn always_keeps_only_substantive_comments_in_order() -> anyhow::Result<()> {
        let mut pipeline = pipeline(IgnoreMoves::Always, false, &[]);
        let outcome = pipeline.filter(record("r", &["first", MOVE, "second", MOVE, "third"]))?;

        let FilterOutcome::Kept(kept) = outcome else {
            panic!("expected record to be kept");
        };
        assert_eq!(bodies(&kept), vec!["first", "second", "third"]);
        assert_eq!(
            pipeline.observer.events,
            vec![
                (RecordEvent::Skipped, "r".to_owned(), 2, true),
                (RecordEvent::Imported, "r".to_owned(), 3, true),
            ]
        );
        Ok(())
    }

    #[test]
    fn nochat_and_none_keep_the_whole_thread() -> anyhow::Result<()> {
        for policy in [IgnoreMoves::None, IgnoreMoves::Nochat] {
            let original = record("r", &[MOVE, "Agreed, this is A. junius.", MOVE]);
            let outcome = pipeline(policy, false, &[]).filter(original.clone())?;
            assert_eq!(outcome, FilterOutcome::Kept(original), "policy={policy:?}");
        }
        Ok(())
    }

    #[test]
    fn screening_yes_and_no() -> anyhow::Result<()> {
        let mut pipeline = pipeline(
            IgnoreMoves::None,
            true,
            &[ScreenDecision::Yes, ScreenDecision::No],
        );

        assert!(matches!(
            pipeline.filter(record("a", &["hi"]))?,
            FilterOutcome::Kept(_)
        ));
        assert_eq!(pipeline.filter(record("b", &["hi"]))?, FilterOutcome::Discarded);
        assert_eq!(pipeline.screener.asked, vec!["a", "b"]);

        let kinds: Vec<RecordEvent> = pipeline.observer.events.iter().map(|e| e.0).collect();
        assert_eq!(
            kinds,
            vec![
                RecordEvent::Screening,
                RecordEvent::Imported,
                RecordEvent::Screening,
                RecordEvent::Skipped,
            ]
        );
        Ok(())
    }

    #[test]
    fn screening_sees_the_policy_filtered_thread() -> anyhow::Result<()> {
        let mut pipeline = pipeline(IgnoreMoves::Always, true, &[ScreenDecision::Yes]);
        pipeline.filter(record("a", &[MOVE, "hi"]))?;
        let screened = pipeline
            .observer
            .events
            .iter()
            .find(|e| e.0 == RecordEvent::Screening)
            .expect("screening event");
        assert_eq!(screened.2, 1);
        Ok(())
    }

    #[test]
    fn auto_keeps_the_record_and_turns_off_screening_and_echo() -> anyhow::Result<()> {
        let mut pipeline = pipeline(IgnoreMoves::None, true, &[ScreenDecision::Auto]);

        assert!(matches!(
            pipeline.filter(record("a", &["hi"]))?,
            FilterOutcome::AutoAcceptRest(_)
        ));
        assert!(!pipeline.options().screen);
        assert!(!pipeline.options().verbose);

        assert!(matches!(
            pipeline.filter(record("b", &["hi"]))?,
            FilterOutcome::Kept(_)
        ));
        assert_eq!(pipeline.screener.asked, vec!["a"]);
        let last = pipeline.observer.events.last().expect("event");
        assert_eq!(last, &(RecordEvent::Imported, "b".to_owned(), 1, false));
        Ok(())
    }

    fn snapshot(sections: Vec<(&str, Vec<Record>)>) -> Snapshot {
        Snapshot {
            snapshot_date: "2024-05-01 10:00:00".to_owned(),
            header: Header::default(),
            parent_rank: "genus".to_owned(),
            start_url: "https://bugguide.net/node/view/9137/bgimage".to_owned(),
            sections: sections
                .into_iter()
                .map(|(title, records)| Section {
                    title: title.to_owned(),
                    rank: "species".to_owned(),
                    taxon: title.to_owned(),
                    own_page: String::new(),
                    parent_page: String::new(),
                    records,
                })
                .collect(),
        }
    }

    fn urls(snapshot: &Snapshot) -> Vec<(String, Vec<String>)> {
        snapshot
            .sections
            .iter()
            .map(|s| {
                (
                    s.title.clone(),
                    s.records.iter().map(|r| r.url.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn quit_keeps_accepted_records_and_drops_the_rest() -> anyhow::Result<()> {
        use ScreenDecision::{No, Quit, Yes};

        let input = snapshot(vec![
            ("A", vec![record("a1", &["x"]), record("a2", &["x"])]),
            ("B", vec![record("b1", &["x"]), record("b2", &["x"]), record("b3", &["x"])]),
            ("C", vec![record("c1", &["x"])]),
        ]);
        let mut pipeline = pipeline(IgnoreMoves::None, true, &[Yes, No, Yes, Quit]);

        let filtered = filter_snapshot(input, &mut pipeline, &CancelFlag::default());
        assert!(filtered.aborted);
        assert_eq!(
            urls(&filtered.snapshot),
            vec![
                ("A".to_owned(), vec!["a1".to_owned()]),
                ("B".to_owned(), vec!["b1".to_owned()]),
            ]
        );
        Ok(())
    }

    #[test]
    fn quit_before_any_acceptance_in_a_section_drops_that_section() -> anyhow::Result<()> {
        use ScreenDecision::{Quit, Yes};

        let input = snapshot(vec![
            ("A", vec![record("a1", &["x"])]),
            ("B", vec![record("b1", &["x"])]),
        ]);
        let mut pipeline = pipeline(IgnoreMoves::None, true, &[Yes, Quit]);

        let filtered = filter_snapshot(input, &mut pipeline, &CancelFlag::default());
        assert_eq!(
            urls(&filtered.snapshot),
            vec![("A".to_owned(), vec!["a1".to_owned()])]
        );
        Ok(())
    }

    #[test]
    fn full_pass_keeps_sections_even_when_emptied() -> anyhow::Result<()> {
        let input = snapshot(vec![
            ("A", vec![record("a1", &[MOVE]), record("a2", &["x"])]),
            ("B", vec![record("b1", &[])]),
        ]);
        let mut pipeline = pipeline(IgnoreMoves::Nochat, false, &[]);

        let filtered = filter_snapshot(input, &mut pipeline, &CancelFlag::default());
        assert!(!filtered.aborted);
        assert_eq!(
            urls(&filtered.snapshot),
            vec![
                ("A".to_owned(), vec!["a2".to_owned()]),
                ("B".to_owned(), vec![]),
            ]
        );
        Ok(())
    }

    #[test]
    fn screening_failure_keeps_accepted_records() -> anyhow::Result<()> {
        use ScreenDecision::Yes;

        let input = snapshot(vec![
            ("A", vec![record("a1", &["x"]), record("a2", &["x"])]),
            ("B", vec![record("b1", &["x"])]),
        ]);
        // The second question finds no scripted answer and fails.
        let mut pipeline = pipeline(IgnoreMoves::None, true, &[Yes]);

        let filtered = filter_snapshot(input, &mut pipeline, &CancelFlag::default());
        assert!(filtered.aborted);
        assert!(filtered.failure.is_some());
        assert_eq!(
            urls(&filtered.snapshot),
            vec![("A".to_owned(), vec!["a1".to_owned()])]
        );
        Ok(())
    }

    #[test]
    fn interrupt_behaves_like_quit() -> anyhow::Result<()> {
        let cancel = CancelFlag::default();
        cancel.cancel();
        let input = snapshot(vec![("A", vec![record("a1", &["x"])])]);
        let mut pipeline = pipeline(IgnoreMoves::None, false, &[]);

        let filtered = filter_snapshot(input, &mut pipeline, &cancel);
        assert!(filtered.aborted);
        assert!(filtered.snapshot.sections.is_empty());
        Ok(())
    }
}
