use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context as _;
use regex::Regex;
use url::Url;

use crate::cancel::CancelFlag;
use crate::cli::{IgnoreMoves, ImportArgs};
use crate::fetch::{FetchError, HttpFetcher, PageFetcher};
use crate::filter::apply_policy;
use crate::formats::{Header, Record, Section, Snapshot};
use crate::parse::{ListPage, parse_list_page, parse_record};
use crate::report::{RecordEvent, RecordObserver, Reporter};
use crate::sections::{PageGroup, accumulate, normalize_rank};
use crate::snapshot_store::SnapshotStore;

static OTHER_GUIDE_TAB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(/node/view/\d+)/(?:tree|bgpage|bglink|bgref|data)/?$")
        .expect("guide tab pattern is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    pub image_budget: Option<u32>,
    pub page_budget: Option<u32>,
    /// Policy applied before storing; `None` stores every record as read.
    pub prefilter: Option<IgnoreMoves>,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ImageBudgetExhausted,
    PageBudgetExhausted,
    NoMorePages,
    UserInterrupted,
    /// A listing page after the first could not be fetched.
    ListingUnavailable,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ImageBudgetExhausted => "image-budget-exhausted",
            Self::PageBudgetExhausted => "page-budget-exhausted",
            Self::NoMorePages => "no-more-pages",
            Self::UserInterrupted => "user-interrupted",
            Self::ListingUnavailable => "listing-unavailable",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub snapshot: Snapshot,
    /// Name of the taxon the crawl started on.
    pub root_taxon: String,
    pub reason: StopReason,
    pub records_visited: u32,
    pub pages_completed: u32,
}

/// Countdown that is never exhausted when unset.
#[derive(Debug, Clone, Copy)]
struct Budget {
    remaining: Option<u32>,
}

impl Budget {
    fn new(limit: Option<u32>) -> Self {
        Self { remaining: limit }
    }

    /// Uses one unit; returns true once nothing is left.
    fn spend(&mut self) -> bool {
        match &mut self.remaining {
            Some(left) => {
                *left = left.saturating_sub(1);
                *left == 0
            }
            None => false,
        }
    }
}

enum CrawlState {
    AwaitingFirstPage,
    FetchingPage(Url),
    ProcessingGroups { url: Url, page: ListPage },
    CheckingContinuation(Option<Url>),
    Done(StopReason),
}

struct FirstPage {
    header: Header,
    rank: String,
    taxon: String,
}

struct Crawler<'a, F, O> {
    fetcher: &'a mut F,
    observer: &'a mut O,
    cancel: &'a CancelFlag,
    options: CrawlOptions,
    origin: Url,
    images: Budget,
    pages: Budget,
    sections: Vec<Section>,
    records_visited: u32,
    pages_completed: u32,
}

/// Walks a taxon's image listing from `start_url`, one page and one record at
/// a time, until a budget runs out, the listing ends, or `cancel` is set.
///
/// Only a failure on the first listing page is an error. Everything
/// accumulated before any other stop is returned in the snapshot.
pub async fn crawl<F: PageFetcher, O: RecordObserver>(
    fetcher: &mut F,
    observer: &mut O,
    start_url: &Url,
    options: CrawlOptions,
    cancel: &CancelFlag,
) -> anyhow::Result<CrawlOutcome> {
    let snapshot_date = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let mut origin = start_url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);

    let mut crawler = Crawler {
        fetcher,
        observer,
        cancel,
        options,
        origin,
        images: Budget::new(options.image_budget),
        pages: Budget::new(options.page_budget),
        sections: Vec::new(),
        records_visited: 0,
        pages_completed: 0,
    };

    let mut first: Option<FirstPage> = None;
    let mut state = CrawlState::AwaitingFirstPage;
    let reason = loop {
        state = match state {
            CrawlState::AwaitingFirstPage => {
                let page = crawler
                    .fetch_list_page(start_url)
                    .await
                    .context("fetch first listing page")?;
                let Some((rank, taxon)) = page.root_taxon.clone() else {
                    anyhow::bail!(
                        "no taxon breadcrumbs on {start_url}; expected the Images tab of a guide page"
                    );
                };
                tracing::info!(taxon = %taxon, "starting on page {}", page.page_label);
                first = Some(FirstPage {
                    header: page.header.clone(),
                    rank,
                    taxon,
                });
                CrawlState::ProcessingGroups {
                    url: start_url.clone(),
                    page,
                }
            }
            CrawlState::FetchingPage(url) => {
                if crawler.cancel.is_cancelled() {
                    CrawlState::Done(StopReason::UserInterrupted)
                } else {
                    match crawler.fetch_list_page(&url).await {
                        Ok(page) => CrawlState::ProcessingGroups { url, page },
                        Err(err) => {
                            tracing::warn!(url = %url, error = %err, "listing page unavailable");
                            CrawlState::Done(StopReason::ListingUnavailable)
                        }
                    }
                }
            }
            CrawlState::ProcessingGroups { url, page } => {
                match crawler
                    .process_groups(&url, &page.groups, &page.page_label)
                    .await
                {
                    Some(reason) => CrawlState::Done(reason),
                    None => CrawlState::CheckingContinuation(page.next_page),
                }
            }
            CrawlState::CheckingContinuation(next_page) => {
                crawler.pages_completed += 1;
                if crawler.pages.spend() {
                    CrawlState::Done(StopReason::PageBudgetExhausted)
                } else {
                    match next_page {
                        Some(url) => CrawlState::FetchingPage(url),
                        None => CrawlState::Done(StopReason::NoMorePages),
                    }
                }
            }
            CrawlState::Done(reason) => break reason,
        };
    };

    let first = first.context("crawl finished without a first page")?;
    Ok(CrawlOutcome {
        snapshot: Snapshot {
            snapshot_date,
            header: first.header,
            parent_rank: normalize_rank(&first.rank),
            start_url: start_url.to_string(),
            sections: crawler.sections,
        },
        root_taxon: first.taxon,
        reason,
        records_visited: crawler.records_visited,
        pages_completed: crawler.pages_completed,
    })
}

impl<F: PageFetcher, O: RecordObserver> Crawler<'_, F, O> {
    async fn fetch_list_page(&mut self, url: &Url) -> Result<ListPage, FetchError> {
        let html = self.fetcher.fetch(url).await?;
        Ok(parse_list_page(&html, url))
    }

    async fn process_groups(
        &mut self,
        page_url: &Url,
        groups: &[PageGroup],
        page_label: &str,
    ) -> Option<StopReason> {
        for group in groups {
            if self.cancel.is_cancelled() {
                return Some(StopReason::UserInterrupted);
            }
            tracing::info!(
                page = page_label,
                "scanning page {page_label} submissions for '{}'",
                group.taxon
            );
            accumulate(&mut self.sections, group, page_url.as_str());

            for link in &group.record_links {
                if self.cancel.is_cancelled() {
                    return Some(StopReason::UserInterrupted);
                }
                if let Some(record) = self.visit_record(link).await {
                    if let Some(section) = self.sections.last_mut() {
                        section.records.push(record);
                    }
                }
                self.records_visited += 1;
                if self.images.spend() {
                    return Some(StopReason::ImageBudgetExhausted);
                }
            }
        }
        None
    }

    async fn visit_record(&mut self, link: &str) -> Option<Record> {
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(link, error = %err, "skipping record: bad link");
                return None;
            }
        };
        tracing::info!(url = %url, "checking record");

        let html = match self.fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "skipping record: fetch failed");
                return None;
            }
        };
        let record = match parse_record(&html, &self.origin) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "skipping record: unexpected page layout");
                return None;
            }
        };

        let verbose = self.options.verbose;
        let record = match self.options.prefilter {
            Some(policy) => apply_policy(record, policy, &mut *self.observer, verbose)?,
            None => record,
        };
        self.observer
            .record_event(RecordEvent::Imported, &record.url, &record.comments, verbose);
        Some(record)
    }
}

/// Checks the starting URL and points sibling guide tabs at the Images tab.
pub fn normalize_start_url(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw.trim()).context("parse start url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("start url must be http/https: {url}");
    }

    let images_path = OTHER_GUIDE_TAB
        .captures(url.path())
        .map(|caps| format!("{}/bgimage", &caps[1]));
    if let Some(path) = images_path {
        tracing::info!(from = %url, "not an images page; switching to the Images tab");
        url.set_path(&path);
        url.set_query(None);
    }
    Ok(url)
}

pub async fn run(args: ImportArgs, cancel: CancelFlag) -> anyhow::Result<()> {
    let start_url = normalize_start_url(&args.url)?;
    let store = SnapshotStore::new(&args.data_dir);
    let mut fetcher = HttpFetcher::new(Duration::from_millis(args.delay_ms))?;
    let mut reporter = Reporter::stderr();

    let options = CrawlOptions {
        image_budget: args.imgcount,
        page_budget: args.pgcount,
        prefilter: (args.ignore_moves != IgnoreMoves::None).then_some(args.ignore_moves),
        verbose: args.verbose,
    };
    let outcome = crawl(&mut fetcher, &mut reporter, &start_url, options, &cancel).await?;

    let path = store
        .write_snapshot(&outcome.root_taxon, &outcome.snapshot, args.replace)
        .context("write snapshot")?;

    match outcome.reason {
        StopReason::ImageBudgetExhausted => {
            tracing::info!("finished checking {} images", outcome.records_visited)
        }
        StopReason::PageBudgetExhausted => {
            tracing::info!("finished checking {} pages", outcome.pages_completed)
        }
        StopReason::NoMorePages => tracing::info!("reached end of list"),
        StopReason::UserInterrupted => tracing::info!("scan ended early"),
        StopReason::ListingUnavailable => tracing::warn!("scan ended at an unreachable page"),
    }
    tracing::info!(
        reason = %outcome.reason,
        records = outcome.records_visited,
        "results saved to '{}'",
        path.display()
    );
    Ok(())
}
