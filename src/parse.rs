use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::comment::depth_from_indent;
use crate::formats::{Comment, Header, Record};
use crate::sections::PageGroup;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing element: {0}")]
    MissingElement(&'static str),
    #[error("photo id is not numeric: {0:?}")]
    InvalidPhotoId(String),
    #[error("build record url")]
    RecordUrl(#[from] url::ParseError),
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static NODE_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".node-title"));
static H1: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static PAGER_CURRENT: LazyLock<Selector> = LazyLock::new(|| selector(".pager b"));
static NEXT_ARROW: LazyLock<Selector> = LazyLock::new(|| selector(r#"img[alt="next page"]"#));
static LIST_GROUP: LazyLock<Selector> = LazyLock::new(|| selector(".node-main, .node-main-alt"));
static BREADCRUMBS: LazyLock<Selector> = LazyLock::new(|| selector(".bgpage-roots"));
static PHOTO_ID: LazyLock<Selector> = LazyLock::new(|| selector(".bgimage-id"));
static PHOTO: LazyLock<Selector> = LazyLock::new(|| selector(".bgimage-image"));
static WHERE_WHEN: LazyLock<Selector> = LazyLock::new(|| selector(".bgimage-where-when"));
static REMARKS: LazyLock<Selector> = LazyLock::new(|| selector(".node-body"));
static NODE_BYLINE: LazyLock<Selector> = LazyLock::new(|| selector(".node-byline"));
static COMMENT: LazyLock<Selector> = LazyLock::new(|| selector(".comment"));
static COMMENT_SUBJECT: LazyLock<Selector> = LazyLock::new(|| selector(".comment-subject"));
static COMMENT_BODY: LazyLock<Selector> = LazyLock::new(|| selector(".comment-body"));
static COMMENT_BYLINE: LazyLock<Selector> = LazyLock::new(|| selector(".comment-byline"));

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("img tag pattern is valid"));

/// What the crawl needs from one page of a taxon's image listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub page_label: String,
    pub header: Header,
    /// Raw rank and name from the first breadcrumb trail on the page.
    pub root_taxon: Option<(String, String)>,
    pub groups: Vec<PageGroup>,
    pub next_page: Option<Url>,
}

pub fn parse_list_page(html: &str, page_url: &Url) -> ListPage {
    let doc = Html::parse_document(html);

    let page_label = doc
        .select(&PAGER_CURRENT)
        .next()
        .map(text_of)
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| "1".to_owned());

    let header = doc
        .select(&NODE_TITLE)
        .next()
        .map(|title| Header {
            html: title
                .select(&H1)
                .next()
                .map(contents_of)
                .unwrap_or_else(|| contents_of(title)),
            plain: text_of(title),
        })
        .unwrap_or_default();

    let root_taxon = doc
        .select(&BREADCRUMBS)
        .next()
        .and_then(|roots| roots.select(&LINK).last())
        .map(|link| (link.value().attr("title").unwrap_or_default().to_owned(), text_of(link)));

    let mut groups = Vec::new();
    for group in doc.select(&LIST_GROUP) {
        match parse_group(group, page_url) {
            Some(parsed) => groups.push(parsed),
            None => tracing::warn!(page = %page_url, "listing group without breadcrumbs; skipping"),
        }
    }

    let next_page = doc
        .select(&NEXT_ARROW)
        .filter_map(|arrow| arrow.parent().and_then(ElementRef::wrap))
        .filter_map(|link| link.value().attr("href"))
        .find_map(|href| page_url.join(href).ok());

    ListPage {
        page_label,
        header,
        root_taxon,
        groups,
        next_page,
    }
}

fn parse_group(group: ElementRef<'_>, page_url: &Url) -> Option<PageGroup> {
    let roots = group.select(&BREADCRUMBS).next()?;
    let taxon_link = roots.select(&LINK).last()?;

    let own_page = taxon_link
        .value()
        .attr("href")
        .and_then(|href| page_url.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_default();

    // Record thumbnails are direct children of the group; nested links belong
    // to the breadcrumbs and pager.
    let record_links = group
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "a")
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .map(|url| url.to_string())
        .collect();

    Some(PageGroup {
        breadcrumbs: text_of(roots),
        rank: taxon_link.value().attr("title").unwrap_or_default().to_owned(),
        taxon: text_of(taxon_link),
        own_page,
        record_links,
    })
}

/// Parses a record page. `origin` is the site root the canonical record URL
/// is rebuilt against.
pub fn parse_record(html: &str, origin: &Url) -> Result<Record, ParseError> {
    let doc = Html::parse_document(html);

    let id_text = doc
        .select(&PHOTO_ID)
        .next()
        .map(text_of)
        .ok_or(ParseError::MissingElement(".bgimage-id"))?;
    let photo_id = photo_id_from_label(&id_text)?;
    let url = origin.join(&format!("/node/view/{photo_id}"))?;

    let image_url = doc
        .select(&PHOTO)
        .next()
        .and_then(|img| img.value().attr("src"))
        .ok_or(ParseError::MissingElement(".bgimage-image"))?;
    let image_url = origin
        .join(image_url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| image_url.to_owned());

    let title = doc
        .select(&NODE_TITLE)
        .next()
        .map(resolve_title)
        .ok_or(ParseError::MissingElement(".node-title"))?;

    Ok(Record {
        url: url.to_string(),
        image_url,
        title,
        metadata: first_contents(&doc, &WHERE_WHEN).unwrap_or_default(),
        remarks: first_contents(&doc, &REMARKS),
        byline: first_contents(&doc, &NODE_BYLINE).unwrap_or_default(),
        comments: doc.select(&COMMENT).map(parse_comment).collect(),
    })
}

/// `.bgimage-id` reads "Photo#123456".
fn photo_id_from_label(label: &str) -> Result<u64, ParseError> {
    let digits = label.rsplit('#').next().unwrap_or_default().trim();
    digits
        .parse()
        .map_err(|_| ParseError::InvalidPhotoId(label.to_owned()))
}

/// Replaces sex-marker icons in a title with trailing text labels. At most
/// two labels are kept; icons without alt text add nothing.
pub fn resolve_title(title: ElementRef<'_>) -> String {
    let labels: Vec<String> = title
        .select(&IMG)
        .filter_map(|img| img.value().attr("alt"))
        .map(|alt| alt.trim().to_lowercase())
        .filter(|alt| !alt.is_empty())
        .take(2)
        .collect();

    let markup = title.inner_html();
    let base = IMG_TAG.replace_all(&markup, "");
    let base = base.trim();

    if labels.is_empty() {
        return base.to_owned();
    }
    format!("{base} {}", labels.join(" & "))
}

pub fn parse_comment(node: ElementRef<'_>) -> Comment {
    Comment {
        subject: comment_part(node, &COMMENT_SUBJECT),
        body: comment_part(node, &COMMENT_BODY),
        byline: comment_part(node, &COMMENT_BYLINE),
        depth: depth_from_indent(reply_indent(node)),
    }
}

fn comment_part(node: ElementRef<'_>, sel: &Selector) -> String {
    node.select(sel)
        .next()
        .map(contents_of)
        .unwrap_or_default()
}

/// Replies sit in the second cell of a table row whose first cell's width is
/// the indent.
fn reply_indent(node: ElementRef<'_>) -> Option<u32> {
    let cell = node.parent().and_then(ElementRef::wrap)?;
    if cell.value().name() != "td" {
        return None;
    }
    let spacer = cell.prev_siblings().find_map(ElementRef::wrap)?;
    let width = spacer.value().attr("width")?.trim();
    width.trim_end_matches("px").parse().ok()
}

fn first_contents(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).next().map(contents_of)
}

fn contents_of(element: ElementRef<'_>) -> String {
    element.inner_html().trim().to_owned()
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}
