use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::cli::ExportFormat;
use crate::formats::{Comment, Record, Section, Snapshot};
use crate::report::plain_text;

/// Turns a (possibly filtered) snapshot into a standalone document.
/// Sections without records are left out.
pub trait Renderer {
    fn extension(&self) -> &'static str;
    fn render(&self, snapshot: &Snapshot) -> String;
}

pub fn renderer_for(format: ExportFormat) -> Box<dyn Renderer> {
    match format {
        ExportFormat::Html => Box::new(HtmlRenderer),
        ExportFormat::Md => Box::new(MarkdownRenderer),
    }
}

/// Ranks whose names are written in italics.
const ITALIC_RANKS: &[&str] = &["genus", "subgenus", "species", "subspecies"];

/// Splits "Anax junius - Common Green Darner" into the scientific name and
/// the rest, when the rank is one that is italicized.
fn split_taxon<'a>(rank: &str, taxon: &'a str) -> (Option<&'a str>, &'a str) {
    if !ITALIC_RANKS.contains(&rank) {
        return (None, taxon);
    }
    match taxon.find(" - ") {
        Some(at) => (Some(&taxon[..at]), &taxon[at..]),
        None => (Some(taxon), ""),
    }
}

fn visible_sections(snapshot: &Snapshot) -> impl Iterator<Item = &Section> {
    snapshot.sections.iter().filter(|s| !s.records.is_empty())
}

const STYLE: &str = r#"
body { font-family: Georgia, serif; max-width: 60rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
header .snapshot { color: #666; font-size: 0.9rem; }
section { margin-top: 3rem; }
section > .crumbs { color: #666; font-size: 0.85rem; margin-top: -0.5rem; }
.record { border-top: 1px solid #ddd; padding: 1rem 0; }
.record-head { display: flex; gap: 1rem; }
.record-head img { max-width: 12rem; max-height: 12rem; }
.record-head h3 { margin: 0 0 0.5rem 0; }
.record .meta, .record .byline { color: #555; font-size: 0.85rem; }
.comments { list-style: none; padding: 0; }
.comment { border-left: 3px solid #ccc; padding: 0.25rem 0.75rem; margin-bottom: 0.75rem; color: #777; }
.comment.mark { border-left-color: #4a7; color: #222; }
.comment .subject { font-weight: bold; }
.comment .byline { font-size: 0.8rem; color: #666; }
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    fn section(&self, out: &mut String, section: &Section) {
        let (scientific, rest) = split_taxon(&section.rank, &section.taxon);
        let name = match scientific {
            Some(name) => format!("<i>{}</i>{}", text(name), text(rest)),
            None => text(rest).into_owned(),
        };

        out.push_str("<section>\n");
        out.push_str(&format!(
            "  <h2>{} <a href=\"{}\">{name}</a></h2>\n",
            text(&capitalize(&section.rank)),
            attr(&section.own_page)
        ));
        out.push_str(&format!("  <p class=\"crumbs\">{}</p>\n", text(&section.title)));
        for record in &section.records {
            self.record(out, record);
        }
        out.push_str("</section>\n");
    }

    fn record(&self, out: &mut String, record: &Record) {
        let url = attr(&record.url);
        out.push_str("  <article class=\"record\">\n");
        out.push_str("    <div class=\"record-head\">\n");
        out.push_str(&format!(
            "      <a href=\"{url}\"><img src=\"{}\" alt=\"\"></a>\n",
            attr(&record.image_url)
        ));
        out.push_str("      <div>\n");
        out.push_str(&format!(
            "        <h3><a href=\"{url}\">{}</a></h3>\n",
            record.title
        ));
        out.push_str(&format!("        <div class=\"meta\">{}</div>\n", record.metadata));
        if let Some(remarks) = &record.remarks {
            out.push_str(&format!("        <div class=\"remarks\">{remarks}</div>\n"));
        }
        out.push_str(&format!("        <div class=\"byline\">{}</div>\n", record.byline));
        out.push_str("      </div>\n");
        out.push_str("    </div>\n");

        out.push_str("    <ol class=\"comments\">\n");
        for comment in &record.comments {
            self.comment(out, comment);
        }
        out.push_str("    </ol>\n");
        out.push_str("  </article>\n");
    }

    fn comment(&self, out: &mut String, comment: &Comment) {
        let class = if comment.highlight() { "comment mark" } else { "comment" };
        out.push_str(&format!(
            "      <li class=\"{class}\" style=\"margin-left: {}rem\">\n",
            comment.depth * 2
        ));
        if !comment.subject_is_redundant() {
            out.push_str(&format!(
                "        <div class=\"subject\">{}</div>\n",
                comment.subject
            ));
        }
        out.push_str(&format!("        <div class=\"body\">{}</div>\n", comment.body));
        out.push_str(&format!(
            "        <div class=\"byline\">{}</div>\n",
            comment.byline
        ));
        out.push_str("      </li>\n");
    }
}

impl Renderer for HtmlRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, snapshot: &Snapshot) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n");
        out.push_str("<html lang=\"en\">\n");
        out.push_str("<head>\n");
        out.push_str("<meta charset=\"utf-8\">\n");
        out.push_str(&format!(
            "<title>Comments: {}</title>\n",
            text(snapshot.header.plain.trim())
        ));
        out.push_str(&format!("<style>{STYLE}</style>\n"));
        out.push_str("</head>\n");
        out.push_str("<body>\n");
        out.push_str("<header>\n");
        out.push_str(&format!("  <h1>{}</h1>\n", snapshot.header.html));
        out.push_str(&format!(
            "  <p class=\"snapshot\">Snapshot of <a href=\"{}\">{}</a> taken {}</p>\n",
            attr(&snapshot.start_url),
            text(&snapshot.start_url),
            text(&snapshot.snapshot_date)
        ));
        out.push_str("</header>\n");
        for section in visible_sections(snapshot) {
            self.section(&mut out, section);
        }
        out.push_str("</body>\n");
        out.push_str("</html>\n");
        out
    }
}

/// Markdown output. Comment markup goes through `html2md`; replies are
/// nested blockquotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    fn comment(&self, out: &mut String, comment: &Comment) {
        let quote = "> ".repeat(comment.depth as usize + 1);
        let mut lines = Vec::new();
        if !comment.subject_is_redundant() {
            let subject = plain_text(&comment.subject);
            if !subject.is_empty() {
                lines.push(format!("**{subject}**"));
                lines.push(String::new());
            }
        }
        lines.extend(markdown(&comment.body).lines().map(str::to_owned));
        lines.push(String::new());
        lines.push(format!("— {}", plain_text(&comment.byline)));

        for line in lines {
            out.push_str(quote.trim_end());
            if !line.is_empty() {
                out.push(' ');
                out.push_str(&line);
            }
            out.push('\n');
        }
        out.push('\n');
    }
}

impl Renderer for MarkdownRenderer {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, snapshot: &Snapshot) -> String {
        let mut out = format!("# {}\n\n", plain_text(&snapshot.header.html));
        out.push_str(&format!(
            "_Snapshot of <{}> taken {}_\n",
            snapshot.start_url, snapshot.snapshot_date
        ));

        for section in visible_sections(snapshot) {
            let (scientific, rest) = split_taxon(&section.rank, &section.taxon);
            let name = match scientific {
                Some(name) => format!("*{name}*{rest}"),
                None => rest.to_owned(),
            };
            out.push_str(&format!(
                "\n## {} [{name}]({})\n\n",
                capitalize(&section.rank),
                section.own_page
            ));

            for record in &section.records {
                out.push_str(&format!(
                    "### [{}]({})\n\n",
                    plain_text(&record.title),
                    record.url
                ));
                out.push_str(&format!("![]({})\n\n", record.image_url));
                for fragment in [Some(&record.metadata), record.remarks.as_ref(), Some(&record.byline)]
                    .into_iter()
                    .flatten()
                {
                    let converted = markdown(fragment);
                    if !converted.is_empty() {
                        out.push_str(&converted);
                        out.push_str("\n\n");
                    }
                }
                for comment in &record.comments {
                    self.comment(&mut out, comment);
                }
            }
        }
        out
    }
}

fn markdown(fragment: &str) -> String {
    html2md::parse_html(fragment).trim().to_owned()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
