use crate::formats::Section;

/// Rank the site assigns to groupings outside the formal hierarchy
/// ("unidentified larvae", "mostly pale spp", ...).
const NO_TAXON_RANK: &str = "No Taxon";

/// One breadcrumb-delimited block of record links on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGroup {
    pub breadcrumbs: String,
    pub rank: String,
    pub taxon: String,
    pub own_page: String,
    pub record_links: Vec<String>,
}

pub fn normalize_rank(raw: &str) -> String {
    let raw = raw.trim();
    if raw == NO_TAXON_RANK {
        return "section".to_owned();
    }
    raw.to_lowercase()
}

/// Returns the section the group's records belong to, starting a new one when
/// the breadcrumb path differs from the most recent section.
///
/// Only the last section is compared: a path that reappears after a different
/// one opens a fresh section, matching the depth-first order of the listing.
pub fn accumulate<'a>(
    sections: &'a mut Vec<Section>,
    group: &PageGroup,
    parent_page: &str,
) -> &'a mut Section {
    let continues = sections
        .last()
        .is_some_and(|last| last.title == group.breadcrumbs);

    if !continues {
        tracing::debug!(title = %group.breadcrumbs, "start section");
        sections.push(Section {
            title: group.breadcrumbs.clone(),
            rank: normalize_rank(&group.rank),
            taxon: group.taxon.clone(),
            own_page: group.own_page.clone(),
            parent_page: parent_page.to_owned(),
            records: Vec::new(),
        });
    }

    let last = sections.len() - 1;
    &mut sections[last]
}
