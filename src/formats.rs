use serde::{Deserialize, Serialize};

/// One crawl run, as persisted to `<data-dir>/<taxon>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_date: String,
    pub header: Header,
    pub parent_rank: String,
    pub start_url: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub html: String,
    pub plain: String,
}

/// Records grouped under one breadcrumb path. A section may span several
/// listing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub rank: String,
    pub taxon: String,
    pub own_page: String,
    pub parent_page: String,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub url: String,
    #[serde(rename = "img")]
    pub image_url: String,
    pub title: String,
    pub metadata: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub byline: String,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "subj")]
    pub subject: String,
    pub body: String,
    pub byline: String,
    pub depth: u32,
}
