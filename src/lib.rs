#![forbid(unsafe_code)]

pub mod cancel;
pub mod cli;
pub mod comment;
pub mod crawl;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod formats;
pub mod list;
pub mod logging;
pub mod parse;
pub mod render;
pub mod report;
pub mod screen;
pub mod sections;
pub mod snapshot_store;
