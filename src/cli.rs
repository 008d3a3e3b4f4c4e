use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::fetch::DEFAULT_DELAY_MS;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download record data for a taxon into a snapshot.
    Import(ImportArgs),
    /// Filter a saved snapshot and render its comments to a document.
    Export(ExportArgs),
    /// Summarize the snapshots downloaded so far.
    List(ListArgs),
}

/// How editors' "Moved from ___." notices are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum IgnoreMoves {
    /// Keep every comment.
    #[default]
    None,
    /// Drop every move notice, even inside a conversation.
    Always,
    /// Keep the whole thread when it has any real commentary.
    Nochat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Html,
    Md,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Starting URL in the guide's Images tab for a taxon.
    pub url: String,

    /// Stop after checking this many listing pages.
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub pgcount: Option<u32>,

    /// Stop after checking this many images.
    #[arg(short = 'i', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub imgcount: Option<u32>,

    /// Overwrite an existing snapshot for this taxon.
    #[arg(short = 'r', long)]
    pub replace: bool,

    /// Print comment text as records are read.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Filter records before they are stored; `none` stores every record.
    #[arg(long, value_enum, default_value_t = IgnoreMoves::None)]
    pub ignore_moves: IgnoreMoves,

    /// Directory holding snapshot files.
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Delay between requests (crawl-delay).
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    pub delay_ms: u64,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Snapshot name (as shown by `list`) or path to a snapshot file.
    pub taxon: String,

    /// Show each record's comments and ask before exporting it.
    #[arg(long)]
    pub screen: bool,

    /// Skip editors' automated move notices.
    #[arg(long, value_enum, default_value_t = IgnoreMoves::None)]
    pub ignore_moves: IgnoreMoves,

    /// Output file name (without extension); defaults to the snapshot name.
    #[arg(long)]
    pub fname: Option<String>,

    /// Overwrite an existing output file.
    #[arg(short = 'r', long)]
    pub replace: bool,

    /// Print comment text as records are exported.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = ExportFormat::Html)]
    pub format: ExportFormat,

    /// Directory holding snapshot files.
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Directory for rendered documents.
    #[arg(long, default_value = "comments")]
    pub out_dir: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Directory holding snapshot files.
    #[arg(long, default_value = "data")]
    pub data_dir: String,
}
