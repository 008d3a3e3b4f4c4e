use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cancel::CancelFlag;
use crate::cli::ExportArgs;
use crate::filter::{FilterOptions, FilterPipeline, Screener, filter_snapshot};
use crate::render::{Renderer, renderer_for};
use crate::report::{RecordObserver, Reporter};
use crate::screen::DialogScreener;
use crate::snapshot_store::{SnapshotStore, output_path, read_snapshot, write_new_or_replace};

pub fn run(args: ExportArgs, cancel: &CancelFlag) -> anyhow::Result<()> {
    let store = SnapshotStore::new(&args.data_dir);
    let input = store.resolve(&args.taxon)?;

    let options = FilterOptions {
        ignore_moves: args.ignore_moves,
        screen: args.screen,
        verbose: args.verbose,
    };
    let screener = DialogScreener::new();
    if args.screen && !screener.is_available() {
        anyhow::bail!("--screen needs an interactive terminal on stdin and stderr");
    }
    let pipeline = FilterPipeline::new(options, screener, Reporter::stderr());
    let renderer = renderer_for(args.format);

    let stem = match &args.fname {
        Some(name) => name.clone(),
        None => input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .with_context(|| format!("snapshot path has no file name: {}", input.display()))?,
    };

    let out = export_snapshot(
        &input,
        Path::new(&args.out_dir),
        &stem,
        pipeline,
        renderer.as_ref(),
        args.replace,
        cancel,
    )?;
    tracing::info!(path = %out.display(), "comments exported");
    Ok(())
}

/// Filters the snapshot at `input` and writes the rendered document into
/// `out_dir`. Whatever was accepted before a quit, interrupt or screening
/// failure is still written; a failure is reported after the write.
pub fn export_snapshot<S: Screener, O: RecordObserver>(
    input: &Path,
    out_dir: &Path,
    stem: &str,
    mut pipeline: FilterPipeline<S, O>,
    renderer: &dyn Renderer,
    replace: bool,
    cancel: &CancelFlag,
) -> anyhow::Result<PathBuf> {
    let snapshot = read_snapshot(input)?;
    tracing::info!(
        snapshot = %input.display(),
        date = %snapshot.snapshot_date,
        "exporting comments"
    );

    let filtered = filter_snapshot(snapshot, &mut pipeline, cancel);
    if filtered.aborted {
        tracing::info!("writing records accepted so far");
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create export output dir: {}", out_dir.display()))?;
    let out = output_path(out_dir, stem, renderer.extension(), replace);
    let document = renderer.render(&filtered.snapshot);
    write_new_or_replace(&out, document.as_bytes(), replace)?;

    match filtered.failure {
        Some(err) => Err(err.context(format!(
            "screening stopped early; accepted records were written to {}",
            out.display()
        ))),
        None => Ok(out),
    }
}
