use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;
use guidechat::cancel::CancelFlag;
use guidechat::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    guidechat::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Import(args) => {
            let cancel = CancelFlag::on_ctrl_c();
            guidechat::crawl::run(args, cancel).await.context("import")?;
        }
        Command::Export(args) => {
            let cancel = CancelFlag::on_ctrl_c();
            // Screening blocks on stdin.
            tokio::task::block_in_place(|| guidechat::export::run(args, &cancel))
                .context("export")?;
        }
        Command::List(args) => {
            guidechat::list::run(args).context("list")?;
        }
    }

    Ok(())
}
