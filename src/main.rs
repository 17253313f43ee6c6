mod cli;
mod error;
mod logging;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;
use trove_config::Config;
use trove_index::{Database, Repository};
use trove_library::Pipeline;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "trove failed");
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())
        .or_raise(|| ErrorKind::Config)?
        .with_overrides(cli.input, cli.library);
    config.validate().or_raise(|| ErrorKind::Config)?;

    for directory in [config.input.clone(), config.library.clone(), config.scratch_root(), config.log_dir()] {
        tokio::fs::create_dir_all(&directory).await.or_raise(|| ErrorKind::Bootstrap)?;
    }
    let _guard = logging::init(&config.log_dir(), cli.verbose).or_raise(|| ErrorKind::Logging)?;
    tracing::info!(
        input = %config.input.display(),
        library = %config.library.display(),
        scratch = %config.scratch_root().display(),
        index = %config.index_path().display(),
        logs = %config.log_dir().display(),
        "starting trove"
    );

    let db = Database::connect(config.index_path()).await.or_raise(|| ErrorKind::Index)?;
    let pipeline = Pipeline::new(Arc::new(config), Repository::from(&db));
    let result = if cli.reindex {
        let library = pipeline.config().library.clone();
        pipeline.run_reindex(&library).await.map(|summary| {
            tracing::info!(indexed = summary.indexed, errors = summary.errors, "reindex finished");
        })
    } else {
        pipeline.run().await.map(|summary| {
            tracing::info!(
                archives_extracted = summary.archives_extracted,
                archives_failed = summary.archives_failed,
                files_added = summary.files_added,
                duplicates = summary.duplicates,
                errors = summary.errors,
                "ingest finished"
            );
        })
    };
    db.close().await;
    result.or_raise(|| ErrorKind::Run)
}
