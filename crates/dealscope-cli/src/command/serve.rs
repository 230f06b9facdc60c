use std::{io, num::NonZeroUsize, thread};

use dealscope_service::serve_lines;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ServeArg {
    /// Number of worker threads (defaults to the available parallelism)
    #[arg(long)]
    workers: Option<NonZeroUsize>,
}

pub(crate) fn run(arg: &ServeArg) -> anyhow::Result<()> {
    let workers = match arg.workers {
        Some(workers) => workers,
        None => thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
    };
    tracing::info!(workers = workers.get(), "serving JSON-lines requests from stdin");
    let summary = serve_lines(io::stdin().lock(), io::stdout(), workers)?;
    tracing::info!(
        requests = summary.requests,
        failures = summary.failures,
        "input closed, all responses written"
    );
    Ok(())
}
