mod cli;
mod output;
mod sink;

use clap::Parser;
use quill_core::{LoadOptions, Quill, SnapshotStream, check_api_key, pump};
use std::io::{self, ErrorKind};

use crate::cli::{Cli, CliCommand, read_code};
use crate::output::OutputHandler;

/// Push a workflow's snapshots to the display chosen by the output mode.
async fn display(snapshots: SnapshotStream, output: &OutputHandler) -> io::Result<()> {
    let mut sink = output.display_sink(*snapshots.aggregator().cleanup());
    let last = pump(snapshots, sink.as_mut()).await?;
    output.diagnostic(&format!(
        "[Done: {} snapshot(s)]",
        last.map_or(0, |s| s.index() + 1)
    ));
    Ok(())
}

async fn run(cli: Cli, output: &OutputHandler) -> io::Result<()> {
    let quill = Quill::load(LoadOptions {
        home: cli.home,
        debug: cli.debug,
    })?;
    output.diagnostic(&format!("[Home: {}]", quill.config.home.display()));

    match cli.command {
        CliCommand::CheckKey { provider } => {
            let key = quill.config.provider(provider).api_key.as_deref();
            let check = check_api_key(provider, key);
            if check.is_ok() {
                output.emit_result(&check.message(provider));
                Ok(())
            } else {
                Err(io::Error::new(ErrorKind::InvalidData, check.message(provider)))
            }
        }
        CliCommand::Brochure {
            company,
            url,
            generation,
        } => {
            let provider = quill.provider(generation.provider)?;
            output.diagnostic(&format!("[Fetching {} for {}]", url, provider.kind()));
            let snapshots = quill
                .brochure(provider.as_ref(), &company, &url, &generation.options())
                .await?;
            display(snapshots, output).await
        }
        CliCommand::Explain {
            file,
            code,
            generation,
        } => {
            let code = read_code(file.as_deref(), code.as_deref())?;
            let provider = quill.provider(generation.provider)?;
            output.diagnostic(&format!(
                "[Explaining {} byte(s) with {}]",
                code.len(),
                provider.kind()
            ));
            let snapshots = quill.explain(provider.as_ref(), &code, &generation.options())?;
            display(snapshots, output).await
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let output = OutputHandler::new(cli.json, cli.verbose);
    run(cli, &output).await
}
