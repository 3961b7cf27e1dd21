use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recording_analyzer::cli::{Cli, Commands};
use recording_analyzer::config::Config;
use recording_analyzer::{output, utils, AnalysisPipeline};

fn init_tracing(verbose: bool, json_logs: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("recording_analyzer=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "recording_analyzer=info".into())
    };

    // stdout carries the report, logs go to stderr
    let json_layer = json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Cancel `token` on the first Ctrl-C, exit on the second
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Received Ctrl+C, cancelling (press again to exit immediately)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let mut config = Config::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Analyze {
            object_key,
            filename,
            prompt,
            prompt_file,
            storage_root,
            format,
            output,
        } => {
            if let Some(root) = storage_root {
                config.storage.root = root;
            }

            let prompt = match prompt_file {
                Some(path) => Some(
                    fs_err::read_to_string(&path).context("Failed to read prompt file")?,
                ),
                None => prompt,
            };

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let pipeline = AnalysisPipeline::from_config(config)
                .context("Analysis failed")?
                .with_cancellation(cancel)
                .with_progress(!cli.quiet);

            let result = pipeline
                .analyze(&object_key, filename.as_deref(), prompt.as_deref())
                .await
                .with_context(|| format!("Analysis of '{}' failed", object_key))?;

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format).await?;
                    println!("Analysis saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, &format)?;
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = Config::resolve_path(cli.config.as_deref())?;
                println!("Configuration file: {}", path.display());
                println!("Edit it, or set TWELVELABS_API_KEY and TWELVELABS_INDEX_ID; use --show to print the effective values.");
            }
        }
        Commands::Check => {
            let missing_deps = utils::check_dependencies(&config.media.ffmpeg_path);
            if missing_deps.is_empty() {
                println!("All external tools are available");
            } else {
                eprintln!("Missing tools:");
                for dep in &missing_deps {
                    eprintln!("   • {}", dep);
                }
                anyhow::bail!("{} required tool(s) missing", missing_deps.len());
            }
        }
    }

    Ok(())
}
