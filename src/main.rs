// Crewloop - developer/debugger code-generation loop
// Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crewloop::config::{load_config, Config};
use crewloop::crew::{DevelopmentLoop, ProgressEvent};
use crewloop::logging::init_tracing;
use crewloop::providers::create_provider;
use crewloop::server;

#[derive(Parser)]
#[command(author, version, about = "Developer/debugger code-generation loop")]
struct Cli {
    /// Config file (default: ~/.crewloop/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        /// Address to listen on (overrides config and environment)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run one development loop and print its events to stdout
    Run {
        /// Requirements text (read from stdin when omitted)
        #[arg(short, long, conflicts_with = "file")]
        requirements: Option<String>,
        /// Read requirements from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Iteration budget (default from config)
        #[arg(short = 'n', long)]
        max_iterations: Option<u32>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            server::serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            requirements,
            file,
            max_iterations,
        } => cmd_run(config, requirements, file.as_deref(), max_iterations).await,
        Command::Config => {
            print!("{}", config.redacted().to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn cmd_run(
    config: Config,
    requirements: Option<String>,
    file: Option<&Path>,
    max_iterations: Option<u32>,
) -> Result<ExitCode> {
    let requirements = match (requirements, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read requirements from {}", path.display()))?,
        (None, None) => {
            eprintln!("Enter your development requirements (press Enter twice to submit):");
            read_requirements(std::io::stdin().lock())?
        }
    };

    if let Some(event) = missing_requirements(&requirements) {
        print_event(&event)?;
        return Ok(ExitCode::FAILURE);
    }

    let max_iterations = config.effective_max_iterations(max_iterations.map(|n| n.max(1)));
    let provider = create_provider(&config.provider)?;
    let runner = Arc::new(DevelopmentLoop::from_config(provider, &config));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling run");
            ctrl_c.cancel();
        }
    });

    let mut events = runner.spawn(requirements, max_iterations, cancel);
    let mut succeeded = false;
    while let Some(event) = events.recv().await {
        print_event(&event)?;
        if event.is_terminal() {
            succeeded = event
                .result
                .as_ref()
                .is_some_and(|result| !matches!(result, crewloop::crew::LoopResult::Failed { .. }));
        }
    }

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// The single `error` event a run prints when there is nothing to build.
fn missing_requirements(requirements: &str) -> Option<ProgressEvent> {
    requirements
        .trim()
        .is_empty()
        .then(|| ProgressEvent::error("No requirements provided. Exiting."))
}

/// One SSE-style `data: <json>` frame per event, flushed so pipes see it
/// immediately.
fn print_event(event: &ProgressEvent) -> Result<()> {
    write_event(&mut std::io::stdout().lock(), event)
}

fn write_event<W: Write>(out: &mut W, event: &ProgressEvent) -> Result<()> {
    out.write_all(event.to_sse_frame()?.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Read lines until the first empty line or end of input.
fn read_requirements<R: BufRead>(reader: R) -> Result<String> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read requirements from stdin")?;
        if line.is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_requirements_stops_at_blank_line() {
        let input = Cursor::new("build a login form\nwith remember-me\n\nignored\n");
        assert_eq!(
            read_requirements(input).unwrap(),
            "build a login form\nwith remember-me"
        );
    }

    #[test]
    fn test_read_requirements_eof() {
        assert_eq!(read_requirements(Cursor::new("one line")).unwrap(), "one line");
        assert_eq!(read_requirements(Cursor::new("")).unwrap(), "");
    }

    #[test]
    fn test_blank_requirements_print_one_error_event() {
        assert!(missing_requirements("build a page").is_none());

        let event = missing_requirements("  \n\t").unwrap();
        let mut out = Vec::new();
        write_event(&mut out, &event).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("data: ") && out.ends_with("\n\n"));
        assert_eq!(out.matches("data: ").count(), 1);

        let json: serde_json::Value =
            serde_json::from_str(out.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "No requirements provided. Exiting.");
        assert_eq!(json["progress"], 0);
        assert_eq!(json["result"]["status"], "failed");
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["crewloop", "-vv", "run", "-r", "make a page", "-n", "3"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run {
                requirements,
                max_iterations,
                ..
            } => {
                assert_eq!(requirements.as_deref(), Some("make a page"));
                assert_eq!(max_iterations, Some(3));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_rejects_requirements_and_file_together() {
        assert!(Cli::try_parse_from(["crewloop", "run", "-r", "x", "-f", "req.txt"]).is_err());
    }
}
