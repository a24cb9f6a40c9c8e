use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use decider_lens::config::Config;
use decider_lens::model::{CandidateRef, Position, RecordKind};
use decider_lens::scheduler::RefreshOutcome;
use decider_lens::{format, Lens};

#[derive(Parser, Debug)]
#[command(
    name = "decider-lens",
    version,
    about = "Completion and hover documentation for deciders and experiments",
    long_about = "Fetches decider and experiment records, caches them locally, and \
        answers completion and hover queries the same way the language server does.\n\n\
        Examples:\n  \
        decider-lens refresh\n  \
        decider-lens search growth --kind decider\n  \
        decider-lens complete app.py --line 12 --character 20\n  \
        decider-lens hover app.py --line 12 --character 14\n  \
        decider-lens detail growth_feature_a\n  \
        decider-lens lsp"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "json",
        help = "Output format",
        long_help = "Output format.\n  json     (default, best for programmatic use)\n  markdown (human-readable)"
    )]
    format: OutputFormat,

    #[arg(long, global = true, help = "Override the records API base URL")]
    api_url: Option<String>,

    #[arg(long, global = true, help = "Override the state database path")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch deciders and experiments and replace the cached snapshot
    Refresh,

    /// Show what the local cache holds
    Status,

    /// Fuzzy search over cached keys
    Search {
        /// Partial key
        query: String,

        #[arg(long, short, help = "Only search deciders or experiments")]
        kind: Option<RecordKind>,

        #[arg(long, short, default_value = "20", help = "Maximum number of results")]
        limit: usize,
    },

    /// Completion candidates at a position in a file ("-" reads stdin)
    Complete {
        file: PathBuf,

        #[arg(long, help = "Zero-based line")]
        line: usize,

        #[arg(long, help = "Zero-based UTF-16 column")]
        character: usize,
    },

    /// Full documentation for a cached key (exit code 1 = not found)
    Detail {
        key: String,

        #[arg(long, short, help = "Disambiguate when both kinds share the key")]
        kind: Option<RecordKind>,
    },

    /// Hover documentation at a position in a file (exit code 1 = nothing to show)
    Hover {
        file: PathBuf,

        #[arg(long, help = "Zero-based line")]
        line: usize,

        #[arg(long, help = "Zero-based UTF-16 column")]
        character: usize,
    },

    /// Start the Language Server Protocol server (stdio)
    Lsp,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Handle SIGPIPE gracefully (prevents broken pipe panics when piped through head/less)
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries command output and the LSP stream.
fn init_logging(config: &Config) {
    tracing_subscriber::registry()
        .with(config.log_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::from_env();
    init_logging(&config);

    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    tracing::debug!("Database path: {:?}", config.db_path);

    let lens = Lens::from_config(&config)?;

    match cli.command {
        Command::Refresh => {
            let outcome = lens.refresh_now().await;
            print_output(&cli.format, &outcome, format::refresh);
            Ok(match outcome {
                RefreshOutcome::Failed { .. } => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        }

        Command::Status => {
            print_output(&cli.format, &lens.status(), format::status);
            Ok(ExitCode::SUCCESS)
        }

        Command::Search { query, kind, limit } => {
            let result = lens.search(&query, kind, limit);
            print_output(&cli.format, &result, format::search);
            Ok(ExitCode::SUCCESS)
        }

        Command::Complete {
            file,
            line,
            character,
        } => {
            let text = read_document(&file)?;
            let candidates = lens.resolve_completions(&text, Position { line, character });
            print_output(&cli.format, &candidates, |c| format::completions(c));
            Ok(ExitCode::SUCCESS)
        }

        Command::Detail { key, kind } => {
            let kind = match kind {
                Some(kind) => Some(kind),
                None => lens
                    .store()
                    .get()
                    .and_then(|snapshot| snapshot.find(&key).map(|r| r.kind())),
            };
            let Some(kind) = kind else {
                eprintln!("{key} not found");
                return Ok(ExitCode::from(1));
            };

            let candidate = CandidateRef {
                key: key.clone(),
                kind,
            };
            match lens.resolve_detail(&candidate).await {
                Some(detail) => {
                    print_output(&cli.format, &detail, |d| format::detail(&key, d));
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("{key} not found");
                    Ok(ExitCode::from(1))
                }
            }
        }

        Command::Hover {
            file,
            line,
            character,
        } => {
            let text = read_document(&file)?;
            match lens.resolve_hover(&text, Position { line, character }).await {
                Some(hover) => {
                    print_output(&cli.format, &hover, format::hover);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("no hover");
                    Ok(ExitCode::from(1))
                }
            }
        }

        Command::Lsp => {
            decider_lens::lsp::serve_stdio(lens).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("reading stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Print output in the requested format
fn print_output<T: serde::Serialize>(
    fmt: &OutputFormat,
    value: &T,
    markdown_fn: impl FnOnce(&T) -> String,
) {
    match fmt {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).expect("serialization failed")
            );
        }
        OutputFormat::Markdown => {
            print!("{}", markdown_fn(value));
        }
    }
}
