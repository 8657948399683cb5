//! redline CLI: inspect and update review annotations from the terminal.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use redline::config::{CONFIG_FILE, Config};
use redline::document::Document;
use redline::error::RedlineError;
use redline::model::{AnnotationStatus, PageNote, ReplyAuthor, StoreRecord};
use redline::session::{AnnotationReport, ReviewSession};
use redline::store::AnnotationStore;

#[derive(Parser)]
#[command(name = "redline", version, about = "Review annotations that survive edits")]
struct Cli {
    /// Config file.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Annotation store, overriding the config.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List annotations.
    List {
        /// Only annotations on this page URL.
        #[arg(long)]
        page: Option<String>,
    },

    /// List page notes.
    Notes {
        #[arg(long)]
        page: Option<String>,
    },

    /// Print the store's change fingerprint.
    Fingerprint,

    /// Set an annotation's lifecycle status.
    Status {
        id: String,
        /// open, in_progress, addressed or resolved.
        status: AnnotationStatus,
    },

    /// Append a reply to an annotation's thread.
    Reply {
        id: String,
        #[arg(long, default_value = "agent")]
        author: ReplyAuthor,
        text: String,
    },

    /// Delete an annotation or page note.
    Delete { id: String },

    /// Add a page note.
    Note {
        #[arg(long)]
        page: String,
        #[arg(long, default_value = "")]
        title: String,
        text: String,
    },

    /// Re-anchor a page's annotations against an HTML snapshot.
    ///
    /// A single check can only report `anchored` or `checking`: the grace
    /// period starts at the first miss. Use `--follow` to keep re-checking
    /// the file every poll interval until annotations settle into `orphaned`.
    Check {
        #[arg(long)]
        page: String,
        /// HTML file to anchor against.
        html: PathBuf,
        /// Re-read the HTML file and the store every poll interval until Ctrl+C.
        #[arg(long)]
        follow: bool,
    },

    /// Print a line whenever the store changes. Ctrl+C exits.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (config, store) = open(&cli)?;

    match cli.command {
        Commands::List { page } => {
            let record = store.read().await?;
            let annotations: Vec<_> = record
                .annotations
                .iter()
                .filter(|a| page.as_deref().is_none_or(|p| a.base().page_url == p))
                .collect();
            if annotations.is_empty() {
                println!("No annotations.");
            } else {
                println!("Annotations ({}):", annotations.len());
                for a in annotations {
                    let base = a.base();
                    println!(
                        "  {} [{}] {:<11} {}  {}",
                        base.id,
                        a.kind(),
                        base.status,
                        a.label(),
                        base.page_url
                    );
                    println!("      note: {}", base.note);
                    for reply in &base.replies {
                        println!("      {} ({}): {}", reply.author, reply.created_at, reply.text);
                    }
                }
            }
        }

        Commands::Notes { page } => {
            let record = store.read().await?;
            let notes: Vec<&PageNote> = match page.as_deref() {
                Some(url) => record.page_notes_for(url).collect(),
                None => record.page_notes.iter().collect(),
            };
            if notes.is_empty() {
                println!("No page notes.");
            } else {
                println!("Page notes ({}):", notes.len());
                for n in notes {
                    println!("  {} {}  {}", n.id, n.page_url, n.note);
                }
            }
        }

        Commands::Fingerprint => {
            println!("{}", store.fingerprint().await?);
        }

        Commands::Status { id, status } => {
            let target = id.clone();
            store
                .mutate(move |mut record| {
                    let annotation = record
                        .annotation_mut(&target)
                        .ok_or_else(|| format!("no annotation with id {target}"))?;
                    annotation.set_status(status, Utc::now());
                    Ok(record)
                })
                .await?;
            println!("{id}: {status}");
        }

        Commands::Reply { id, author, text } => {
            let target = id.clone();
            store
                .mutate(move |mut record| {
                    let annotation = record
                        .annotation_mut(&target)
                        .ok_or_else(|| format!("no annotation with id {target}"))?;
                    annotation.add_reply(author, text, Utc::now());
                    Ok(record)
                })
                .await?;
            println!("Replied to {id} as {author}.");
        }

        Commands::Delete { id } => {
            let target = id.clone();
            store
                .mutate(move |mut record| {
                    let removed = record.remove_annotation(&target).is_some()
                        || record.remove_page_note(&target).is_some();
                    if !removed {
                        return Err(format!("no annotation or page note with id {target}").into());
                    }
                    Ok(record)
                })
                .await?;
            println!("Deleted {id}.");
        }

        Commands::Note { page, title, text } => {
            let note = PageNote::new(page, title, text, Utc::now());
            let id = note.id.clone();
            store
                .mutate(move |mut record| {
                    record.insert_page_note(note);
                    Ok(record)
                })
                .await?;
            println!("Added page note {id}.");
        }

        Commands::Check { page, html, follow } => {
            let mut session = ReviewSession::new(store, &config);
            session.refresh().await?;
            let (doc, record) = snapshot(&session, &html).await?;
            print_reports(&page, &session.check_page(&doc, &record, &page));

            if follow {
                let mut tick = tokio::time::interval(config.poll_interval());
                tick.tick().await;
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            session.refresh().await?;
                            let (doc, record) = snapshot(&session, &html).await?;
                            println!("{}", Utc::now().to_rfc3339());
                            print_reports(&page, &session.check_page(&doc, &record, &page));
                        }
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!("check stopped");
                            break;
                        }
                    }
                }
            }
        }

        Commands::Watch => {
            let mut session = ReviewSession::new(store, &config);
            session.refresh().await?;
            println!(
                "Watching {} at {} (Ctrl+C to stop)",
                session.store().path().display(),
                session.fingerprint().map_or("-", |fp| fp.as_str())
            );
            let mut tick = tokio::time::interval(config.poll_interval());
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        match session.refresh().await {
                            Ok(Some(fp)) => println!("{} changed: {fp}", Utc::now().to_rfc3339()),
                            Ok(None) => {}
                            Err(e) => tracing::warn!(error = %e, "fingerprint poll failed"),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("watch stopped");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Config plus the store it points at, with `--store` taking precedence.
fn open(cli: &Cli) -> std::result::Result<(Config, AnnotationStore), RedlineError> {
    let config = Config::load(&cli.config)?;
    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path.clone());
    let store = AnnotationStore::open(store_path)?;
    Ok((config, store))
}

/// Current HTML file and store record.
async fn snapshot(session: &ReviewSession, html: &Path) -> Result<(Document, StoreRecord)> {
    let source = std::fs::read_to_string(html).into_diagnostic()?;
    let record = session.store().read().await?;
    Ok((Document::parse(&source), record))
}

fn print_reports(page: &str, reports: &[AnnotationReport]) {
    if reports.is_empty() {
        println!("No annotations for {page}.");
    }
    for report in reports {
        let tier = report.tier.map_or("-", |t| t.as_str());
        println!(
            "  {} {:<9} {:<12} {:<11} {}",
            report.id, report.state, tier, report.status, report.label
        );
    }
}
