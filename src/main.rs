//! CLI entry point for `mailsearch`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailsearch::config::{self, Config};
use mailsearch::{KeyFile, Mail, SearchEngine, SearchResult, TagCount};

#[derive(Parser)]
#[command(
    name = "mailsearch",
    version,
    about = "Encrypted local full-text search over a mail store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Mail agent home holding the index (default: ~/.leap)
    #[arg(long, global = true, value_name = "DIR", env = "MAILSEARCH_HOME")]
    home: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Index mails from a JSON array file, as one atomic batch
    Index {
        #[arg(value_name = "FILE.json")]
        path: PathBuf,
    },
    /// Search indexed mails
    Search {
        query: String,
        /// Page size
        #[arg(long)]
        window: Option<usize>,
        /// Page number, starting at 1
        #[arg(long, allow_negative_numbers = true)]
        page: Option<i64>,
        /// Return every match instead of one page
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show per-tag mail counts
    Tags {
        /// Only tags whose name contains this text
        #[arg(long)]
        query: Option<String>,
        /// Leave out inbox, sent, drafts and trash
        #[arg(long)]
        skip_defaults: bool,
        #[arg(long)]
        json: bool,
    },
    /// List addresses from earlier mails matching a filter
    Contacts { query: String },
    /// Remove a mail from the index
    Remove { ident: String },
    /// Fold pending commits into the base index file
    Compact,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();
    if let Some(home) = cli.home {
        config.general.agent_home = Some(home);
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Index { path } => cmd_index(&config, &path),
        Commands::Search {
            query,
            window,
            page,
            all,
            json,
        } => cmd_search(&config, &query, window, page, all, json),
        Commands::Tags {
            query,
            skip_defaults,
            json,
        } => cmd_tags(&config, query.as_deref(), skip_defaults, json),
        Commands::Contacts { query } => cmd_contacts(&config, &query),
        Commands::Remove { ident } => cmd_remove(&config, &ident),
        Commands::Compact => cmd_compact(&config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_default();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path.file_name().unwrap_or_default();
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn open_engine(config: &Config) -> anyhow::Result<SearchEngine> {
    let key = KeyFile::new(config::key_file_path(config));
    SearchEngine::from_config(config, &key).with_context(|| {
        format!(
            "Cannot open search index in {}",
            config::index_dir(config).display()
        )
    })
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailsearch", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Index every mail of a JSON file in one batch.
fn cmd_index(config: &Config, path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let mails: Vec<Mail> = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a JSON array of mails", path.display()))?;
    let count = mails.len();

    let engine = open_engine(config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .expect("valid template"),
    );
    pb.set_message(format!("Indexing {count} mail(s)"));
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let result = engine.index_mails(&mails, Some(&|| pb.finish_and_clear()));
    pb.finish_and_clear();
    result?;

    println!();
    println!("  {:<20} {}", "Indexed", count);
    println!("  {:<20} {}", "Documents", engine.document_count());
    println!("  {:<20} {}", "Index", engine.index_dir().display());
    println!("  {:<20} {:.2?}", "Time", start.elapsed());
    println!();
    Ok(())
}

fn cmd_search(
    config: &Config,
    query: &str,
    window: Option<usize>,
    page: Option<i64>,
    all: bool,
    json: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let result = engine.search(query, window, page, all)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    match &result {
        SearchResult::All(idents) => println!("  {} result(s)", idents.len()),
        SearchResult::Page(p) => println!(
            "  {} result(s) on this page, {} tag match(es) overall",
            p.idents.len(),
            p.total
        ),
    }
    println!();
    for (i, ident) in result.idents().iter().enumerate() {
        println!("  {:<4} {}", i + 1, ident);
    }
    if !result.idents().is_empty() {
        println!();
    }
    Ok(())
}

fn cmd_tags(
    config: &Config,
    query: Option<&str>,
    skip_defaults: bool,
    json: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let tags = engine.tags(query, skip_defaults)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    } else {
        print_tags_table(&tags);
    }
    Ok(())
}

/// Print tag counts as a human-readable table.
fn print_tags_table(tags: &[TagCount]) {
    println!();
    println!("  {:<30} {:>8} {:>8}", "Tag", "Total", "Read");
    println!("  {}", "-".repeat(48));
    for tag in tags {
        let name: String = tag.name.chars().take(28).collect();
        let marker = if tag.default { "*" } else { " " };
        println!(
            "  {marker}{:<29} {:>8} {:>8}",
            name, tag.counts.total, tag.counts.read
        );
    }
    println!();
}

fn cmd_contacts(config: &Config, query: &str) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    for address in engine.contacts(query)? {
        println!("{address}");
    }
    Ok(())
}

fn cmd_remove(config: &Config, ident: &str) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    engine.remove_from_index(ident)?;
    println!("  Removed {ident} ({} document(s) left)", engine.document_count());
    Ok(())
}

fn cmd_compact(config: &Config) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    engine.compact()?;
    println!("  Compacted index ({} document(s))", engine.document_count());
    Ok(())
}
