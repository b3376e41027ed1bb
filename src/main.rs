//! # TrendRadar CLI (`radar`)
//!
//! Fetches items from the configured sources into SQLite and queries them
//! back ranked by score plus keyword relevance.
//!
//! ## Usage
//!
//! ```bash
//! radar --config ./config/radar.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `radar init` | Create the database and seed sources + keywords from config |
//! | `radar sources` | List sources; `enable` / `disable` by id |
//! | `radar fetch` | Run one fetch cycle over the enabled sources |
//! | `radar items` | Query stored items with filters |
//! | `radar bookmarks` | List, add, update, remove bookmarks |
//! | `radar keywords` | Manage relevance keywords |
//! | `radar searches` | Saved searches and recent history |
//! | `radar stats` | Database overview |
//! | `radar serve` | Start the JSON HTTP API |
//! | `radar completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! radar init
//! radar fetch --source hn
//! radar items --search "claude code" --since 2025-06-01 --limit 20
//! radar items --sort-by published_at --order asc --json
//! radar keywords add claude --weight 3
//! radar serve
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change the filter.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use trendradar::bookmarks::{self, BookmarkUpdate};
use trendradar::config;
use trendradar::ingest;
use trendradar::keywords;
use trendradar::saved_search;
use trendradar::search::{self, effective_limit, parse_date_bound};
use trendradar::server;
use trendradar::sources;
use trendradar::stats;
use trendradar::store::{ItemFilter, SortKey, SortOrder};

/// TrendRadar: a source aggregation and ranking engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/radar.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "radar",
    about = "TrendRadar: aggregate releases, repos, models and feeds, ranked by relevance",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/radar.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and seed sources and keywords.
    ///
    /// Idempotent. Re-running refreshes source definitions from the config
    /// but keeps each source's enabled flag and last fetch time.
    Init,

    /// List sources, or enable / disable one.
    Sources {
        #[command(subcommand)]
        action: Option<SourcesAction>,
    },

    /// Run one fetch cycle over the enabled sources.
    ///
    /// Sources inside their rate-limit window are skipped. A failing
    /// source is reported and does not stop the others.
    Fetch {
        /// Only fetch this source id.
        #[arg(long)]
        source: Option<String>,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Query stored items.
    Items {
        /// Restrict to these source ids (repeatable).
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Free-text search over title and description.
        #[arg(long)]
        search: Option<String>,

        /// Published on or after this date (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        since: Option<String>,

        /// Published on or before this date (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        until: Option<String>,

        #[arg(long)]
        score_min: Option<f64>,

        #[arg(long)]
        score_max: Option<f64>,

        /// Only bookmarked items.
        #[arg(long)]
        bookmarks_only: bool,

        /// score, published_at, stars, title, source, or created_at.
        #[arg(long, default_value = "score")]
        sort_by: SortKey,

        /// asc or desc.
        #[arg(long, default_value = "desc")]
        order: SortOrder,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Print the result page as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage bookmarks.
    Bookmarks {
        #[command(subcommand)]
        action: Option<BookmarksAction>,
    },

    /// Manage relevance keywords.
    Keywords {
        #[command(subcommand)]
        action: Option<KeywordsAction>,
    },

    /// Saved searches and search history.
    Searches {
        #[command(subcommand)]
        action: Option<SearchesAction>,
    },

    /// Show database statistics.
    Stats,

    /// Start the JSON HTTP API on `[server].bind`.
    Serve,

    /// Print a shell completion script to stdout.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum SourcesAction {
    List,
    Enable { id: String },
    Disable { id: String },
}

#[derive(Subcommand)]
enum BookmarksAction {
    List,
    Add {
        item_id: String,
        #[arg(long)]
        note: Option<String>,
        /// Tag (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Update {
        item_id: String,
        #[arg(long)]
        note: Option<String>,
        /// Replace tags (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        reviewed: Option<bool>,
    },
    Remove {
        item_id: String,
    },
}

#[derive(Subcommand)]
enum KeywordsAction {
    List,
    /// Add a keyword, or update its weight.
    Add {
        keyword: String,
        #[arg(long, default_value_t = 1.0)]
        weight: f64,
    },
    Remove {
        keyword: String,
    },
}

#[derive(Subcommand)]
enum SearchesAction {
    List,
    Save {
        name: String,
        #[arg(long)]
        query: Option<String>,
        /// Filters as a JSON object.
        #[arg(long)]
        filters: Option<String>,
        #[arg(long)]
        sort_by: Option<String>,
    },
    Delete {
        id: i64,
    },
    /// Most recent distinct queries.
    Recent,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trendradar=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "radar", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            sources::run_init(&cfg).await?;
        }
        Commands::Sources { action } => match action.unwrap_or(SourcesAction::List) {
            SourcesAction::List => sources::run_list(&cfg).await?,
            SourcesAction::Enable { id } => sources::run_set_enabled(&cfg, &id, true).await?,
            SourcesAction::Disable { id } => sources::run_set_enabled(&cfg, &id, false).await?,
        },
        Commands::Fetch { source, json } => {
            ingest::run_fetch(&cfg, source.as_deref(), json).await?;
        }
        Commands::Items {
            sources,
            search,
            since,
            until,
            score_min,
            score_max,
            bookmarks_only,
            sort_by,
            order,
            limit,
            offset,
            json,
        } => {
            let filter = ItemFilter {
                sources: if sources.is_empty() { None } else { Some(sources) },
                search: search.filter(|s| !s.trim().is_empty()),
                date_from: since.as_deref().map(|s| parse_date_bound(s, false)).transpose()?,
                date_to: until.as_deref().map(|s| parse_date_bound(s, true)).transpose()?,
                score_min,
                score_max,
                bookmarks_only,
                sort_by,
                sort_order: order,
                limit: effective_limit(limit, &cfg.query),
                offset: offset.max(0),
            };
            search::run_items(&cfg, filter, json).await?;
        }
        Commands::Bookmarks { action } => match action.unwrap_or(BookmarksAction::List) {
            BookmarksAction::List => bookmarks::run_list(&cfg).await?,
            BookmarksAction::Add {
                item_id,
                note,
                tags,
            } => bookmarks::run_add(&cfg, &item_id, note.as_deref(), &tags).await?,
            BookmarksAction::Update {
                item_id,
                note,
                tags,
                reviewed,
            } => {
                let update = BookmarkUpdate {
                    note,
                    tags: if tags.is_empty() { None } else { Some(tags) },
                    reviewed,
                };
                bookmarks::run_update(&cfg, &item_id, update).await?;
            }
            BookmarksAction::Remove { item_id } => bookmarks::run_remove(&cfg, &item_id).await?,
        },
        Commands::Keywords { action } => match action.unwrap_or(KeywordsAction::List) {
            KeywordsAction::List => keywords::run_list(&cfg).await?,
            KeywordsAction::Add { keyword, weight } => {
                keywords::run_add(&cfg, &keyword, weight).await?
            }
            KeywordsAction::Remove { keyword } => keywords::run_remove(&cfg, &keyword).await?,
        },
        Commands::Searches { action } => match action.unwrap_or(SearchesAction::List) {
            SearchesAction::List => saved_search::run_list(&cfg).await?,
            SearchesAction::Save {
                name,
                query,
                filters,
                sort_by,
            } => {
                let filters = match filters {
                    Some(raw) => serde_json::from_str(&raw)
                        .with_context(|| format!("--filters is not valid JSON: {}", raw))?,
                    None => serde_json::json!({}),
                };
                saved_search::run_save(&cfg, &name, query.as_deref(), &filters, sort_by.as_deref())
                    .await?;
            }
            SearchesAction::Delete { id } => saved_search::run_delete(&cfg, id).await?,
            SearchesAction::Recent => saved_search::run_recent(&cfg).await?,
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}
