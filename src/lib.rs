//! # TrendRadar
//!
//! A source aggregation and ranking engine.
//!
//! TrendRadar pulls items from heterogeneous upstreams (web feeds, code
//! hosting search, model hubs, an MCP server registry, product changelogs),
//! normalizes them into one [`models::Item`] shape, stores them in SQLite,
//! and serves them back ranked by base score plus weighted keyword
//! relevance, through a CLI and a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌────────────┐   ┌────────────┐
//! │    Adapters     │──▶│ normalize  │──▶│   SQLite   │
//! │ rss/github/hub/ │   │  + ingest  │   │ items+FTS5 │
//! │ mcp/changelog   │   └────────────┘   └─────┬──────┘
//! └─────────────────┘                          │
//!                      ┌───────────────────────┤
//!                      ▼                       ▼
//!                 ┌──────────┐          ┌────────────┐
//!                 │   CLI    │          │  HTTP API  │
//!                 │ (radar)  │          │   (axum)   │
//!                 └──────────┘          └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! radar init                        # create database, seed sources
//! radar fetch                       # one fetch cycle
//! radar items --search "mcp server" --limit 20
//! radar serve                       # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Raw record → canonical item |
//! | [`traits`] | Adapter contract and kind registry |
//! | [`http`] | Shared outbound HTTP client |
//! | [`adapter_feed`] | RSS / Atom feeds |
//! | [`adapter_github`] | Repository search by topic |
//! | [`adapter_hub`] | Trending models and spaces |
//! | [`adapter_mcp`] | MCP server registry |
//! | [`adapter_changelog`] | Release lists and markdown changelogs |
//! | [`ingest`] | Fetch cycle orchestration |
//! | [`store`] | Storage trait, SQLite and in-memory backends |
//! | [`search`] | Query composition and relevance ranking |
//! | [`sources`] | Source records and config seeding |
//! | [`keywords`] | Relevance keyword management |
//! | [`bookmarks`] | Bookmarks on items |
//! | [`saved_search`] | Saved searches, history, suggestions |
//! | [`stats`] | Database statistics |
//! | [`server`] | JSON HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod adapter_changelog;
pub mod adapter_feed;
pub mod adapter_github;
pub mod adapter_hub;
pub mod adapter_mcp;
pub mod bookmarks;
pub mod config;
pub mod db;
pub mod http;
pub mod ingest;
pub mod keywords;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod saved_search;
pub mod search;
pub mod server;
pub mod sources;
pub mod stats;
pub mod store;
pub mod traits;
