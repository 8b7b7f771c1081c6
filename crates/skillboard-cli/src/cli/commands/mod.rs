use super::args::*;
use anyhow::Context;
use skillboard_core::config::{load_config, write_sample_config, LoadedConfig, SkillboardConfig};
use skillboard_core::errors::StoreError;
use skillboard_core::freshness::{lookup_cached, CachedLookup};
use skillboard_core::model::{Page, ProfileRecord};
use skillboard_core::storage::{ProfileRepository, Store};

pub mod import;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const NOT_FOUND: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const STALE: i32 = 3;
    pub const CONFLICT: i32 = 4;
}

/// Config file (if any), then `SKILLBOARD_*` env, then `--db`.
pub fn resolve_config(global: &GlobalArgs) -> anyhow::Result<LoadedConfig> {
    let mut loaded = match &global.config {
        Some(path) => load_config(path, global.strict_config)?,
        None => LoadedConfig {
            config: SkillboardConfig::default(),
            ignored_keys: Vec::new(),
        },
    };
    loaded.config = loaded.config.with_env();
    if let Some(db) = &global.db {
        loaded.config.db_path = db.clone();
    }
    Ok(loaded)
}

pub async fn dispatch(cmd: Command, cfg: SkillboardConfig) -> anyhow::Result<i32> {
    match cmd {
        Command::Init(args) => cmd_init(args, &cfg),
        Command::Upsert(args) => cmd_upsert(args, &cfg),
        Command::Insert(args) => cmd_insert(args, &cfg),
        Command::Get(args) => cmd_get(args, &cfg),
        Command::Top(args) => {
            let store = open_store(&cfg)?;
            let page = page_for(&args, &cfg);
            print_list(&store.list_by_points_desc(page)?, page, &args.format)
        }
        Command::Recent(args) => {
            let store = open_store(&cfg)?;
            let page = page_for(&args, &cfg);
            print_list(&store.list_by_last_fetched_desc(page)?, page, &args.format)
        }
        Command::Import(args) => import::cmd_import(args, &cfg).await,
        Command::Delete(args) => cmd_delete(args, &cfg),
        Command::Stats(args) => cmd_stats(args, &cfg),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

pub(crate) fn open_store(cfg: &SkillboardConfig) -> anyhow::Result<Store> {
    if let Some(parent) = cfg.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let store = Store::open_with(&cfg.db_path, &cfg.store_options())
        .with_context(|| format!("failed to open database {}", cfg.db_path.display()))?;
    store.init_schema()?;
    Ok(store)
}

fn cmd_init(args: InitArgs, cfg: &SkillboardConfig) -> anyhow::Result<i32> {
    if let Some(path) = &args.sample_config {
        if path.exists() {
            eprintln!("kept existing config: {}", path.display());
        } else {
            write_sample_config(path)?;
            eprintln!("wrote file: {}", path.display());
        }
    }

    open_store(cfg)?;
    tracing::info!(event = "schema_initialized", db = %cfg.db_path.display());
    eprintln!("initialized {}", cfg.db_path.display());
    Ok(exit_codes::OK)
}

fn cmd_upsert(args: ProfileArgs, cfg: &SkillboardConfig) -> anyhow::Result<i32> {
    let profile = args.to_upsert()?;
    let store = open_store(cfg)?;
    let result = store.upsert(&profile)?;
    tracing::info!(
        event = "profile_upserted",
        id = %result.record.id,
        created = result.created
    );
    println!("{}", serde_json::to_string_pretty(&result.record)?);
    Ok(exit_codes::OK)
}

fn cmd_insert(args: ProfileArgs, cfg: &SkillboardConfig) -> anyhow::Result<i32> {
    let profile = args.to_upsert()?;
    let store = open_store(cfg)?;
    match store.insert(&profile) {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(exit_codes::OK)
        }
        Err(e @ StoreError::UniqueConstraintViolation { .. }) => {
            eprintln!("{e}");
            Ok(exit_codes::CONFLICT)
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_get(args: GetArgs, cfg: &SkillboardConfig) -> anyhow::Result<i32> {
    let store = open_store(cfg)?;
    let repo: &dyn ProfileRepository = &store;

    if let Some(url) = &args.url {
        let ttl = args
            .max_age_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or_else(|| cfg.freshness_ttl());
        return match lookup_cached(repo, url, ttl, chrono::Utc::now())? {
            CachedLookup::Fresh(record) => {
                println!("{}", serde_json::to_string_pretty(&record)?);
                Ok(exit_codes::OK)
            }
            CachedLookup::Stale(record) => {
                println!("{}", serde_json::to_string_pretty(&record)?);
                eprintln!("stale: last fetched {}", record.last_fetched);
                Ok(exit_codes::STALE)
            }
            CachedLookup::Missing => {
                eprintln!("profile not found for url: {url}");
                Ok(exit_codes::NOT_FOUND)
            }
        };
    }

    let id = args.id.as_deref().unwrap_or_default();
    match repo.require(id) {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(exit_codes::OK)
        }
        Err(e @ StoreError::NotFound { .. }) => {
            eprintln!("{e}");
            Ok(exit_codes::NOT_FOUND)
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_delete(args: DeleteArgs, cfg: &SkillboardConfig) -> anyhow::Result<i32> {
    let store = open_store(cfg)?;
    if store.delete(&args.id)? {
        tracing::info!(event = "profile_deleted", id = %args.id);
        eprintln!("deleted {}", args.id);
        Ok(exit_codes::OK)
    } else {
        eprintln!("profile not found: {}", args.id);
        Ok(exit_codes::NOT_FOUND)
    }
}

fn cmd_stats(args: StatsArgs, cfg: &SkillboardConfig) -> anyhow::Result<i32> {
    let store = open_store(cfg)?;
    let stats = store.stats_best_effort()?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        println!("Database: {}", cfg.db_path.display());
        println!("Schema version: {}", or_dash(stats.schema_version.map(|v| v.to_string())));
        println!("Profiles: {}", or_dash(stats.profiles.map(|v| v.to_string())));
        println!("Newest fetch: {}", or_dash(stats.newest_fetch));
        println!("Oldest fetch: {}", or_dash(stats.oldest_fetch));
    }
    Ok(exit_codes::OK)
}

fn page_for(args: &ListArgs, cfg: &SkillboardConfig) -> Page {
    Page {
        limit: args.limit.unwrap_or(cfg.default_limit),
        offset: args.offset,
    }
}

fn print_list(rows: &[ProfileRecord], page: Page, format: &str) -> anyhow::Result<i32> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(exit_codes::OK);
    }

    println!("{:>5}  {:>8}  {:<14}  {:<24}  last fetched", "rank", "points", "id", "name");
    for (i, r) in rows.iter().enumerate() {
        println!(
            "{:>5}  {:>8}  {:<14}  {:<24}  {}",
            page.offset as usize + i + 1,
            r.points,
            r.id,
            r.name.as_deref().unwrap_or("-"),
            r.last_fetched.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(exit_codes::OK)
}
