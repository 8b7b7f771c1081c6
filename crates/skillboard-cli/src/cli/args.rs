use anyhow::Context;
use clap::{Parser, Subcommand};
use skillboard_core::model::ProfileUpsert;
use skillboard_core::storage::store::parse_timestamp;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "skillboard",
    version,
    about = "Store and rank scraped SkillRack profile statistics"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// YAML config file (built-in defaults when absent)
    #[arg(long, global = true, env = "SKILLBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// database path; overrides the config file and SKILLBOARD_DB
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// reject unknown keys in the config file
    #[arg(long, global = true)]
    pub strict_config: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database schema
    Init(InitArgs),
    /// Insert a profile or update the supplied columns of an existing one
    Upsert(ProfileArgs),
    /// Insert a new profile; fails if the id exists
    Insert(ProfileArgs),
    Get(GetArgs),
    /// Profiles by points, highest first
    Top(ListArgs),
    /// Profiles by last fetch time, newest first
    Recent(ListArgs),
    /// Upsert profiles from a JSON-lines file in one transaction
    Import(ImportArgs),
    Delete(DeleteArgs),
    Stats(StatsArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    /// also write a sample config file here (kept if it exists)
    #[arg(long)]
    pub sample_config: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ProfileArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub college: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub points: Option<i32>,

    #[arg(long, allow_negative_numbers = true)]
    pub dc: Option<i32>,

    #[arg(long, allow_negative_numbers = true)]
    pub dt: Option<i32>,

    #[arg(long)]
    pub profile_url: Option<String>,

    /// RFC 3339 time of the scrape (defaults to now on insert)
    #[arg(long)]
    pub last_fetched: Option<String>,
}

impl ProfileArgs {
    pub fn to_upsert(&self) -> anyhow::Result<ProfileUpsert> {
        let mut up = ProfileUpsert::new(self.id.clone());
        up.name = self.name.clone().map(Some);
        up.college = self.college.clone().map(Some);
        up.points = self.points;
        up.dc = self.dc;
        up.dt = self.dt;
        up.profile_url = self.profile_url.clone().map(Some);
        if let Some(raw) = &self.last_fetched {
            let at = parse_timestamp(raw)
                .with_context(|| format!("invalid --last-fetched {raw:?} (expected RFC 3339)"))?;
            up.last_fetched = Some(at);
        }
        Ok(up)
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct GetArgs {
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    pub id: Option<String>,

    /// look up by source page URL and check freshness
    #[arg(long)]
    pub url: Option<String>,

    /// freshness window for --url (defaults to freshness_ttl_secs)
    #[arg(long, requires = "url", conflicts_with = "id")]
    pub max_age_secs: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ListArgs {
    /// page size (defaults to default_limit)
    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long, default_value_t = 0)]
    pub offset: u32,

    /// text | json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ImportArgs {
    /// one JSON object per line: {"id": "...", "points": 10, ...}
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(long)]
    pub id: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StatsArgs {
    /// text | json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_args_only_supply_given_flags() {
        let cli = Cli::try_parse_from([
            "skillboard",
            "upsert",
            "--id",
            "9",
            "--points",
            "-3",
            "--last-fetched",
            "2026-10-01T10:00:00+02:00",
        ])
        .unwrap();
        let Command::Upsert(args) = cli.cmd else {
            panic!("expected upsert");
        };
        let up = args.to_upsert().unwrap();
        assert_eq!(up.points, Some(-3));
        assert_eq!(up.name, None);
        assert_eq!(
            up.last_fetched.map(|t| t.to_rfc3339()),
            Some("2026-10-01T08:00:00+00:00".to_string())
        );
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let args = ProfileArgs {
            id: "1".into(),
            name: None,
            college: None,
            points: None,
            dc: None,
            dt: None,
            profile_url: None,
            last_fetched: Some("yesterday".into()),
        };
        assert!(args.to_upsert().is_err());
    }

    #[test]
    fn get_requires_exactly_one_key() {
        assert!(Cli::try_parse_from(["skillboard", "get"]).is_err());
        assert!(Cli::try_parse_from(["skillboard", "get", "--id", "1", "--url", "u"]).is_err());
        assert!(Cli::try_parse_from(["skillboard", "get", "--id", "1", "--max-age-secs", "5"]).is_err());
        assert!(Cli::try_parse_from(["skillboard", "get", "--max-age-secs", "5"]).is_err());
        assert!(Cli::try_parse_from(["skillboard", "get", "--id", "1"]).is_ok());
        assert!(Cli::try_parse_from(["skillboard", "get", "--url", "u", "--max-age-secs", "5"]).is_ok());
    }
}
