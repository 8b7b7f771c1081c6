//! Freshness window for stored profiles.
//!
//! A profile whose `last_fetched` is younger than the TTL can be served as-is;
//! older ones should be re-scraped by the writer before being trusted.

use crate::errors::StoreError;
use crate::model::ProfileRecord;
use crate::storage::ProfileRepository;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Fresh iff `now - last_fetched < ttl`. A fetch time in the future counts as fresh.
pub fn classify(record: &ProfileRecord, now: DateTime<Utc>, ttl: Duration) -> Freshness {
    match now.signed_duration_since(record.last_fetched).to_std() {
        Ok(age) if age >= ttl => Freshness::Stale,
        _ => Freshness::Fresh,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedLookup {
    Fresh(ProfileRecord),
    Stale(ProfileRecord),
    Missing,
}

/// Look a profile up by its source URL and judge it against `ttl`.
pub fn lookup_cached(
    repo: &dyn ProfileRepository,
    url: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<CachedLookup, StoreError> {
    let Some(record) = repo.find_by_profile_url(url)? else {
        tracing::debug!(event = "cache_miss", url = %url);
        return Ok(CachedLookup::Missing);
    };

    match classify(&record, now, ttl) {
        Freshness::Fresh => {
            tracing::debug!(event = "cache_hit", id = %record.id);
            Ok(CachedLookup::Fresh(record))
        }
        Freshness::Stale => {
            tracing::debug!(event = "cache_stale", id = %record.id, last_fetched = %record.last_fetched);
            Ok(CachedLookup::Stale(record))
        }
    }
}
