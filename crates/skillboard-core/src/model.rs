use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One tracked profile as stored in `skillrack_profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub name: Option<String>,
    pub college: Option<String>,
    pub points: i32,
    /// When the source page was last scraped. Set by the writer.
    pub last_fetched: DateTime<Utc>,
    /// Secondary counters scraped alongside `points`.
    pub dc: i32,
    pub dt: i32,
    pub profile_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Re-stamped by the engine on every update.
    pub updated_at: DateTime<Utc>,
}

/// Partial write keyed on `id`.
///
/// `None` means "not supplied": the column keeps its current value on update and
/// takes its default on insert. For the nullable text columns `Some(None)` clears
/// the value. `created_at` and `updated_at` cannot be supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpsert {
    pub id: String,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub college: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetched: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dc: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<i32>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_url: Option<Option<String>>,
}

// Present-but-null must stay distinguishable from absent.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

impl ProfileUpsert {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(Some(name.into()));
        self
    }

    pub fn clear_name(mut self) -> Self {
        self.name = Some(None);
        self
    }

    pub fn college(mut self, college: impl Into<String>) -> Self {
        self.college = Some(Some(college.into()));
        self
    }

    pub fn clear_college(mut self) -> Self {
        self.college = Some(None);
        self
    }

    pub fn points(mut self, points: i32) -> Self {
        self.points = Some(points);
        self
    }

    pub fn last_fetched(mut self, at: DateTime<Utc>) -> Self {
        self.last_fetched = Some(at);
        self
    }

    pub fn dc(mut self, dc: i32) -> Self {
        self.dc = Some(dc);
        self
    }

    pub fn dt(mut self, dt: i32) -> Self {
        self.dt = Some(dt);
        self
    }

    pub fn profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = Some(Some(url.into()));
        self
    }

    pub fn clear_profile_url(mut self) -> Self {
        self.profile_url = Some(None);
        self
    }
}

/// Result of an upsert: the row as committed, and whether it was new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertResult {
    pub created: bool,
    pub record: ProfileRecord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Window over an ordered read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(20)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub profiles: Option<u64>,
    pub newest_fetch: Option<String>,
    pub oldest_fetch: Option<String>,
    pub schema_version: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_null_fields_are_distinct() {
        let up: ProfileUpsert =
            serde_json::from_str(r#"{"id":"7","name":null,"points":12}"#).unwrap();
        assert_eq!(up.id, "7");
        assert_eq!(up.name, Some(None));
        assert_eq!(up.college, None);
        assert_eq!(up.points, Some(12));
        assert_eq!(up.dc, None);
    }

    #[test]
    fn builder_marks_supplied_columns() {
        let up = ProfileUpsert::new("X1").name("Alice").points(120).clear_college();
        assert_eq!(up.name, Some(Some("Alice".to_string())));
        assert_eq!(up.college, Some(None));
        assert_eq!(up.points, Some(120));
        assert!(up.profile_url.is_none());
    }

    #[test]
    fn wrong_json_type_is_rejected() {
        let res = serde_json::from_str::<ProfileUpsert>(r#"{"id":"7","points":"many"}"#);
        assert!(res.is_err());
    }
}
