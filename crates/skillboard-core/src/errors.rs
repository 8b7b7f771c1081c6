//! Error types for the profile store.

use rusqlite::ErrorCode;

// Extended result codes from sqlite3.h.
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
const SQLITE_CONSTRAINT_DATATYPE: i32 = 3091;

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No profile with this id.
    #[error("profile not found: {id}")]
    NotFound { id: String },

    /// Plain insert collided with an existing id.
    #[error("profile already exists: {id}")]
    UniqueConstraintViolation { id: String },

    /// Value incompatible with the column's declared type.
    #[error("type mismatch on column {column}: {detail}")]
    TypeMismatch { column: String, detail: String },

    /// Database was initialised by a newer schema than this build knows.
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("database error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl StoreError {
    /// Classify an engine error raised while writing the row identified by `id`.
    pub fn for_id(e: rusqlite::Error, id: &str) -> Self {
        match classify(e) {
            StoreError::UniqueConstraintViolation { .. } => StoreError::UniqueConstraintViolation {
                id: id.to_string(),
            },
            other => other,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        classify(e)
    }
}

fn classify(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, msg) = &e {
        if err.code == ErrorCode::ConstraintViolation {
            match err.extended_code {
                SQLITE_CONSTRAINT_PRIMARYKEY | SQLITE_CONSTRAINT_UNIQUE => {
                    return StoreError::UniqueConstraintViolation {
                        id: "<unknown>".to_string(),
                    };
                }
                SQLITE_CONSTRAINT_DATATYPE => {
                    let detail = msg.clone().unwrap_or_else(|| err.to_string());
                    return StoreError::TypeMismatch {
                        column: column_from_message(&detail),
                        detail,
                    };
                }
                _ => {}
            }
        }
    }

    match e {
        rusqlite::Error::FromSqlConversionFailure(idx, ty, source) => StoreError::TypeMismatch {
            column: column_name(idx),
            detail: format!("cannot decode {ty} value: {source}"),
        },
        rusqlite::Error::IntegralValueOutOfRange(idx, value) => StoreError::TypeMismatch {
            column: column_name(idx),
            detail: format!("integer {value} out of range"),
        },
        rusqlite::Error::InvalidColumnType(idx, name, ty) => StoreError::TypeMismatch {
            column: if name.is_empty() { column_name(idx) } else { name },
            detail: format!("unexpected {ty} value"),
        },
        other => StoreError::Sqlite(other),
    }
}

// "cannot store TEXT value in INTEGER column skillrack_profiles.points"
fn column_from_message(msg: &str) -> String {
    msg.rsplit_once("column ")
        .map(|(_, rest)| rest.rsplit('.').next().unwrap_or(rest).trim().to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

fn column_name(idx: usize) -> String {
    crate::storage::schema::COLUMNS
        .get(idx)
        .map(|c| c.to_string())
        .unwrap_or_else(|| format!("#{idx}"))
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_is_extracted_from_datatype_message() {
        assert_eq!(
            column_from_message("cannot store TEXT value in INTEGER column skillrack_profiles.points"),
            "points"
        );
        assert_eq!(column_from_message("something else"), "<unknown>");
    }

    #[test]
    fn out_of_range_maps_to_type_mismatch() {
        let err: StoreError = rusqlite::Error::IntegralValueOutOfRange(3, 5_000_000_000).into();
        match err {
            StoreError::TypeMismatch { column, detail } => {
                assert_eq!(column, "points");
                assert!(detail.contains("5000000000"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_errors_pass_through() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
