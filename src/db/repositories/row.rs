//! Backend-neutral row decoding and bind values

use crate::models::parse_string_list;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::mysql::{MySqlQueryResult, MySqlRow};
use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

/// Typed column access shared by SQLite and MySQL rows.
///
/// `int` reads 64-bit columns, `small` reads MySQL `INT` columns.
pub(crate) trait DbRow {
    fn int(&self, col: &str) -> Result<i64>;
    fn opt_int(&self, col: &str) -> Result<Option<i64>>;
    fn small(&self, col: &str) -> Result<i32>;
    fn opt_small(&self, col: &str) -> Result<Option<i32>>;
    fn float(&self, col: &str) -> Result<f64>;
    fn flag(&self, col: &str) -> Result<bool>;
    fn text(&self, col: &str) -> Result<String>;
    fn opt_text(&self, col: &str) -> Result<Option<String>>;
    fn time(&self, col: &str) -> Result<DateTime<Utc>>;
    fn opt_time(&self, col: &str) -> Result<Option<DateTime<Utc>>>;
    fn date(&self, col: &str) -> Result<NaiveDate>;

    /// String column parsed into an enum, falling back to its default
    fn parsed<T: FromStr + Default>(&self, col: &str) -> Result<T> {
        Ok(self.text(col)?.parse().unwrap_or_default())
    }

    /// Nullable string column parsed into an enum
    fn opt_parsed<T: FromStr>(&self, col: &str) -> Result<Option<T>> {
        Ok(self.opt_text(col)?.and_then(|raw| raw.parse().ok()))
    }

    /// JSON array column
    fn list(&self, col: &str) -> Result<Vec<String>> {
        Ok(parse_string_list(&self.text(col)?))
    }
}

macro_rules! impl_db_row {
    ($row:ty) => {
        impl DbRow for $row {
            fn int(&self, col: &str) -> Result<i64> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn opt_int(&self, col: &str) -> Result<Option<i64>> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn small(&self, col: &str) -> Result<i32> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn opt_small(&self, col: &str) -> Result<Option<i32>> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn float(&self, col: &str) -> Result<f64> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn flag(&self, col: &str) -> Result<bool> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn text(&self, col: &str) -> Result<String> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn opt_text(&self, col: &str) -> Result<Option<String>> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn time(&self, col: &str) -> Result<DateTime<Utc>> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn opt_time(&self, col: &str) -> Result<Option<DateTime<Utc>>> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }

            fn date(&self, col: &str) -> Result<NaiveDate> {
                self.try_get(col).with_context(|| format!("Failed to read column {}", col))
            }
        }
    };
}

impl_db_row!(SqliteRow);
impl_db_row!(MySqlRow);

/// Id generated by the last `INSERT`
pub(crate) trait InsertId {
    fn insert_id(&self) -> i64;
}

impl InsertId for SqliteQueryResult {
    fn insert_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertId for MySqlQueryResult {
    fn insert_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// A bind value for dynamically built queries
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlArg {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Time(DateTime<Utc>),
}

/// Accumulates `WHERE` conditions and their bind values
#[derive(Debug, Default)]
pub(crate) struct Conditions {
    clauses: Vec<String>,
    pub args: Vec<SqlArg>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause with its `?` placeholders filled by `args`
    pub fn push(&mut self, clause: impl Into<String>, args: impl IntoIterator<Item = SqlArg>) {
        self.clauses.push(clause.into());
        self.args.extend(args);
    }

    /// `WHERE ...` or an empty string when nothing was added
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// `LIKE` pattern matching a tag inside a JSON array column
pub(crate) fn tag_pattern(tag: &str) -> String {
    format!("%{}%", serde_json::to_string(tag).unwrap_or_default())
}

/// `LIKE` pattern for a free-text search
pub(crate) fn contains_pattern(query: &str) -> String {
    format!("%{}%", query.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_where_sql() {
        let mut conditions = Conditions::new();
        assert_eq!(conditions.where_sql(), "");

        conditions.push("user_id = ?", [SqlArg::Int(1)]);
        conditions.push("status = ?", [SqlArg::Text("ACTIVE".into())]);
        assert_eq!(conditions.where_sql(), "WHERE user_id = ? AND status = ?");
        assert_eq!(conditions.args.len(), 2);
    }

    #[test]
    fn test_tag_pattern_matches_json_element() {
        assert_eq!(tag_pattern("cardio"), "%\"cardio\"%");
        assert_eq!(contains_pattern("  sepse "), "%sepse%");
    }
}
