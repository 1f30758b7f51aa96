//! Tag repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide exact, case-folded and substring tag lookups.
//! - Create tag rows and surface uniqueness races as conflicts.
//!
//! # Invariants
//! - Write paths validate names before SQL mutations.
//! - `name_folded` always mirrors `fold_name(name)`.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::tag::{
    fold_name, validate_tag_name, CaseMatch, Tag, TagId, TagValidationError,
};
use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TAG_SELECT_SQL: &str = "SELECT id, name, taggings_count FROM tags";

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for tag and tagging persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(TagValidationError),
    /// A tag with an equivalent name already exists.
    Conflict(String),
    TagNotFound(TagId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict(name) => write!(f, "tag name already exists: `{name}`"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "tag repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "tag repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "tag repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid tag store data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<TagValidationError> for RepoError {
    fn from(value: TagValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository interface for tag rows.
pub trait TagRepository {
    /// Returns tags whose name equals any of `names` exactly.
    fn find_tags_by_names_exact(&self, names: &[String]) -> RepoResult<Vec<Tag>>;
    /// Returns tags whose case-folded name equals any folded entry of `names`.
    fn find_tags_by_names_case_insensitive(&self, names: &[String]) -> RepoResult<Vec<Tag>>;
    /// Returns tags whose case-folded name contains the folded `pattern`.
    fn find_tags_by_name_substring(&self, pattern: &str) -> RepoResult<Vec<Tag>>;
    /// Creates one tag.
    ///
    /// Fails with `RepoError::Conflict` when a tag equivalent under
    /// `unique_by` already exists.
    fn create_tag(&self, name: &str, unique_by: CaseMatch) -> RepoResult<Tag>;
    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>>;
    /// Deletes one tag; its taggings go with it.
    fn delete_tag(&self, id: TagId) -> RepoResult<()>;
    /// Returns all tags sorted by id.
    fn list_tags(&self) -> RepoResult<Vec<Tag>>;

    /// Batched lookup under the given case policy.
    fn find_tags_by_names(&self, names: &[String], case_match: CaseMatch) -> RepoResult<Vec<Tag>> {
        match case_match {
            CaseMatch::Strict => self.find_tags_by_names_exact(names),
            CaseMatch::Loose => self.find_tags_by_names_case_insensitive(names),
        }
    }
}

/// SQLite-backed tag and tagging repository.
pub struct SqliteTagRepository<'conn> {
    pub(crate) conn: &'conn mut Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tag_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn find_tags_by_names_exact(&self, names: &[String]) -> RepoResult<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        query_tags(
            &*self.conn,
            &format!(
                "{TAG_SELECT_SQL}
                 WHERE name IN (SELECT value FROM json_each(?1))
                 ORDER BY id ASC;"
            ),
            &encode_json_list(names)?,
        )
    }

    fn find_tags_by_names_case_insensitive(&self, names: &[String]) -> RepoResult<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let folded: Vec<String> = names.iter().map(|name| fold_name(name)).collect();
        query_tags(
            &*self.conn,
            &format!(
                "{TAG_SELECT_SQL}
                 WHERE name_folded IN (SELECT value FROM json_each(?1))
                 ORDER BY id ASC;"
            ),
            &encode_json_list(&folded)?,
        )
    }

    fn find_tags_by_name_substring(&self, pattern: &str) -> RepoResult<Vec<Tag>> {
        query_tags(
            &*self.conn,
            &format!(
                "{TAG_SELECT_SQL}
                 WHERE name_folded LIKE ?1 ESCAPE '!'
                 ORDER BY id ASC;"
            ),
            &format!("%{}%", escape_like(&fold_name(pattern))),
        )
    }

    fn create_tag(&self, name: &str, unique_by: CaseMatch) -> RepoResult<Tag> {
        validate_tag_name(name)?;
        let folded = fold_name(name);

        let inserted = match unique_by {
            CaseMatch::Strict => self.conn.execute(
                "INSERT INTO tags (name, name_folded) VALUES (?1, ?2);",
                params![name, folded],
            ),
            // Single statement, so the folded check and the insert are atomic.
            CaseMatch::Loose => self.conn.execute(
                "INSERT INTO tags (name, name_folded)
                 SELECT ?1, ?2
                 WHERE NOT EXISTS (SELECT 1 FROM tags WHERE name_folded = ?2);",
                params![name, folded],
            ),
        };

        match inserted {
            Ok(0) => Err(RepoError::Conflict(name.to_string())),
            Ok(_) => {
                let tag = Tag::new(self.conn.last_insert_rowid(), name);
                debug!(
                    "event=tag_create module=repo status=ok tag_id={} case_match={}",
                    tag.id,
                    unique_by.as_str()
                );
                Ok(tag)
            }
            Err(err) if is_unique_violation(&err) => Err(RepoError::Conflict(name.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                &format!("{TAG_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_tag_row,
            )
            .optional()?;
        Ok(tag)
    }

    fn delete_tag(&self, id: TagId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM tags WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::TagNotFound(id));
        }
        Ok(())
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TAG_SELECT_SQL} ORDER BY id ASC;"))?;
        let tags = stmt
            .query_map([], parse_tag_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}

pub(crate) fn parse_tag_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        name: row.get("name")?,
        count: row.get::<_, Option<i64>>("taggings_count")?.unwrap_or(0),
        score: None,
    })
}

/// Encodes a list as one JSON array parameter for `json_each`.
pub(crate) fn encode_json_list<T: serde::Serialize>(values: &[T]) -> RepoResult<String> {
    serde_json::to_string(values)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode lookup list: {err}")))
}

fn query_tags(conn: &Connection, sql: &str, param: &str) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(sql)?;
    let tags = stmt
        .query_map([param], parse_tag_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn ensure_tag_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        ("tags", &["id", "name", "name_folded", "taggings_count"]),
        (
            "taggings",
            &[
                "tag_id",
                "owner_type",
                "owner_id",
                "context",
                "tagger_type",
                "tagger_id",
                "position",
                "score",
            ],
        ),
    ];

    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_guards_wildcards() {
        assert_eq!(escape_like("50%_off!"), "50!%!_off!!");
        assert_eq!(escape_like("plain"), "plain");
    }
}
