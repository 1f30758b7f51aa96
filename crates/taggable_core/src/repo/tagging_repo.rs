//! Tagging repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Write and remove linkage rows for one `(owner, context)` pair.
//! - Read tags back in position or identity order.
//!
//! # Invariants
//! - At most one row per `(owner, context, tag)`.
//! - Upserts leave rows whose position and score already match untouched.
//! - `reconcile_taggings` on SQLite runs in one immediate transaction.

use crate::model::tag::{Tag, TagId};
use crate::model::tagging::{OwnerRef, Tagging, TaggingWrite};
use crate::repo::tag_repo::{encode_json_list, parse_tag_row, RepoResult, SqliteTagRepository};
use rusqlite::{params, Connection, Row, TransactionBehavior};

/// Repository interface for tagging (linkage) rows.
pub trait TaggingRepository {
    /// Inserts missing links and updates position/score of existing ones.
    ///
    /// `tagger` is recorded on newly inserted rows only.
    fn upsert_taggings(
        &mut self,
        owner: &OwnerRef,
        context: &str,
        tagger: Option<&OwnerRef>,
        writes: &[TaggingWrite],
    ) -> RepoResult<()>;

    /// Deletes links of `(owner, context)` whose tag is not in `keep`.
    /// Returns the number of removed rows.
    fn delete_taggings_not_in(
        &mut self,
        owner: &OwnerRef,
        context: &str,
        keep: &[TagId],
    ) -> RepoResult<usize>;

    /// Makes the links of `(owner, context)` exactly match `writes`.
    fn reconcile_taggings(
        &mut self,
        owner: &OwnerRef,
        context: &str,
        tagger: Option<&OwnerRef>,
        writes: &[TaggingWrite],
    ) -> RepoResult<()> {
        let keep: Vec<TagId> = writes.iter().map(|write| write.tag_id).collect();
        self.delete_taggings_not_in(owner, context, &keep)?;
        self.upsert_taggings(owner, context, tagger, writes)
    }

    /// Returns linked tags, by position when `ordered`, otherwise by tag id.
    /// Each tag carries the score stored on its link.
    fn list_tags_for(&self, owner: &OwnerRef, context: &str, ordered: bool)
        -> RepoResult<Vec<Tag>>;

    /// Returns raw linkage rows for `(owner, context)` sorted by row id.
    fn list_taggings(&self, owner: &OwnerRef, context: &str) -> RepoResult<Vec<Tagging>>;

    /// Returns distinct contexts that currently hold links for `owner`.
    fn list_contexts_for(&self, owner: &OwnerRef) -> RepoResult<Vec<String>>;

    /// Deletes every link of `owner` across all contexts.
    fn delete_owner_taggings(&mut self, owner: &OwnerRef) -> RepoResult<usize>;
}

impl TaggingRepository for SqliteTagRepository<'_> {
    fn upsert_taggings(
        &mut self,
        owner: &OwnerRef,
        context: &str,
        tagger: Option<&OwnerRef>,
        writes: &[TaggingWrite],
    ) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        upsert_in(&tx, owner, context, tagger, writes)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_taggings_not_in(
        &mut self,
        owner: &OwnerRef,
        context: &str,
        keep: &[TagId],
    ) -> RepoResult<usize> {
        delete_not_in(&*self.conn, owner, context, keep)
    }

    fn reconcile_taggings(
        &mut self,
        owner: &OwnerRef,
        context: &str,
        tagger: Option<&OwnerRef>,
        writes: &[TaggingWrite],
    ) -> RepoResult<()> {
        let keep: Vec<TagId> = writes.iter().map(|write| write.tag_id).collect();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        delete_not_in(&tx, owner, context, &keep)?;
        upsert_in(&tx, owner, context, tagger, writes)?;
        tx.commit()?;
        Ok(())
    }

    fn list_tags_for(
        &self,
        owner: &OwnerRef,
        context: &str,
        ordered: bool,
    ) -> RepoResult<Vec<Tag>> {
        let order_by = if ordered {
            "tg.position IS NULL, tg.position ASC, tg.id ASC"
        } else {
            "t.id ASC"
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT t.id, t.name, t.taggings_count, tg.score
             FROM taggings tg
             INNER JOIN tags t ON t.id = tg.tag_id
             WHERE tg.owner_type = ?1
               AND tg.owner_id = ?2
               AND tg.context = ?3
             ORDER BY {order_by};"
        ))?;
        let tags = stmt
            .query_map(
                params![owner.owner_type, owner.owner_id, context],
                |row| {
                    let score: Option<i64> = row.get("score")?;
                    parse_tag_row(row).map(|tag| tag.with_score(score))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn list_taggings(&self, owner: &OwnerRef, context: &str) -> RepoResult<Vec<Tagging>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                tag_id,
                owner_type,
                owner_id,
                context,
                tagger_type,
                tagger_id,
                position,
                score,
                created_at
             FROM taggings
             WHERE owner_type = ?1
               AND owner_id = ?2
               AND context = ?3
             ORDER BY id ASC;",
        )?;
        let taggings = stmt
            .query_map(
                params![owner.owner_type, owner.owner_id, context],
                parse_tagging_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(taggings)
    }

    fn list_contexts_for(&self, owner: &OwnerRef) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT context
             FROM taggings
             WHERE owner_type = ?1
               AND owner_id = ?2
             ORDER BY context ASC;",
        )?;
        let contexts = stmt
            .query_map(params![owner.owner_type, owner.owner_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(contexts)
    }

    fn delete_owner_taggings(&mut self, owner: &OwnerRef) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM taggings WHERE owner_type = ?1 AND owner_id = ?2;",
            params![owner.owner_type, owner.owner_id],
        )?;
        Ok(removed)
    }
}

fn upsert_in(
    conn: &Connection,
    owner: &OwnerRef,
    context: &str,
    tagger: Option<&OwnerRef>,
    writes: &[TaggingWrite],
) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO taggings (
            tag_id,
            owner_type,
            owner_id,
            context,
            tagger_type,
            tagger_id,
            position,
            score
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT (owner_type, owner_id, context, tag_id) DO UPDATE SET
            position = excluded.position,
            score = excluded.score
        WHERE taggings.position IS NOT excluded.position
           OR taggings.score IS NOT excluded.score;",
    )?;
    let tagger_type = tagger.map(|t| t.owner_type.as_str());
    let tagger_id = tagger.map(|t| t.owner_id.as_str());
    for write in writes {
        stmt.execute(params![
            write.tag_id,
            owner.owner_type,
            owner.owner_id,
            context,
            tagger_type,
            tagger_id,
            write.position,
            write.score,
        ])?;
    }
    Ok(())
}

fn delete_not_in(
    conn: &Connection,
    owner: &OwnerRef,
    context: &str,
    keep: &[TagId],
) -> RepoResult<usize> {
    let removed = conn.execute(
        "DELETE FROM taggings
         WHERE owner_type = ?1
           AND owner_id = ?2
           AND context = ?3
           AND tag_id NOT IN (SELECT value FROM json_each(?4));",
        params![owner.owner_type, owner.owner_id, context, encode_json_list(keep)?],
    )?;
    Ok(removed)
}

fn parse_tagging_row(row: &Row<'_>) -> rusqlite::Result<Tagging> {
    let tagger_type: Option<String> = row.get("tagger_type")?;
    let tagger_id: Option<String> = row.get("tagger_id")?;
    let tagger = match (tagger_type, tagger_id) {
        (Some(owner_type), Some(owner_id)) => Some(OwnerRef::new(owner_type, owner_id)),
        _ => None,
    };
    Ok(Tagging {
        id: row.get("id")?,
        tag_id: row.get("tag_id")?,
        owner: OwnerRef::new(
            row.get::<_, String>("owner_type")?,
            row.get::<_, String>("owner_id")?,
        ),
        context: row.get("context")?,
        tagger,
        position: row.get("position")?,
        score: row.get("score")?,
        created_at: row.get("created_at")?,
    })
}
