//! Note/tag repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist corpus notes with their field, notebook/cell slot and tags.
//! - Hand the whole corpus back as loader records in position order.
//!
//! # Invariants
//! - Fields are registered before notes reference them; registration order
//!   defines field order.
//! - `set_note_tags` replaces the whole tag set in a single transaction.
//! - Tag names are normalized to lowercase identifiers before persistence.

use crate::db::DbError;
use crate::model::note::{normalize_tag, CorpusRecord};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store-owned identifier of one persisted note.
pub type NoteUuid = Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for corpus persistence and loading.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(NoteUuid),
    /// Note references a field that was never registered.
    UnknownField(String),
    /// Tag is blank or contains characters outside the tag alphabet.
    InvalidTag(String),
    /// Another note already occupies this slot.
    DuplicatePosition {
        field: String,
        notebook: u32,
        cell: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::UnknownField(field) => write!(f, "field is not registered: `{field}`"),
            Self::InvalidTag(tag) => write!(f, "invalid tag: `{tag}`"),
            Self::DuplicatePosition {
                field,
                notebook,
                cell,
            } => write!(
                f,
                "note already stored at field=`{field}` notebook={notebook} cell={cell}"
            ),
            Self::InvalidData(message) => write!(f, "invalid stored note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
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

/// Repository interface for the corpus store.
pub trait NoteRepository {
    /// Registers `field` if unknown and returns its ordinal.
    fn register_field(&self, field: &str) -> RepoResult<u32>;
    /// Returns registered fields in ordinal order.
    fn list_fields(&self) -> RepoResult<Vec<String>>;
    /// Stores one note with its tags and returns its generated id.
    fn create_note(&mut self, record: &CorpusRecord) -> RepoResult<NoteUuid>;
    /// Replaces all tags of one note in one transaction.
    fn set_note_tags(&mut self, note_id: NoteUuid, tags: &[String]) -> RepoResult<()>;
    /// Deletes every note of `field` and returns the number removed.
    fn delete_field_notes(&self, field: &str) -> RepoResult<usize>;
    /// Returns all notes as loader records ordered by field, notebook, cell.
    fn load_corpus(&self) -> RepoResult<Vec<CorpusRecord>>;
}

/// SQLite-backed corpus repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn register_field(&self, field: &str) -> RepoResult<u32> {
        let name = field.trim();
        if name.is_empty() {
            return Err(RepoError::UnknownField(field.to_string()));
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO fields (name, ordinal)
             SELECT ?1, COALESCE(MAX(ordinal) + 1, 0) FROM fields;",
            [name],
        )?;
        let ordinal = self.conn.query_row(
            "SELECT ordinal FROM fields WHERE name = ?1;",
            [name],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(ordinal)
    }

    fn list_fields(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM fields ORDER BY ordinal ASC;")?;
        let mut rows = stmt.query([])?;
        let mut fields = Vec::new();
        while let Some(row) = rows.next()? {
            fields.push(row.get("name")?);
        }
        Ok(fields)
    }

    fn create_note(&mut self, record: &CorpusRecord) -> RepoResult<NoteUuid> {
        let field = record.field.trim();
        let tags = normalize_tags(&record.tags)?;
        let note_id = Uuid::new_v4();

        let tx = self.conn.transaction()?;
        let known: Option<String> = tx
            .query_row("SELECT name FROM fields WHERE name = ?1;", [field], |row| {
                row.get(0)
            })
            .optional()?;
        if known.is_none() {
            return Err(RepoError::UnknownField(field.to_string()));
        }

        tx.execute(
            "INSERT INTO notes (uuid, field, notebook, cell, body)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                note_id.to_string(),
                field,
                record.notebook,
                record.cell,
                record.body.as_str()
            ],
        )
        .map_err(|err| {
            if is_constraint_violation(&err) {
                RepoError::DuplicatePosition {
                    field: field.to_string(),
                    notebook: record.notebook,
                    cell: record.cell,
                }
            } else {
                err.into()
            }
        })?;

        link_tags(&tx, &note_id.to_string(), &tags)?;
        tx.commit()?;
        Ok(note_id)
    }

    fn set_note_tags(&mut self, note_id: NoteUuid, tags: &[String]) -> RepoResult<()> {
        let normalized = normalize_tags(tags)?;
        let note_id_text = note_id.to_string();

        let tx = self.conn.transaction()?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM notes WHERE uuid = ?1);",
            [note_id_text.as_str()],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::NotFound(note_id));
        }

        tx.execute(
            "DELETE FROM note_tags WHERE note_uuid = ?1;",
            [note_id_text.as_str()],
        )?;
        link_tags(&tx, &note_id_text, &normalized)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_field_notes(&self, field: &str) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM notes WHERE field = ?1;", [field.trim()])?;
        Ok(removed)
    }

    fn load_corpus(&self) -> RepoResult<Vec<CorpusRecord>> {
        let mut tags_by_note: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT nt.note_uuid, t.name
                 FROM note_tags nt
                 INNER JOIN tags t ON t.id = nt.tag_id
                 ORDER BY t.name COLLATE NOCASE ASC;",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let note_uuid: String = row.get(0)?;
                let name: String = row.get(1)?;
                tags_by_note
                    .entry(note_uuid)
                    .or_default()
                    .push(name.to_lowercase());
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT n.uuid, n.field, n.notebook, n.cell, n.body
             FROM notes n
             INNER JOIN fields f ON f.name = n.field
             ORDER BY f.ordinal ASC, n.notebook ASC, n.cell ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get("uuid")?;
            Uuid::parse_str(&uuid_text).map_err(|_| {
                RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in notes.uuid"))
            })?;
            let tags = tags_by_note.remove(&uuid_text).unwrap_or_default();
            records.push(CorpusRecord {
                field: row.get("field")?,
                notebook: row.get("notebook")?,
                cell: row.get("cell")?,
                tags,
                body: row.get("body")?,
                external_id: Some(uuid_text),
            });
        }

        Ok(records)
    }
}

/// Normalizes and deduplicates tags, rejecting unqueryable values.
pub fn normalize_tags(tags: &[String]) -> RepoResult<Vec<String>> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        let normalized = normalize_tag(tag).ok_or_else(|| RepoError::InvalidTag(tag.clone()))?;
        unique.insert(normalized);
    }
    Ok(unique.into_iter().collect())
}

fn link_tags(tx: &Transaction<'_>, note_uuid: &str, tags: &[String]) -> RepoResult<()> {
    for tag in tags {
        tx.execute(
            "INSERT OR IGNORE INTO tags (name) VALUES (?1);",
            [tag.as_str()],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO note_tags (note_uuid, tag_id)
             SELECT ?1, id
             FROM tags
             WHERE name = ?2 COLLATE NOCASE;",
            params![note_uuid, tag.as_str()],
        )?;
    }
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, RepoError};

    #[test]
    fn normalize_tags_dedupes_and_sorts() {
        let tags = normalize_tags(&[
            "Work".to_string(),
            "IMPORTANT".to_string(),
            "work ".to_string(),
        ])
        .unwrap();
        assert_eq!(tags, vec!["important".to_string(), "work".to_string()]);
    }

    #[test]
    fn normalize_tags_rejects_blank_and_symbols() {
        assert!(matches!(
            normalize_tags(&["   ".to_string()]),
            Err(RepoError::InvalidTag(_))
        ));
        assert!(matches!(
            normalize_tags(&["c#".to_string()]),
            Err(RepoError::InvalidTag(_))
        ));
    }
}
