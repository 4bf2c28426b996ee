//! Real object repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist one metadata row per real object and one row per record.
//! - Provide the primitive reads/writes that store services compose.
//!
//! # Invariants
//! - `replace_object` swaps metadata and all records in one transaction.
//! - `adjust_ref_count` is a plain read-modify-write and floors at zero.
//! - Listing order is creation order (`created_seq ASC`).

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::real_object::{
    HandlerEntry, ObjectValidationError, RealId, RealObject, RealObjectMeta, Record, RecordNo,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const OBJECT_SELECT_SQL: &str = "SELECT
    real_id,
    name,
    ref_count,
    created_at,
    modified_at,
    default_handlers
FROM real_objects";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for real object persistence and lookups.
#[derive(Debug)]
pub enum RepoError {
    Validation(ObjectValidationError),
    Db(DbError),
    NotFound(RealId),
    /// Record index is outside the object's record list.
    RecordNotFound {
        real_id: RealId,
        record_no: RecordNo,
    },
    /// Link index is outside the record's well-formed link list.
    LinkNotFound {
        real_id: RealId,
        record_no: RecordNo,
        index: usize,
    },
    /// A link write was rejected.
    InvalidLink(crate::model::link::LinkError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "real object not found: {id}"),
            Self::RecordNotFound { real_id, record_no } => {
                write!(f, "record {record_no} not found in real object {real_id}")
            }
            Self::LinkNotFound {
                real_id,
                record_no,
                index,
            } => write!(
                f,
                "link #{index} not found in record {record_no} of real object {real_id}"
            ),
            Self::InvalidLink(err) => write!(f, "invalid link: {err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "object repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted object data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidLink(err) => Some(err),
            Self::NotFound(_)
            | Self::RecordNotFound { .. }
            | Self::LinkNotFound { .. }
            | Self::UninitializedConnection { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<ObjectValidationError> for RepoError {
    fn from(value: ObjectValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<crate::model::link::LinkError> for RepoError {
    fn from(value: crate::model::link::LinkError) -> Self {
        Self::InvalidLink(value)
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

/// Repository interface for real object persistence.
pub trait ObjectRepository {
    /// Inserts a new object with all of its records.
    fn insert_object(&self, object: &RealObject) -> RepoResult<RealId>;
    /// Replaces metadata and every record of an existing object.
    fn replace_object(&self, object: &RealObject) -> RepoResult<()>;
    /// Loads one object with its records.
    fn get_object(&self, id: RealId) -> RepoResult<Option<RealObject>>;
    /// Returns whether an object with this id exists.
    fn exists(&self, id: RealId) -> RepoResult<bool>;
    /// Reads only the stored `ref_count`, without loading records.
    fn ref_count(&self, id: RealId) -> RepoResult<Option<u32>>;
    /// Applies `delta` to `ref_count`, flooring at zero, and returns the new value.
    fn adjust_ref_count(&self, id: RealId, delta: i64) -> RepoResult<u32>;
    /// Overwrites `ref_count` without touching content.
    fn set_ref_count(&self, id: RealId, ref_count: u32) -> RepoResult<()>;
    /// Lists ids with `ref_count == 0` in creation order.
    fn list_unreferenced(&self) -> RepoResult<Vec<RealId>>;
    /// Lists every id in creation order.
    fn list_ids(&self) -> RepoResult<Vec<RealId>>;
    /// Removes metadata and records unconditionally.
    fn delete_object(&self, id: RealId) -> RepoResult<()>;
}

impl<R: ObjectRepository + ?Sized> ObjectRepository for &R {
    fn insert_object(&self, object: &RealObject) -> RepoResult<RealId> {
        (**self).insert_object(object)
    }
    fn replace_object(&self, object: &RealObject) -> RepoResult<()> {
        (**self).replace_object(object)
    }
    fn get_object(&self, id: RealId) -> RepoResult<Option<RealObject>> {
        (**self).get_object(id)
    }
    fn exists(&self, id: RealId) -> RepoResult<bool> {
        (**self).exists(id)
    }
    fn ref_count(&self, id: RealId) -> RepoResult<Option<u32>> {
        (**self).ref_count(id)
    }
    fn adjust_ref_count(&self, id: RealId, delta: i64) -> RepoResult<u32> {
        (**self).adjust_ref_count(id, delta)
    }
    fn set_ref_count(&self, id: RealId, ref_count: u32) -> RepoResult<()> {
        (**self).set_ref_count(id, ref_count)
    }
    fn list_unreferenced(&self) -> RepoResult<Vec<RealId>> {
        (**self).list_unreferenced()
    }
    fn list_ids(&self) -> RepoResult<Vec<RealId>> {
        (**self).list_ids()
    }
    fn delete_object(&self, id: RealId) -> RepoResult<()> {
        (**self).delete_object(id)
    }
}

/// SQLite-backed real object repository.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn insert_object(&self, object: &RealObject) -> RepoResult<RealId> {
        object.validate()?;
        let handlers = encode_handlers(&object.meta.default_handlers)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO real_objects (
                real_id,
                name,
                ref_count,
                created_at,
                modified_at,
                default_handlers
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                object.real_id.to_string(),
                object.meta.name.as_str(),
                i64::from(object.meta.ref_count),
                object.meta.created_at,
                object.meta.modified_at,
                handlers,
            ],
        )?;
        insert_records(&tx, object.real_id, &object.records)?;
        tx.commit()?;

        Ok(object.real_id)
    }

    fn replace_object(&self, object: &RealObject) -> RepoResult<()> {
        object.validate()?;
        let handlers = encode_handlers(&object.meta.default_handlers)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE real_objects
             SET
                name = ?2,
                ref_count = ?3,
                created_at = ?4,
                modified_at = ?5,
                default_handlers = ?6
             WHERE real_id = ?1;",
            params![
                object.real_id.to_string(),
                object.meta.name.as_str(),
                i64::from(object.meta.ref_count),
                object.meta.created_at,
                object.meta.modified_at,
                handlers,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(object.real_id));
        }

        tx.execute(
            "DELETE FROM records WHERE real_id = ?1;",
            [object.real_id.to_string()],
        )?;
        insert_records(&tx, object.real_id, &object.records)?;
        tx.commit()?;
        Ok(())
    }

    fn get_object(&self, id: RealId) -> RepoResult<Option<RealObject>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{OBJECT_SELECT_SQL} WHERE real_id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let (real_id, meta) = parse_object_row(row)?;

        let mut record_stmt = self.conn.prepare(
            "SELECT record_no, content
             FROM records
             WHERE real_id = ?1
             ORDER BY record_no ASC;",
        )?;
        let mut record_rows = record_stmt.query([id.to_string()])?;
        let mut records = Vec::new();
        while let Some(record_row) = record_rows.next()? {
            let record_no: i64 = record_row.get("record_no")?;
            if record_no != records.len() as i64 {
                return Err(RepoError::InvalidData(format!(
                    "record numbers of {real_id} are not dense: expected {}, found {record_no}",
                    records.len()
                )));
            }
            records.push(Record::new(record_row.get::<_, String>("content")?));
        }

        let object = RealObject {
            real_id,
            meta,
            records,
        };
        object.validate()?;
        Ok(Some(object))
    }

    fn exists(&self, id: RealId) -> RepoResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM real_objects WHERE real_id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn ref_count(&self, id: RealId) -> RepoResult<Option<u32>> {
        let stored: Option<i64> = self
            .conn
            .query_row(
                "SELECT ref_count FROM real_objects WHERE real_id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        stored
            .map(|value| {
                u32::try_from(value).map_err(|_| {
                    RepoError::InvalidData(format!("ref_count of {id} out of range: {value}"))
                })
            })
            .transpose()
    }

    fn adjust_ref_count(&self, id: RealId, delta: i64) -> RepoResult<u32> {
        let current: i64 = self
            .conn
            .query_row(
                "SELECT ref_count FROM real_objects WHERE real_id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(RepoError::NotFound(id))?;

        let next = (current + delta).clamp(0, i64::from(u32::MAX));
        self.conn.execute(
            "UPDATE real_objects
             SET ref_count = ?2
             WHERE real_id = ?1;",
            params![id.to_string(), next],
        )?;
        Ok(next as u32)
    }

    fn set_ref_count(&self, id: RealId, ref_count: u32) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE real_objects
             SET ref_count = ?2
             WHERE real_id = ?1;",
            params![id.to_string(), i64::from(ref_count)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list_unreferenced(&self) -> RepoResult<Vec<RealId>> {
        query_ids(
            self.conn,
            "SELECT real_id FROM real_objects WHERE ref_count = 0 ORDER BY created_seq ASC;",
        )
    }

    fn list_ids(&self) -> RepoResult<Vec<RealId>> {
        query_ids(
            self.conn,
            "SELECT real_id FROM real_objects ORDER BY created_seq ASC;",
        )
    }

    fn delete_object(&self, id: RealId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM real_objects WHERE real_id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn insert_records(tx: &Transaction<'_>, real_id: RealId, records: &[Record]) -> RepoResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO records (real_id, record_no, content)
         VALUES (?1, ?2, ?3);",
    )?;
    for (record_no, record) in records.iter().enumerate() {
        stmt.execute(params![
            real_id.to_string(),
            record_no as i64,
            record.content.as_str()
        ])?;
    }
    Ok(())
}

fn query_ids(conn: &Connection, sql: &str) -> RepoResult<Vec<RealId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(parse_real_id(row)?);
    }
    Ok(ids)
}

fn parse_real_id(row: &Row<'_>) -> RepoResult<RealId> {
    let text: String = row.get("real_id")?;
    Uuid::parse_str(&text).map_err(|_| {
        RepoError::InvalidData(format!("invalid real_id value `{text}` in real_objects"))
    })
}

fn parse_object_row(row: &Row<'_>) -> RepoResult<(RealId, RealObjectMeta)> {
    let real_id = parse_real_id(row)?;

    let ref_count_raw: i64 = row.get("ref_count")?;
    let ref_count = u32::try_from(ref_count_raw).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid ref_count `{ref_count_raw}` for real object {real_id}"
        ))
    })?;

    let handlers_text: String = row.get("default_handlers")?;
    let default_handlers = serde_json::from_str::<BTreeMap<String, HandlerEntry>>(&handlers_text)
        .map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid default_handlers for real object {real_id}: {err}"
            ))
        })?;

    Ok((
        real_id,
        RealObjectMeta {
            name: row.get("name")?,
            ref_count,
            created_at: row.get("created_at")?,
            modified_at: row.get("modified_at")?,
            default_handlers,
        },
    ))
}

fn encode_handlers(handlers: &BTreeMap<String, HandlerEntry>) -> RepoResult<String> {
    serde_json::to_string(handlers)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode default_handlers: {err}")))
}
