//! Real object domain model.
//!
//! # Responsibility
//! - Define the persistent content-bearing entity and its metadata.
//! - Provide constructors that honor the creation lifecycle.
//!
//! # Invariants
//! - `real_id` is assigned once and never reused.
//! - `records` is never empty; record numbers are vector indices.
//! - `ref_count` is only changed through the store, never by content edits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable, time-ordered identifier of a real object.
pub type RealId = Uuid;

/// Dense record index inside one real object.
pub type RecordNo = u32;

/// Allocates a fresh identifier.
///
/// UUIDv7 embeds the creation timestamp, so identifiers sort in creation
/// order and the creation time can be derived from the id alone.
pub fn new_real_id() -> RealId {
    Uuid::now_v7()
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// One entry of the per-object default handler table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerEntry {
    pub display_name: String,
    pub is_default: bool,
}

/// Metadata unit persisted once per real object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealObjectMeta {
    pub name: String,
    /// Number of live links store-wide that target this object.
    pub ref_count: u32,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds; refreshed on every save.
    pub modified_at: i64,
    /// Keyed by handler id; ordered for stable persistence.
    pub default_handlers: BTreeMap<String, HandlerEntry>,
}

/// One content segment of a real object.
///
/// Content is an opaque markup document that may embed link elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub content: String,
}

impl Record {
    /// Document skeleton used for freshly created objects.
    pub const EMPTY_DOCUMENT: &'static str = "<document>\n</document>\n";

    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Creates a record holding an empty document.
    pub fn empty() -> Self {
        Self::new(Self::EMPTY_DOCUMENT)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::empty()
    }
}

/// Persistent content-bearing entity, the "inode" of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealObject {
    pub real_id: RealId,
    pub meta: RealObjectMeta,
    pub records: Vec<Record>,
}

/// Validation failures for real object writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectValidationError {
    /// Every real object must keep at least one record.
    NoRecords(RealId),
    /// `modified_at` must not precede `created_at`.
    ModifiedBeforeCreated {
        created_at: i64,
        modified_at: i64,
    },
}

impl Display for ObjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecords(id) => write!(f, "real object {id} has no records"),
            Self::ModifiedBeforeCreated {
                created_at,
                modified_at,
            } => write!(
                f,
                "modified_at ({modified_at}) is earlier than created_at ({created_at})"
            ),
        }
    }
}

impl Error for ObjectValidationError {}

impl RealObject {
    /// Creates a new, unreferenced object with one record and a fresh id.
    pub fn new(name: impl Into<String>, initial_record: Record) -> Self {
        Self::with_id(new_real_id(), name, initial_record)
    }

    /// Creates a new object under a caller-reserved id.
    ///
    /// Used by clone paths that must know the id before content is written.
    pub fn with_id(real_id: RealId, name: impl Into<String>, initial_record: Record) -> Self {
        let now = now_epoch_ms();
        Self {
            real_id,
            meta: RealObjectMeta {
                name: name.into(),
                ref_count: 0,
                created_at: now,
                modified_at: now,
                default_handlers: BTreeMap::new(),
            },
            records: vec![initial_record],
        }
    }

    /// Returns whether no live link targets this object.
    pub fn is_unreferenced(&self) -> bool {
        self.meta.ref_count == 0
    }

    pub fn record(&self, record_no: RecordNo) -> Option<&Record> {
        self.records.get(record_no as usize)
    }

    pub fn record_mut(&mut self, record_no: RecordNo) -> Option<&mut Record> {
        self.records.get_mut(record_no as usize)
    }

    /// Checks structural invariants before persistence.
    pub fn validate(&self) -> Result<(), ObjectValidationError> {
        if self.records.is_empty() {
            return Err(ObjectValidationError::NoRecords(self.real_id));
        }
        if self.meta.modified_at < self.meta.created_at {
            return Err(ObjectValidationError::ModifiedBeforeCreated {
                created_at: self.meta.created_at,
                modified_at: self.meta.modified_at,
            });
        }
        Ok(())
    }
}
