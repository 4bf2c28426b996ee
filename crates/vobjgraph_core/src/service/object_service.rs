//! Real object store service.
//!
//! # Responsibility
//! - Provide create/load/save and the reference-count lifecycle.
//! - Offer link-aware edits that keep `ref_count` in step with content.
//! - Rebuild counts from the actual link population on demand.
//!
//! # Invariants
//! - `ref_count(X)` equals the number of live links targeting X, as long as
//!   every link edit goes through `add_link`/`remove_link` or is paired
//!   with `link_to`/`unlink_from` by the caller.
//! - `link_to`/`unlink_from` are unsynchronized read-modify-writes; with
//!   more than one writer per id, run `reconcile()` to repair drift.
//! - `physical_delete` ignores `ref_count`; callers own dangling links.

use crate::codec::link_codec::{parse_links, remove_link_at, serialize_links};
use crate::graph::traversal::{build_reference_graph, ReferenceGraph};
use crate::model::link::Link;
use crate::model::real_object::{now_epoch_ms, HandlerEntry, RealId, RealObject, Record, RecordNo};
use crate::repo::object_repo::{ObjectRepository, RepoError, RepoResult};
use crate::service::clone_ops::{clone_deep, clone_shallow, CloneOutcome};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Default node budget for traversal and deep clone.
pub const DEFAULT_MAX_NODES: usize = 256;

/// One `ref_count` correction applied by `reconcile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefCountRepair {
    pub real_id: RealId,
    pub stored: u32,
    pub actual: u32,
}

/// Summary of one `reconcile` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Number of objects scanned.
    pub scanned: usize,
    /// Links whose target no longer exists.
    pub dangling_links: usize,
    pub repairs: Vec<RefCountRepair>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.repairs.is_empty()
    }
}

/// Use-case service over a real object repository.
pub struct ObjectService<R: ObjectRepository> {
    repo: R,
}

impl<R: ObjectRepository> ObjectService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Borrows the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Creates an unreferenced object with one record.
    pub fn create(&self, name: impl Into<String>, initial_record: Record) -> RepoResult<RealId> {
        let object = RealObject::new(name, initial_record);
        let id = self.repo.insert_object(&object)?;
        info!("event=object_create module=service status=ok real_id={id}");
        Ok(id)
    }

    /// Loads one object.
    pub fn load(&self, id: RealId) -> RepoResult<RealObject> {
        self.repo.get_object(id)?.ok_or(RepoError::NotFound(id))
    }

    /// Replaces an object's metadata and records.
    ///
    /// `modified_at` is refreshed. The stored `ref_count` is kept: counts
    /// change only through link operations and `reconcile`.
    pub fn save(&self, id: RealId, object: &RealObject) -> RepoResult<()> {
        let current = self.load(id)?;
        let mut next = object.clone();
        next.real_id = id;
        next.meta.ref_count = current.meta.ref_count;
        next.meta.created_at = current.meta.created_at;
        next.meta.modified_at = now_epoch_ms().max(current.meta.created_at);
        self.repo.replace_object(&next)
    }

    /// Records one more live link pointing at `id`.
    pub fn link_to(&self, id: RealId) -> RepoResult<u32> {
        self.repo.adjust_ref_count(id, 1)
    }

    /// Records one fewer live link pointing at `id`, flooring at zero.
    pub fn unlink_from(&self, id: RealId) -> RepoResult<u32> {
        self.repo.adjust_ref_count(id, -1)
    }

    /// Lists unreferenced objects in creation order.
    pub fn list_unreferenced(&self) -> RepoResult<Vec<RealId>> {
        self.repo.list_unreferenced()
    }

    /// Lists every object in creation order.
    pub fn list_ids(&self) -> RepoResult<Vec<RealId>> {
        self.repo.list_ids()
    }

    /// Irreversibly removes an object and all its records.
    ///
    /// Works on objects whose stored content no longer validates.
    pub fn physical_delete(&self, id: RealId) -> RepoResult<()> {
        let ref_count = self.repo.ref_count(id)?.ok_or(RepoError::NotFound(id))?;
        self.repo.delete_object(id)?;
        if ref_count > 0 {
            warn!(
                "event=object_delete module=service status=ok real_id={id} dangling_refs={ref_count}"
            );
        } else {
            info!("event=object_delete module=service status=ok real_id={id}");
        }
        Ok(())
    }

    /// Renames an object.
    pub fn rename(&self, id: RealId, name: impl Into<String>) -> RepoResult<()> {
        let mut object = self.load(id)?;
        object.meta.name = name.into();
        self.save(id, &object)
    }

    /// Sets `handler_id` as the object's default handler.
    ///
    /// Any other handler loses its default flag.
    pub fn set_default_handler(
        &self,
        id: RealId,
        handler_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> RepoResult<()> {
        let mut object = self.load(id)?;
        for entry in object.meta.default_handlers.values_mut() {
            entry.is_default = false;
        }
        object.meta.default_handlers.insert(
            handler_id.into(),
            HandlerEntry {
                display_name: display_name.into(),
                is_default: true,
            },
        );
        self.save(id, &object)
    }

    /// Appends a record and returns its number.
    ///
    /// Links contained in `record` are counted against their targets.
    pub fn append_record(&self, id: RealId, record: Record) -> RepoResult<RecordNo> {
        let mut object = self.load(id)?;
        let targets = parse_links(&record)
            .into_iter()
            .map(|link| link.target.real_id)
            .collect::<Vec<_>>();
        object.records.push(record);
        let record_no = (object.records.len() - 1) as RecordNo;
        self.save(id, &object)?;
        for target in targets {
            if self.repo.exists(target)? {
                self.link_to(target)?;
            }
        }
        Ok(record_no)
    }

    /// Embeds `link` into one record and counts it against its target.
    ///
    /// Returns the index of the new link within the record.
    pub fn add_link(&self, source: RealId, record_no: RecordNo, link: Link) -> RepoResult<usize> {
        link.validate()?;
        if !self.repo.exists(link.target.real_id)? {
            return Err(RepoError::NotFound(link.target.real_id));
        }

        let mut object = self.load(source)?;
        let target = link.target.real_id;
        let record = object
            .record_mut(record_no)
            .ok_or(RepoError::RecordNotFound {
                real_id: source,
                record_no,
            })?;
        let mut links = parse_links(record);
        links.push(link);
        let index = links.len() - 1;
        *record = serialize_links(record, &links);

        self.save(source, &object)?;
        self.link_to(target)?;
        Ok(index)
    }

    /// Removes the `index`-th link of one record and releases its target.
    pub fn remove_link(
        &self,
        source: RealId,
        record_no: RecordNo,
        index: usize,
    ) -> RepoResult<Link> {
        let mut object = self.load(source)?;
        let record = object
            .record_mut(record_no)
            .ok_or(RepoError::RecordNotFound {
                real_id: source,
                record_no,
            })?;
        let (removed, rewritten) =
            remove_link_at(record, index).ok_or(RepoError::LinkNotFound {
                real_id: source,
                record_no,
                index,
            })?;
        *record = rewritten;

        self.save(source, &object)?;
        match self.unlink_from(removed.target.real_id) {
            Ok(_) | Err(RepoError::NotFound(_)) => Ok(removed),
            Err(err) => Err(err),
        }
    }

    /// Recomputes every `ref_count` from the links present in the store.
    ///
    /// Running it twice in a row leaves the store unchanged the second time.
    pub fn reconcile(&self) -> RepoResult<ReconcileReport> {
        let started_at = Instant::now();
        let ids = self.repo.list_ids()?;
        let mut actual = ids
            .iter()
            .map(|id| (*id, 0u32))
            .collect::<HashMap<_, _>>();
        let mut stored = HashMap::with_capacity(ids.len());
        let mut report = ReconcileReport {
            scanned: ids.len(),
            ..ReconcileReport::default()
        };

        for id in &ids {
            let Some(object) = self.repo.get_object(*id)? else {
                continue;
            };
            stored.insert(*id, object.meta.ref_count);
            for link in object.records.iter().flat_map(parse_links) {
                match actual.get_mut(&link.target.real_id) {
                    Some(count) => *count = count.saturating_add(1),
                    None => report.dangling_links += 1,
                }
            }
        }

        for id in &ids {
            let (Some(stored_count), Some(actual_count)) = (stored.get(id), actual.get(id)) else {
                continue;
            };
            if stored_count != actual_count {
                self.repo.set_ref_count(*id, *actual_count)?;
                report.repairs.push(RefCountRepair {
                    real_id: *id,
                    stored: *stored_count,
                    actual: *actual_count,
                });
            }
        }

        info!(
            "event=reconcile module=service status=ok scanned={} repaired={} dangling_links={} duration_ms={}",
            report.scanned,
            report.repairs.len(),
            report.dangling_links,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Deep-clones `root_id` and everything reachable from it, up to
    /// `max_nodes` objects.
    pub fn clone_deep(&self, root_id: RealId, max_nodes: usize) -> RepoResult<CloneOutcome> {
        clone_deep(&self.repo, root_id, max_nodes)
    }

    /// Duplicates one object's records under `new_name`.
    pub fn clone_shallow(&self, id: RealId, new_name: impl Into<String>) -> RepoResult<RealId> {
        clone_shallow(&self.repo, id, new_name.into())
    }

    /// Walks the link graph rooted at `root_id`.
    pub fn build_reference_graph(
        &self,
        root_id: RealId,
        max_nodes: usize,
    ) -> RepoResult<ReferenceGraph> {
        build_reference_graph(&self.repo, root_id, max_nodes)
    }
}
