//! Deep and shallow clone of real objects.
//!
//! # Invariants
//! - Deep clone walks an explicit work queue guarded by `VisitGuard`, so
//!   cycles and shared references are cloned exactly once.
//! - A clone's `ref_count` counts only rewritten links inside the clone
//!   set; references from outside the set are never cloned.
//! - Every link a clone writes that still points at an original object
//!   (budget overflow, shallow copy) is counted against that original.

use crate::codec::link_codec::{parse_links, serialize_links};
use crate::graph::guard::{Admission, VisitGuard};
use crate::model::real_object::{new_real_id, RealId, RealObject, Record};
use crate::repo::object_repo::{ObjectRepository, RepoError, RepoResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

/// Result of a deep clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneOutcome {
    pub new_root_id: RealId,
    /// Original id to clone id, for every object materialized.
    pub clone_map: HashMap<RealId, RealId>,
    /// `true` when the node budget left part of the graph uncloned.
    pub truncated: bool,
}

/// Deep-clones `root_id` and, transitively, every object it links to.
///
/// The root clone starts with the number of links inside the clone set
/// that point back at it (0 unless a cycle returns to the root); the
/// caller links it wherever it is pasted.
pub fn clone_deep<R: ObjectRepository>(
    repo: &R,
    root_id: RealId,
    max_nodes: usize,
) -> RepoResult<CloneOutcome> {
    let started_at = Instant::now();
    if !repo.exists(root_id)? {
        return Err(RepoError::NotFound(root_id));
    }

    let mut guard = VisitGuard::new(max_nodes);
    let mut clone_map = HashMap::new();
    let mut materialized = HashSet::new();
    let mut queue = VecDeque::new();
    let mut incoming: HashMap<RealId, u32> = HashMap::new();
    let mut outside_targets = Vec::new();
    let mut clones = Vec::new();

    guard.admit(root_id);
    let new_root_id = new_real_id();
    clone_map.insert(root_id, new_root_id);
    queue.push_back(root_id);

    while let Some(original_id) = queue.pop_front() {
        if !materialized.insert(original_id) {
            continue;
        }
        let Some(source) = repo.get_object(original_id)? else {
            continue;
        };

        let mut records = Vec::with_capacity(source.records.len());
        for record in &source.records {
            let mut links = parse_links(record);
            for link in &mut links {
                let target = link.target.real_id;
                let reserved = match clone_map.get(&target) {
                    Some(clone_id) => Some(*clone_id),
                    None if !repo.exists(target)? => None,
                    None => match guard.admit(target) {
                        Admission::Fresh(_) => {
                            let clone_id = new_real_id();
                            clone_map.insert(target, clone_id);
                            queue.push_back(target);
                            Some(clone_id)
                        }
                        Admission::Seen(_) => clone_map.get(&target).copied(),
                        Admission::Rejected => {
                            outside_targets.push(target);
                            None
                        }
                    },
                };

                if let Some(clone_id) = reserved {
                    link.target.real_id = clone_id;
                    *incoming.entry(clone_id).or_insert(0) += 1;
                }
            }
            records.push(serialize_links(record, &links));
        }

        let clone_id = clone_map[&original_id];
        let mut clone = RealObject::with_id(clone_id, source.meta.name.clone(), Record::empty());
        clone.meta.default_handlers = source.meta.default_handlers.clone();
        clone.records = records;
        clones.push(clone);
    }

    for clone in &mut clones {
        clone.meta.ref_count = incoming.get(&clone.real_id).copied().unwrap_or(0);
        repo.insert_object(clone)?;
    }
    for target in &outside_targets {
        repo.adjust_ref_count(*target, 1)?;
    }

    let truncated = guard.is_truncated();
    info!(
        "event=clone_deep module=service status=ok root={} new_root={} cloned={} truncated={} duration_ms={}",
        root_id,
        new_root_id,
        clones.len(),
        truncated,
        started_at.elapsed().as_millis()
    );
    Ok(CloneOutcome {
        new_root_id,
        clone_map,
        truncated,
    })
}

/// Copies one object's records verbatim under `new_name`.
///
/// Copied links keep pointing at the original targets and are counted
/// against them, so the new object is free-floating (`ref_count == 0`)
/// while every link it carries is live.
pub fn clone_shallow<R: ObjectRepository>(
    repo: &R,
    id: RealId,
    new_name: String,
) -> RepoResult<RealId> {
    let source = repo.get_object(id)?.ok_or(RepoError::NotFound(id))?;

    let mut clone = RealObject::new(new_name, Record::empty());
    clone.meta.default_handlers = source.meta.default_handlers.clone();
    clone.records = source.records.clone();
    let clone_id = repo.insert_object(&clone)?;

    for link in source.records.iter().flat_map(parse_links) {
        if repo.exists(link.target.real_id)? {
            repo.adjust_ref_count(link.target.real_id, 1)?;
        }
    }

    info!("event=clone_shallow module=service status=ok source={id} clone={clone_id}");
    Ok(clone_id)
}
