//! Load-order-wide record index.
//!
//! The indexing pass touches only record headers: every record is skipped, and
//! its location stored under its global identifier. A later file defining the
//! same identifier replaces the earlier location, which is how plugins override
//! their masters. Full decoding is deferred until a caller asks for a record,
//! through an [`Accessor`] positioned at the winning location.

use crate::accessor::Accessor;
use crate::error::Result;
use crate::format::Tag;
use crate::ident::GlobalId;
use crate::pool::Coordinator;
use crate::traversal::{self, HandlerSet, PluginFailure, TraversalStats};
use log::{debug, warn};
use std::collections::HashMap;

/// Where a record lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    pub file: usize,
    pub offset: u64,
    pub tag: Tag,
}

/// `GlobalId -> location` map with override tracking
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    entries: HashMap<GlobalId, RecordLocation>,
    overrides: usize,
    /// Overrides contributed per file
    overrides_by_file: HashMap<usize, usize>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every file of the load order.
    ///
    /// Each file is indexed on its own and folded in only once its walk has
    /// succeeded, so a file that fails part-way contributes nothing.
    pub fn build(coordinator: &Coordinator) -> (Self, Vec<PluginFailure>) {
        let mut index = Self::new();
        let mut failures = Vec::new();
        for (file, plugin) in coordinator.load_order().iter().enumerate() {
            let mut scratch = Self::new();
            match scratch.index_file(coordinator, file) {
                Ok(_) => index.merge(scratch),
                Err(error) => {
                    warn!("Leaving {} out of the index: {}", plugin.name(), error);
                    failures.push(PluginFailure {
                        index: file,
                        name: plugin.name().to_string(),
                        error,
                    });
                }
            }
            coordinator.close_file(file);
        }
        debug!(
            "Indexed {} records, {} overrides",
            index.len(),
            index.override_count()
        );
        (index, failures)
    }

    /// Index a single file into this index.
    ///
    /// On error the records seen before the failure are already inserted; index
    /// into a scratch `RecordIndex` and [`merge`](Self::merge) it to avoid that.
    pub fn index_file(
        &mut self,
        coordinator: &Coordinator,
        file: usize,
    ) -> Result<TraversalStats> {
        let mut handlers = self.handlers();
        traversal::walk_file(coordinator, file, &mut handlers)
    }

    /// A handler set that records every non-header record into this index
    pub fn handlers(&mut self) -> HandlerSet<'_> {
        let mut handlers = HandlerSet::new();
        handlers.fallback(move |accessor, _| {
            let header = accessor.skip_record()?;
            if header.tag != Tag::TES4 && !header.id.is_null() {
                self.insert(
                    header.id,
                    RecordLocation {
                        file: accessor.file(),
                        offset: header.offset,
                        tag: header.tag,
                    },
                );
            }
            Ok(())
        });
        handlers
    }

    /// Insert a location, returning the one it replaced
    pub fn insert(&mut self, id: GlobalId, location: RecordLocation) -> Option<RecordLocation> {
        let previous = self.entries.insert(id, location);
        if previous.is_some() {
            self.overrides += 1;
            *self.overrides_by_file.entry(location.file).or_insert(0) += 1;
        }
        previous
    }

    /// Fold in an index built separately over later files
    pub fn merge(&mut self, later: RecordIndex) {
        for (id, location) in later.entries {
            self.insert(id, location);
        }
        // overrides inside `later` itself
        self.overrides += later.overrides;
        for (file, count) in later.overrides_by_file {
            *self.overrides_by_file.entry(file).or_insert(0) += count;
        }
    }

    pub fn get(&self, id: GlobalId) -> Option<&RecordLocation> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many times an identifier was redefined
    pub fn override_count(&self) -> usize {
        self.overrides
    }

    /// Overrides contributed by one file
    pub fn overrides_in(&self, file: usize) -> usize {
        self.overrides_by_file.get(&file).copied().unwrap_or(0)
    }

    /// Identifiers defined for one record type
    pub fn ids_tagged(&self, tag: Tag) -> impl Iterator<Item = GlobalId> + '_ {
        self.entries
            .iter()
            .filter(move |(_, location)| location.tag == tag)
            .map(|(id, _)| *id)
    }

    /// Accessor positioned at the winning definition of `id`
    pub fn accessor<'c>(
        &self,
        coordinator: &'c Coordinator,
        id: GlobalId,
    ) -> Result<Option<Accessor<'c>>> {
        match self.entries.get(&id) {
            Some(location) => coordinator
                .accessor_at(location.file, location.offset)
                .map(Some),
            None => Ok(None),
        }
    }
}
