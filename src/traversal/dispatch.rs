//! Tag-keyed handler registry.
//!
//! The store never needs to know the full set of record types: callers map the
//! tags they care about to handlers, and everything else is skipped. Different
//! passes over the same data simply use different [`HandlerSet`]s.

use crate::accessor::Accessor;
use crate::error::Result;
use crate::format::{GroupType, RecordHeader, Tag};
use crate::ident::GlobalId;
use crate::records::Record;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;

/// Where in the file hierarchy a record was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraversalContext {
    /// Global index of the file being walked
    pub file: usize,
    pub world: Option<GlobalId>,
    pub cell: Option<GlobalId>,
    pub topic: Option<GlobalId>,
    /// Cell-children partition, for references
    pub partition: Option<GroupType>,
}

/// Something that consumes records of one or more types.
///
/// The accessor is positioned at the record's first byte. A handler must leave
/// it just past the record; one that does not move it at all has the record
/// skipped for it. Stopping part-way, e.g. after only
/// [`read_record_header`](Accessor::read_record_header), fails the walk with a
/// `Desync` naming the record's tag.
pub trait RecordHandler {
    fn handle(&mut self, accessor: &mut Accessor<'_>, context: &TraversalContext) -> Result<()>;
}

impl<F> RecordHandler for F
where
    F: FnMut(&mut Accessor<'_>, &TraversalContext) -> Result<()>,
{
    fn handle(&mut self, accessor: &mut Accessor<'_>, context: &TraversalContext) -> Result<()> {
        self(accessor, context)
    }
}

/// Adapter that decodes a `T` before calling the wrapped closure
struct Typed<T, F> {
    callback: F,
    _record: PhantomData<fn() -> T>,
}

impl<T, F> RecordHandler for Typed<T, F>
where
    T: Record,
    F: FnMut(RecordHeader, T, &TraversalContext) -> Result<()>,
{
    fn handle(&mut self, accessor: &mut Accessor<'_>, context: &TraversalContext) -> Result<()> {
        let (header, record) = accessor.read_record::<T>()?;
        (self.callback)(header, record, context)
    }
}

/// Mapping from record tag to handler
#[derive(Default)]
pub struct HandlerSet<'h> {
    handlers: Vec<Box<dyn RecordHandler + 'h>>,
    by_tag: HashMap<Tag, usize>,
    fallback: Option<usize>,
}

impl<'h> HandlerSet<'h> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            by_tag: HashMap::new(),
            fallback: None,
        }
    }

    /// Register one handler for every tag in `tags`, replacing earlier registrations
    pub fn insert_many(&mut self, tags: &[Tag], handler: impl RecordHandler + 'h) -> &mut Self {
        let index = self.handlers.len();
        self.handlers.push(Box::new(handler));
        for tag in tags {
            self.by_tag.insert(*tag, index);
        }
        self
    }

    pub fn insert(&mut self, tag: Tag, handler: impl RecordHandler + 'h) -> &mut Self {
        self.insert_many(&[tag], handler)
    }

    /// Register a closure working directly on the accessor
    pub fn on_raw<F>(&mut self, tag: Tag, handler: F) -> &mut Self
    where
        F: FnMut(&mut Accessor<'_>, &TraversalContext) -> Result<()> + 'h,
    {
        self.insert(tag, handler)
    }

    /// Register a closure receiving decoded `T` records, for every tag `T` decodes
    ///
    /// # Example
    /// ```ignore
    /// let mut cells = Vec::new();
    /// let mut handlers = HandlerSet::new();
    /// handlers.on::<Cell, _>(|header, cell, _| {
    ///     cells.push((header.id, cell));
    ///     Ok(())
    /// });
    /// ```
    pub fn on<T, F>(&mut self, callback: F) -> &mut Self
    where
        T: Record + 'h,
        F: FnMut(RecordHeader, T, &TraversalContext) -> Result<()> + 'h,
    {
        self.insert_many(
            T::TAGS,
            Typed {
                callback,
                _record: PhantomData,
            },
        )
    }

    /// Handler for records no tag-specific handler claims
    pub fn fallback<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&mut Accessor<'_>, &TraversalContext) -> Result<()> + 'h,
    {
        let index = self.handlers.len();
        self.handlers.push(Box::new(handler));
        self.fallback = Some(index);
        self
    }

    pub fn handles(&self, tag: Tag) -> bool {
        self.by_tag.contains_key(&tag) || self.fallback.is_some()
    }

    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut (dyn RecordHandler + 'h)> {
        let index = self.by_tag.get(&tag).copied().or(self.fallback)?;
        Some(self.handlers[index].as_mut())
    }
}

impl std::fmt::Debug for HandlerSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSet")
            .field("tags", &self.by_tag.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Counters for one traversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Records passed to a handler
    pub dispatched: u64,
    /// Records skipped because nothing handled them
    pub skipped: u64,
    pub groups: u64,
    pub per_tag: BTreeMap<Tag, u64>,
}

impl TraversalStats {
    pub fn records(&self) -> u64 {
        self.dispatched + self.skipped
    }

    pub fn merge(&mut self, other: &TraversalStats) {
        self.dispatched += other.dispatched;
        self.skipped += other.skipped;
        self.groups += other.groups;
        for (tag, count) in &other.per_tag {
            *self.per_tag.entry(*tag).or_insert(0) += count;
        }
    }
}
