//! The traversal driver.
//!
//! A plugin is a `TES4` header record followed by `Top` groups, one per record
//! type. Most `Top` groups are a flat run of records of the labelled type. Three
//! are hierarchies and get their own paths:
//!
//! ```text
//! Top(CELL)  -> InteriorCellBlock -> InteriorCellSubBlock -> CELL [CellChildren]
//! Top(WRLD)  -> WRLD [WorldChildren -> ROAD? CELL? [CellChildren]
//!                      ExteriorCellBlock -> ExteriorCellSubBlock -> CELL [CellChildren]]
//! Top(DIAL)  -> DIAL [TopicChildren -> INFO*]
//!
//! CellChildren -> CellPersistentChildren       -> REFR/ACHR/ACRE*
//!              -> CellTemporaryChildren        -> LAND? PGRD? REFR/ACHR/ACRE*
//!              -> CellVisibleDistantChildren   -> REFR/ACHR/ACRE*
//! ```
//!
//! Every children group is optional. The driver decides what comes next with
//! peeks, so a missing group is just zero children.

pub mod dispatch;

pub use dispatch::{HandlerSet, RecordHandler, TraversalContext, TraversalStats};

use crate::accessor::Accessor;
use crate::error::{Result, StoreError};
use crate::format::{Group, GroupType, RecordHeader, Tag, RECORD_HEADER_SIZE};
use crate::ident::GlobalId;
use crate::pool::Coordinator;
use log::{debug, info, warn};

const REFERENCES: &[Tag] = &[Tag::REFR, Tag::ACHR, Tag::ACRE];

/// Walks one file and dispatches every record it meets.
pub struct Walker<'r, 'h> {
    handlers: &'r mut HandlerSet<'h>,
    stats: TraversalStats,
}

impl<'r, 'h> Walker<'r, 'h> {
    pub fn new(handlers: &'r mut HandlerSet<'h>) -> Self {
        Self {
            handlers,
            stats: TraversalStats::default(),
        }
    }

    pub fn stats(&self) -> &TraversalStats {
        &self.stats
    }

    pub fn into_stats(self) -> TraversalStats {
        self.stats
    }

    /// Walk a whole file from its first byte
    ///
    /// # Errors
    /// * `Truncated` if the file is empty
    /// * `Desync` if it does not start with a `TES4` record
    /// * `GroupSchema` for a group out of place or a record at top level
    pub fn walk(&mut self, accessor: &mut Accessor<'_>) -> Result<()> {
        let context = TraversalContext {
            file: accessor.file(),
            ..TraversalContext::default()
        };

        match accessor.peek_record_type()? {
            Some(Tag::TES4) => self.dispatch(accessor, Tag::TES4, &context)?,
            Some(other) => {
                return Err(StoreError::desync(accessor.position(), "TES4", other));
            }
            None => {
                return Err(StoreError::Truncated {
                    offset: accessor.position(),
                    needed: RECORD_HEADER_SIZE,
                    available: 0,
                });
            }
        }

        while accessor.peek_group_type()?.is_some() {
            let group = accessor.read_group()?.expect_type(GroupType::Top)?;
            self.stats.groups += 1;
            self.top_group(accessor, &group, &context)?;
            expect_end(accessor, &group)?;
        }

        if let Some(tag) = accessor.peek_record_type()? {
            return Err(StoreError::group_schema(
                accessor.position(),
                format!("{tag} record outside of any group"),
            ));
        }
        Ok(())
    }

    fn top_group(
        &mut self,
        accessor: &mut Accessor<'_>,
        group: &Group,
        context: &TraversalContext,
    ) -> Result<()> {
        let label = group.label.record_type().ok_or_else(|| {
            StoreError::group_schema(group.offset, "top group without a record type label")
        })?;
        debug!("{}: {label} group at {:#x}", accessor.file_name(), group.offset);

        match label {
            Tag::CELL => self.interior_cells(accessor, group, context),
            Tag::WRLD => self.worlds(accessor, group, context),
            Tag::DIAL => self.topics(accessor, group, context),
            _ => self.flat_run(accessor, group, context),
        }
    }

    /// Read a `Top` group's children as a run of records of its label's type.
    ///
    /// The accessor must be at the group's first child. Hierarchy labels are
    /// refused: their children are groups, not records.
    pub fn flat_run(
        &mut self,
        accessor: &mut Accessor<'_>,
        group: &Group,
        context: &TraversalContext,
    ) -> Result<()> {
        let label = match group.label.record_type() {
            Some(tag) if !tag.is_structural() => tag,
            Some(tag) => {
                return Err(StoreError::group_schema(
                    group.offset,
                    format!("{tag} group holds nested groups and cannot be read as a record run"),
                ))
            }
            None => {
                return Err(StoreError::group_schema(
                    group.offset,
                    format!("{:?} group cannot be read as a record run", group.group_type),
                ))
            }
        };
        self.records(accessor, group.end_offset(), &[label], context)
    }

    /// Dispatch records until `end`; each must carry one of `accepted`
    fn records(
        &mut self,
        accessor: &mut Accessor<'_>,
        end: u64,
        accepted: &[Tag],
        context: &TraversalContext,
    ) -> Result<()> {
        while accessor.position() < end {
            let tag = self.expect_record(accessor, end, accepted)?;
            self.dispatch(accessor, tag, context)?;
        }
        Ok(())
    }

    fn interior_cells(
        &mut self,
        accessor: &mut Accessor<'_>,
        top: &Group,
        context: &TraversalContext,
    ) -> Result<()> {
        while accessor.position() < top.end_offset() {
            let block = self.child_group(accessor, GroupType::InteriorCellBlock)?;
            while accessor.position() < block.end_offset() {
                let sub_block = self.child_group(accessor, GroupType::InteriorCellSubBlock)?;
                self.cells(accessor, sub_block.end_offset(), context)?;
                expect_end(accessor, &sub_block)?;
            }
            expect_end(accessor, &block)?;
        }
        Ok(())
    }

    fn exterior_cells(
        &mut self,
        accessor: &mut Accessor<'_>,
        end: u64,
        context: &TraversalContext,
    ) -> Result<()> {
        while accessor.position() < end {
            let block = self.child_group(accessor, GroupType::ExteriorCellBlock)?;
            while accessor.position() < block.end_offset() {
                let sub_block = self.child_group(accessor, GroupType::ExteriorCellSubBlock)?;
                self.cells(accessor, sub_block.end_offset(), context)?;
                expect_end(accessor, &sub_block)?;
            }
            expect_end(accessor, &block)?;
        }
        Ok(())
    }

    /// Cells, each optionally followed by its children group
    fn cells(&mut self, accessor: &mut Accessor<'_>, end: u64, context: &TraversalContext) -> Result<()> {
        while accessor.position() < end {
            self.cell(accessor, end, context)?;
        }
        Ok(())
    }

    fn cell(&mut self, accessor: &mut Accessor<'_>, end: u64, context: &TraversalContext) -> Result<()> {
        self.expect_record(accessor, end, &[Tag::CELL])?;
        let header = probe_header(accessor)?;
        let context = TraversalContext {
            cell: Some(header.id),
            partition: None,
            ..*context
        };
        self.dispatch(accessor, Tag::CELL, &context)?;

        if accessor.position() >= end {
            return Ok(());
        }
        if accessor.peek_group_type()? != Some(GroupType::CellChildren) {
            // no children; the next unit is a sibling
            return Ok(());
        }

        let children = self.child_group(accessor, GroupType::CellChildren)?;
        expect_parent(&children, header.id)?;
        while accessor.position() < children.end_offset() {
            let partition = accessor.read_group()?;
            self.stats.groups += 1;
            expect_parent(&partition, header.id)?;
            let context = TraversalContext {
                partition: Some(partition.group_type),
                ..context
            };
            match partition.group_type {
                GroupType::CellPersistentChildren | GroupType::CellVisibleDistantChildren => {
                    self.records(accessor, partition.end_offset(), REFERENCES, &context)?
                }
                GroupType::CellTemporaryChildren => {
                    self.temporary_children(accessor, partition.end_offset(), &context)?
                }
                other => {
                    return Err(StoreError::group_schema(
                        partition.offset,
                        format!("{other:?} group inside cell children"),
                    ))
                }
            }
            expect_end(accessor, &partition)?;
        }
        expect_end(accessor, &children)
    }

    /// At most one `LAND` and one `PGRD`, ahead of the references
    fn temporary_children(
        &mut self,
        accessor: &mut Accessor<'_>,
        end: u64,
        context: &TraversalContext,
    ) -> Result<()> {
        let mut seen_land = false;
        let mut seen_grid = false;
        let mut in_references = false;

        while accessor.position() < end {
            let accepted: Vec<Tag> = REFERENCES
                .iter()
                .copied()
                .chain((!in_references && !seen_land).then_some(Tag::LAND))
                .chain((!in_references && !seen_grid).then_some(Tag::PGRD))
                .collect();
            let tag = self.expect_record(accessor, end, &accepted)?;
            match tag {
                Tag::LAND => seen_land = true,
                Tag::PGRD => seen_grid = true,
                _ => in_references = true,
            }
            self.dispatch(accessor, tag, context)?;
        }
        Ok(())
    }

    fn worlds(
        &mut self,
        accessor: &mut Accessor<'_>,
        top: &Group,
        context: &TraversalContext,
    ) -> Result<()> {
        let end = top.end_offset();
        while accessor.position() < end {
            self.expect_record(accessor, end, &[Tag::WRLD])?;
            let header = probe_header(accessor)?;
            let context = TraversalContext {
                world: Some(header.id),
                ..*context
            };
            self.dispatch(accessor, Tag::WRLD, &context)?;

            if accessor.position() < end
                && accessor.peek_group_type()? == Some(GroupType::WorldChildren)
            {
                let children = self.child_group(accessor, GroupType::WorldChildren)?;
                expect_parent(&children, header.id)?;
                self.world_children(accessor, &children, &context)?;
                expect_end(accessor, &children)?;
            }
        }
        Ok(())
    }

    fn world_children(
        &mut self,
        accessor: &mut Accessor<'_>,
        children: &Group,
        context: &TraversalContext,
    ) -> Result<()> {
        let end = children.end_offset();

        if accessor.position() < end && accessor.peek_record_type()? == Some(Tag::ROAD) {
            self.dispatch(accessor, Tag::ROAD, context)?;
        }
        // the persistent cell holds references that are loaded for the whole world
        if accessor.position() < end && accessor.peek_record_type()? == Some(Tag::CELL) {
            self.cell(accessor, end, context)?;
        }
        let context = TraversalContext {
            cell: None,
            partition: None,
            ..*context
        };
        self.exterior_cells(accessor, end, &context)
    }

    fn topics(
        &mut self,
        accessor: &mut Accessor<'_>,
        top: &Group,
        context: &TraversalContext,
    ) -> Result<()> {
        let end = top.end_offset();
        while accessor.position() < end {
            self.expect_record(accessor, end, &[Tag::DIAL])?;
            let header = probe_header(accessor)?;
            let context = TraversalContext {
                topic: Some(header.id),
                ..*context
            };
            self.dispatch(accessor, Tag::DIAL, &context)?;

            if accessor.position() < end
                && accessor.peek_group_type()? == Some(GroupType::TopicChildren)
            {
                let infos = self.child_group(accessor, GroupType::TopicChildren)?;
                expect_parent(&infos, header.id)?;
                self.records(accessor, infos.end_offset(), &[Tag::INFO], &context)?;
                expect_end(accessor, &infos)?;
            }
        }
        Ok(())
    }

    /// Read a group that must be of `expected` type
    fn child_group(&mut self, accessor: &mut Accessor<'_>, expected: GroupType) -> Result<Group> {
        let group = accessor.read_group()?.expect_type(expected)?;
        self.stats.groups += 1;
        Ok(group)
    }

    /// Peek the next unit, which must be a record with one of `accepted` tags
    fn expect_record(
        &mut self,
        accessor: &mut Accessor<'_>,
        end: u64,
        accepted: &[Tag],
    ) -> Result<Tag> {
        let offset = accessor.position();
        match accessor.peek_record_type()? {
            Some(tag) if accepted.contains(&tag) => Ok(tag),
            Some(Tag::GRUP) => Err(StoreError::group_schema(
                offset,
                format!("unexpected group where {} was expected", join(accepted)),
            )),
            Some(tag) => Err(StoreError::desync(offset, join(accepted), tag)),
            None => Err(StoreError::Truncated {
                offset,
                needed: end - offset,
                available: 0,
            }),
        }
    }

    fn dispatch(
        &mut self,
        accessor: &mut Accessor<'_>,
        tag: Tag,
        context: &TraversalContext,
    ) -> Result<()> {
        *self.stats.per_tag.entry(tag).or_insert(0) += 1;
        let start = accessor.position();
        match self.handlers.get_mut(tag) {
            Some(handler) => {
                handler.handle(accessor, context)?;
                if accessor.position() == start {
                    accessor.skip_record()?;
                } else {
                    expect_consumed(accessor, start, tag)?;
                }
                self.stats.dispatched += 1;
            }
            None => {
                accessor.skip_record()?;
                self.stats.skipped += 1;
            }
        }
        Ok(())
    }
}

/// Read the header at the accessor's position through a copy, leaving it in place
fn probe_header(accessor: &Accessor<'_>) -> Result<RecordHeader> {
    let mut probe = *accessor;
    probe.read_record_header()
}

/// A handler that moved the accessor must have left it past the whole record
fn expect_consumed(accessor: &Accessor<'_>, start: u64, tag: Tag) -> Result<()> {
    let mut record = *accessor;
    record.seek(start);
    let end = record.read_record_header()?.end_offset();
    if accessor.position() < end {
        return Err(StoreError::desync(
            accessor.position(),
            format!("end of the {tag} record at {end:#x}, left there by its handler"),
            tag,
        ));
    }
    Ok(())
}

fn expect_end(accessor: &Accessor<'_>, group: &Group) -> Result<()> {
    if accessor.position() != group.end_offset() {
        return Err(StoreError::group_schema(
            group.offset,
            format!(
                "{:?} group should end at {:#x}, its content ends at {:#x}",
                group.group_type,
                group.end_offset(),
                accessor.position()
            ),
        ));
    }
    Ok(())
}

fn expect_parent(group: &Group, parent: GlobalId) -> Result<()> {
    match group.label.parent() {
        Some(id) if *id == parent => Ok(()),
        other => Err(StoreError::group_schema(
            group.offset,
            format!(
                "{:?} group belongs to {}, expected {parent}",
                group.group_type,
                other.map(ToString::to_string).unwrap_or_else(|| "nothing".to_string())
            ),
        )),
    }
}

fn join(tags: &[Tag]) -> String {
    tags.iter()
        .map(Tag::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// Walk one file of the load order
pub fn walk_file(
    coordinator: &Coordinator,
    file: usize,
    handlers: &mut HandlerSet<'_>,
) -> Result<TraversalStats> {
    let mut accessor = coordinator.accessor(file)?;
    let mut walker = Walker::new(handlers);
    let name = accessor.file_name();
    walker.walk(&mut accessor).map_err(|e| e.in_file(name))?;
    Ok(walker.into_stats())
}

/// A file whose traversal failed
#[derive(Debug)]
pub struct PluginFailure {
    pub index: usize,
    pub name: String,
    pub error: StoreError,
}

/// Outcome of walking every file in the load order
#[derive(Debug, Default)]
pub struct LoadOrderWalk {
    /// Per successfully walked file: its index and counters
    pub walked: Vec<(usize, TraversalStats)>,
    pub failures: Vec<PluginFailure>,
}

impl LoadOrderWalk {
    pub fn totals(&self) -> TraversalStats {
        let mut totals = TraversalStats::default();
        for (_, stats) in &self.walked {
            totals.merge(stats);
        }
        totals
    }
}

/// Walk every file in order with the same handlers.
///
/// A failure aborts only the file it happened in; the walk continues with the
/// next one. Each file's handle is released once it has been walked.
pub fn walk_load_order(coordinator: &Coordinator, handlers: &mut HandlerSet<'_>) -> LoadOrderWalk {
    let mut outcome = LoadOrderWalk::default();
    for (index, plugin) in coordinator.load_order().iter().enumerate() {
        match walk_file(coordinator, index, handlers) {
            Ok(stats) => {
                info!(
                    "{}: {} records in {} groups",
                    plugin.name(),
                    stats.records(),
                    stats.groups
                );
                outcome.walked.push((index, stats));
            }
            Err(error) => {
                warn!("Skipping rest of {}: {}", plugin.name(), error);
                outcome.failures.push(PluginFailure {
                    index,
                    name: plugin.name().to_string(),
                    error,
                });
            }
        }
        coordinator.close_file(index);
    }
    outcome
}
