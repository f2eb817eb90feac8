//! Bounded file-handle pool and the coordinator that serves every read.
//!
//! The [`Coordinator`] maps a logical `(file index, byte offset)` request onto one
//! of P pooled OS handles. All pool state sits behind a single lock that is held
//! for exactly one logical operation: one peek, one header read, one skip, one
//! group read or one payload read. Inflating, translating and decoding the bytes
//! happens after the lock is released, so readers of different files only ever
//! wait for each other's raw I/O.
//!
//! Ownership is arena-and-index: slots own the handles, and each file holds at
//! most an index into the slot array, which the pool may revoke at any time.

mod eviction;

use crate::accessor::Accessor;
use crate::config::StoreConfig;
use crate::cursor::StreamCursor;
use crate::error::{Result, StoreError};
use crate::format::{codec, Group, GroupType, RawRecord, RecordHeader, Tag};
use crate::ident::{GlobalId, LocalId, LocalLoadOrder};
use crate::load_order::LoadOrder;
use crate::records::{PluginHeader, Record};
use eviction::Evictor;
use log::debug;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

/// One pool entry
#[derive(Debug, Default)]
struct Slot {
    /// File currently served by this slot
    file: Option<usize>,
    handle: Option<File>,
    /// Where the OS handle is positioned; `None` after a failed operation
    position: Option<u64>,
    /// File length at open time; skips may not pass it
    len: u64,
}

/// Counters describing how the pool has been used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Files opened into a slot
    pub opens: u64,
    /// Slots reclaimed from another file
    pub evictions: u64,
    /// Operations that started exactly where the handle already was
    pub position_hits: u64,
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<Slot>,
    /// Per file in the load order: the slot serving it, if any
    owners: Vec<Option<usize>>,
    evictor: Evictor,
    stats: PoolStats,
}

impl PoolState {
    /// Slot serving `file`, opening (and if necessary evicting) on demand
    fn handle_for(&mut self, file: usize, load_order: &LoadOrder) -> Result<usize> {
        if let Some(slot) = self.owners[file] {
            self.evictor.touch(slot);
            return Ok(slot);
        }

        let plugin = load_order.get(file).ok_or_else(|| StoreError::UnknownPlugin {
            name: format!("#{file}"),
        })?;

        let slot = match self.slots.iter().position(|s| s.handle.is_none()) {
            Some(free) => free,
            None => {
                let victim = self.evictor.victim();
                self.release(victim);
                self.stats.evictions += 1;
                victim
            }
        };

        let open_error = |e| StoreError::FileOpen {
            path: plugin.path().to_path_buf(),
            source: e,
        };
        let handle = File::open(plugin.path()).map_err(open_error)?;
        let len = handle.metadata().map_err(open_error)?.len();
        debug!("Opened {} ({len} bytes) into pool slot {slot}", plugin.name());

        self.slots[slot] = Slot {
            file: Some(file),
            handle: Some(handle),
            position: Some(0),
            len,
        };
        self.owners[file] = Some(slot);
        self.evictor.touch(slot);
        self.stats.opens += 1;
        Ok(slot)
    }

    /// Close a slot and revoke its owner's reference
    fn release(&mut self, slot: usize) {
        let entry = std::mem::take(&mut self.slots[slot]);
        if let Some(owner) = entry.file {
            self.owners[owner] = None;
            debug!("Closed file #{owner} in pool slot {slot}");
        }
        self.evictor.forget(slot);
    }
}

/// Shared entry point for every read against the load order.
///
/// `Coordinator` is `Send + Sync`; share it by reference or through an `Arc`.
#[derive(Debug)]
pub struct Coordinator {
    load_order: LoadOrder,
    capacity: usize,
    state: Mutex<PoolState>,
    local_orders: Vec<OnceLock<Arc<LocalLoadOrder>>>,
}

impl Coordinator {
    /// Create a coordinator over a load order
    ///
    /// No file is opened here; each file is opened on first access.
    ///
    /// # Errors
    /// * `Config` if the configuration is invalid
    pub fn new(load_order: LoadOrder, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.pool_size)
            .ok_or_else(|| StoreError::config("pool_size must be at least 1"))?;

        let state = PoolState {
            slots: (0..capacity.get()).map(|_| Slot::default()).collect(),
            owners: vec![None; load_order.len()],
            evictor: Evictor::new(config.eviction, capacity, config.seed),
            stats: PoolStats::default(),
        };
        let local_orders = (0..load_order.len()).map(|_| OnceLock::new()).collect();

        Ok(Self {
            load_order,
            capacity: capacity.get(),
            state: Mutex::new(state),
            local_orders,
        })
    }

    pub fn load_order(&self) -> &LoadOrder {
        &self.load_order
    }

    /// Maximum number of simultaneously open handles.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn open_handle_count(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|s| s.handle.is_some())
            .count()
    }

    /// Whether `file` currently holds a pool slot
    pub fn is_open(&self, file: usize) -> bool {
        let state = self.state.lock();
        state.owners.get(file).copied().flatten().is_some()
    }

    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats
    }

    /// Release a file's handle early. Idempotent.
    pub fn close_file(&self, file: usize) {
        let mut state = self.state.lock();
        if let Some(slot) = state.owners.get(file).copied().flatten() {
            state.release(slot);
        }
    }

    /// Accessor at the start of a file
    pub fn accessor(&self, file: usize) -> Result<Accessor<'_>> {
        self.accessor_at(file, 0)
    }

    /// Accessor at an arbitrary offset, e.g. a previously indexed record
    pub fn accessor_at(&self, file: usize, position: u64) -> Result<Accessor<'_>> {
        if file >= self.load_order.len() {
            return Err(StoreError::UnknownPlugin {
                name: format!("#{file}"),
            });
        }
        Ok(Accessor::new(self, file, position))
    }

    /// Accessor at the start of a file looked up by name
    pub fn accessor_by_name(&self, name: &str) -> Result<Accessor<'_>> {
        let file = self
            .load_order
            .index_of(name)
            .ok_or_else(|| StoreError::UnknownPlugin {
                name: name.to_string(),
            })?;
        self.accessor(file)
    }

    /// The file's slot table, derived from its header on first use
    pub fn local_load_order(&self, file: usize) -> Result<Arc<LocalLoadOrder>> {
        let cell = self
            .local_orders
            .get(file)
            .ok_or_else(|| StoreError::UnknownPlugin {
                name: format!("#{file}"),
            })?;
        if let Some(local) = cell.get() {
            return Ok(Arc::clone(local));
        }

        let result = self
            .with_cursor(file, 0, |c| {
                let (header, stored, _) = codec::read_record_bytes_matching(c, &[Tag::TES4])?;
                Ok((header, stored))
            })
            .and_then(|(header, stored)| {
                let raw = RawRecord::from_disk(header, stored)?;
                let masters = PluginHeader::master_names(&raw)?;
                LocalLoadOrder::derive(file, &masters, &self.load_order)
            });
        let derived = self.in_file(file, result)?;
        debug!(
            "{}: {} master(s) declared",
            derived.file(),
            derived.masters().len()
        );

        // A racing reader may have derived it first; both results are identical.
        let _ = cell.set(Arc::new(derived));
        cell.get()
            .cloned()
            .ok_or_else(|| StoreError::config("local load order was not stored"))
    }

    /// Translate a file-local identifier of `file`
    pub fn translate(&self, file: usize, id: LocalId) -> Result<GlobalId> {
        let local = self.local_load_order(file)?;
        self.in_file(file, local.translate(id))
    }

    /// Tag of the unit at `position` (`GRUP` for groups), `None` at end of file
    pub fn peek_record_type(&self, file: usize, position: u64) -> Result<Option<Tag>> {
        let result = self.with_cursor(file, position, |c| codec::peek_record_type(c));
        self.in_file(file, result)
    }

    pub fn read_record_header(&self, file: usize, position: u64) -> Result<(RecordHeader, u64)> {
        let (header, end) = self.in_file(
            file,
            self.with_cursor(file, position, |c| codec::read_record_header(c)),
        )?;
        Ok((self.translate_header(file, header)?, end))
    }

    /// Read a header and seek past its payload without reading it
    pub fn skip_record(&self, file: usize, position: u64) -> Result<(RecordHeader, u64)> {
        let (header, end) =
            self.in_file(file, self.with_cursor(file, position, |c| codec::skip_record(c)))?;
        Ok((self.translate_header(file, header)?, end))
    }

    /// Read one record with its payload inflated and identifiers translated
    pub fn read_raw_record(&self, file: usize, position: u64) -> Result<(RawRecord, u64)> {
        let read = self.with_cursor(file, position, |c| codec::read_record_bytes(c));
        let (header, stored, end) = self.in_file(file, read)?;
        Ok((self.finish_record(file, header, stored)?, end))
    }

    /// Read and decode one record of type `T`
    ///
    /// A record whose tag is not one of `T::TAGS` is a desync; its payload is
    /// not read.
    pub fn read_record<T: Record>(
        &self,
        file: usize,
        position: u64,
    ) -> Result<(RecordHeader, T, u64)> {
        let read = self.with_cursor(file, position, |c| {
            codec::read_record_bytes_matching(c, T::TAGS)
        });
        let (header, stored, end) = self.in_file(file, read)?;
        let raw = self.finish_record(file, header, stored)?;
        let decoded = self.in_file(file, T::decode(&raw))?;
        Ok((raw.header, decoded, end))
    }

    pub fn peek_group_type(&self, file: usize, position: u64) -> Result<Option<GroupType>> {
        let result = self.with_cursor(file, position, |c| codec::peek_group_type(c));
        self.in_file(file, result)
    }

    /// Read a group header. The returned position is that of the first child.
    pub fn read_group(&self, file: usize, position: u64) -> Result<(Group, u64)> {
        let (group, end) =
            self.in_file(file, self.with_cursor(file, position, |c| codec::read_group(c)))?;
        let local = self.local_load_order(file)?;
        let group = self.in_file(file, group.try_map_id(|id| local.translate(id)))?;
        Ok((group, end))
    }

    /// Skip a whole group. Returns the position just past it.
    pub fn skip_group(&self, file: usize, position: u64) -> Result<u64> {
        self.in_file(file, self.with_cursor(file, position, |c| codec::skip_group(c)))
    }

    /// Run one logical operation against `file` at `position` under the pool lock
    fn with_cursor<T>(
        &self,
        file: usize,
        position: u64,
        op: impl FnOnce(&mut StreamCursor<&mut File>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let slot_index = state.handle_for(file, &self.load_order)?;
        let slot = &mut state.slots[slot_index];
        let handle = slot
            .handle
            .as_mut()
            .ok_or_else(|| StoreError::config("pool slot lost its handle"))?;

        let known = match slot.position {
            Some(known) => {
                if known == position {
                    state.stats.position_hits += 1;
                }
                known
            }
            None => {
                handle.seek(SeekFrom::Start(position))?;
                position
            }
        };

        let mut cursor = StreamCursor::new(handle, known).with_len(slot.len);
        let result = cursor.seek(position).and_then(|_| op(&mut cursor));
        let end = cursor.tell();
        slot.position = match result {
            Ok(_) => Some(end),
            Err(_) => None,
        };
        result
    }

    fn finish_record(
        &self,
        file: usize,
        header: RecordHeader<LocalId>,
        stored: Vec<u8>,
    ) -> Result<RawRecord> {
        let local = self.local_load_order(file)?;
        let translated = RawRecord::from_disk(header, stored).and_then(|raw| raw.translate(&local));
        self.in_file(file, translated)
    }

    fn translate_header(
        &self,
        file: usize,
        header: RecordHeader<LocalId>,
    ) -> Result<RecordHeader> {
        let local = self.local_load_order(file)?;
        self.in_file(file, header.try_map_id(|id| local.translate(id)))
    }

    fn in_file<T>(&self, file: usize, result: Result<T>) -> Result<T> {
        result.map_err(|e| match self.load_order.get(file) {
            Some(plugin) => e.in_file(plugin.name()),
            None => e,
        })
    }
}
