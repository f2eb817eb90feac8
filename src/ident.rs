//! Record identifiers and cross-file translation.
//!
//! On disk every identifier's top byte is a slot in the *owning file's* master
//! list. A [`LocalLoadOrder`] maps those slots to positions in the global
//! [`LoadOrder`], giving a [`GlobalId`] that means the same thing everywhere.
//!
//! Slot layout for a file with K declared masters:
//!
//! - `0..K` - the masters, in declaration order
//! - `K` - the file itself (records it introduces)
//! - `> K` - undeclared, always an error
//!
//! The null identifier `0` stays `0` in every file.

pub mod manifest;

use crate::error::{Result, StoreError};
use crate::load_order::LoadOrder;
use std::fmt;

const SERIAL_MASK: u32 = 0x00ff_ffff;

/// Load-order-wide record identifier: global file index in the top byte,
/// serial in the low 24 bits
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GlobalId(u32);

impl GlobalId {
    pub const NULL: GlobalId = GlobalId(0);

    pub const fn new(file_index: u8, serial: u32) -> Self {
        Self(((file_index as u32) << 24) | (serial & SERIAL_MASK))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub const fn file_index(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn serial(&self) -> u32 {
        self.0 & SERIAL_MASK
    }

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalId({:08X})", self.0)
    }
}

/// Identifier as stored in a file: local master slot in the top byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LocalId(u32);

impl LocalId {
    pub const fn new(slot: u8, serial: u32) -> Self {
        Self(((slot as u32) << 24) | (serial & SERIAL_MASK))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub const fn slot(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn serial(&self) -> u32 {
        self.0 & SERIAL_MASK
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({:08X})", self.0)
    }
}

/// Slot-to-global-index table for one file, derived once from its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLoadOrder {
    file: String,
    file_index: u8,
    masters: Vec<String>,
    /// Global index per slot: the masters, then the file itself
    slots: Vec<u8>,
}

impl LocalLoadOrder {
    /// Resolve a file's declared masters against the global load order
    ///
    /// # Arguments
    /// * `file_index` - The owning file's global index
    /// * `masters` - Master file names from the file's header, in declaration order
    /// * `load_order` - The global load order
    ///
    /// # Errors
    /// * `MissingMaster` if a master is not in the load order
    /// * `MasterOutOfOrder` if a master is loaded at or after the owning file
    pub fn derive(file_index: usize, masters: &[String], load_order: &LoadOrder) -> Result<Self> {
        let file = load_order
            .get(file_index)
            .map(|p| p.name().to_string())
            .ok_or_else(|| StoreError::UnknownPlugin {
                name: format!("#{file_index}"),
            })?;

        if masters.len() >= u8::MAX as usize {
            return Err(StoreError::invalid_field(
                0,
                crate::format::Tag::new(*b"MAST"),
                format!("{} masters declared, at most 254 are addressable", masters.len()),
            )
            .in_file(file));
        }

        let mut slots = Vec::with_capacity(masters.len() + 1);
        for master in masters {
            let index = load_order
                .index_of(master)
                .ok_or_else(|| StoreError::MissingMaster {
                    file: file.clone(),
                    master: master.clone(),
                })?;
            if index >= file_index {
                return Err(StoreError::MasterOutOfOrder {
                    file: file.clone(),
                    master: master.clone(),
                });
            }
            slots.push(index as u8);
        }
        slots.push(file_index as u8);

        Ok(Self {
            file,
            file_index: file_index as u8,
            masters: masters.to_vec(),
            slots,
        })
    }

    /// Map a file-local identifier to its global form.
    ///
    /// The low 24 bits are kept; the slot is replaced by the global index.
    pub fn translate(&self, id: LocalId) -> Result<GlobalId> {
        if id.raw() == 0 {
            return Ok(GlobalId::NULL);
        }
        match self.slots.get(id.slot() as usize) {
            Some(&index) => Ok(GlobalId::new(index, id.serial())),
            None => Err(StoreError::UndeclaredMaster {
                file: self.file.clone(),
                id: id.raw(),
                slot: id.slot(),
                declared: self.slots.len(),
            }),
        }
    }

    /// Name of the owning file.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn file_index(&self) -> u8 {
        self.file_index
    }

    /// Declared master names, in declaration order.
    pub fn masters(&self) -> &[String] {
        &self.masters
    }

    /// Number of valid slots: declared masters plus the file itself.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; the owning file occupies the last slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Global index a slot resolves to, if the slot is declared
    pub fn global_index_of_slot(&self, slot: u8) -> Option<u8> {
        self.slots.get(slot as usize).copied()
    }
}
