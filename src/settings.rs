//! Hand-off of game settings to a caller-owned key/value store.
//!
//! `GMST` and `GLOB` records are not kept as addressable records. They are
//! decoded during traversal and their values pushed into a [`SettingsSink`],
//! keyed by editor id. A later file setting the same key simply overwrites it.

use crate::accessor::Accessor;
use crate::error::Result;
use crate::format::Tag;
use crate::records::{GameSetting, GlobalVariable, Record};
use crate::traversal::{HandlerSet, RecordHandler, TraversalContext};
use log::trace;
use std::collections::HashMap;
use std::fmt;

/// A decoded setting value
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Int(i32),
    Float(f32),
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// Destination for decoded settings
pub trait SettingsSink {
    fn set(&mut self, key: &str, value: SettingValue);
}

impl SettingsSink for HashMap<String, SettingValue> {
    fn set(&mut self, key: &str, value: SettingValue) {
        self.insert(key.to_string(), value);
    }
}

impl<S: SettingsSink + ?Sized> SettingsSink for &mut S {
    fn set(&mut self, key: &str, value: SettingValue) {
        (**self).set(key, value);
    }
}

/// Record handler decoding `GMST` and `GLOB` into a sink
#[derive(Debug)]
pub struct SettingsHandler<S> {
    sink: S,
    pushed: usize,
}

impl<S: SettingsSink> SettingsHandler<S> {
    /// Tags this handler consumes.
    pub const TAGS: &'static [Tag] = &[Tag::GMST, Tag::GLOB];

    pub fn new(sink: S) -> Self {
        Self { sink, pushed: 0 }
    }

    /// Number of values pushed so far
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Register this handler for every settings tag
    pub fn register<'h>(self, handlers: &mut HandlerSet<'h>)
    where
        S: 'h,
    {
        handlers.insert_many(Self::TAGS, self);
    }
}

impl<S: SettingsSink> RecordHandler for SettingsHandler<S> {
    fn handle(&mut self, accessor: &mut Accessor<'_>, _context: &TraversalContext) -> Result<()> {
        let raw = accessor.read_raw_record()?;
        let (key, value) = match raw.header.tag {
            Tag::GMST => {
                let setting = GameSetting::decode(&raw)?;
                (setting.editor_id, setting.value)
            }
            _ => {
                let global = GlobalVariable::decode(&raw)?;
                (global.editor_id, global.value)
            }
        };
        trace!("{} = {value}", key);
        self.sink.set(&key, value);
        self.pushed += 1;
        Ok(())
    }
}
