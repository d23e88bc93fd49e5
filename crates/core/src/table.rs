//! Table instances, sample columns, and the per-file table set.
//!
//! A table-definition file holds up to four independent waveform columns.
//! Each column is bound to a table instance id in `1..=4`, which doubles as
//! its slot in a [`TableSet`] (`slot = id - 1`).

use std::fmt;

/// Number of table instances the controller holds.
pub const MAX_INSTANCES: usize = 4;

/// Fewest samples a table may contain.
pub const MIN_SAMPLES: usize = 2;

/// Most samples a table may contain.
pub const MAX_SAMPLES: usize = 16_300;

/// Identifier of one of the controller's lookup tables, in `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableInstance(u8);

impl TableInstance {
    /// Create an instance id, or `None` if `id` is outside `1..=4`.
    pub fn new(id: u8) -> Option<Self> {
        if (1..=MAX_INSTANCES as u8).contains(&id) {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Instance for a zero-based slot index.
    pub fn from_slot(slot: usize) -> Option<Self> {
        if slot < MAX_INSTANCES {
            Some(Self(slot as u8 + 1))
        } else {
            None
        }
    }

    /// The id as sent to the device.
    pub fn id(self) -> u8 {
        self.0
    }

    /// Zero-based slot index.
    pub fn slot(self) -> usize {
        self.0 as usize - 1
    }

    /// All instances in ascending order.
    pub fn all() -> impl Iterator<Item = TableInstance> {
        (1..=MAX_INSTANCES as u8).map(TableInstance)
    }
}

impl fmt::Display for TableInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Samples of one table, in playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    samples: Vec<f32>,
}

impl Column {
    /// Wrap already-validated samples.
    ///
    /// The ingestor is the normal producer; it enforces the
    /// [`MIN_SAMPLES`]..=[`MAX_SAMPLES`] bounds before building a column.
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Up to four columns, indexed by table instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    slots: [Option<Column>; MAX_INSTANCES],
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `column` in the slot for `instance`, returning any previous column.
    pub fn insert(&mut self, instance: TableInstance, column: Column) -> Option<Column> {
        self.slots[instance.slot()].replace(column)
    }

    pub fn get(&self, instance: TableInstance) -> Option<&Column> {
        self.slots[instance.slot()].as_ref()
    }

    /// Present columns in ascending instance order.
    pub fn iter(&self) -> impl Iterator<Item = (TableInstance, &Column)> {
        TableInstance::all().filter_map(move |instance| self.get(instance).map(|c| (instance, c)))
    }

    /// Number of present columns.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the set, yielding present columns in ascending instance order.
    pub fn into_columns(self) -> impl Iterator<Item = (TableInstance, Column)> {
        self.slots
            .into_iter()
            .enumerate()
            .filter_map(|(slot, column)| Some((TableInstance::from_slot(slot)?, column?)))
    }
}
