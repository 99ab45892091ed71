//! The ordered list of watched addresses.

use std::fmt;

use tracing::{debug, info};

use crate::error::{InspectError, InspectResult};
use crate::memory::MemoryAccessor;
use crate::types::ValueType;

/// Stable identifier of a watch entry
///
/// Identifiers are never reused within a list, even after removal or
/// [`WatchList::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchEntryId(pub u64);

impl fmt::Display for WatchEntryId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.0)
    }
}

/// One watched address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry
{
    id: WatchEntryId,
    description: String,
    address_expr: String,
    address_label: String,
    value_type: ValueType,
    frozen: bool,
    cached_value: Option<String>,
}

impl WatchEntry
{
    #[must_use]
    pub fn id(&self) -> WatchEntryId
    {
        self.id
    }

    #[must_use]
    pub fn description(&self) -> &str
    {
        &self.description
    }

    /// The expression resolved on every read
    #[must_use]
    pub fn address_expr(&self) -> &str
    {
        &self.address_expr
    }

    /// Symbolic rendering of the address, computed once when added
    #[must_use]
    pub fn address_label(&self) -> &str
    {
        &self.address_label
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType
    {
        self.value_type
    }

    /// Frozen entries keep their cached value across refreshes
    #[must_use]
    pub fn is_frozen(&self) -> bool
    {
        self.frozen
    }

    /// Last value read, or the placeholder if that read failed
    #[must_use]
    pub fn cached_value(&self) -> Option<&str>
    {
        self.cached_value.as_deref()
    }
}

/// Ordered collection of watch entries
///
/// Entries keep insertion order; nothing here reorders them. Adding an
/// entry reads its value once. After that, values only change through
/// [`refresh`](Self::refresh), which skips frozen entries.
#[derive(Debug, Default)]
pub struct WatchList
{
    entries: Vec<WatchEntry>,
    next_id: u64,
}

impl WatchList
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append an entry and populate its initial value
    ///
    /// The address expression is stored as given and resolved lazily on
    /// each read. Exactly one read is performed here; a failed read leaves
    /// the placeholder as the cached value.
    ///
    /// ## Errors
    ///
    /// `InvalidLength` if `value_type` is a string or byte array with a zero
    /// length. Nothing is appended in that case.
    pub fn add(
        &mut self,
        accessor: &MemoryAccessor,
        description: impl Into<String>,
        address_expr: impl Into<String>,
        value_type: ValueType,
    ) -> InspectResult<WatchEntryId>
    {
        value_type.validate()?;

        let address_expr = address_expr.into();
        let address_label = accessor.convert_address_to_symbol(&address_expr);
        let value = accessor.read_typed(&address_expr, value_type);

        let id = WatchEntryId(self.next_id);
        self.next_id += 1;
        info!(%id, address = %address_expr, %value_type, "Watch entry added");

        self.entries.push(WatchEntry {
            id,
            description: description.into(),
            address_expr,
            address_label,
            value_type,
            frozen: false,
            cached_value: Some(value),
        });
        Ok(id)
    }

    /// Set whether refreshes may overwrite an entry's cached value
    ///
    /// ## Errors
    ///
    /// `UnknownEntry` if no entry has this id.
    pub fn freeze(&mut self, id: WatchEntryId, frozen: bool) -> InspectResult<()>
    {
        let entry = self.entry_mut(id)?;
        entry.frozen = frozen;
        debug!(%id, frozen, "Watch entry freeze toggled");
        Ok(())
    }

    /// Remove an entry immediately
    ///
    /// ## Errors
    ///
    /// `UnknownEntry` if no entry has this id.
    pub fn remove(&mut self, id: WatchEntryId) -> InspectResult<WatchEntry>
    {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(InspectError::UnknownEntry(id.0))?;
        Ok(self.entries.remove(index))
    }

    /// Remove every entry
    pub fn clear(&mut self)
    {
        self.entries.clear();
    }

    /// Re-read every unfrozen entry
    ///
    /// Returns the entries whose cached value changed, in list order.
    pub fn refresh(&mut self, accessor: &MemoryAccessor) -> Vec<(WatchEntryId, String)>
    {
        let mut changed = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| !e.frozen) {
            let value = accessor.read_typed(&entry.address_expr, entry.value_type);
            if entry.cached_value.as_deref() != Some(value.as_str()) {
                entry.cached_value = Some(value.clone());
                changed.push((entry.id, value));
            }
        }
        changed
    }

    #[must_use]
    pub fn get(&self, id: WatchEntryId) -> Option<&WatchEntry>
    {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &WatchEntry>
    {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, id: WatchEntryId) -> InspectResult<&mut WatchEntry>
    {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(InspectError::UnknownEntry(id.0))
    }
}

impl<'a> IntoIterator for &'a WatchList
{
    type IntoIter = std::slice::Iter<'a, WatchEntry>;
    type Item = &'a WatchEntry;

    fn into_iter(self) -> Self::IntoIter
    {
        self.entries.iter()
    }
}
