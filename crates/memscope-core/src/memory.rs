//! # Memory Accessor
//!
//! Typed, single-address reads against the current attachment.
//!
//! The accessor resolves an address expression, issues exactly one backend
//! read covering the type's width, and decodes the bytes with the
//! [codec](crate::codec). The display-oriented entry points never fail:
//! any per-read error becomes the configured placeholder, so the pollers
//! and the watch list built on top keep running through protected pages,
//! bad pointers, and processes that exit mid-read.

use std::sync::Arc;

use tracing::debug;

use crate::attach::SharedAttachment;
use crate::backend::SharedBackend;
use crate::codec;
use crate::error::{InspectError, InspectResult};
use crate::types::{Address, ValueKind, ValueType};

/// Reads and decodes values from the attached process
///
/// Cheap to clone; clones share the backend and the attachment.
#[derive(Clone)]
pub struct MemoryAccessor
{
    backend: SharedBackend,
    attachment: SharedAttachment,
    placeholder: Arc<str>,
}

impl MemoryAccessor
{
    /// Create an accessor that renders failed reads as `placeholder`
    pub fn new(backend: SharedBackend, attachment: SharedAttachment, placeholder: impl Into<Arc<str>>) -> Self
    {
        Self {
            backend,
            attachment,
            placeholder: placeholder.into(),
        }
    }

    /// Display text used for failed reads
    #[must_use]
    pub fn placeholder(&self) -> &str
    {
        &self.placeholder
    }

    /// Read a value, reporting failures
    ///
    /// The attachment cannot change while the read is in flight.
    ///
    /// ## Errors
    ///
    /// - `InvalidLength`: zero-length string or byte array
    /// - `NotAttached`: no process attached
    /// - `UnresolvedAddress`: the expression does not resolve
    /// - `ReadFault`: the backend could not read the range
    /// - `MalformedData`: the backend returned the wrong number of bytes
    pub fn try_read(&self, address_expr: &str, ty: ValueType) -> InspectResult<String>
    {
        ty.validate()?;
        let guard = self.attachment.read();
        if !guard.state().is_attached() {
            return Err(InspectError::NotAttached);
        }

        let address = self.resolve_attached(address_expr)?;
        let bytes = self.backend.read_memory(address, ty.width())?;
        drop(guard);
        codec::decode(&bytes, ty)
    }

    /// Read a value for display; failures become the placeholder
    #[must_use]
    pub fn read_typed(&self, address_expr: &str, ty: ValueType) -> String
    {
        self.try_read(address_expr, ty).unwrap_or_else(|e| self.absorb(address_expr, &e))
    }

    /// Read a value from selector fields, as an inspect surface holds them
    ///
    /// `length` is required (and must be non-zero) for string and
    /// byte-array kinds and ignored otherwise; `unicode` only affects
    /// strings. Invalid field combinations produce the placeholder, like
    /// any other failed read.
    #[must_use]
    pub fn read_single_address(&self, address_expr: &str, kind: ValueKind, length: Option<usize>, unicode: bool) -> String
    {
        match ValueType::new(kind, length, unicode) {
            Ok(ty) => self.read_typed(address_expr, ty),
            Err(e) => self.absorb(address_expr, &e),
        }
    }

    /// Resolve an address expression against the current attachment
    ///
    /// Numeric literals (`0x...` or decimal) resolve without the backend;
    /// anything else is handed to the backend's symbol resolver.
    ///
    /// ## Errors
    ///
    /// `NotAttached` or `UnresolvedAddress`.
    pub fn resolve(&self, address_expr: &str) -> InspectResult<Address>
    {
        let guard = self.attachment.read();
        if !guard.state().is_attached() {
            return Err(InspectError::NotAttached);
        }
        self.resolve_attached(address_expr)
    }

    /// Symbolic rendering of an address expression, for display
    ///
    /// Numeric literals are symbolized through the backend (`0x7f..` becomes
    /// `libc.so.6+0x1a2b0`); expressions that are already symbolic, or that
    /// cannot be symbolized, come back unchanged.
    #[must_use]
    pub fn convert_address_to_symbol(&self, address_expr: &str) -> String
    {
        let guard = self.attachment.read();
        match Address::parse_literal(address_expr) {
            Some(address) if guard.state().is_attached() => self.backend.symbolize(address),
            _ => address_expr.trim().to_string(),
        }
    }

    /// Numeric rendering of an address expression
    ///
    /// Falls back to the expression as given if it cannot be resolved.
    #[must_use]
    pub fn convert_symbol_to_address(&self, address_expr: &str) -> String
    {
        match self.resolve(address_expr) {
            Ok(address) => address.to_string(),
            Err(_) => address_expr.trim().to_string(),
        }
    }

    /// Caller must hold the attachment read guard
    fn resolve_attached(&self, address_expr: &str) -> InspectResult<Address>
    {
        if let Some(address) = Address::parse_literal(address_expr) {
            return Ok(address);
        }
        let expr = address_expr.trim();
        if expr.is_empty() {
            return Err(InspectError::UnresolvedAddress(String::new()));
        }
        self.backend.resolve_symbol(expr)
    }

    fn absorb(&self, address_expr: &str, error: &InspectError) -> String
    {
        debug!(address = address_expr, %error, "Read failed; showing placeholder");
        self.placeholder.to_string()
    }
}
