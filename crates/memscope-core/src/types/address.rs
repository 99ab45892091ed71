//! Memory address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed memory address in the target's address space
///
/// Wraps a `u64` so addresses cannot be mixed up with lengths or offsets.
///
/// ## Example
///
/// ```rust
/// use memscope_core::types::Address;
///
/// let addr = Address::from(0x0040_0000);
/// assert_eq!((addr + 0x10).value(), 0x0040_0010);
/// assert_eq!(addr.to_string(), "0x400000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address, usable in const contexts
    #[must_use]
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw `u64` value of this address
    #[must_use]
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset, returning `None` on overflow
    #[must_use]
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset, returning `None` on underflow
    #[must_use]
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Parse a numeric address literal
    ///
    /// Accepts `0x`-prefixed hexadecimal (either case) and plain decimal.
    /// Surrounding whitespace is ignored. Anything else, including symbols,
    /// returns `None`; symbolic expressions are the backend's business.
    ///
    /// ```rust
    /// use memscope_core::types::Address;
    ///
    /// assert_eq!(Address::parse_literal("0x00400000"), Some(Address::new(0x400000)));
    /// assert_eq!(Address::parse_literal(" 4096 "), Some(Address::new(4096)));
    /// assert_eq!(Address::parse_literal("main"), None);
    /// ```
    #[must_use]
    pub fn parse_literal(text: &str) -> Option<Self>
    {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16).ok().map(Address);
        }
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            return text.parse().ok().map(Address);
        }
        None
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:x}", self.0)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
