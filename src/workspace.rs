//! Binary image services consumed during canonicalization.
//!
//! When address anonymization is enabled, the engine asks the [`Workspace`] whether a
//! constant is a valid address, whether that address is a function with a known thunk name,
//! and whether a string literal lives there. [`MemoryWorkspace`] is a small in-memory
//! implementation, useful for tests and for callers that already hold this information.

use std::collections::BTreeMap;

use crate::Result;

/// Workspace and image queries.
///
/// Implementations return [`crate::Error::CollaboratorUnavailable`] when they cannot answer;
/// the engine aborts the run instead of substituting a default.
pub trait Workspace {
    /// Returns `true` if `address` falls inside mapped memory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CollaboratorUnavailable`] if the query cannot be answered.
    fn is_valid_address(&self, address: u64) -> Result<bool>;

    /// Returns `true` if `address` is a known function entry point.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CollaboratorUnavailable`] if the query cannot be answered.
    fn is_function(&self, address: u64) -> Result<bool>;

    /// Returns the thunk/API name of the function at `address`, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CollaboratorUnavailable`] if the query cannot be answered.
    fn thunk_name(&self, address: u64) -> Result<Option<String>>;

    /// Returns a human-readable rendering of the string literal at `address`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CollaboratorUnavailable`] if the query cannot be answered.
    fn string_literal(&self, address: u64) -> Result<Option<String>>;

    /// Native pointer width of the image, in bytes.
    fn pointer_width(&self) -> u8;
}

impl<W: Workspace + ?Sized> Workspace for &W {
    fn is_valid_address(&self, address: u64) -> Result<bool> {
        (**self).is_valid_address(address)
    }

    fn is_function(&self, address: u64) -> Result<bool> {
        (**self).is_function(address)
    }

    fn thunk_name(&self, address: u64) -> Result<Option<String>> {
        (**self).thunk_name(address)
    }

    fn string_literal(&self, address: u64) -> Result<Option<String>> {
        (**self).string_literal(address)
    }

    fn pointer_width(&self) -> u8 {
        (**self).pointer_width()
    }
}

/// A named range of mapped memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    /// Base address.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
    /// Name of the map (section or segment name).
    pub name: String,
}

impl MemoryMap {
    /// Returns `true` if `address` lies inside this map.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address - self.base < self.size
    }
}

/// Kind of data recorded at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// An ASCII string.
    String,
    /// A UTF-16 string.
    Unicode,
    /// A pointer.
    Pointer,
    /// A plain number.
    Number,
}

/// A typed location inside the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Start address.
    pub address: u64,
    /// Size in bytes.
    pub size: u64,
    /// What lives here.
    pub kind: LocationKind,
    /// Decoded content, for string locations.
    pub text: Option<String>,
}

impl Location {
    /// Returns `true` for string and unicode locations.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self.kind, LocationKind::String | LocationKind::Unicode)
    }

    /// Human-readable rendering: `'text'` for strings, `u'text'` for unicode strings.
    #[must_use]
    pub fn repr(&self) -> String {
        let text = self.text.as_deref().unwrap_or_default();
        match self.kind {
            LocationKind::String => format!("'{text}'"),
            LocationKind::Unicode => format!("u'{text}'"),
            LocationKind::Pointer => format!("ptr_{:08x}", self.address),
            LocationKind::Number => format!("num_{:08x}", self.address),
        }
    }
}

/// In-memory [`Workspace`].
///
/// # Examples
///
/// ```rust
/// use symcanon::workspace::{MemoryWorkspace, Workspace};
///
/// let mut ws = MemoryWorkspace::new();
/// ws.add_memory_map(0x56560000, 0x2000, "woot");
/// ws.add_function(0x56561000, Some("kernel32.CreateFileA"));
/// ws.add_string(0x56560100, "hello");
///
/// assert!(ws.is_valid_address(0x56560020)?);
/// assert_eq!(ws.thunk_name(0x56561000)?.as_deref(), Some("kernel32.CreateFileA"));
/// assert_eq!(ws.string_literal(0x56560102)?.as_deref(), Some("'hello'"));
/// # Ok::<(), symcanon::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemoryWorkspace {
    maps: Vec<MemoryMap>,
    functions: BTreeMap<u64, Option<String>>,
    locations: BTreeMap<u64, Location>,
    pointer_width: u8,
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self {
            maps: Vec::new(),
            functions: BTreeMap::new(),
            locations: BTreeMap::new(),
            pointer_width: 4,
        }
    }
}

impl MemoryWorkspace {
    /// Creates an empty workspace with a 4 byte pointer width.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pointer width.
    #[must_use]
    pub fn with_pointer_width(mut self, width: u8) -> Self {
        self.pointer_width = width;
        self
    }

    /// Adds a memory map.
    pub fn add_memory_map(&mut self, base: u64, size: u64, name: impl Into<String>) {
        self.maps.push(MemoryMap {
            base,
            size,
            name: name.into(),
        });
    }

    /// Registers a function entry point, optionally with a thunk/API name.
    pub fn add_function(&mut self, address: u64, thunk: Option<&str>) {
        self.functions.insert(address, thunk.map(str::to_string));
    }

    /// Records an ASCII string location.
    pub fn add_string(&mut self, address: u64, text: &str) {
        self.add_location(Location {
            address,
            size: text.len() as u64 + 1,
            kind: LocationKind::String,
            text: Some(text.to_string()),
        });
    }

    /// Records a UTF-16 string location.
    pub fn add_unicode(&mut self, address: u64, text: &str) {
        self.add_location(Location {
            address,
            size: (text.encode_utf16().count() as u64 + 1) * 2,
            kind: LocationKind::Unicode,
            text: Some(text.to_string()),
        });
    }

    /// Records an arbitrary location.
    pub fn add_location(&mut self, location: Location) {
        self.locations.insert(location.address, location);
    }

    /// Returns the location containing `address`, if any.
    #[must_use]
    pub fn location(&self, address: u64) -> Option<&Location> {
        self.locations
            .range(..=address)
            .next_back()
            .map(|(_, location)| location)
            .filter(|location| address - location.address < location.size.max(1))
    }

    /// Returns the memory map containing `address`, if any.
    #[must_use]
    pub fn memory_map(&self, address: u64) -> Option<&MemoryMap> {
        self.maps.iter().find(|map| map.contains(address))
    }
}

impl Workspace for MemoryWorkspace {
    fn is_valid_address(&self, address: u64) -> Result<bool> {
        Ok(self.memory_map(address).is_some())
    }

    fn is_function(&self, address: u64) -> Result<bool> {
        Ok(self.functions.contains_key(&address))
    }

    fn thunk_name(&self, address: u64) -> Result<Option<String>> {
        Ok(self.functions.get(&address).cloned().flatten())
    }

    fn string_literal(&self, address: u64) -> Result<Option<String>> {
        Ok(self
            .location(address)
            .filter(|location| location.is_string())
            .map(Location::repr))
    }

    fn pointer_width(&self) -> u8 {
        self.pointer_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> MemoryWorkspace {
        let mut ws = MemoryWorkspace::new();
        ws.add_memory_map(0x1000, 0x100, "text");
        ws.add_function(0x1010, None);
        ws.add_function(0x1020, Some("msvcrt.malloc"));
        ws.add_string(0x1080, "abc");
        ws.add_unicode(0x1090, "wide");
        ws.add_location(Location {
            address: 0x10c0,
            size: 4,
            kind: LocationKind::Pointer,
            text: None,
        });
        ws
    }

    #[test]
    fn test_valid_address_bounds() {
        let ws = workspace();
        assert!(ws.is_valid_address(0x1000).unwrap());
        assert!(ws.is_valid_address(0x10ff).unwrap());
        assert!(!ws.is_valid_address(0x1100).unwrap());
        assert!(!ws.is_valid_address(0xfff).unwrap());
    }

    #[test]
    fn test_functions_and_thunks() {
        let ws = workspace();
        assert!(ws.is_function(0x1010).unwrap());
        assert_eq!(ws.thunk_name(0x1010).unwrap(), None);
        assert_eq!(ws.thunk_name(0x1020).unwrap().as_deref(), Some("msvcrt.malloc"));
        assert!(!ws.is_function(0x1030).unwrap());
    }

    #[test]
    fn test_string_literals() {
        let ws = workspace();
        assert_eq!(ws.string_literal(0x1080).unwrap().as_deref(), Some("'abc'"));
        assert_eq!(ws.string_literal(0x1083).unwrap().as_deref(), Some("'abc'"));
        assert_eq!(ws.string_literal(0x1084).unwrap(), None);
        assert_eq!(ws.string_literal(0x1090).unwrap().as_deref(), Some("u'wide'"));
        assert_eq!(ws.string_literal(0x10c0).unwrap(), None);
        assert!(ws.location(0x10c0).is_some());
    }
}
