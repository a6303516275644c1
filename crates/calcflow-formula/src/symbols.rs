//! Name resolution scopes

use ahash::AHashMap;
use std::fmt;

/// Index of a value in the evaluation environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub usize);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Case-insensitive mapping from names to slots, with an optional parent
/// scope consulted when a name is not defined locally.
#[derive(Debug, Default)]
pub struct SymbolTable<'p> {
    parent: Option<&'p SymbolTable<'p>>,
    symbols: AHashMap<String, Slot>,
}

impl<'p> SymbolTable<'p> {
    /// Create a root scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope nested in this one
    pub fn child(&self) -> SymbolTable<'_> {
        SymbolTable {
            parent: Some(self),
            symbols: AHashMap::new(),
        }
    }

    /// Bind a name in this scope; returns false if it is already bound here.
    /// Shadowing a parent binding is allowed.
    pub fn define(&mut self, name: &str, slot: Slot) -> bool {
        let key = name.to_lowercase();
        if self.symbols.contains_key(&key) {
            return false;
        }
        self.symbols.insert(key, slot);
        true
    }

    /// Look a name up here, then in each enclosing scope
    pub fn resolve(&self, name: &str) -> Option<Slot> {
        let key = name.to_lowercase();
        let mut scope = Some(self);
        while let Some(table) = scope {
            if let Some(&slot) = table.symbols.get(&key) {
                return Some(slot);
            }
            scope = table.parent;
        }
        None
    }

    /// Whether the name is bound in this scope itself
    pub fn is_local(&self, name: &str) -> bool {
        self.symbols.contains_key(&name.to_lowercase())
    }
}
