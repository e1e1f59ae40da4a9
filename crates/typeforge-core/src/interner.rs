//! Name interning for type and member identifiers.
//!
//! Every type and member name is stored once and referred to by a `Symbol`.
//! Member lookups compare symbols, so resolving a name is a single hash probe
//! followed by integer comparisons along the base chain.

use std::collections::HashMap;

/// A lightweight handle to an interned name.
///
/// Symbols are ordered by insertion order, not lexicographically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    /// Raw index for debugging.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Name table. Deduplicates strings and returns `Symbol` handles.
#[derive(Debug, Clone, Default)]
pub struct Interner {
    map: HashMap<String, Symbol>,
    names: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning the existing symbol if it was seen before.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&sym) = self.map.get(name) {
            return sym;
        }

        let sym = Symbol(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.map.insert(name.to_owned(), sym);
        sym
    }

    /// Look up a name without interning it.
    ///
    /// A name that was never interned cannot match any declared member,
    /// so lookups use this to fail early without growing the table.
    #[inline]
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.map.get(name).copied()
    }

    /// Resolve a symbol back to its name.
    ///
    /// # Panics
    /// Panics if the symbol was not created by this interner.
    #[inline]
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.names[sym.0 as usize]
    }

    /// Number of interned names.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
