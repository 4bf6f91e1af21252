//! Name interning for module and plugin identifiers.
//!
//! A `NameTable` is owned by a single build context, so there is no global
//! interner. Module names are matched case-insensitively; the spelling seen
//! first is the one reported back.

use std::collections::HashMap;
use std::fmt;

/// A cheap, copyable handle to an interned name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Index of the symbol inside its table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Case-insensitive name table.
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    lookup: HashMap<String, Symbol>,
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing symbol if a name differing only
    /// in case was interned before.
    pub fn intern(&mut self, name: &str) -> Symbol {
        let key = name.to_ascii_lowercase();
        if let Some(&symbol) = self.lookup.get(&key) {
            return symbol;
        }

        let symbol = Symbol(self.names.len() as u32);
        self.names.push(name.to_string());
        self.lookup.insert(key, symbol);
        symbol
    }

    /// Look up a name without interning it.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.lookup.get(&name.to_ascii_lowercase()).copied()
    }

    /// The display spelling of a symbol.
    pub fn resolve(&self, symbol: Symbol) -> &str {
        &self.names[symbol.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_case_insensitive() {
        let mut table = NameTable::new();
        let a = table.intern("Engine");
        let b = table.intern("engine");
        let c = table.intern("Core");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_first_spelling_wins() {
        let mut table = NameTable::new();
        let sym = table.intern("SlateCore");
        table.intern("SLATECORE");

        assert_eq!(table.resolve(sym), "SlateCore");
    }

    #[test]
    fn test_get_does_not_intern() {
        let mut table = NameTable::new();
        assert!(table.get("Core").is_none());

        let sym = table.intern("Core");
        assert_eq!(table.get("CORE"), Some(sym));
        assert_eq!(table.len(), 1);
    }
}
