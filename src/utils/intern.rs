//! Symbol interning for induction variables, invariants and array names.
//!
//! The interner is owned by a [`CompilationContext`](crate::CompilationContext)
//! rather than living in a global, so that two compilations never share names.

use serde::{Deserialize, Serialize};
use std::fmt;
use string_interner::{backend::StringBackend, DefaultSymbol, StringInterner, Symbol as SymbolTrait};

type Backend = StringBackend<DefaultSymbol>;

/// A symbol representing an interned name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(u32);

impl Symbol {
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// A symbol interner backed by `string_interner`.
#[derive(Debug, Clone)]
pub struct SymbolInterner {
    interner: StringInterner<Backend>,
}

impl Default for SymbolInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolInterner {
    pub fn new() -> Self {
        Self { interner: StringInterner::new() }
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        let sym = self.interner.get_or_intern(s);
        Symbol(sym.to_usize() as u32)
    }

    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        let internal = DefaultSymbol::try_from_usize(sym.0 as usize)?;
        self.interner.resolve(internal)
    }

    /// Resolve a symbol, falling back to `_<index>` for foreign symbols.
    pub fn name(&self, sym: Symbol) -> String {
        match self.resolve(sym) {
            Some(s) => s.to_string(),
            None => format!("_{}", sym.0),
        }
    }

    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.interner.get(s).map(|sym| Symbol(sym.to_usize() as u32))
    }

    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_resolve() {
        let mut interner = SymbolInterner::new();
        let i = interner.intern("i");
        let n = interner.intern("N");
        assert_ne!(i, n);
        assert_eq!(interner.intern("i"), i);
        assert_eq!(interner.resolve(n), Some("N"));
        assert_eq!(interner.get("j"), None);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_name_fallback() {
        let interner = SymbolInterner::new();
        let mut other = SymbolInterner::new();
        let sym = other.intern("x");
        assert_eq!(interner.name(sym), format!("_{}", sym.as_raw()));
    }
}
