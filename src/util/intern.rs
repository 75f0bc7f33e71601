//! Context-scoped string interner.
//!
//! Every compile owns its own [`Interner`]; two compiles running in the same
//! process never share a table, so a long-lived service does not accumulate
//! symbols across requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// An interned string handle.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    /// Raw index inside the owning interner
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct Table {
    map: HashMap<Arc<str>, Symbol>,
    strings: Vec<Arc<str>>,
}

/// A thread-safe string interner.
#[derive(Default)]
pub struct Interner {
    table: RwLock<Table>,
}

impl fmt::Debug for Interner {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Interner")
            .field("len", &self.len())
            .finish()
    }
}

impl Interner {
    /// Create a new empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its symbol.
    pub fn intern(
        &self,
        text: &str,
    ) -> Symbol {
        if let Some(symbol) = self.table.read().map.get(text) {
            return *symbol;
        }

        let mut table = self.table.write();
        // another thread may have won the race between the two locks
        if let Some(symbol) = table.map.get(text) {
            return *symbol;
        }
        let symbol = Symbol(table.strings.len() as u32);
        let shared: Arc<str> = Arc::from(text);
        table.strings.push(Arc::clone(&shared));
        table.map.insert(shared, symbol);
        symbol
    }

    /// Look up a string without interning it.
    pub fn get(
        &self,
        text: &str,
    ) -> Option<Symbol> {
        self.table.read().map.get(text).copied()
    }

    /// Resolve a symbol back to its text.
    ///
    /// Symbols from a different interner resolve to `None`.
    pub fn resolve(
        &self,
        symbol: Symbol,
    ) -> Option<Arc<str>> {
        self.table.read().strings.get(symbol.index()).cloned()
    }

    /// Resolve a symbol, falling back to a placeholder for foreign symbols.
    pub fn display(
        &self,
        symbol: Symbol,
    ) -> String {
        self.resolve(symbol)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("<symbol#{}>", symbol.index()))
    }

    /// Number of distinct strings
    pub fn len(&self) -> usize {
        self.table.read().strings.len()
    }

    /// Whether nothing has been interned yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
