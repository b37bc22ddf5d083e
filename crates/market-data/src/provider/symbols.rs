//! Caller-to-provider symbol translation.

use std::collections::HashMap;

/// How an unmapped caller symbol becomes a provider symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolTransform {
    /// Uppercase and append a quote-currency suffix ("sol" -> "SOLUSDT").
    UppercaseWithSuffix(&'static str),
    /// Lowercase id ("Solana" -> "solana").
    Lowercase,
}

impl SymbolTransform {
    fn apply(&self, symbol: &str) -> String {
        match self {
            Self::UppercaseWithSuffix(suffix) => {
                let upper = symbol.to_uppercase();
                // Already a pair ("SOLUSDT"), don't double the suffix
                if !suffix.is_empty() && upper.ends_with(suffix) && upper.len() > suffix.len() {
                    upper
                } else {
                    format!("{}{}", upper, suffix)
                }
            }
            Self::Lowercase => symbol.to_lowercase(),
        }
    }
}

/// Per-adapter symbol table.
///
/// Explicit entries win; anything else goes through the deterministic
/// fallback transform instead of failing. Lookups are case-insensitive on
/// the caller side.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    entries: HashMap<String, String>,
    fallback: SymbolTransform,
}

impl SymbolTable {
    pub fn new(fallback: SymbolTransform) -> Self {
        Self {
            entries: HashMap::new(),
            fallback,
        }
    }

    /// Add an explicit mapping.
    pub fn with(mut self, caller: &str, provider: &str) -> Self {
        self.insert(caller, provider);
        self
    }

    pub fn insert(&mut self, caller: &str, provider: &str) {
        self.entries
            .insert(caller.trim().to_lowercase(), provider.to_string());
    }

    /// Translate a caller symbol into this provider's vocabulary.
    pub fn to_provider(&self, symbol: &str) -> String {
        let key = symbol.trim().to_lowercase();
        match self.entries.get(&key) {
            Some(mapped) => mapped.clone(),
            None => self.fallback.apply(symbol.trim()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
