//! Provider lookup and per-category priority ordering.
//!
//! The orchestrator never holds providers directly. It asks a
//! [`ProviderLookup`] for each id listed in the [`PriorityConfig`], so the
//! set of registered adapters and the order they are tried in can be
//! configured independently.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::models::{Category, ProviderId};
use crate::provider::MarketDataProvider;

/// Source of provider adapters by id.
pub trait ProviderLookup: Send + Sync {
    /// Returns `None` if no adapter is registered under `id`.
    fn get_provider(&self, id: &str) -> Option<Arc<dyn MarketDataProvider>>;

    /// Every registered adapter, in registration order.
    fn all_providers(&self) -> Vec<Arc<dyn MarketDataProvider>>;
}

/// In-process registry over a fixed list of adapters.
#[derive(Default)]
pub struct StaticProviderRegistry {
    providers: Vec<Arc<dyn MarketDataProvider>>,
}

impl StaticProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self { providers }
    }

    /// Add an adapter. A later registration under an existing id replaces it.
    pub fn register(&mut self, provider: Arc<dyn MarketDataProvider>) {
        if let Some(existing) = self.providers.iter_mut().find(|p| p.id() == provider.id()) {
            *existing = provider;
        } else {
            self.providers.push(provider);
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ProviderLookup for StaticProviderRegistry {
    fn get_provider(&self, id: &str) -> Option<Arc<dyn MarketDataProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    fn all_providers(&self) -> Vec<Arc<dyn MarketDataProvider>> {
        self.providers.clone()
    }
}

/// A provider's place in the selection order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    /// Higher is preferred.
    pub priority: i32,
    pub categories: Vec<Category>,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<ProviderId>, priority: i32, categories: &[Category]) -> Self {
        Self {
            id: id.into(),
            priority,
            categories: categories.to_vec(),
        }
    }

    /// Descriptor covering every category the adapter declares.
    pub fn for_provider(provider: &dyn MarketDataProvider, priority: i32) -> Self {
        Self {
            id: Cow::Borrowed(provider.id()),
            priority,
            categories: provider.capabilities().categories.to_vec(),
        }
    }
}

/// One entry in a category's priority list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub provider_id: String,
    pub priority: i32,
}

/// Ordered provider lists per category.
///
/// Serialized as a map from category to entries:
///
/// ```json
/// { "quote": [{ "provider_id": "BINANCE", "priority": 10 }] }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityConfig {
    #[serde(flatten)]
    categories: HashMap<Category, Vec<PriorityEntry>>,
}

impl PriorityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from descriptors; registration order breaks priority ties.
    pub fn from_descriptors(descriptors: &[ProviderDescriptor]) -> Self {
        let mut config = Self::new();
        for descriptor in descriptors {
            for category in &descriptor.categories {
                config.push(*category, descriptor.id.to_string(), descriptor.priority);
            }
        }
        config
    }

    /// Parse the JSON form shown on [`PriorityConfig`].
    pub fn from_json(json: &str) -> Result<Self, MarketDataError> {
        serde_json::from_str(json)
            .map_err(|e| MarketDataError::Config(format!("priority config: {}", e)))
    }

    /// Append a provider to a category list.
    pub fn push(&mut self, category: Category, provider_id: impl Into<String>, priority: i32) {
        self.categories.entry(category).or_default().push(PriorityEntry {
            provider_id: provider_id.into(),
            priority,
        });
    }

    /// Provider ids for `category`, highest priority first.
    ///
    /// The sort is stable so equal priorities keep their listed order.
    /// A provider listed twice keeps only its first position.
    pub fn ordered(&self, category: Category) -> Vec<ProviderId> {
        let Some(entries) = self.categories.get(&category) else {
            return Vec::new();
        };

        let mut sorted: Vec<&PriorityEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut ids: Vec<ProviderId> = Vec::with_capacity(sorted.len());
        for entry in sorted {
            if !ids.iter().any(|id| id == entry.provider_id.as_str()) {
                ids.push(Cow::Owned(entry.provider_id.clone()));
            }
        }
        ids
    }

    pub fn entries(&self, category: Category) -> &[PriorityEntry] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every provider id mentioned in any category.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for category in Category::ALL {
            for entry in self.entries(category) {
                if !ids.contains(&entry.provider_id) {
                    ids.push(entry.provider_id.clone());
                }
            }
        }
        ids
    }
}
