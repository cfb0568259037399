//! Known feed providers.

use crate::types::Provider;

/// What [`ProviderRegistry::upsert`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Renamed,
    Unchanged,
}

/// Providers keyed by URL, in registration order.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `url`, or rename it if it is known under another name.
    pub fn upsert(&mut self, url: &str, name: &str) -> Upsert {
        match self.providers.iter_mut().find(|p| p.provider_url == url) {
            Some(provider) if provider.provider_name == name => Upsert::Unchanged,
            Some(provider) => {
                provider.provider_name = name.to_string();
                Upsert::Renamed
            }
            None => {
                self.providers.push(Provider {
                    provider_url: url.to_string(),
                    provider_name: name.to_string(),
                });
                Upsert::Added
            }
        }
    }

    /// Register `url` under its own URL as name unless already known.
    /// Returns true if it was added.
    pub fn upsert_if_absent(&mut self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        self.upsert(url, url) == Upsert::Added
    }

    pub fn remove(&mut self, url: &str) -> Option<Provider> {
        let index = self.providers.iter().position(|p| p.provider_url == url)?;
        Some(self.providers.remove(index))
    }

    pub fn get(&self, url: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.provider_url == url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    pub fn all(&self) -> &[Provider] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
