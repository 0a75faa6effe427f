//! Payment provider registry.
//!
//! Each provider belongs to a closed set of capability classes that decides
//! how checkout settles payment. Adding a provider is a registry entry, not a
//! new branch in the checkout flow.

use std::collections::HashMap;

use medusa_store_core::PaymentProviderId;

/// How a provider settles payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCapability {
    /// Needs a server-issued secret and client-side confirmation before the
    /// order can complete.
    ConfirmationRequired,
    /// Authorized server-side at order placement; nothing to confirm.
    DirectSettle,
}

/// A payment provider offered at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProvider {
    /// Backend provider id.
    pub id: PaymentProviderId,
    /// Label shown to the shopper.
    pub title: String,
    /// Settlement capability.
    pub capability: ProviderCapability,
}

/// Known payment providers, in display order.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<PaymentProvider>,
    index: HashMap<PaymentProviderId, usize>,
    default_provider: PaymentProviderId,
}

impl Default for ProviderRegistry {
    /// The card processor and the manual test provider, defaulting to manual.
    fn default() -> Self {
        let mut registry = Self::empty(PaymentProviderId::new(PaymentProviderId::SYSTEM_DEFAULT));
        registry.register(PaymentProvider {
            id: PaymentProviderId::new(PaymentProviderId::STRIPE),
            title: "Credit Card".to_string(),
            capability: ProviderCapability::ConfirmationRequired,
        });
        registry.register(PaymentProvider {
            id: PaymentProviderId::new(PaymentProviderId::SYSTEM_DEFAULT),
            title: "Manual Payment (Test)".to_string(),
            capability: ProviderCapability::DirectSettle,
        });
        registry
    }
}

impl ProviderRegistry {
    /// A registry with no providers yet.
    #[must_use]
    pub fn empty(default_provider: PaymentProviderId) -> Self {
        Self {
            providers: Vec::new(),
            index: HashMap::new(),
            default_provider,
        }
    }

    /// Add or replace a provider.
    pub fn register(&mut self, provider: PaymentProvider) {
        if let Some(&i) = self.index.get(&provider.id)
            && let Some(slot) = self.providers.get_mut(i)
        {
            *slot = provider;
            return;
        }
        self.index.insert(provider.id.clone(), self.providers.len());
        self.providers.push(provider);
    }

    /// Look up a provider.
    #[must_use]
    pub fn get(&self, id: &PaymentProviderId) -> Option<&PaymentProvider> {
        self.index.get(id).and_then(|&i| self.providers.get(i))
    }

    /// Provider preselected on a fresh checkout.
    #[must_use]
    pub const fn default_provider(&self) -> &PaymentProviderId {
        &self.default_provider
    }

    /// All providers in display order.
    pub fn iter(&self) -> impl Iterator<Item = &PaymentProvider> {
        self.providers.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = ProviderRegistry::default();
        let stripe = registry
            .get(&PaymentProviderId::new(PaymentProviderId::STRIPE))
            .unwrap();
        assert_eq!(stripe.capability, ProviderCapability::ConfirmationRequired);
        assert_eq!(stripe.title, "Credit Card");

        let manual = registry.get(registry.default_provider()).unwrap();
        assert_eq!(manual.capability, ProviderCapability::DirectSettle);
        assert_eq!(registry.iter().count(), 2);
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::default();
        assert!(registry.get(&PaymentProviderId::new("pp_paypal")).is_none());
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = ProviderRegistry::default();
        registry.register(PaymentProvider {
            id: PaymentProviderId::new(PaymentProviderId::STRIPE),
            title: "Card".to_string(),
            capability: ProviderCapability::ConfirmationRequired,
        });
        assert_eq!(registry.iter().count(), 2);
        assert_eq!(
            registry
                .get(&PaymentProviderId::new(PaymentProviderId::STRIPE))
                .unwrap()
                .title,
            "Card"
        );
    }
}
