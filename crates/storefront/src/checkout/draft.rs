//! Checkout draft and local validation.

use std::fmt;

use medusa_store_core::{Email, PaymentProviderId, ShippingOptionId};

use crate::gateway::{Address, CartUpdate, ShippingOption};
use crate::payment::{BillingAddress, BillingDetails};

/// Postal fields captured on the shipping step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address_1: String,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 code, any case (default `us`).
    pub country_code: String,
    /// Optional; blank means absent.
    pub phone: String,
}

impl Default for ShippingAddress {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            address_1: String::new(),
            city: String::new(),
            postal_code: String::new(),
            country_code: "us".to_string(),
            phone: String::new(),
        }
    }
}

/// A required draft field that is missing or invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    ContactEmail,
    FirstName,
    LastName,
    Address,
    City,
    PostalCode,
    ShippingOption,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ContactEmail => "email",
            Self::FirstName => "first name",
            Self::LastName => "last name",
            Self::Address => "address",
            Self::City => "city",
            Self::PostalCode => "postal code",
            Self::ShippingOption => "shipping option",
        })
    }
}

/// Shopper input collected across the checkout steps.
///
/// Nothing here reaches the backend until a step is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDraft {
    pub contact_email: String,
    pub shipping_address: ShippingAddress,
    pub selected_shipping_option_id: Option<ShippingOptionId>,
    pub selected_payment_provider_id: PaymentProviderId,
}

impl CheckoutDraft {
    /// An empty draft with a preselected payment provider.
    #[must_use]
    pub fn new(default_provider: PaymentProviderId) -> Self {
        Self {
            contact_email: String::new(),
            shipping_address: ShippingAddress::default(),
            selected_shipping_option_id: None,
            selected_payment_provider_id: default_provider,
        }
    }

    /// Check every field the shipping step requires.
    ///
    /// The selected shipping option must be one of `available`.
    ///
    /// # Errors
    ///
    /// Returns every offending field, in form order.
    pub fn validate(&self, available: &[ShippingOption]) -> Result<(), Vec<DraftField>> {
        let blank = |s: &str| s.trim().is_empty();
        let address = &self.shipping_address;
        let mut missing = Vec::new();

        if Email::parse(&self.contact_email).is_err() {
            missing.push(DraftField::ContactEmail);
        }
        if blank(&address.first_name) {
            missing.push(DraftField::FirstName);
        }
        if blank(&address.last_name) {
            missing.push(DraftField::LastName);
        }
        if blank(&address.address_1) {
            missing.push(DraftField::Address);
        }
        if blank(&address.city) {
            missing.push(DraftField::City);
        }
        if blank(&address.postal_code) {
            missing.push(DraftField::PostalCode);
        }
        let option_offered = self
            .selected_shipping_option_id
            .as_ref()
            .is_some_and(|id| available.iter().any(|option| &option.id == id));
        if !option_offered {
            missing.push(DraftField::ShippingOption);
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    fn normalized_email(&self) -> String {
        Email::parse(&self.contact_email).map_or_else(
            |_| self.contact_email.trim().to_string(),
            |email| email.as_str().to_string(),
        )
    }

    /// Address in the backend's shape.
    #[must_use]
    pub fn address(&self) -> Address {
        let a = &self.shipping_address;
        Address {
            first_name: a.first_name.trim().to_string(),
            last_name: a.last_name.trim().to_string(),
            address_1: a.address_1.trim().to_string(),
            city: a.city.trim().to_string(),
            postal_code: a.postal_code.trim().to_string(),
            country_code: a.country_code.trim().to_ascii_lowercase(),
            phone: Some(a.phone.trim().to_string()).filter(|p| !p.is_empty()),
        }
    }

    /// Email plus shipping and billing address (billing mirrors shipping).
    #[must_use]
    pub fn cart_update(&self) -> CartUpdate {
        let address = self.address();
        CartUpdate {
            email: Some(self.normalized_email()),
            shipping_address: Some(address.clone()),
            billing_address: Some(address),
        }
    }

    /// Billing details for the payment processor.
    #[must_use]
    pub fn billing_details(&self) -> BillingDetails {
        let a = &self.shipping_address;
        BillingDetails {
            name: format!("{} {}", a.first_name.trim(), a.last_name.trim()),
            email: self.normalized_email(),
            address: BillingAddress {
                line1: a.address_1.trim().to_string(),
                city: a.city.trim().to_string(),
                postal_code: a.postal_code.trim().to_string(),
                country: a.country_code.trim().to_ascii_uppercase(),
            },
        }
    }
}
