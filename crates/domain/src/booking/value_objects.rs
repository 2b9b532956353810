//! Booking value objects.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// The customer a booking is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

impl CustomerInfo {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Payment captured by checkout before the booking was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub amount: Money,
    pub method: String,
    pub reference: Option<String>,
}

impl PaymentInfo {
    pub fn new(amount: Money, method: impl Into<String>) -> Self {
        Self {
            amount,
            method: method.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}
