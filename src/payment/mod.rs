//! Outbound payment collaborator.
//!
//! The storefront only needs two calls from a gateway: open a payment for an
//! order (returning the URL the buyer is redirected to) and capture it once the
//! buyer comes back through the success route.

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

pub mod paypal;

pub use paypal::PayPalGateway;

/// A line of the payment request, built from an order's frozen line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Everything the gateway needs to open a payment for one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub invoice_number: String,
    pub currency: String,
    pub total: Decimal,
    pub lines: Vec<PaymentLine>,
    pub return_url: String,
    pub cancel_url: String,
}

/// Gateway answer to a successful payment creation.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentApproval {
    /// Gateway-side payment id, echoed back as `token` on the return routes.
    pub reference: String,
    pub approval_url: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway is not configured")]
    Unconfigured,

    #[error("payment gateway timed out")]
    Timeout,

    #[error("payment gateway request failed: {0}")]
    Transport(String),

    #[error("payment gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("payment gateway returned no approval link")]
    MissingApprovalLink,

    #[error("payment was not completed (status {0})")]
    NotCompleted(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::Timeout
        } else {
            PaymentError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment and return where to send the buyer.
    async fn create_payment(&self, request: &PaymentRequest)
        -> Result<PaymentApproval, PaymentError>;

    /// Capture a previously approved payment.
    async fn capture_payment(&self, reference: &str) -> Result<(), PaymentError>;
}

/// Render an amount the way gateways expect it: two decimal places, no exponent.
pub fn format_amount(amount: Decimal) -> String {
    let mut value = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(2);
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_always_have_two_decimals() {
        assert_eq!(format_amount(Decimal::new(25, 0)), "25.00");
        assert_eq!(format_amount(Decimal::new(1999, 2)), "19.99");
        assert_eq!(format_amount(Decimal::new(12345, 3)), "12.35");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }
}
