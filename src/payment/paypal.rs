//! PayPal Orders v2 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::{PaymentApproval, PaymentError, PaymentGateway, PaymentRequest, format_amount};
use crate::config::PaymentConfig;

#[derive(Clone)]
pub struct PayPalGateway {
    client: Client,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for PayPalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalGateway")
            .field("api_base", &self.api_base)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    status: String,
}

impl PayPalGateway {
    /// Build a client whose every request is bounded by the configured timeout.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(PaymentError::Unconfigured);
        }

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    #[instrument(skip(self, request), fields(invoice = %request.invoice_number))]
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentApproval, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.api_base))
            .bearer_auth(token)
            .json(&order_body(request))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let created: CreateOrderResponse = response.json().await?;

        let approval_url =
            approval_link(&created.links).ok_or(PaymentError::MissingApprovalLink)?;
        debug!(reference = %created.id, "paypal order created");

        Ok(PaymentApproval {
            reference: created.id,
            approval_url: approval_url.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn capture_payment(&self, reference: &str) -> Result<(), PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{reference}/capture",
                self.api_base
            ))
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let capture: CaptureResponse = response.json().await?;

        if capture.status != "COMPLETED" {
            return Err(PaymentError::NotCompleted(capture.status));
        }
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, "paypal request rejected");
    Err(PaymentError::Rejected {
        status: status.as_u16(),
        body,
    })
}

fn order_body(request: &PaymentRequest) -> Value {
    let currency = request.currency.as_str();
    let items: Vec<Value> = request
        .lines
        .iter()
        .map(|line| {
            json!({
                "name": line.name,
                "quantity": line.quantity.to_string(),
                "unit_amount": {
                    "currency_code": currency,
                    "value": format_amount(line.unit_price),
                },
            })
        })
        .collect();

    json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "invoice_id": request.invoice_number,
            "amount": {
                "currency_code": currency,
                "value": format_amount(request.total),
                "breakdown": {
                    "item_total": {
                        "currency_code": currency,
                        "value": format_amount(request.total),
                    }
                }
            },
            "items": items,
        }],
        "application_context": {
            "return_url": request.return_url,
            "cancel_url": request.cancel_url,
            "user_action": "PAY_NOW",
        },
    })
}

// Newer API versions answer with `payer-action` instead of `approve`.
fn approval_link(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|link| link.rel == "approve" || link.rel == "payer-action")
        .map(|link| link.href.as_str())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::payment::PaymentLine;

    fn request() -> PaymentRequest {
        PaymentRequest {
            invoice_number: "INV-20260101-abcdef12".into(),
            currency: "USD".into(),
            total: Decimal::new(2500, 2),
            lines: vec![
                PaymentLine {
                    name: "Product A".into(),
                    quantity: 2,
                    unit_price: Decimal::new(10, 0),
                },
                PaymentLine {
                    name: "Product B".into(),
                    quantity: 1,
                    unit_price: Decimal::new(5, 0),
                },
            ],
            return_url: "http://localhost:3000/checkout/success".into(),
            cancel_url: "http://localhost:3000/checkout/cancel".into(),
        }
    }

    fn config(client_id: &str) -> PaymentConfig {
        PaymentConfig {
            api_base: "https://api-m.sandbox.paypal.com/".into(),
            client_id: client_id.into(),
            client_secret: String::new(),
            currency: "USD".into(),
            return_url: String::new(),
            cancel_url: String::new(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn order_body_carries_items_and_total() {
        let body = order_body(&request());
        let unit = &body["purchase_units"][0];

        assert_eq!(body["intent"], "CAPTURE");
        assert_eq!(unit["invoice_id"], "INV-20260101-abcdef12");
        assert_eq!(unit["amount"]["value"], "25.00");
        assert_eq!(unit["amount"]["breakdown"]["item_total"]["value"], "25.00");
        assert_eq!(unit["items"][0]["quantity"], "2");
        assert_eq!(unit["items"][0]["unit_amount"]["value"], "10.00");
        assert_eq!(unit["items"][1]["name"], "Product B");
        assert_eq!(
            body["application_context"]["cancel_url"],
            "http://localhost:3000/checkout/cancel"
        );
    }

    #[test]
    fn approval_link_accepts_both_rel_names() {
        let links = vec![
            Link {
                href: "https://api/self".into(),
                rel: "self".into(),
            },
            Link {
                href: "https://paypal/checkoutnow?token=1".into(),
                rel: "payer-action".into(),
            },
        ];
        assert_eq!(
            approval_link(&links),
            Some("https://paypal/checkoutnow?token=1")
        );
        assert_eq!(approval_link(&links[..1]), None);
    }

    #[test]
    fn trims_api_base_and_redacts_secret() {
        let gateway = PayPalGateway::new(&config("id")).expect("client");
        assert_eq!(gateway.api_base, "https://api-m.sandbox.paypal.com");
        assert!(format!("{gateway:?}").contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let gateway = PayPalGateway::new(&config("")).expect("client");
        let err = gateway
            .create_payment(&request())
            .await
            .expect_err("unconfigured gateway");
        assert!(matches!(err, PaymentError::Unconfigured));
    }
}
