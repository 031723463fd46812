//! services/api/src/adapters/payment.rs
//!
//! This module contains the adapter for the payment gateway. It implements
//! the `PaymentGateway` port against a Snap-style checkout API: one
//! server-authenticated call that turns an order into a checkout token and
//! redirect URL.

use async_trait::async_trait;
use mentor_core::ports::{PaymentGateway, PaymentOrder, PaymentToken, PortError, PortResult};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Wire Payloads
//=========================================================================================

#[derive(Serialize)]
struct TransactionRequest<'a> {
    transaction_details: TransactionDetails<'a>,
    customer_details: CustomerDetails<'a>,
}

#[derive(Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Serialize)]
struct CustomerDetails<'a> {
    email: &'a str,
    first_name: &'a str,
}

#[derive(Deserialize)]
struct TransactionResponse {
    token: String,
    redirect_url: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PaymentGateway` against a Snap-style API.
#[derive(Clone)]
pub struct SnapGateway {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl SnapGateway {
    /// Creates a new `SnapGateway`.
    pub fn new(base_url: String, server_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            server_key,
        }
    }
}

//=========================================================================================
// `PaymentGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl PaymentGateway for SnapGateway {
    async fn create_transaction(&self, order: &PaymentOrder) -> PortResult<PaymentToken> {
        let url = format!("{}/snap/v1/transactions", self.base_url);
        let body = TransactionRequest {
            transaction_details: TransactionDetails {
                order_id: &order.order_id,
                gross_amount: order.gross_amount,
            },
            customer_details: CustomerDetails {
                email: &order.email,
                first_name: &order.first_name,
            },
        };

        let response = self
            .client
            .post(&url)
            // Snap authenticates with the server key as the basic-auth user
            // and an empty password.
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "payment gateway rejected the order ({}): {}",
                status, detail
            )));
        }

        let parsed: TransactionResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(PaymentToken {
            token: parsed.token,
            redirect_url: parsed.redirect_url,
        })
    }
}
