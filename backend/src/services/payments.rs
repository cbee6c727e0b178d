//! Payment gate: records payments and derives the order's payment status

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_accepts_payment, derive_payment_status, normalize_kenyan_phone, validate_amount,
    validate_kenyan_phone, validate_mpesa_receipt, Actor, Order, Payment, PaymentMethod,
    PaymentRecordStatus,
};
use uuid::Uuid;

use super::authorization::require_party_to;
use super::fulfillment::lock_order;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, Store};

/// Input for recording a payment
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    /// Outcome reported by the payment channel; completed when omitted
    #[serde(default)]
    pub status: PaymentRecordStatus,
    pub mpesa_receipt_number: Option<String>,
    pub mpesa_phone: Option<String>,
    pub notes: Option<String>,
}

impl RecordPaymentInput {
    fn validate(&self) -> AppResult<()> {
        validate_amount(self.amount)?;
        if self.payment_method == PaymentMethod::Mpesa {
            match self.mpesa_phone.as_deref() {
                Some(phone) => validate_kenyan_phone(phone)?,
                None => {
                    return Err(AppError::Validation {
                        field: "mpesa_phone".to_string(),
                        message: "M-Pesa payments need the paying phone number".to_string(),
                    })
                }
            }
            if let Some(receipt) = self.mpesa_receipt_number.as_deref() {
                validate_mpesa_receipt(receipt)?;
            }
        }
        Ok(())
    }
}

/// The new payment and the order header after status derivation
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub order: Order,
}

#[derive(Clone)]
pub struct PaymentGate {
    store: Arc<dyn Store>,
}

impl PaymentGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a payment against an order.
    ///
    /// Completed payments accumulate until they cover the total, at which
    /// point the order is PAID. Reaching PAID never fulfills the order.
    pub async fn record_payment(
        &self,
        actor: Actor,
        order_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<PaymentReceipt> {
        input.validate()?;
        let now = Utc::now();

        let receipt = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let mut order = lock_order(uow, order_id).await?;
                require_party_to(&actor, &order)?;
                check_accepts_payment(&order)?;

                let is_mpesa = input.payment_method == PaymentMethod::Mpesa;
                let payment = Payment {
                    id: Uuid::new_v4(),
                    order_id,
                    amount: input.amount,
                    status: input.status,
                    payment_method: input.payment_method,
                    mpesa_receipt_number: input.mpesa_receipt_number.filter(|_| is_mpesa),
                    mpesa_phone: input
                        .mpesa_phone
                        .filter(|_| is_mpesa)
                        .and_then(|p| normalize_kenyan_phone(&p)),
                    notes: input.notes,
                    recorded_by: actor.user_id,
                    paid_at: (input.status == PaymentRecordStatus::Completed).then_some(now),
                    created_at: now,
                };
                uow.insert_payment(&payment).await?;

                let payments = uow.payments_for_order(order_id).await?;
                let payment_status = derive_payment_status(&order, &payments);
                if payment_status != order.payment_status {
                    order.payment_status = payment_status;
                    order.updated_at = now;
                    uow.update_order(&order).await?;
                }

                Ok(PaymentReceipt { payment, order })
            })
        })
        .await?;

        tracing::info!(
            order_id = %order_id,
            order_number = %receipt.order.order_number,
            amount = %receipt.payment.amount,
            method = ?receipt.payment.payment_method,
            payment_status = %receipt.order.payment_status,
            "Payment recorded"
        );

        Ok(receipt)
    }

    /// Payments of one order in the order they were recorded
    pub async fn list_payments(&self, actor: Actor, order_id: Uuid) -> AppResult<Vec<Payment>> {
        with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let order = uow
                    .order(order_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
                require_party_to(&actor, &order)?;
                uow.payments_for_order(order_id).await
            })
        })
        .await
    }
}
