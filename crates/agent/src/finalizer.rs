use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use stampdesk_core::domain::order::{Order, OrderLocation};
use stampdesk_core::domain::schema::FieldSchema;
use stampdesk_core::notify::{CustomerNotifier, StaffNotifier};
use stampdesk_db::OrderRepository;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizeStage {
    Persist,
    Notify,
}

impl fmt::Display for FinalizeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persist => f.write_str("persist"),
            Self::Notify => f.write_str("notify"),
        }
    }
}

#[derive(Debug, Error)]
#[error("order finalization failed at the {stage} stage: {source}")]
pub struct FinalizeError {
    pub stage: FinalizeStage,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl FinalizeError {
    fn new(stage: FinalizeStage, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self { stage, source: Box::new(source) }
    }
}

/// Shows the customer their order, persists it and tells the staff about it.
pub struct OrderFinalizer {
    orders: Arc<dyn OrderRepository>,
    notifier: Arc<dyn StaffNotifier>,
    customer: Arc<dyn CustomerNotifier>,
    schema: FieldSchema,
}

impl OrderFinalizer {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        notifier: Arc<dyn StaffNotifier>,
        customer: Arc<dyn CustomerNotifier>,
        schema: FieldSchema,
    ) -> Self {
        Self { orders, notifier, customer, schema }
    }

    /// Summary to the customer, then persist, then notify; nothing is retried.
    /// A summary that cannot be delivered is logged and does not stop the order.
    pub async fn finalize(&self, order: &Order) -> Result<OrderLocation, FinalizeError> {
        let summary = order.full_summary(&self.schema);
        if let Err(error) = self.customer.send(&order.conversation_id, &summary).await {
            warn!(
                event_name = "intake.order.summary_failed",
                conversation_id = %order.conversation_id,
                error = %error,
                "order summary not delivered to the customer"
            );
        }

        let location = self
            .orders
            .persist(order)
            .await
            .map_err(|error| FinalizeError::new(FinalizeStage::Persist, error))?;
        info!(
            event_name = "intake.order.persisted",
            conversation_id = %order.conversation_id,
            location = %location.0,
            "order persisted"
        );

        self.notifier
            .notify(&order.short_summary(&self.schema))
            .await
            .map_err(|error| FinalizeError::new(FinalizeStage::Notify, error))?;
        info!(
            event_name = "intake.order.staff_notified",
            conversation_id = %order.conversation_id,
            "staff notified about order"
        );

        Ok(location)
    }
}
