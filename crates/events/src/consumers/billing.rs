//! Billing consumer: meters processed images per owner.

use yolo_core::events::ImageProcessedEvent;

use super::{EventSink, Totals};

pub const BILLING_QUEUE: &str = "billing.events";

#[derive(Debug, Default)]
pub struct BillingLedger {
    totals: Totals,
}

impl BillingLedger {
    pub fn totals(&self) -> Totals {
        self.totals
    }
}

impl EventSink for BillingLedger {
    fn name(&self) -> &'static str {
        "billing"
    }

    fn queue(&self) -> &'static str {
        BILLING_QUEUE
    }

    fn record(&mut self, event: &ImageProcessedEvent) {
        self.totals.add(event);
        tracing::info!(
            prediction_uid = %event.prediction_uid,
            user_id = event.user_id,
            detection_count = event.detection_count,
            chat_id = event.chat_id.as_deref(),
            total_events = self.totals.events,
            total_detections = self.totals.detections,
            "Billing event received"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_event() {
        let mut ledger = BillingLedger::default();
        for count in [1, 3] {
            ledger.record(&ImageProcessedEvent {
                prediction_uid: format!("uid-{count}"),
                user_id: 7,
                labels: vec!["dog".into(); count],
                detection_count: count,
                chat_id: Some("chat-1".into()),
            });
        }
        assert_eq!(ledger.totals().events, 2);
        assert_eq!(ledger.totals().detections, 4);
    }
}
