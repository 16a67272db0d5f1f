//! Analytics consumer: label frequencies across all processed images.

use std::collections::HashMap;

use yolo_core::events::ImageProcessedEvent;

use super::{EventSink, Totals};

pub const ANALYTICS_QUEUE: &str = "analytics.events";

/// Number of labels included in each log line.
const TOP_LABELS_LOGGED: usize = 5;

#[derive(Debug, Default)]
pub struct AnalyticsTally {
    totals: Totals,
    labels: HashMap<String, u64>,
}

impl AnalyticsTally {
    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn label_count(&self, label: &str) -> u64 {
        self.labels.get(label).copied().unwrap_or(0)
    }

    /// The `n` most frequent labels, most frequent first, ties by name.
    pub fn top_labels(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<_> = self.labels.iter().map(|(l, c)| (l.as_str(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

impl EventSink for AnalyticsTally {
    fn name(&self) -> &'static str {
        "analytics"
    }

    fn queue(&self) -> &'static str {
        ANALYTICS_QUEUE
    }

    fn record(&mut self, event: &ImageProcessedEvent) {
        self.totals.add(event);
        for label in &event.labels {
            *self.labels.entry(label.clone()).or_default() += 1;
        }

        tracing::info!(
            prediction_uid = %event.prediction_uid,
            labels = ?event.labels,
            total_events = self.totals.events,
            total_detections = self.totals.detections,
            top_labels = ?self.top_labels(TOP_LABELS_LOGGED),
            "Analytics event received"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(labels: &[&str]) -> ImageProcessedEvent {
        ImageProcessedEvent {
            prediction_uid: "abc".into(),
            user_id: 1,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            detection_count: labels.len(),
            chat_id: None,
        }
    }

    #[test]
    fn tallies_repeated_labels() {
        let mut tally = AnalyticsTally::default();
        tally.record(&event(&["dog", "dog", "cat"]));
        tally.record(&event(&["person"]));
        tally.record(&event(&[]));

        assert_eq!(tally.label_count("dog"), 2);
        assert_eq!(tally.label_count("cat"), 1);
        assert_eq!(tally.label_count("car"), 0);
        assert_eq!(tally.totals().events, 3);
        assert_eq!(tally.totals().detections, 4);
    }

    #[test]
    fn top_labels_orders_by_count_then_name() {
        let mut tally = AnalyticsTally::default();
        tally.record(&event(&["cat", "dog", "bird", "dog"]));

        assert_eq!(tally.top_labels(2), vec![("dog", 2), ("bird", 1)]);
    }
}
