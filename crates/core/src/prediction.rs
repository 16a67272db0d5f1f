//! Detection results and the persisted prediction artifact.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f64,
    /// Bounding box as `[x1, y1, x2, y2]`.
    #[serde(rename = "box")]
    pub bbox: [f64; 4],
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f64, bbox: [f64; 4]) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }

    /// Text form of the bounding box as stored in `detection_objects.box`.
    pub fn box_text(&self) -> String {
        let [x1, y1, x2, y2] = self.bbox;
        format!("[{x1}, {y1}, {x2}, {y2}]")
    }
}

/// What the inference engine returns for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceOutput {
    /// Detections in the order produced by the model.
    pub detections: Vec<Detection>,
    /// Object count as reported by the engine.
    pub count: usize,
}

impl InferenceOutput {
    pub fn new(detections: Vec<Detection>) -> Self {
        let count = detections.len();
        Self { detections, count }
    }
}

/// Record of one completed job: a prediction session plus its detections.
///
/// Created once per successfully processed job and handed to the
/// repository; the pipeline never reads it back.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionArtifact {
    pub uid: String,
    pub original_image: String,
    pub predicted_image: String,
    pub user_id: DbId,
    pub detections: Vec<Detection>,
}

impl PredictionArtifact {
    /// Labels in detection order.
    pub fn labels(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.label.clone()).collect()
    }

    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_serializes_box_field() {
        let d = Detection::new("dog", 0.92, [1.0, 2.0, 3.0, 4.0]);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"label": "dog", "score": 0.92, "box": [1.0, 2.0, 3.0, 4.0]})
        );
    }

    #[test]
    fn box_text_matches_list_form() {
        let d = Detection::new("car", 0.8, [5.0, 5.5, 20.0, 20.25]);
        assert_eq!(d.box_text(), "[5, 5.5, 20, 20.25]");
    }

    #[test]
    fn labels_keep_detection_order() {
        let artifact = PredictionArtifact {
            uid: "u".into(),
            original_image: "o.jpg".into(),
            predicted_image: "p.jpg".into(),
            user_id: 1,
            detections: vec![
                Detection::new("person", 0.9, [0.0, 0.0, 10.0, 10.0]),
                Detection::new("car", 0.8, [5.0, 5.0, 20.0, 20.0]),
                Detection::new("person", 0.7, [1.0, 1.0, 2.0, 2.0]),
            ],
        };
        assert_eq!(artifact.labels(), vec!["person", "car", "person"]);
        assert_eq!(artifact.detection_count(), 3);
    }
}
