use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoxRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// Landmark point. Serialized as `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f32, pub f32);

impl Point {
    pub fn x(&self) -> f32 {
        self.0
    }

    pub fn y(&self) -> f32 {
        self.1
    }
}

/// Expression label → probability, kept in the order the pipeline produced them.
///
/// Order matters: ties in `top()` go to the label that appears first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionScores(Vec<(String, f32)>);

impl ExpressionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a label, keeping the original position on replace.
    pub fn insert(&mut self, label: impl Into<String>, score: f32) {
        let label = label.into();
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = score,
            None => self.0.push((label, score)),
        }
    }

    /// Score for a label; absent labels score zero.
    pub fn score(&self, label: &str) -> f32 {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, s)| *s)
            .unwrap_or(0.0)
    }

    /// Highest scoring label. Ties keep the first label encountered.
    pub fn top(&self) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;
        for (label, score) in &self.0 {
            match best {
                Some((_, best_score)) if *score <= best_score => {}
                _ => best = Some((label.as_str(), *score)),
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(l, s)| (l.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for ExpressionScores {
    fn from_iter<I: IntoIterator<Item = (S, f32)>>(iter: I) -> Self {
        let mut scores = Self::new();
        for (label, score) in iter {
            scores.insert(label, score);
        }
        scores
    }
}

impl Serialize for ExpressionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, score) in &self.0 {
            map.serialize_entry(label, score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExpressionScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedScores;

        impl<'de> Visitor<'de> for OrderedScores {
            type Value = ExpressionScores;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of expression label to probability")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut scores = ExpressionScores::new();
                while let Some((label, score)) = access.next_entry::<String, f32>()? {
                    scores.insert(label, score);
                }
                Ok(scores)
            }
        }

        deserializer.deserialize_map(OrderedScores)
    }
}

/// One face in one frame, as returned by a perception pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Missing boxes are tolerated at parse time and rejected by `validate`.
    #[serde(rename = "box", default)]
    pub bbox: Option<BoxRect>,
    /// Detector confidence for the face itself.
    #[serde(default = "full_confidence")]
    pub score: f32,
    #[serde(default)]
    pub landmarks: Vec<Point>,
    #[serde(default)]
    pub expressions: ExpressionScores,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub gender_probability: Option<f32>,
    #[serde(default)]
    pub age: Option<f32>,
}

fn full_confidence() -> f32 {
    1.0
}

impl FaceDetection {
    /// Check the record is usable by the tracker and renderer.
    pub fn validate(&self) -> Result<BoxRect, MalformedDetection> {
        let bbox = self.bbox.ok_or(MalformedDetection {
            reason: "missing bounding box",
        })?;
        if !bbox.is_finite() {
            return Err(MalformedDetection {
                reason: "non-finite box coordinates",
            });
        }
        if bbox.width < 0.0 || bbox.height < 0.0 {
            return Err(MalformedDetection {
                reason: "negative box size",
            });
        }
        if self.landmarks.is_empty() {
            return Err(MalformedDetection {
                reason: "no landmarks",
            });
        }
        if self
            .landmarks
            .iter()
            .any(|p| !p.0.is_finite() || !p.1.is_finite())
        {
            return Err(MalformedDetection {
                reason: "non-finite landmark",
            });
        }
        if self.expressions.iter().any(|(_, s)| !s.is_finite()) {
            return Err(MalformedDetection {
                reason: "non-finite expression score",
            });
        }
        Ok(bbox)
    }
}

/// A single detection record was unusable. The entity is skipped for the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MalformedDetection {
    pub reason: &'static str,
}

impl fmt::Display for MalformedDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed detection: {}", self.reason)
    }
}

impl std::error::Error for MalformedDetection {}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> FaceDetection {
        FaceDetection {
            bbox: Some(BoxRect::new(10.0, 20.0, 50.0, 60.0)),
            score: 0.9,
            landmarks: vec![Point(12.0, 25.0), Point(40.0, 25.0)],
            expressions: [("neutral", 0.6), ("angry", 0.4)].into_iter().collect(),
            gender: "female".to_string(),
            gender_probability: Some(0.8),
            age: Some(31.0),
        }
    }

    #[test]
    fn top_expression_prefers_first_on_tie() {
        let scores: ExpressionScores = [("happy", 0.4), ("angry", 0.4), ("sad", 0.2)]
            .into_iter()
            .collect();
        assert_eq!(scores.top(), Some(("happy", 0.4)));
    }

    #[test]
    fn missing_label_scores_zero() {
        assert_eq!(face().expressions.score("surprised"), 0.0);
        assert_eq!(face().expressions.score("angry"), 0.4);
    }

    #[test]
    fn deserialize_keeps_document_order() {
        let json = r#"{"zeta": 0.5, "alpha": 0.5}"#;
        let scores: ExpressionScores = serde_json::from_str(json).unwrap();
        let labels: Vec<&str> = scores.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["zeta", "alpha"]);
        assert_eq!(scores.top(), Some(("zeta", 0.5)));
    }

    #[test]
    fn parses_pipeline_record() {
        let json = r#"{
            "box": {"x": 100.4, "y": 99.6, "width": 80, "height": 90},
            "landmarks": [[110, 120], [150, 121]],
            "expressions": {"angry": 0.5, "neutral": 0.5},
            "gender": "male",
            "age": 40
        }"#;
        let det: FaceDetection = serde_json::from_str(json).unwrap();
        assert_eq!(det.score, 1.0);
        assert_eq!(det.landmarks.len(), 2);
        assert!(det.validate().is_ok());
    }

    #[test]
    fn validate_rejects_broken_records() {
        let mut missing_box = face();
        missing_box.bbox = None;
        assert_eq!(
            missing_box.validate().unwrap_err().reason,
            "missing bounding box"
        );

        let mut nan_box = face();
        nan_box.bbox = Some(BoxRect::new(f32::NAN, 0.0, 1.0, 1.0));
        assert!(nan_box.validate().is_err());

        let mut no_landmarks = face();
        no_landmarks.landmarks.clear();
        assert_eq!(no_landmarks.validate().unwrap_err().reason, "no landmarks");

        let mut inf_score = face();
        inf_score.expressions.insert("angry", f32::INFINITY);
        assert!(inf_score.validate().is_err());

        let mut negative_size = face();
        negative_size.bbox = Some(BoxRect::new(10.0, 20.0, -1.0, 60.0));
        assert_eq!(
            negative_size.validate().unwrap_err().reason,
            "negative box size"
        );

        let mut nan_landmark = face();
        nan_landmark.landmarks.push(Point(f32::NAN, 25.0));
        assert_eq!(
            nan_landmark.validate().unwrap_err().reason,
            "non-finite landmark"
        );
    }
}
