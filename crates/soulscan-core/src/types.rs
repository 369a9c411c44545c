use serde::{Deserialize, Serialize};

/// Facial emotion label. Closed set, shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
    Neutral,
    Fearful,
    Disgusted,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Neutral => "neutral",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output order. The seven raw scores produced by the emotion
/// model are positionally aligned with this array.
pub const LABEL_ORDER: [Emotion; 7] = [
    Emotion::Angry,
    Emotion::Disgusted,
    Emotion::Fearful,
    Emotion::Happy,
    Emotion::Neutral,
    Emotion::Sad,
    Emotion::Surprised,
];

/// One emotion with its confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub emotion: Emotion,
    pub score: f32,
}

/// Bounding box for a detected face, in source-pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Which path produced a set of scores: real inference or the random
/// fallback used when no classifier model is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Model,
    Fallback,
}

/// Output of one processing cycle. Replaced wholesale every cycle.
///
/// When no face was detected, `emotions` is empty and both `dominant` and
/// `source` are `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    /// Ranked emotion list, sorted by descending score.
    pub emotions: Vec<EmotionScore>,
    /// Head of the ranked list.
    pub dominant: Option<Emotion>,
    pub source: Option<ScoreSource>,
}

impl Analysis {
    /// The no-face result: empty list, no dominant emotion.
    pub fn no_face() -> Self {
        Self::default()
    }

    pub fn ranked(emotions: Vec<EmotionScore>, source: ScoreSource) -> Self {
        let dominant = emotions.first().map(|e| e.emotion);
        Self {
            emotions,
            dominant,
            source: Some(source),
        }
    }
}

/// Zip seven raw scores with [`LABEL_ORDER`] and sort descending by score.
///
/// The sort is stable, so equal scores keep label-order precedence.
pub fn rank_scores(raw: &[f32; 7]) -> Vec<EmotionScore> {
    let mut scored: Vec<EmotionScore> = LABEL_ORDER
        .iter()
        .zip(raw.iter())
        .map(|(&emotion, &score)| EmotionScore { emotion, score })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}
