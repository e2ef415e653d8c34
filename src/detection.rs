use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One recognized object instance. `bbox` is `[x1, y1, x2, y2]` in pixel
/// coordinates of the decoded image, with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: [i64; 4],
}

/// Reply body for a failed cycle: an error message plus an empty detection
/// list, so clients always receive a well-formed JSON reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    pub detections: Vec<Detection>,
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ErrorReply {
    pub fn from_error(err: &DetectionError) -> Self {
        Self {
            error: err.to_string(),
            detections: Vec::new(),
        }
    }
}
