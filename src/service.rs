use crate::{
    detection::{Detection, DetectionError, ErrorReply},
    model_service::ModelService,
};

/// Run one request cycle: decode the frame bytes, run the model, return the
/// detections. The decoded image lives only for the duration of the cycle.
pub fn handle_frame<M: ModelService>(
    model: &M,
    frame: &[u8],
) -> Result<Vec<Detection>, DetectionError> {
    let image = image::load_from_memory(frame)?;
    model.detect(&image)
}

/// Encode the reply payload: a bare JSON array on success, an
/// `{"error": ..., "detections": []}` object on failure.
pub fn encode_reply(result: &Result<Vec<Detection>, DetectionError>) -> Vec<u8> {
    let encoded = match result {
        Ok(detections) => serde_json::to_vec(detections),
        Err(err) => serde_json::to_vec(&ErrorReply::from_error(err)),
    };

    // Detection and ErrorReply serialize to plain JSON values.
    encoded.unwrap_or_else(|_| b"[]".to_vec())
}
