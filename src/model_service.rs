use crate::detection::{Detection, DetectionError};
use image::DynamicImage;

/// Seam between the serve loop and the detection engine, so the loop can be
/// exercised with a mock model in tests.
pub trait ModelService: Send + Sync + 'static {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectionError>;
}
