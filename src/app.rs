use crate::{
    config::Config, labels::load_labels, ort_service::OrtDetector, server::ReplyServer,
    weights::ensure_weights,
};
use std::error::Error;

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let weights = match ensure_weights(&config.model) {
        Ok(path) => path,
        Err(e) => {
            tracing::error!("Failed to prepare model weights: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let labels = match load_labels(&config.labels.get_path()) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::error!("Failed to load class labels: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let detector = match OrtDetector::new(&config.model, &weights, labels) {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!("Failed to instantiate ort detector: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let addr = config.server.get_address();
    let server = ReplyServer::bind(&addr, detector, config.limits.max_frame_bytes).await?;

    server.run().await?;

    Ok(())
}
