use crate::config::ModelConfig;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeightsError {
    #[error("model weights not found at {0} and no source_url configured")]
    Missing(PathBuf),
    #[error("failed to fetch model weights: {0}")]
    Fetch(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Return the local path of the weights artifact, fetching it from the
/// configured URL when absent. The artifact is written to a `.part` file
/// first so a failed fetch never leaves a truncated model behind.
pub fn ensure_weights(config: &ModelConfig) -> Result<PathBuf, WeightsError> {
    let path = config.get_model_path();
    if path.exists() {
        return Ok(path);
    }

    let url = config
        .source_url
        .as_ref()
        .ok_or_else(|| WeightsError::Missing(path.clone()))?;

    tracing::info!(url = %url, path = %path.display(), "model weights absent, fetching");
    std::fs::create_dir_all(&config.model_dir)?;

    let response = ureq::get(url)
        .call()
        .map_err(|e| WeightsError::Fetch(e.to_string()))?;

    let partial = path.with_extension("part");
    let mut file = std::fs::File::create(&partial)?;
    std::io::copy(&mut response.into_reader(), &mut file)?;
    std::fs::rename(&partial, &path)?;

    tracing::info!(path = %path.display(), "model weights ready");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_model_config(name: &str, source_url: Option<String>) -> ModelConfig {
        ModelConfig {
            onnx_file: format!("{}.onnx", name),
            model_dir: std::env::temp_dir().join(format!("detection-weights-{}", std::process::id())),
            source_url,
            input_size: 640,
            min_confidence: 0.5,
            iou_threshold: 0.7,
        }
    }

    #[test]
    fn existing_weights_are_returned_without_fetching() {
        let config = temp_model_config("present", None);
        std::fs::create_dir_all(&config.model_dir).unwrap();
        let path = config.get_model_path();
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"onnx").unwrap();

        let resolved = ensure_weights(&config).unwrap();
        assert_eq!(resolved, path);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn absent_weights_without_source_url_is_an_error() {
        let config = temp_model_config("absent", None);

        let result = ensure_weights(&config);
        assert!(matches!(result, Err(WeightsError::Missing(_))));
    }
}
