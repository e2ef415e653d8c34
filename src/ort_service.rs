use crate::{
    config::ModelConfig,
    detection::{Detection, DetectionError},
    model_service::ModelService,
};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{s, Array, ArrayD, Axis, Ix4};
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{path::Path, sync::Mutex};

/// One candidate box in original-image coordinates, before label mapping.
#[derive(Debug, Clone, Copy)]
struct RawDetection {
    class_id: usize,
    confidence: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

fn intersection(box1: &RawDetection, box2: &RawDetection) -> f32 {
    let w = (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)).max(0.);
    let h = (box1.y2.min(box2.y2) - box1.y1.max(box2.y1)).max(0.);
    w * h
}

fn union(box1: &RawDetection, box2: &RawDetection) -> f32 {
    ((box1.x2 - box1.x1) * (box1.y2 - box1.y1)) + ((box2.x2 - box2.x1) * (box2.y2 - box2.y1))
        - intersection(box1, box2)
}

fn image_to_tensor(image: &DynamicImage, input_size: u32) -> Array<f32, Ix4> {
    let size = input_size as usize;
    let img = image.resize_exact(input_size, input_size, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, size, size));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Decode the `[1, 4 + classes, candidates]` detection head: arg-max class
/// score per candidate, confidence cut, center-format box rescaled to the
/// original image and clamped to its bounds, then greedy NMS.
fn postprocess(
    output: &ArrayD<f32>,
    img_width: u32,
    img_height: u32,
    input_size: u32,
    min_confidence: f32,
    iou_threshold: f32,
) -> Result<Vec<RawDetection>, DetectionError> {
    let shape = output.shape();
    if output.ndim() != 3 || shape[0] != 1 || shape[1] <= 4 {
        return Err(DetectionError::Inference(format!(
            "unexpected model output shape {:?}",
            shape
        )));
    }

    let size = input_size as f32;
    let mut boxes = Vec::new();
    let view = output.slice(s![0, .., ..]);

    for col in view.axis_iter(Axis(1)) {
        let row: Vec<f32> = col.iter().copied().collect();
        let Some((class_id, prob)) = row
            .iter()
            .skip(4)
            .enumerate()
            .map(|(index, value)| (index, *value))
            .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        else {
            continue;
        };

        if prob < min_confidence {
            continue;
        }

        let xc = row[0] / size * (img_width as f32);
        let yc = row[1] / size * (img_height as f32);
        let w = row[2] / size * (img_width as f32);
        let h = row[3] / size * (img_height as f32);

        boxes.push(RawDetection {
            class_id,
            confidence: prob,
            x1: (xc - w / 2.).max(0.).min(img_width as f32),
            y1: (yc - h / 2.).max(0.).min(img_height as f32),
            x2: (xc + w / 2.).max(0.).min(img_width as f32),
            y2: (yc + h / 2.).max(0.).min(img_height as f32),
        });
    }

    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result = Vec::new();

    while !boxes.is_empty() {
        result.push(boxes[0]);
        boxes = boxes
            .iter()
            .filter(|box1| intersection(&boxes[0], box1) / union(&boxes[0], box1) < iou_threshold)
            .copied()
            .collect();
    }

    Ok(result)
}

fn label_for(labels: &[String], class_id: usize) -> String {
    labels
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("unknown class {}", class_id))
}

pub struct OrtDetector {
    session: Mutex<Session>,
    labels: Vec<String>,
    input_size: u32,
    min_confidence: f32,
    iou_threshold: f32,
}

impl OrtDetector {
    pub fn new(
        config: &ModelConfig,
        weights: &Path,
        labels: Vec<String>,
    ) -> Result<Self, ort::Error> {
        ort::init()
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .commit()?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(weights)?;

        tracing::info!(
            model = %weights.display(),
            classes = labels.len(),
            "ONNX session created"
        );

        Ok(Self {
            session: Mutex::new(session),
            labels,
            input_size: config.input_size,
            min_confidence: config.min_confidence,
            iou_threshold: config.iou_threshold,
        })
    }

    fn run_session(&self, input: &Array<f32, Ix4>) -> Result<ArrayD<f32>, DetectionError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| DetectionError::Inference(format!("session mutex poisoned: {}", e)))?;

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectionError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let output = outputs.get("output0").ok_or_else(|| {
            DetectionError::Inference("model has no output named `output0`".to_string())
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Inference(format!("failed to extract tensor: {}", e)))?;

        let ix = shape.to_ixdyn();
        ArrayD::from_shape_vec(ix, data.to_vec())
            .map_err(|e| DetectionError::Inference(format!("invalid tensor shape: {}", e)))
    }
}

impl ModelService for OrtDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectionError> {
        let (img_width, img_height) = image.dimensions();
        let input = image_to_tensor(image, self.input_size);
        let output = self.run_session(&input)?;

        let raw = postprocess(
            &output,
            img_width,
            img_height,
            self.input_size,
            self.min_confidence,
            self.iou_threshold,
        )?;

        Ok(raw
            .into_iter()
            .map(|r| Detection {
                label: label_for(&self.labels, r.class_id),
                confidence: r.confidence,
                bbox: [r.x1 as i64, r.y1 as i64, r.x2 as i64, r.y2 as i64],
            })
            .collect())
    }
}
