use std::{collections::BTreeMap, path::Path};

use crate::{
    config::{ClassifierSettings, DetectorSettings},
    detection::{non_max_suppression, BoundingBox, Detection},
    errors::{GarmentError, Result},
    imageops::{letterbox, to_nchw_tensor, TensorLayout},
    traits::{GarmentClassifier, GarmentDetector, HeadScores},
};
use image::RgbImage;
use ndarray::prelude::*;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

const FALLBACK_DETECTOR_SIZE: u32 = 640;

fn build_session(model_path: &Path, device_id: i32) -> Result<Session> {
    info!("loading model {}", model_path.display());
    if !model_path.exists() {
        return Err(GarmentError::model(
            format!("model lookup: {}", model_path.display()),
            "file does not exist",
        ));
    }

    SessionBuilder::new()
        .map_err(|e| GarmentError::model("session builder initialization", e))?
        .with_execution_providers([
            TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
        ])
        .map_err(|e| GarmentError::model("execution provider registration", e))?
        .with_memory_pattern(true)
        .map_err(|e| GarmentError::model("memory pattern setup", e))?
        .commit_from_file(model_path)
        .map_err(|e| GarmentError::model(format!("model load: {}", model_path.display()), e))
}

/// Static dimension `axis` of the first input, `None` when dynamic.
fn input_dimension(session: &Session, axis: usize) -> Option<u32> {
    session.inputs[0]
        .input_type
        .tensor_shape()
        .and_then(|shape| shape.get(axis).copied())
        .filter(|&d| d > 0)
        .map(|d| d as u32)
}

/// Parses the `names` entry Ultralytics writes into ONNX metadata,
/// e.g. `{0: 'shirt', 1: "men's coat", 2: 'top, long sleeve'}`.
pub fn parse_class_names(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let body = raw
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(raw);

    let names: BTreeMap<usize, String> = split_unquoted(body, ',')
        .into_iter()
        .filter_map(|entry| {
            let (index, name) = entry.split_once(':')?;
            let index = index.trim().parse().ok()?;
            Some((index, unquote(name.trim()).to_string()))
        })
        .collect();

    // only a dense 0..n table is usable
    if names.keys().copied().eq(0..names.len()) {
        names.into_values().collect()
    } else {
        Vec::new()
    }
}

/// Splits on `separator` outside single or double quoted runs.
fn split_unquoted(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == separator => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn unquote(text: &str) -> &str {
    ['\'', '"']
        .into_iter()
        .find_map(|q| text.strip_prefix(q)?.strip_suffix(q))
        .unwrap_or(text)
}

/// YOLO-style ONNX detector: letterboxed `[1, 3, S, S]` input, `[1, 4 + C, N]`
/// output of center boxes followed by per-class scores.
pub struct OnnxDetector {
    pub image_size: u32,
    confidence: f32,
    iou: f32,
    max_detections: usize,
    class_names: Vec<String>,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

impl OnnxDetector {
    pub fn new(settings: &DetectorSettings) -> Result<Self> {
        let session = build_session(&settings.model_path, settings.device_id)?;

        let image_size = settings
            .input_size
            .or_else(|| input_dimension(&session, 2))
            .unwrap_or(FALLBACK_DETECTOR_SIZE);

        let class_names = match &settings.class_names {
            Some(names) => names.clone(),
            None => Self::metadata_class_names(&session).unwrap_or_else(|| {
                warn!("detector has no class names, falling back to class indices");
                Self::index_class_names(&session)
            }),
        };

        let input_name = session.inputs[0].name.clone();
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| {
                GarmentError::shape_mismatch("detector outputs", "model has no output")
            })?;

        debug!(
            image_size,
            classes = class_names.len(),
            input = %input_name,
            output = %output_name,
            "detector ready"
        );

        Ok(Self {
            image_size,
            confidence: settings.confidence,
            iou: settings.iou,
            max_detections: settings.max_detections,
            class_names,
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }

    fn metadata_class_names(session: &Session) -> Option<Vec<String>> {
        let raw = session.metadata().ok()?.custom("names").ok()??;
        let names = parse_class_names(&raw);
        (!names.is_empty()).then_some(names)
    }

    fn index_class_names(session: &Session) -> Vec<String> {
        let classes = session
            .outputs
            .first()
            .and_then(|o| o.output_type.tensor_shape())
            .and_then(|shape| shape.get(1).copied())
            .filter(|&d| d > 4)
            .map_or(0, |d| d as usize - 4);
        (0..classes).map(|i| i.to_string()).collect()
    }

    pub fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array3<f32>> {
        let mut binding = self.session.lock();
        let outputs = binding.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&tensor.as_standard_layout())?
        ])?;
        Ok(outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix3>()?
            .to_owned())
    }
}

/// Decodes a `[1, 4 + C, N]` prediction into candidates above `confidence`,
/// still in letterbox coordinates.
pub fn decode_predictions(output: ArrayView3<f32>, confidence: f32) -> Result<Vec<Detection>> {
    let rows = output.shape()[1];
    if output.shape()[0] != 1 || rows <= 4 {
        return Err(GarmentError::shape_mismatch(
            "detector output decoding",
            format!("expected [1, 4 + classes, anchors], got {:?}", output.shape()),
        ));
    }

    let prediction = output.index_axis(Axis(0), 0);
    let candidates = prediction
        .axis_iter(Axis(1))
        .filter_map(|anchor| {
            let scores = anchor.slice(s![4..]);
            let (class_id, &score) = scores
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, &f32)>, (i, v)| match best {
                    Some((_, b)) if *v <= *b => best,
                    _ => Some((i, v)),
                })?;
            (score > confidence).then(|| {
                Detection::new(
                    class_id,
                    score,
                    BoundingBox::from_center(anchor[0], anchor[1], anchor[2], anchor[3]),
                )
            })
        })
        .collect();
    Ok(candidates)
}

impl GarmentDetector for OnnxDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (canvas, geometry) = letterbox(image, self.image_size);
        let tensor = to_nchw_tensor(&canvas);
        let output = self.predict(tensor.view())?;

        let candidates = decode_predictions(output.view(), self.confidence)?;
        debug!("{} candidates above {}", candidates.len(), self.confidence);

        Ok(non_max_suppression(candidates, self.iou, self.max_detections)
            .into_iter()
            .map(|d| Detection {
                bbox: geometry.restore(d.bbox),
                ..d
            })
            .collect())
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        self.class_names.get(class_id).map(String::as_str)
    }
}

/// Two-head ONNX classifier. The first graph output scores styles, the
/// second scores seasons.
pub struct OnnxClassifier {
    pub image_size: u32,
    layout: TensorLayout,
    input_name: String,
    style_output: String,
    season_output: String,
    session: Mutex<Session>,
}

impl OnnxClassifier {
    pub fn new(settings: &ClassifierSettings) -> Result<Self> {
        let session = build_session(&settings.model_path, settings.device_id)?;

        let spatial_axis = match settings.layout {
            TensorLayout::Nhwc => 1,
            TensorLayout::Nchw => 2,
        };
        if let Some(size) = input_dimension(&session, spatial_axis) {
            if size != settings.input_size {
                return Err(GarmentError::shape_mismatch(
                    "classifier input",
                    format!(
                        "model expects {size}x{size} ({:?}), configured {}",
                        settings.layout, settings.input_size
                    ),
                ));
            }
        }

        let [style_output, season_output] = match session.outputs.as_slice() {
            [style, season, ..] => [style.name.clone(), season.name.clone()],
            outputs => {
                return Err(GarmentError::shape_mismatch(
                    "classifier outputs",
                    format!("expected two heads, model has {}", outputs.len()),
                ))
            }
        };

        Ok(Self {
            image_size: settings.input_size,
            layout: settings.layout,
            input_name: session.inputs[0].name.clone(),
            style_output,
            season_output,
            session: Mutex::new(session),
        })
    }
}

impl GarmentClassifier for OnnxClassifier {
    fn input_size(&self) -> u32 {
        self.image_size
    }

    fn input_layout(&self) -> TensorLayout {
        self.layout
    }

    fn classify(&self, tensor: ArrayView4<f32>) -> Result<HeadScores> {
        let mut binding = self.session.lock();
        let outputs = binding.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&tensor.as_standard_layout())?
        ])?;

        let head = |name: &str| -> Result<Array1<f32>> {
            Ok(outputs[name].try_extract_array::<f32>()?.iter().copied().collect())
        };

        Ok(HeadScores {
            style: head(&self.style_output)?,
            season: head(&self.season_output)?,
        })
    }
}
