use crate::detection::Detection;
use crate::errors::Result;
use crate::imageops::TensorLayout;
use crate::traits::{GarmentClassifier, GarmentDetector, HeadScores};
use image::RgbImage;
use ndarray::prelude::*;

/// Detector returning a fixed list of candidates whatever the image.
#[derive(Debug, Clone)]
pub struct MockDetector {
    pub detections: Vec<Detection>,
    pub class_names: Vec<String>,
}

impl MockDetector {
    pub fn new(detections: Vec<Detection>, class_names: &[&str]) -> Self {
        Self {
            detections,
            class_names: class_names.iter().map(ToString::to_string).collect(),
        }
    }
}

impl GarmentDetector for MockDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        self.class_names.get(class_id).map(String::as_str)
    }
}

/// Classifier returning fixed head scores after checking the input shape.
#[derive(Debug, Clone)]
pub struct MockClassifier {
    pub image_size: u32,
    pub layout: TensorLayout,
    pub style: Vec<f32>,
    pub season: Vec<f32>,
}

impl MockClassifier {
    pub fn new(style: Vec<f32>, season: Vec<f32>) -> Self {
        Self {
            image_size: 224,
            layout: TensorLayout::Nhwc,
            style,
            season,
        }
    }
}

impl GarmentClassifier for MockClassifier {
    fn input_size(&self) -> u32 {
        self.image_size
    }

    fn input_layout(&self) -> TensorLayout {
        self.layout
    }

    fn classify(&self, tensor: ArrayView4<f32>) -> Result<HeadScores> {
        let size = self.image_size as usize;
        let expected = match self.layout {
            TensorLayout::Nhwc => [1, size, size, 3],
            TensorLayout::Nchw => [1, 3, size, size],
        };
        if tensor.shape() != expected {
            return Err(crate::errors::GarmentError::shape_mismatch(
                "mock classifier input",
                format!("expected {expected:?}, got {:?}", tensor.shape()),
            ));
        }
        Ok(HeadScores {
            style: Array1::from(self.style.clone()),
            season: Array1::from(self.season.clone()),
        })
    }
}
