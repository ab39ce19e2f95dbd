use crate::detection::Detection;
use crate::errors::Result;
use crate::imageops::TensorLayout;
use image::RgbImage;
use ndarray::prelude::*;

/// Object detector proposing garment boxes.
pub trait GarmentDetector: Send + Sync {
    /// Candidate boxes in source image coordinates, any order.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// Name of a detector class.
    fn class_name(&self, class_id: usize) -> Option<&str>;
}

/// Raw scores of the two classifier heads for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadScores {
    pub style: Array1<f32>,
    pub season: Array1<f32>,
}

/// Two-head style/season classifier.
pub trait GarmentClassifier: Send + Sync {
    /// Square input side in pixels.
    fn input_size(&self) -> u32;

    fn input_layout(&self) -> TensorLayout;

    /// Scores for a single-image batch already resized and normalized.
    fn classify(&self, tensor: ArrayView4<f32>) -> Result<HeadScores>;
}
