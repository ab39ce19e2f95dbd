use std::path::{Path, PathBuf};

use image::{imageops, imageops::FilterType, ImageError, ImageReader, RgbImage};
use tracing::{debug, info, warn};

use crate::{
    color::dominant_color,
    config::AnalysisOptions,
    detection::select_best,
    errors::{exit_code, GarmentError, Result},
    report::GarmentReport,
    traits::{GarmentClassifier, GarmentDetector},
};

pub const DEBUG_CROP_FILE: &str = "debug_cropped.jpg";
pub const DEBUG_FULL_FILE: &str = "debug_full.jpg";

/// How an analysis ended when no error occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Report(GarmentReport),
    NothingDetected,
    InvalidBox,
}

impl Outcome {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Report(_) => exit_code::SUCCESS,
            Self::NothingDetected => exit_code::NOTHING_DETECTED,
            Self::InvalidBox => exit_code::INVALID_BOX,
        }
    }
}

/// Single-image garment analysis over an injected detector and classifier.
pub struct GarmentAnalyzer<D: GarmentDetector, C: GarmentClassifier> {
    detector: D,
    classifier: C,
    options: AnalysisOptions,
}

impl<D: GarmentDetector, C: GarmentClassifier> GarmentAnalyzer<D, C> {
    pub const fn new(detector: D, classifier: C, options: AnalysisOptions) -> Self {
        Self {
            detector,
            classifier,
            options,
        }
    }

    pub fn analyze(&self, path: &Path) -> Result<Outcome> {
        let image = load_rgb(path)?;
        info!(
            "decoded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        self.analyze_image(&image)
    }

    pub fn analyze_image(&self, image: &RgbImage) -> Result<Outcome> {
        let (width, height) = image.dimensions();

        let detections = self.detector.detect(image)?;
        debug!("{} detections", detections.len());
        let Some(best) = select_best(&detections) else {
            return Ok(Outcome::NothingDetected);
        };
        debug!(
            class_id = best.class_id,
            confidence = best.confidence,
            bbox = ?best.bbox,
            "selected detection"
        );

        let Some(region) = best.bbox.clamp_to(width, height) else {
            debug!("box {:?} is empty inside {width}x{height}", best.bbox);
            return Ok(Outcome::InvalidBox);
        };

        let crop = imageops::crop_imm(image, region.x, region.y, region.width, region.height)
            .to_image();
        if let Some(dir) = &self.options.debug_dir {
            dump_debug_images(dir, &crop, image);
        }

        let color = dominant_color(&crop, &self.options.clustering);
        debug!("dominant color {color}");

        let (style, season) = self.classify(&crop)?;

        let garment_type = self
            .detector
            .class_name(best.class_id)
            .ok_or_else(|| GarmentError::Validation {
                field: "class_id".to_string(),
                reason: format!("{} has no detector label", best.class_id),
            })?
            .to_string();

        Ok(Outcome::Report(GarmentReport {
            garment_type,
            color,
            style,
            season,
            confidence: best.confidence,
            region,
        }))
    }

    fn classify(&self, crop: &RgbImage) -> Result<(String, String)> {
        let size = self.classifier.input_size();
        let resized = imageops::resize(crop, size, size, FilterType::CatmullRom);
        let tensor = self.classifier.input_layout().convert(&resized);

        let scores = self.classifier.classify(tensor.view())?;
        debug!(style = ?scores.style, season = ?scores.season, "classifier scores");

        let style = self.options.style_labels.pick(scores.style.view())?;
        let season = self.options.season_labels.pick(scores.season.view())?;
        Ok((style.to_string(), season.to_string()))
    }
}

/// Decodes any supported format, sniffing the content rather than trusting
/// the extension.
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let decode_error = |source| GarmentError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)
        .map_err(|e| decode_error(ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode_error(ImageError::IoError(e)))?
        .decode()
        .map(|image| image.into_rgb8())
        .map_err(decode_error)
}

/// Debug dumps never fail the analysis.
fn dump_debug_images(dir: &Path, crop: &RgbImage, full: &RgbImage) {
    let targets: [(PathBuf, &RgbImage); 2] = [
        (dir.join(DEBUG_CROP_FILE), crop),
        (dir.join(DEBUG_FULL_FILE), full),
    ];
    for (path, image) in targets {
        match image.save(&path) {
            Ok(()) => debug!("wrote {}", path.display()),
            Err(e) => warn!("cannot write {}: {e}", path.display()),
        }
    }
}
