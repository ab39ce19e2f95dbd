use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::ensure;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::{
    color::{ClusterSettings, ColorStrategy},
    errors::{GarmentError, Result},
    imageops::TensorLayout,
    vocabulary::{Vocabulary, DEFAULT_SEASONS, DEFAULT_STYLES},
};

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   report printed
  1   configuration or filesystem failure
  2   invalid command line
  10  nothing detected
  11  invalid box
  20  image could not be decoded
  21  inference failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None, after_help = EXIT_CODES_HELP)]
pub struct Config {
    /// Image to analyze
    #[arg(long)]
    pub image: PathBuf,

    #[arg(long, default_value = "best.onnx")]
    pub detector_model: PathBuf,

    #[arg(long, default_value = "style_season_model.onnx")]
    pub classifier_model: PathBuf,

    /// Newline separated detector class names, overrides the model metadata
    #[arg(long)]
    pub detector_labels: Option<PathBuf>,

    /// Detector letterbox size, read from the model when omitted
    #[arg(long)]
    pub detector_size: Option<u32>,

    #[arg(long, default_value_t = 0.25)]
    pub confidence: f32,

    #[arg(long, default_value_t = 0.7)]
    pub iou: f32,

    #[arg(long, default_value_t = 300)]
    pub max_detections: usize,

    #[arg(long, default_value_t = 224)]
    pub classifier_size: u32,

    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc)]
    pub classifier_layout: TensorLayout,

    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_STYLES.map(String::from))]
    pub style_labels: Vec<String>,

    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_SEASONS.map(String::from))]
    pub season_labels: Vec<String>,

    #[arg(long, default_value_t = 3)]
    pub clusters: usize,

    #[arg(long, default_value_t = 10)]
    pub restarts: usize,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = ColorStrategy::FirstCluster)]
    pub color_strategy: ColorStrategy,

    /// Write debug_cropped.jpg and debug_full.jpg into this directory
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Exit with status 0 on every outcome
    #[arg(long)]
    pub legacy_exit_codes: bool,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Pipeline settings independent of the model backends.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub style_labels: Vocabulary,
    pub season_labels: Vocabulary,
    pub clustering: ClusterSettings,
    pub debug_dir: Option<PathBuf>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            style_labels: Vocabulary::styles(),
            season_labels: Vocabulary::seasons(),
            clustering: ClusterSettings::default(),
            debug_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub model_path: PathBuf,
    pub class_names: Option<Vec<String>>,
    pub input_size: Option<u32>,
    pub confidence: f32,
    pub iou: f32,
    pub max_detections: usize,
    pub device_id: i32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("best.onnx"),
            class_names: None,
            input_size: None,
            confidence: 0.25,
            iou: 0.7,
            max_detections: 300,
            device_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    pub model_path: PathBuf,
    pub input_size: u32,
    pub layout: TensorLayout,
    pub device_id: i32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("style_season_model.onnx"),
            input_size: 224,
            layout: TensorLayout::Nhwc,
            device_id: 0,
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.confidence),
            "--confidence must lie in [0, 1]"
        );
        ensure!((0.0..=1.0).contains(&self.iou), "--iou must lie in [0, 1]");
        ensure!(self.max_detections > 0, "--max-detections must be positive");
        ensure!(self.classifier_size > 0, "--classifier-size must be positive");
        ensure!(
            self.detector_size != Some(0),
            "--detector-size must be positive"
        );
        ensure!(self.clusters > 0, "--clusters must be positive");
        ensure!(self.restarts > 0, "--restarts must be positive");
        if let Some(dir) = &self.debug_dir {
            ensure!(
                dir.is_dir(),
                "debug directory {} does not exist",
                dir.display()
            );
        }
        Ok(())
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    pub fn analysis_options(&self) -> Result<AnalysisOptions> {
        Ok(AnalysisOptions {
            style_labels: Vocabulary::new("style", self.style_labels.iter().cloned())?,
            season_labels: Vocabulary::new("season", self.season_labels.iter().cloned())?,
            clustering: ClusterSettings {
                clusters: self.clusters,
                restarts: self.restarts,
                seed: self.seed,
                strategy: self.color_strategy,
            },
            debug_dir: self.debug_dir.clone(),
        })
    }

    pub fn detector_settings(&self) -> Result<DetectorSettings> {
        let class_names = self
            .detector_labels
            .as_deref()
            .map(load_labels)
            .transpose()?;

        Ok(DetectorSettings {
            model_path: self.detector_model.clone(),
            class_names,
            input_size: self.detector_size,
            confidence: self.confidence,
            iou: self.iou,
            max_detections: self.max_detections,
            device_id: self.device_id,
        })
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            model_path: self.classifier_model.clone(),
            input_size: self.classifier_size,
            layout: self.classifier_layout,
            device_id: self.device_id,
        }
    }
}

/// One label per non-empty line, in class index order.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| GarmentError::FileSystem {
        path: path.to_path_buf(),
        operation: "read labels".to_string(),
        source: e,
    })?;

    let labels: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect();

    if labels.is_empty() {
        return Err(GarmentError::Configuration {
            message: format!("no detector labels in {}", path.display()),
        });
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("garment-analyzer").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--image", "photo.jpg"]);
        assert_eq!(config.image, PathBuf::from("photo.jpg"));
        assert_eq!(config.style_labels, DEFAULT_STYLES);
        assert_eq!(config.season_labels, DEFAULT_SEASONS);
        assert_eq!(config.classifier_size, 224);
        assert_eq!(config.color_strategy, ColorStrategy::FirstCluster);
        assert_eq!(config.format, OutputFormat::Text);
        assert!(config.debug_dir.is_none());
        assert!(!config.legacy_exit_codes);
        assert_eq!(config.log_level(), LevelFilter::WARN);
        assert!(config.validate().is_ok());

        let options = config.analysis_options().unwrap();
        assert_eq!(options, AnalysisOptions::default());
        assert_eq!(config.classifier_settings(), ClassifierSettings::default());
        assert_eq!(config.detector_settings().unwrap(), DetectorSettings::default());
    }

    #[test]
    fn test_image_is_required() {
        assert!(Config::try_parse_from(["garment-analyzer"]).is_err());
    }

    #[test]
    fn test_custom_vocabularies_and_strategy() {
        let config = parse(&[
            "--image",
            "a.png",
            "--style-labels",
            "street,office",
            "--season-labels",
            "dry,wet",
            "--color-strategy",
            "largest-cluster",
            "--classifier-layout",
            "nchw",
            "-vv",
        ]);
        let options = config.analysis_options().unwrap();
        assert_eq!(options.style_labels.labels(), ["street", "office"]);
        assert_eq!(options.season_labels.labels(), ["dry", "wet"]);
        assert_eq!(options.clustering.strategy, ColorStrategy::LargestCluster);
        assert_eq!(config.classifier_settings().layout, TensorLayout::Nchw);
        assert_eq!(config.log_level(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_blank_vocabulary_label_is_a_configuration_error() {
        let config = parse(&["--image", "a.png", "--style-labels", "casual,,sport"]);
        let err = config.analysis_options().unwrap_err();
        assert!(matches!(err, GarmentError::Configuration { .. }));
        assert_eq!(err.exit_code(), crate::errors::exit_code::FAILURE);
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let config = parse(&["--image", "a.png", "--confidence", "1.5"]);
        assert!(config.validate().is_err());

        let config = parse(&["--image", "a.png", "--clusters", "0"]);
        assert!(config.validate().is_err());

        let config = parse(&["--image", "a.png", "--debug-dir", "/definitely/not/here"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_labels() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("labels.txt");
        fs::write(&path, "shirt\n\n  dress \ncoat\n")?;
        assert_eq!(load_labels(&path)?, vec!["shirt", "dress", "coat"]);

        fs::write(&path, "\n\n")?;
        assert!(matches!(
            load_labels(&path),
            Err(GarmentError::Configuration { .. })
        ));

        assert!(matches!(
            load_labels(&temp_dir.path().join("missing.txt")),
            Err(GarmentError::FileSystem { .. })
        ));
        Ok(())
    }
}
