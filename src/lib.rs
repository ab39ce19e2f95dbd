pub mod color;
pub mod config;
pub mod detection;
pub mod errors;
pub mod imageops;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod traits;
pub mod vocabulary;

pub mod mocks;

pub use config::{AnalysisOptions, ClassifierSettings, Config, DetectorSettings, OutputFormat};
pub use errors::{GarmentError, Result};
pub use model::{OnnxClassifier, OnnxDetector};
pub use pipeline::{GarmentAnalyzer, Outcome};
pub use report::GarmentReport;
pub use traits::*;
