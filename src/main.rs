use std::{
    io::{self, Write},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use garment_analyzer::{
    errors::exit_code, report, Config, GarmentAnalyzer, GarmentError, OnnxClassifier,
    OnnxDetector, Outcome,
};

fn main() -> ExitCode {
    let config = Config::parse();

    // stdout carries the report only
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_writer(io::stderr)
        .init();

    let (output, code) = report::conclude(&run(&config), config.format, config.legacy_exit_codes);

    let mut stdout = io::stdout().lock();
    let written = writeln!(stdout, "{output}").and_then(|()| stdout.flush());

    if written.is_err() && !config.legacy_exit_codes {
        ExitCode::from(exit_code::FAILURE)
    } else {
        ExitCode::from(code)
    }
}

fn run(config: &Config) -> Result<Outcome> {
    config.validate().map_err(GarmentError::from)?;
    let options = config.analysis_options()?;

    let detector = OnnxDetector::new(&config.detector_settings()?)
        .with_context(|| format!("Failed to load detector {}", config.detector_model.display()))?;
    let classifier = OnnxClassifier::new(&config.classifier_settings()).with_context(|| {
        format!(
            "Failed to load classifier {}",
            config.classifier_model.display()
        )
    })?;
    info!("models loaded");

    let analyzer = GarmentAnalyzer::new(detector, classifier, options);
    Ok(analyzer.analyze(&config.image)?)
}
