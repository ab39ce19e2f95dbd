use std::fmt;

use serde_json::json;

use crate::{
    color::HexColor,
    config::OutputFormat,
    detection::CropRect,
    errors::{exit_code, GarmentError},
    pipeline::Outcome,
};

pub const NOTHING_DETECTED_MESSAGE: &str = "Aucun vêtement détecté.";
pub const INVALID_BOX_MESSAGE: &str = "Boîte invalide.";
pub const ERROR_PREFIX: &str = "Erreur :";

const TITLE: &str = "Résultat final";
const RULE: &str = "---------------------------";

/// Everything known about the analyzed garment.
#[derive(Debug, Clone, PartialEq)]
pub struct GarmentReport {
    pub garment_type: String,
    pub color: HexColor,
    pub style: String,
    pub season: String,
    pub confidence: f32,
    pub region: CropRect,
}

impl fmt::Display for GarmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{TITLE}")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Type du vêtement : {}", self.garment_type)?;
        writeln!(f, "Couleur dominante : {}", self.color)?;
        writeln!(f, "Style : {}", self.style)?;
        writeln!(f, "Saison : {}", self.season)?;
        write!(f, "{RULE}")
    }
}

impl GarmentReport {
    fn to_json(&self) -> serde_json::Value {
        let CropRect {
            x,
            y,
            width,
            height,
        } = self.region;
        json!({
            "status": "ok",
            "type": self.garment_type,
            "color": self.color,
            "style": self.style,
            "season": self.season,
            "confidence": self.confidence,
            "box": [x, y, x + width, y + height],
        })
    }
}

/// Renders a finished analysis for stdout, without trailing newline.
pub fn render(outcome: &Outcome, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => match outcome {
            Outcome::Report(report) => report.to_string(),
            Outcome::NothingDetected => NOTHING_DETECTED_MESSAGE.to_string(),
            Outcome::InvalidBox => INVALID_BOX_MESSAGE.to_string(),
        },
        OutputFormat::Json => {
            let value = match outcome {
                Outcome::Report(report) => report.to_json(),
                Outcome::NothingDetected => json!({ "status": "no_detection" }),
                Outcome::InvalidBox => json!({ "status": "invalid_box" }),
            };
            value.to_string()
        }
    }
}

pub fn render_error(message: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{ERROR_PREFIX} {message}"),
        OutputFormat::Json => json!({ "status": "error", "error": message }).to_string(),
    }
}

/// Output line and process exit code for a finished run. Errors keep their
/// context chain in the message and map to the code of the innermost
/// [`GarmentError`], or to the generic failure code when there is none.
pub fn conclude(
    result: &anyhow::Result<Outcome>,
    format: OutputFormat,
    legacy_exit_codes: bool,
) -> (String, u8) {
    let (output, code) = match result {
        Ok(outcome) => (render(outcome, format), outcome.exit_code()),
        Err(err) => {
            let code = err
                .downcast_ref::<GarmentError>()
                .map_or(exit_code::FAILURE, GarmentError::exit_code);
            (render_error(&format!("{err:#}"), format), code)
        }
    };

    if legacy_exit_codes {
        (output, exit_code::SUCCESS)
    } else {
        (output, code)
    }
}
