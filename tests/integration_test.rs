use image::{GenericImageView, Rgb, RgbImage};
use std::path::Path;
use tempfile::TempDir;

use garment_analyzer::{
    detection::{BoundingBox, Detection},
    errors::exit_code,
    mocks::{MockClassifier, MockDetector},
    pipeline::{DEBUG_CROP_FILE, DEBUG_FULL_FILE},
    report, AnalysisOptions, GarmentAnalyzer, GarmentError, Outcome, OutputFormat,
};

// 160x120 gray frame with a green garment at (40, 30)..(120, 100)
fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let image = RgbImage::from_fn(160, 120, |x, y| {
        if (40..120).contains(&x) && (30..100).contains(&y) {
            Rgb([20, 160, 60])
        } else {
            Rgb([230, 230, 230])
        }
    });
    let path = dir.join("photo.png");
    image.save(&path).unwrap();
    path
}

fn analyzer(
    detections: Vec<Detection>,
    debug_dir: Option<&Path>,
) -> GarmentAnalyzer<MockDetector, MockClassifier> {
    let options = AnalysisOptions {
        debug_dir: debug_dir.map(Path::to_path_buf),
        ..AnalysisOptions::default()
    };
    GarmentAnalyzer::new(
        MockDetector::new(detections, &["tshirt", "jacket", "dress"]),
        MockClassifier::new(vec![0.05, 0.05, 0.1, 0.8], vec![0.6, 0.2, 0.1, 0.1]),
        options,
    )
}

#[test]
fn test_end_to_end_report_and_debug_images() {
    let temp_dir = TempDir::new().unwrap();
    let image_path = write_fixture(temp_dir.path());
    let debug_dir = temp_dir.path().join("debug");
    std::fs::create_dir_all(&debug_dir).unwrap();

    let detections = vec![
        Detection::new(0, 0.35, BoundingBox::new(0.0, 0.0, 30.0, 30.0)),
        Detection::new(1, 0.91, BoundingBox::new(40.2, 30.7, 120.4, 100.9)),
    ];
    let outcome = analyzer(detections, Some(&debug_dir))
        .analyze(&image_path)
        .unwrap();

    let text = report::render(&outcome, OutputFormat::Text);
    assert_eq!(
        text,
        "\
Résultat final
---------------------------
Type du vêtement : jacket
Couleur dominante : #14A03C
Style : chic
Saison : summer
---------------------------"
    );
    assert_eq!(outcome.exit_code(), exit_code::SUCCESS);

    let crop = image::open(debug_dir.join(DEBUG_CROP_FILE)).unwrap();
    let full = image::open(debug_dir.join(DEBUG_FULL_FILE)).unwrap();
    assert_eq!(crop.dimensions(), (80, 70));
    assert_eq!(full.dimensions(), (160, 120));
}

#[test]
fn test_nothing_detected_writes_no_debug_images() {
    let temp_dir = TempDir::new().unwrap();
    let image_path = write_fixture(temp_dir.path());

    let outcome = analyzer(vec![], Some(temp_dir.path()))
        .analyze(&image_path)
        .unwrap();

    assert_eq!(outcome, Outcome::NothingDetected);
    assert_eq!(
        report::render(&outcome, OutputFormat::Text),
        "Aucun vêtement détecté."
    );
    assert_eq!(outcome.exit_code(), exit_code::NOTHING_DETECTED);
    assert!(!temp_dir.path().join(DEBUG_CROP_FILE).exists());
    assert!(!temp_dir.path().join(DEBUG_FULL_FILE).exists());
}

#[test]
fn test_box_outside_image_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let image_path = write_fixture(temp_dir.path());

    let detections = vec![Detection::new(
        2,
        0.9,
        BoundingBox::new(170.0, 10.0, 200.0, 50.0),
    )];
    let outcome = analyzer(detections, None).analyze(&image_path).unwrap();

    assert_eq!(outcome, Outcome::InvalidBox);
    assert_eq!(
        report::render(&outcome, OutputFormat::Text),
        "Boîte invalide."
    );
}

#[test]
fn test_debug_images_are_opt_in() {
    let temp_dir = TempDir::new().unwrap();
    let image_path = write_fixture(temp_dir.path());
    let detections = vec![Detection::new(
        0,
        0.9,
        BoundingBox::new(40.0, 30.0, 120.0, 100.0),
    )];

    let outcome = analyzer(detections, None).analyze(&image_path).unwrap();
    assert!(matches!(outcome, Outcome::Report(_)));
    assert!(!temp_dir.path().join(DEBUG_CROP_FILE).exists());
    assert!(!Path::new(DEBUG_CROP_FILE).exists());
}

#[test]
fn test_missing_image_reports_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = analyzer(vec![], None)
        .analyze(&temp_dir.path().join("nope.jpg"))
        .unwrap_err();

    assert!(matches!(err, GarmentError::ImageDecode { .. }));
    assert_eq!(err.exit_code(), exit_code::IMAGE_DECODE);

    let line = report::render_error(&err.to_string(), OutputFormat::Text);
    assert!(line.starts_with("Erreur :"), "{line}");
}

#[test]
fn test_exit_codes_and_legacy_mode() {
    let temp_dir = TempDir::new().unwrap();
    let image_path = write_fixture(temp_dir.path());

    let missing = analyzer(vec![], None)
        .analyze(&temp_dir.path().join("nope.jpg"))
        .map_err(anyhow::Error::from);
    let (line, code) = report::conclude(&missing, OutputFormat::Text, false);
    assert!(line.starts_with("Erreur :"), "{line}");
    assert_eq!(code, exit_code::IMAGE_DECODE);
    assert_eq!(
        report::conclude(&missing, OutputFormat::Text, true).1,
        exit_code::SUCCESS
    );

    let nothing = analyzer(vec![], None)
        .analyze(&image_path)
        .map_err(anyhow::Error::from);
    assert_eq!(
        report::conclude(&nothing, OutputFormat::Text, false),
        ("Aucun vêtement détecté.".to_string(), exit_code::NOTHING_DETECTED)
    );
    assert_eq!(
        report::conclude(&nothing, OutputFormat::Text, true).1,
        exit_code::SUCCESS
    );
}

#[test]
fn test_undecodable_image_reports_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.jpg");
    std::fs::write(&path, b"definitely not an image").unwrap();

    let err = analyzer(vec![], None).analyze(&path).unwrap_err();
    assert!(matches!(err, GarmentError::ImageDecode { .. }));
}

#[test]
fn test_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let image_path = write_fixture(temp_dir.path());
    let detections = vec![Detection::new(
        2,
        0.7,
        BoundingBox::new(40.0, 30.0, 120.0, 100.0),
    )];

    let outcome = analyzer(detections, None).analyze(&image_path).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&report::render(&outcome, OutputFormat::Json)).unwrap();

    assert_eq!(value["status"], "ok");
    assert_eq!(value["type"], "dress");
    assert_eq!(value["color"], "#14A03C");
    assert_eq!(value["style"], "chic");
    assert_eq!(value["season"], "summer");
    assert_eq!(value["box"], serde_json::json!([40, 30, 120, 100]));
}
