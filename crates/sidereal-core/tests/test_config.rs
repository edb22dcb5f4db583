use std::path::PathBuf;

use sidereal_core::config::{
    AlignmentConfig, CropConfig, RunConfig, SquareConfig, StackMethod, StackingConfig,
};
use sidereal_core::geometry::IntegerRect;
use sidereal_core::stack::{PostStack, StackMode};

#[test]
fn test_default_config_toml_roundtrip() {
    let config = RunConfig::default();
    let text = toml::to_string_pretty(&config).unwrap();
    let parsed: RunConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.inputs, config.inputs);
    assert_eq!(parsed.alignment, config.alignment);
    assert_eq!(parsed.stacking, config.stacking);
}

#[test]
fn test_minimal_toml_uses_defaults() {
    let text = r#"
        inputs = ["a.png", "b.png"]
        output = "out.tiff"
    "#;
    let config: RunConfig = toml::from_str(text).unwrap();
    assert_eq!(config.inputs, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
    assert_eq!(config.threads, 0);
    assert_eq!(config.alignment, AlignmentConfig::default());
    assert_eq!(config.stacking.method, StackMethod::Standard);
}

#[test]
fn test_partial_sections() {
    let text = r#"
        inputs = ["a.png"]
        output = "out.png"
        threads = 4

        [alignment]
        reference = "a"
        value_threshold = 0.5

        [[alignment.squares]]
        x = 10
        y = 20
        size = 32

        [stacking]
        method = "SigmaReject"
        sigma_threshold = 1.5
        post_stack = "Normalize"
        crop = { x = 1, y = 2, width = 30, height = 40 }
    "#;
    let config: RunConfig = toml::from_str(text).unwrap();
    assert_eq!(config.threads, 4);

    let align = config.alignment.to_params("a", 100, 100);
    assert_eq!(align.value_threshold, 0.5);
    assert_eq!(align.squares.len(), 1);
    assert_eq!(align.squares[0].name, "square-1");
    assert_eq!(align.squares[0].rect, IntegerRect::new(10, 20, 32, 32));

    let stack = config.stacking.to_params(100, 100).unwrap();
    assert_eq!(stack.mode, StackMode::SigmaReject { threshold: 1.5 });
    assert_eq!(stack.post_stack, PostStack::Normalize);
    assert_eq!(stack.crop, IntegerRect::new(1, 2, 30, 40));
}

#[test]
fn test_stack_methods_map_to_modes() {
    let mode = |method| {
        StackingConfig {
            method,
            ..StackingConfig::default()
        }
        .mode()
    };
    assert_eq!(mode(StackMethod::Maximum), StackMode::Extremum { maximum: true });
    assert_eq!(mode(StackMethod::Minimum), StackMode::Extremum { maximum: false });
    assert_eq!(mode(StackMethod::Calibration), StackMode::Calibration);
    assert_eq!(format!("{}", StackMethod::SigmaReject), "Sigma Reject");
}

#[test]
fn test_named_square_and_json() {
    let config = AlignmentConfig {
        squares: vec![SquareConfig {
            name: Some("limb".into()),
            x: 0,
            y: 0,
            size: 16,
        }],
        ..AlignmentConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: AlignmentConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
    assert_eq!(back.to_params("r", 64, 64).squares[0].name, "limb");
}

#[test]
fn test_invalid_sigma_threshold() {
    let config = StackingConfig {
        method: StackMethod::SigmaReject,
        sigma_threshold: 0.0,
        crop: Some(CropConfig {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        }),
        ..StackingConfig::default()
    };
    assert!(config.to_params(4, 4).is_err());
}
