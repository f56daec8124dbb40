use face_motion_dic::Error;
use face_motion_dic::config::{PipelineConfig, ReferenceConfig};
use face_motion_dic::heatmap::Colormap;
use face_motion_dic::landmarks::RoiKind;
use face_motion_dic::types::Roi;
use tempfile::tempdir;

#[test]
fn test_default_config_is_valid() {
    let config = PipelineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.stabilizer.alpha, 0.3);
    assert_eq!(config.stabilizer.motion_floor, 0.015);
    assert_eq!(config.heatmap.overlay_alpha, 0.4);
    assert_eq!(config.grid.spacing, [20.0, 20.0]);
    assert_eq!(config.reference, ReferenceConfig::PreviousFrame);
    assert!(config.mask_images);

    let params = config.field_params();
    assert_eq!(params.grid_spacing, config.grid.spacing);
    assert!(params.roi.is_none());
    assert_eq!(config.create_stabilizer().unwrap().alpha(), 0.3);
    assert_eq!(config.create_tracker().levels, config.tracker.levels);
}

#[test]
fn test_out_of_range_values_are_rejected() {
    let mut config = PipelineConfig::default();
    config.stabilizer.alpha = 0.0;
    assert!(matches!(config.validate(), Err(Error::InvalidParameter(_))));

    let mut config = PipelineConfig::default();
    config.heatmap.overlay_alpha = 1.5;
    assert!(config.validate().is_err());

    let mut config = PipelineConfig::default();
    config.reference = ReferenceConfig::PeriodicRefresh { period: 0 };
    assert!(config.validate().is_err());

    let mut config = PipelineConfig::default();
    config.reference = ReferenceConfig::StimulusBaseline {
        lead_ms: 8000,
        buffer_ms: 7000,
    };
    assert!(config.validate().is_err());

    let mut config = PipelineConfig::default();
    config.grid.roi = Some(Roi::new(10.0, 5.0, 0.0, 10.0));
    assert!(matches!(config.validate(), Err(Error::InvalidRegion(_))));
}

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let path = path.to_str().unwrap();

    let mut config = PipelineConfig::default();
    config.reference = ReferenceConfig::PeriodicRefresh { period: 30 };
    config.heatmap.colormap = Colormap::Viridis;
    config.roi_kind = RoiKind::Mouth;
    config.grid.roi = Some(Roi::new(0.0, 320.0, 0.0, 240.0));
    config.save(path).unwrap();

    let loaded = PipelineConfig::load(path).unwrap();
    assert_eq!(loaded, config);

    std::fs::write(path, r#"{"stabilizer": {"alpha": 2.0}}"#).unwrap();
    assert!(PipelineConfig::load(path).is_err());
}

#[test]
fn test_partial_json_falls_back_to_defaults() {
    let empty: PipelineConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, PipelineConfig::default());
    assert!(empty.mask_images);

    let stimulus: PipelineConfig =
        serde_json::from_str(r#"{"reference": {"kind": "stimulus_baseline"}}"#).unwrap();
    assert_eq!(
        stimulus.reference,
        ReferenceConfig::StimulusBaseline {
            lead_ms: 5000,
            buffer_ms: 7000,
        }
    );

    let partial: PipelineConfig =
        serde_json::from_str(r#"{"stabilizer": {"alpha": 0.5}, "roi_kind": "eye"}"#).unwrap();
    assert_eq!(partial.stabilizer.alpha, 0.5);
    assert_eq!(partial.stabilizer.motion_floor, 0.015);
    assert_eq!(partial.roi_kind, RoiKind::Eye);
}
