use face_motion_dic::Error;
use face_motion_dic::config::PipelineConfig;
use face_motion_dic::grid::{Grid, GridMeta};
use face_motion_dic::io::{
    LandmarkRecord, LandmarksJsonWriter, load_landmarks, object_from_json, object_to_json,
    write_session_report,
};
use face_motion_dic::landmarks::NormalizedPoint;
use face_motion_dic::session::{FrameInput, FrameOutcome, HeatmapSession};
use face_motion_dic::types::{Point2D, PointSet};
use image::GrayImage;
use tempfile::tempdir;

fn record(frame_index: usize) -> LandmarkRecord {
    LandmarkRecord {
        frame_index,
        timestamp_ms: frame_index as i64 * 40,
        values: vec![0.5, 0.0],
        points: vec![[3, 4], [5, 6]],
    }
}

#[test]
fn test_landmark_writer_produces_a_json_array() {
    let mut writer = LandmarksJsonWriter::new(Vec::new()).unwrap();
    writer.write_record(&record(0)).unwrap();
    writer.write_record(&record(1)).unwrap();
    assert_eq!(writer.records(), 2);
    let bytes = writer.finish().unwrap();

    let parsed: Vec<LandmarkRecord> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed, vec![record(0), record(1)]);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("\"frameIndex\":1"));
    assert!(text.contains("\"timestampMs\":40"));
}

#[test]
fn test_empty_landmark_writer_is_valid_json() {
    let writer = LandmarksJsonWriter::new(Vec::new()).unwrap();
    let bytes = writer.finish().unwrap();
    let parsed: Vec<LandmarkRecord> = serde_json::from_slice(&bytes).unwrap();
    assert!(parsed.is_empty());
}

#[test]
fn test_session_report_and_outcome_records() {
    let dir = tempdir().unwrap();
    let calls = std::sync::atomic::AtomicUsize::new(0);
    let tracker = |_a: &GrayImage, _b: &GrayImage, p: &[Point2D]| -> face_motion_dic::Result<PointSet> {
        if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            Err(Error::TrackingUnavailable("lost face".to_string()))
        } else {
            Ok(p.iter().map(|q| *q + Point2D::new(0.0, 1.0)).collect())
        }
    };
    let mut session = HeatmapSession::new(tracker, &PipelineConfig::default()).unwrap();
    let outcomes: Vec<FrameOutcome> = (0..2)
        .map(|k| {
            let input = FrameInput::new(k, k as i64 * 33, GrayImage::new(60, 40))
                .with_query_pixels(vec![[10, 10]]);
            session.process_frame(&input).unwrap()
        })
        .collect();
    assert!(!outcomes[0].is_processed());
    assert!(outcomes[1].is_processed());

    let mut writer = LandmarksJsonWriter::new(Vec::new()).unwrap();
    assert!(!writer.write_outcome(&outcomes[0]).unwrap());
    assert!(writer.write_outcome(&outcomes[1]).unwrap());
    let parsed: Vec<LandmarkRecord> = serde_json::from_slice(&writer.finish().unwrap()).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].frame_index, 1);
    assert_eq!(parsed[0].points, vec![[10, 10]]);

    let path = dir.path().join("report.json");
    write_session_report(path.to_str().unwrap(), &outcomes).unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["totalFrames"], 2);
    assert_eq!(report["processedFrames"], 1);
    assert_eq!(report["skippedFrames"], 1);
    assert_eq!(report["frames"][0]["processed"], false);
    assert!(report["frames"][0]["reason"].is_string());
    assert!(report["frames"][1]["stats"]["meanAbs"].is_number());
}

#[test]
fn test_load_landmarks_accepts_both_layouts() {
    let dir = tempdir().unwrap();
    let pairs = dir.path().join("pairs.json");
    std::fs::write(&pairs, "[[0.25, 0.5], [1.0, 0.0]]").unwrap();
    let objects = dir.path().join("objects.json");
    std::fs::write(&objects, r#"[{"x": 0.25, "y": 0.5}, {"x": 1.0, "y": 0.0}]"#).unwrap();

    let expected = vec![
        NormalizedPoint { x: 0.25, y: 0.5 },
        NormalizedPoint { x: 1.0, y: 0.0 },
    ];
    assert_eq!(load_landmarks(pairs.to_str().unwrap()).unwrap(), expected);
    assert_eq!(load_landmarks(objects.to_str().unwrap()).unwrap(), expected);

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        load_landmarks(missing.to_str().unwrap()),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_grid_meta_rebuilds_the_grid() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grid_meta.json");
    let path = path.to_str().unwrap();

    let grid = Grid::over_roi(
        &face_motion_dic::types::Roi::new(0.0, 100.0, 0.0, 60.0),
        [20.0, 20.0],
        [85.0, 85.0],
    )
    .unwrap();
    object_to_json(path, &grid.meta).unwrap();
    let meta: GridMeta = object_from_json(path).unwrap();
    assert_eq!(meta, grid.meta);

    let rebuilt = Grid::from_meta(&meta).unwrap();
    assert_eq!(rebuilt.grid_x, grid.grid_x);
    assert_eq!(rebuilt.grid_y, grid.grid_y);
}
