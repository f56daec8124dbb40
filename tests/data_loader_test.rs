use face_motion_dic::data_loader::{frame_paths, load_frames};
use image::{GrayImage, Luma};
use tempfile::TempDir;

fn write_frames(dir: &TempDir) {
    for (name, value) in [("1000.png", 10u8), ("1040.png", 20), ("zz.png", 30)] {
        GrayImage::from_pixel(8, 6, Luma([value]))
            .save(dir.path().join(name))
            .unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();
}

#[test]
fn test_frame_paths_are_sorted_images() {
    let dir = TempDir::new().unwrap();
    write_frames(&dir);
    let paths = frame_paths(dir.path().to_str().unwrap()).unwrap();
    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["1000.png", "1040.png", "zz.png"]);
}

#[test]
fn test_load_frames_timestamps_and_sampling() {
    let dir = TempDir::new().unwrap();
    write_frames(&dir);
    let root = dir.path().to_str().unwrap();

    let frames = load_frames(root, 0, 1, 33).unwrap();
    assert_eq!(frames.len(), 3);
    let timestamps: Vec<i64> = frames.iter().map(|f| f.timestamp_ms).collect();
    // numeric names are milliseconds, others fall back to index * interval
    assert_eq!(timestamps, vec![1000, 1040, 66]);
    assert_eq!(frames[1].image.get_pixel(0, 0).0[0], 20);
    assert_eq!(frames[2].image.dimensions(), (8, 6));

    let sampled = load_frames(root, 1, 2, 33).unwrap();
    assert_eq!(sampled.len(), 1);
    assert_eq!(sampled[0].index, 0);
    assert_eq!(sampled[0].timestamp_ms, 1040);
}
