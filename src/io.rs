use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Result;
use crate::landmarks::NormalizedPoint;
use crate::session::{FrameOutcome, FrameSummary};

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &str, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    let mut file = File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Landmark file: either `[[x, y], ...]` or `[{"x": .., "y": ..}, ...]`, normalized.
pub fn load_landmarks(file_path: &str) -> Result<Vec<NormalizedPoint>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Pair([f64; 2]),
        Point(NormalizedPoint),
    }
    let entries: Vec<Entry> = object_from_json(file_path)?;
    Ok(entries
        .into_iter()
        .map(|e| match e {
            Entry::Pair(v) => NormalizedPoint::from(v),
            Entry::Point(p) => p,
        })
        .collect())
}

/// One record of the streaming landmark export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkRecord {
    pub frame_index: usize,
    pub timestamp_ms: i64,
    pub values: Vec<f64>,
    pub points: Vec<[i32; 2]>,
}

/// Appends landmark records to a JSON array as frames arrive.
///
/// The file is a valid JSON document only after [`finish`](Self::finish).
pub struct LandmarksJsonWriter<W: Write> {
    out: W,
    records: usize,
}

impl LandmarksJsonWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        LandmarksJsonWriter::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> LandmarksJsonWriter<W> {
    pub fn new(mut out: W) -> Result<Self> {
        out.write_all(b"[\n")?;
        Ok(LandmarksJsonWriter {
            out,
            records: 0,
        })
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn write_record(&mut self, record: &LandmarkRecord) -> Result<()> {
        if self.records > 0 {
            self.out.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.out, record)?;
        self.records += 1;
        Ok(())
    }

    /// Writes the record of a processed frame; skipped frames leave no record.
    pub fn write_outcome(&mut self, outcome: &FrameOutcome) -> Result<bool> {
        match outcome.frame() {
            Some(frame) => {
                self.write_record(&LandmarkRecord {
                    frame_index: frame.index,
                    timestamp_ms: frame.timestamp_ms,
                    values: frame.landmark_values.clone(),
                    points: frame.landmark_points.clone(),
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes the array and hands back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.out.write_all(b"\n]\n")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionReport<'a> {
    timestamp: String,
    total_frames: usize,
    processed_frames: usize,
    skipped_frames: usize,
    frames: &'a [FrameSummary],
}

/// Writes per-frame statistics of a session as pretty JSON.
pub fn write_session_report(output_path: &str, outcomes: &[FrameOutcome]) -> Result<()> {
    use std::time::SystemTime;

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let frames: Vec<FrameSummary> = outcomes.iter().map(FrameSummary::from).collect();
    let processed_frames = frames.iter().filter(|f| f.processed).count();
    let report = SessionReport {
        timestamp: timestamp.to_string(),
        total_frames: frames.len(),
        processed_frames,
        skipped_frames: frames.len() - processed_frames,
        frames: &frames,
    };
    object_to_json(output_path, &report)
}
