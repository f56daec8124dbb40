use clap::{Parser, Subcommand};
use face_motion_dic::config::PipelineConfig;
use face_motion_dic::data_loader::load_frames;
use face_motion_dic::io::{LandmarksJsonWriter, load_landmarks, object_to_json, write_session_report};
use face_motion_dic::landmarks::{RoiKind, select_query_points};
use face_motion_dic::mask::FaceMask;
use face_motion_dic::session::{FrameInput, FrameOutcome, HeatmapSession};
use face_motion_dic::synthetic::{GaussianBump, SyntheticMotion, speckle_image};
use face_motion_dic::types::Point2D;
use face_motion_dic::visualization::log_heatmap_frame;
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;

#[derive(Parser)]
#[command(version, about, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute motion heatmaps for a folder of frames
    Run {
        /// Folder with frames, processed in file name order
        frames: String,

        /// Pipeline configuration JSON
        #[arg(short, long)]
        config: Option<String>,

        /// Face mask image, black pixels are background
        #[arg(short, long)]
        mask: Option<String>,

        /// Normalized face-mesh landmarks JSON
        #[arg(short, long)]
        landmarks: Option<String>,

        /// Landmark region to report, overrides the config
        #[arg(long, value_enum)]
        roi_kind: Option<RoiKind>,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: String,

        /// Save a rerun recording to this file
        #[arg(long)]
        rerun: Option<String>,

        /// Stimulus timestamps in ms, used by the stimulus baseline policy
        #[arg(long, value_delimiter = ',')]
        events: Vec<i64>,

        #[arg(long, default_value = "0")]
        start_idx: usize,

        #[arg(long, default_value = "1")]
        step: usize,

        /// Frame spacing for files whose name is not a timestamp
        #[arg(long, default_value = "33")]
        frame_interval_ms: i64,
    },
    /// Generate a synthetic speckle sequence with known motion
    Synth {
        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Number of frames to generate
        #[arg(short, long, default_value = "10")]
        frames: usize,

        /// Image width
        #[arg(long, default_value = "320")]
        width: u32,

        /// Image height
        #[arg(long, default_value = "240")]
        height: u32,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
    /// Write the default configuration
    Config {
        #[arg(short, long)]
        output: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            frames,
            config,
            mask,
            landmarks,
            roi_kind,
            output,
            rerun,
            events,
            start_idx,
            step,
            frame_interval_ms,
        } => {
            let mut config = match config {
                Some(path) => PipelineConfig::load(&path)?,
                None => PipelineConfig::default(),
            };
            if let Some(kind) = roi_kind {
                config.roi_kind = kind;
            }
            run(
                &frames,
                &config,
                mask.as_deref(),
                landmarks.as_deref(),
                &output,
                rerun.as_deref(),
                &events,
                (start_idx, step, frame_interval_ms),
            )?;
        }
        Commands::Synth {
            output,
            frames,
            width,
            height,
            seed,
        } => {
            synth(&output, frames, width, height, seed)?;
        }
        Commands::Config { output } => {
            PipelineConfig::default().save(&output)?;
            println!("default configuration written to {}", output);
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run(
    frames_dir: &str,
    config: &PipelineConfig,
    mask_path: Option<&str>,
    landmarks_path: Option<&str>,
    output_dir: &str,
    rerun_path: Option<&str>,
    events: &[i64],
    (start_idx, step, frame_interval_ms): (usize, usize, i64),
) -> Result<(), Box<dyn std::error::Error>> {
    let now = Instant::now();
    let loaded = load_frames(frames_dir, start_idx, step, frame_interval_ms)?;
    if loaded.is_empty() {
        return Err(format!("no frames found in {}", frames_dir).into());
    }
    let (width, height) = loaded[0].image.dimensions();
    log::info!(
        "loaded {} frames of {}x{} in {:.3} sec",
        loaded.len(),
        width,
        height,
        now.elapsed().as_secs_f64()
    );

    let landmarks = landmarks_path.map(load_landmarks).transpose()?;
    let mask = match (mask_path, &landmarks) {
        (Some(path), _) => Some(FaceMask::from_image(&image::open(path)?)),
        (None, Some(lm)) => match FaceMask::from_landmarks(lm, width, height) {
            Ok(mask) => Some(mask),
            Err(e) => {
                log::warn!("no face mask: {}", e);
                None
            }
        },
        (None, None) => None,
    };
    let query_pixels = landmarks
        .as_deref()
        .map(|lm| select_query_points(lm, config.roi_kind, width, height))
        .unwrap_or_default();

    let inputs: Vec<FrameInput> = loaded
        .iter()
        .map(|f| {
            let input = FrameInput::new(f.index, f.timestamp_ms, f.image.clone())
                .with_query_pixels(query_pixels.clone());
            match &mask {
                Some(m) => input.with_mask(m.clone()),
                None => input,
            }
        })
        .collect();

    let mut session = HeatmapSession::new(config.create_tracker(), config)?;
    let now = Instant::now();
    let outcomes: Vec<FrameOutcome> = if events.is_empty() {
        session.process_sequence(&inputs)?
    } else {
        let mut pending = events.to_vec();
        pending.sort();
        let mut pending = pending.into_iter().peekable();
        let mut outcomes = Vec::with_capacity(inputs.len());
        for input in &inputs {
            while let Some(t) = pending.next_if(|&t| t <= input.timestamp_ms) {
                session.notify_event(t);
            }
            outcomes.push(session.process_frame(input)?);
        }
        outcomes
    };
    let duration_sec = now.elapsed().as_secs_f64();
    println!("processing took {:.6} sec", duration_sec);
    println!("avg: {} sec", duration_sec / inputs.len() as f64);

    std::fs::create_dir_all(output_dir)?;
    let recording = match rerun_path {
        Some(path) => Some(rerun::RecordingStreamBuilder::new("dicmap").save(path)?),
        None => None,
    };
    let mut writer = LandmarksJsonWriter::create(Path::new(output_dir).join("landmarks.json"))?;
    for (outcome, frame) in outcomes.iter().zip(&loaded) {
        writer.write_outcome(outcome)?;
        let Some(heat) = outcome.frame() else {
            continue;
        };
        let renderer = session.renderer();
        let frame_img = DynamicImage::ImageLuma8(frame.image.clone());
        let overlay = renderer.overlay(
            &frame_img,
            &renderer.render_resized(&heat.grid, width, height),
        );
        overlay.save(Path::new(output_dir).join(format!("heatmap_{:06}.png", heat.index)))?;
        if let Some(recording) = &recording {
            log_heatmap_frame(recording, "/face", &frame_img, heat, &overlay)?;
        }
    }
    writer.finish()?;

    if let Some(meta) = session.grid_meta() {
        object_to_json(
            &Path::new(output_dir).join("grid_meta.json").to_string_lossy(),
            meta,
        )?;
    }
    write_session_report(
        &Path::new(output_dir).join("report.json").to_string_lossy(),
        &outcomes,
    )?;
    let processed = outcomes.iter().filter(|o| o.is_processed()).count();
    println!(
        "{} of {} frames processed, results in {}",
        processed,
        outcomes.len(),
        output_dir
    );
    Ok(())
}

fn synth(
    output_dir: &str,
    num_frames: usize,
    width: u32,
    height: u32,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(output_dir)?;
    let base = speckle_image(width, height, seed);
    let center = Point2D::new(width as f64 / 2.0, height as f64 / 2.0);
    let sigma = width.min(height) as f64 / 8.0;

    let motions: Vec<SyntheticMotion> = (0..num_frames)
        .map(|k| {
            let k = k as f64;
            SyntheticMotion::rigid(0.002 * k, center, Point2D::new(0.3 * k, 0.1 * k)).with_bump(
                GaussianBump {
                    center: center + Point2D::new(0.0, height as f64 / 6.0),
                    amplitude: Point2D::new(0.0, 0.25 * k),
                    sigma,
                },
            )
        })
        .collect();

    for (k, motion) in motions.iter().enumerate() {
        let path = Path::new(output_dir).join(format!("frame_{:06}.png", k));
        motion.warp(&base).save(&path)?;
        log::debug!("wrote {}", path.display());
    }
    object_to_json(
        &Path::new(output_dir).join("motion.json").to_string_lossy(),
        &motions,
    )?;
    println!("{} synthetic frames written to {}", num_frames, output_dir);
    Ok(())
}
