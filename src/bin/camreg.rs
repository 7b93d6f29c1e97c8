use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use camvisor::camera::{
    CameraConfig, CameraKind, CameraPatch, DetectPatch, PrivacyPatch, RecordingMode,
    RecordingPatch,
};
use camvisor::{CameraRegistry, CamvisorConfig, JsonRegistry};

/// Inspect and edit the camera registry.
#[derive(Parser, Debug)]
#[command(name = "camreg")]
#[command(about = "Manage the camvisor camera registry")]
struct Args {
    /// Registry file (defaults to registry.path from the configuration)
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Path to camvisor configuration file
    #[arg(short = 'c', long, default_value = "camvisor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List cameras
    List {
        /// Include disabled cameras
        #[arg(short, long)]
        all: bool,
    },
    /// Print one camera as JSON
    Show { id: String },
    /// Add a camera
    Add {
        /// Camera id (generated as cam_N when omitted)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: String,
        /// usb or rtsp
        #[arg(long, value_parser = parse_kind)]
        kind: CameraKind,
        /// Device index for USB, rtsp:// URL for RTSP
        #[arg(long)]
        source: String,
        #[arg(long, default_value_t = 20)]
        fps_limit: u32,
        /// Add the camera disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Change fields of a camera
    Set {
        id: String,
        #[command(flatten)]
        patch: PatchArgs,
    },
    Enable { id: String },
    Disable { id: String },
    /// Delete a camera
    Remove { id: String },
}

#[derive(ClapArgs, Debug, Default)]
struct PatchArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long, value_parser = parse_kind)]
    kind: Option<CameraKind>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    fps_limit: Option<u32>,
    #[arg(long)]
    yolo_every_n: Option<u32>,
    #[arg(long)]
    pose_every_n: Option<u32>,
    #[arg(long)]
    emotion_every_n: Option<u32>,
    #[arg(long)]
    min_face_px: Option<u32>,
    #[arg(long)]
    blur_faces: Option<bool>,
    /// off, events-only, continuous or manual
    #[arg(long, value_parser = parse_recording_mode)]
    recording_mode: Option<RecordingMode>,
    #[arg(long)]
    retention_days: Option<u32>,
}

impl PatchArgs {
    fn into_patch(self) -> CameraPatch {
        let detect = DetectPatch {
            yolo_every_n: self.yolo_every_n,
            pose_every_n: self.pose_every_n,
            emotion_every_n: self.emotion_every_n,
            min_face_px: self.min_face_px,
        };
        let privacy = PrivacyPatch {
            blur_faces: self.blur_faces,
            blur_zones: None,
        };
        let recording = RecordingPatch {
            mode: self.recording_mode,
            retention_days: self.retention_days,
        };

        CameraPatch {
            name: self.name,
            kind: self.kind,
            source: self.source,
            fps_limit: self.fps_limit,
            detect: (detect != DetectPatch::default()).then_some(detect),
            privacy: (privacy != PrivacyPatch::default()).then_some(privacy),
            recording: (recording != RecordingPatch::default()).then_some(recording),
            ..CameraPatch::default()
        }
    }
}

fn parse_kind(value: &str) -> Result<CameraKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "usb" => Ok(CameraKind::Usb),
        "rtsp" => Ok(CameraKind::Rtsp),
        other => Err(format!("unknown camera type '{}', expected usb or rtsp", other)),
    }
}

fn parse_recording_mode(value: &str) -> Result<RecordingMode, String> {
    match value.to_ascii_lowercase().replace('_', "-").as_str() {
        "off" => Ok(RecordingMode::Off),
        "events-only" => Ok(RecordingMode::EventsOnly),
        "continuous" => Ok(RecordingMode::Continuous),
        "manual" => Ok(RecordingMode::Manual),
        other => Err(format!("unknown recording mode '{}'", other)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("camvisor=warn")),
        )
        .init();

    let args = Args::parse();

    let path = match args.registry {
        Some(path) => path,
        None => {
            CamvisorConfig::load_from_file(&args.config)
                .with_context(|| format!("Failed to load {}", args.config.display()))?
                .registry
                .path
        }
    };
    let registry = JsonRegistry::open(&path)
        .with_context(|| format!("Failed to open camera registry {}", path.display()))?;

    match args.command {
        Command::List { all } => {
            for camera in registry.list(all) {
                print_row(&camera);
            }
        }
        Command::Show { id } => {
            let camera = registry
                .get(&id)
                .with_context(|| format!("No camera with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&camera)?);
        }
        Command::Add {
            id,
            name,
            kind,
            source,
            fps_limit,
            disabled,
        } => {
            let id = id.unwrap_or_else(|| registry.generate_id());
            let camera = match kind {
                CameraKind::Usb => {
                    let index: u32 = source
                        .trim()
                        .parse()
                        .with_context(|| format!("USB source must be a device index: {}", source))?;
                    CameraConfig::usb(&id, &name, index)
                }
                CameraKind::Rtsp => CameraConfig::rtsp(&id, &name, &source),
            }
            .with_fps_limit(fps_limit)
            .with_enabled(!disabled);

            let camera = registry.add(camera)?;
            println!("✓ Added camera");
            print_row(&camera);
        }
        Command::Set { id, patch } => {
            let patch = patch.into_patch();
            if patch.is_empty() {
                bail!("Nothing to change; pass at least one field flag");
            }
            let camera = registry.update(&id, &patch)?;
            println!("✓ Updated camera");
            print_row(&camera);
        }
        Command::Enable { id } => {
            print_row(&registry.enable(&id)?);
        }
        Command::Disable { id } => {
            print_row(&registry.disable(&id)?);
        }
        Command::Remove { id } => {
            if !registry.delete(&id)? {
                bail!("No camera with id {}", id);
            }
            println!("✓ Removed camera {}", id);
        }
    }

    Ok(())
}

fn print_row(camera: &CameraConfig) {
    println!(
        "{} {:<12} {:<4} {:>2} fps  {}  {}",
        if camera.enabled { "+" } else { "-" },
        camera.id,
        camera.kind,
        camera.fps_limit,
        camera.name,
        camera.source
    );
}
