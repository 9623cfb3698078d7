use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tractscope_common::Tractogram;
use tractscope_io::{SyntheticSpec, region, synthetic, trk};
use tractscope_player::{Player, PlayerConfig, sink_for};
use tractscope_render::SoftwareScene;

#[derive(Parser)]
#[command(name = "tractscope", about = "Animate tractograms through a sliding window of streamline batches")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Summarize a TrackVis tractogram
    Inspect {
        /// Path to a .trk file
        tractogram: PathBuf,
    },
    /// Write the synthetic sample bundles to a .trk file
    Synth {
        /// Destination .trk file
        output: PathBuf,
        /// Streamlines per bundle
        #[arg(long, default_value = "200")]
        per_bundle: usize,
        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Play a tractogram batch by batch
    Play(PlayArgs),
}

#[derive(Args, Debug, Default)]
struct PlayArgs {
    /// Tractogram to play (.trk); synthetic bundles when omitted
    #[arg(long)]
    tractogram: Option<PathBuf>,
    /// Static translucent tractogram that also seeds the camera
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Binary segmentation masks (.nii / .nii.gz) shown as surfaces
    #[arg(long, num_args = 1..)]
    regions: Vec<PathBuf>,
    /// Capture frames and encode them here (.gif, or a directory for PNGs)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also write each displayed frame to this PNG
    #[arg(long)]
    preview: Option<PathBuf>,
    /// JSON player configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of streamlines visible at once
    #[arg(long)]
    window_size: Option<usize>,
    /// Streamlines added per frame
    #[arg(long)]
    batch_size: Option<usize>,
    /// Render resolution
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    plot_size: Option<Vec<u32>>,
    /// Camera smoothing weight while the window fills
    #[arg(long)]
    initial_weight: Option<f32>,
    /// Camera smoothing weight once the window is full
    #[arg(long)]
    steady_weight: Option<f32>,
    /// Fit all actors into view after every frame
    #[arg(long)]
    reset_camera: bool,
    /// Keep the camera where the reference (or default) put it
    #[arg(long)]
    freeze_camera: bool,
    /// Frame rate of the captured animation
    #[arg(long)]
    fps: Option<u32>,
    /// Camera distance from the focal point
    #[arg(long)]
    distance_factor: Option<f32>,
    /// Delay before each displayed frame, in milliseconds
    #[arg(long)]
    pacing_ms: Option<u64>,
    /// Seed for the synthetic bundles
    #[arg(long, default_value = "42")]
    seed: u64,
}

impl PlayArgs {
    /// Start from the config file (or defaults) and apply flag overrides.
    fn player_config(&self) -> anyhow::Result<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => PlayerConfig::default(),
        };

        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some([w, h]) = self.plot_size.as_deref() {
            config.plot_size = [*w, *h];
        }
        if let Some(v) = self.initial_weight {
            config.initial_weight = v;
        }
        if let Some(v) = self.steady_weight {
            config.steady_weight = v;
        }
        if let Some(v) = self.fps {
            config.fps = v;
        }
        if let Some(v) = self.distance_factor {
            config.distance_factor = v;
        }
        if let Some(v) = self.pacing_ms {
            config.pacing_ms = v;
        }
        if self.reset_camera {
            config.reset_camera = true;
        }
        if self.freeze_camera {
            config.update_camera = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tractscope v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", tractscope_common::crate_info());
            println!("window: {}", tractscope_window::crate_info());
            println!("camera: {}", tractscope_camera::crate_info());
            println!("render: {}", tractscope_render::crate_info());
            println!("io: {}", tractscope_io::crate_info());
            println!("export: {}", tractscope_export::crate_info());
            println!("player: {}", tractscope_player::crate_info());
        }
        Commands::Inspect { tractogram } => inspect(&tractogram)?,
        Commands::Synth {
            output,
            per_bundle,
            seed,
        } => {
            let spec = SyntheticSpec {
                streamlines_per_bundle: per_bundle,
                seed,
                ..SyntheticSpec::default()
            };
            let tractogram = synthetic::bundles(&spec);
            trk::write(&output, &tractogram)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Wrote {} streamlines to {}", tractogram.len(), output.display());
        }
        Commands::Play(args) => play(&args)?,
    }

    Ok(())
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let header = trk::read_header(path).with_context(|| format!("failed to read {}", path.display()))?;
    let tractogram = trk::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let defaults = PlayerConfig::default();

    println!("File: {}", path.display());
    println!("TrackVis version: {}", header.version);
    println!("Dimensions: {:?}", header.dim);
    println!("Voxel size: {:?}", header.voxel_size.to_array());
    println!(
        "Voxel order: {}",
        String::from_utf8_lossy(&header.voxel_order)
    );
    println!("Scalars per point: {}", header.n_scalars);
    println!("Properties per streamline: {}", header.n_properties);
    println!("Streamlines: {}", tractogram.len());
    println!("Points: {}", tractogram.point_count());
    if let Some((lo, hi)) = tractogram.bounds() {
        println!("Bounds (RAS mm): {:?} .. {:?}", lo.to_array(), hi.to_array());
    }
    println!(
        "Batches of {}: {}",
        defaults.batch_size,
        tractscope_window::batch_count(tractogram.len(), defaults.batch_size)
    );
    Ok(())
}

fn load_tractogram(path: Option<&Path>, seed: u64) -> anyhow::Result<Tractogram> {
    match path {
        Some(path) => trk::read(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            info!(seed, "no tractogram given, using synthetic bundles");
            Ok(synthetic::bundles(&SyntheticSpec {
                seed,
                ..SyntheticSpec::default()
            }))
        }
    }
}

fn play(args: &PlayArgs) -> anyhow::Result<()> {
    let config = args.player_config()?;
    let tractogram = load_tractogram(args.tractogram.as_deref(), args.seed)?;
    let streamlines = tractogram.to_voxel_space();

    let [width, height] = config.plot_size;
    let mut scene = SoftwareScene::new(width, height);
    if let Some(preview) = &args.preview {
        scene = scene.with_preview(preview);
    }

    let mut player = Player::new(config.clone())?;

    let masks = args
        .regions
        .iter()
        .map(|path| region::read(path).with_context(|| format!("failed to read region {}", path.display())))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if let Some(affine) = player.load_regions(&mut scene, &masks)? {
        if !affine.abs_diff_eq(tractogram.affine, 1e-4) {
            warn!("region affine differs from the tractogram affine, overlays may be misaligned");
        }
    }

    if let Some(path) = &args.reference {
        let reference = trk::read(path).with_context(|| format!("failed to read reference {}", path.display()))?;
        player.seed_from_reference(&mut scene, &reference.to_voxel_space())?;
    }

    let sink = sink_for(&config, args.output.clone());
    let summary = player.run(&mut scene, sink, &streamlines)?;

    println!(
        "Frames: {}, admitted: {}, evicted: {}, degenerate camera skips: {}",
        summary.frames, summary.batches_admitted, summary.batches_evicted, summary.degenerate_skips
    );
    println!(
        "Step time: mean {:?}, max {:?}",
        summary.mean_step, summary.max_step
    );
    if let Some(report) = summary.artifact {
        println!(
            "Wrote {} frames ({}x{}, {:?}) to {}",
            report.frames,
            report.width,
            report.height,
            report.format,
            report.path.display()
        );
    }
    Ok(())
}
