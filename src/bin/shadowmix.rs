use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use shadowmix::{
    AssetProvider as _, BackendKind, BlendStyle, BuiltinAssets, CompositeOutcome, GpuBackend,
    MixConfig, MixManager, PipelineEvent, SubjectKind, SyntheticHands,
    create_backend,
};

#[derive(Parser, Debug)]
#[command(name = "shadowmix", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a headless mix session and write the final output image as a PNG.
    Mix(MixArgs),
    /// Print the natural size and timing of a video source.
    Probe(ProbeArgs),
    /// Print the default configuration as JSON, or validate a configuration file.
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
struct MixArgs {
    /// Registered video name or a video file path (files require `media-ffmpeg`).
    #[arg(long, default_value = shadowmix::assets::provider::SYNTHETIC_VIDEO)]
    video: String,

    /// Tracked subject.
    #[arg(long, default_value = "hand")]
    kind: SubjectKind,

    /// Blend style; overrides the configuration file.
    #[arg(long)]
    style: Option<BlendStyle>,

    /// Number of video frames to step through.
    #[arg(long, default_value_t = 30)]
    frames: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Also write the unprocessed video frame to this PNG path.
    #[arg(long)]
    raw_out: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Cpu)]
    backend: BackendChoice,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Registered video name or a video file path.
    #[arg(long, default_value = shadowmix::assets::provider::SYNTHETIC_VIDEO)]
    video: String,
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Validate this file instead of printing the defaults.
    #[arg(long)]
    check: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Cpu,
    #[cfg(feature = "gpu")]
    Gpu,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Mix(args) => cmd_mix(args),
        Command::Probe(args) => cmd_probe(args),
        Command::Config(args) => cmd_config(args),
    }
}

fn make_backend(choice: BackendChoice, config: &MixConfig) -> anyhow::Result<Arc<dyn GpuBackend>> {
    let kind = match choice {
        BackendChoice::Cpu => BackendKind::Cpu,
        #[cfg(feature = "gpu")]
        BackendChoice::Gpu => BackendKind::Gpu,
    };
    Ok(create_backend(kind, &config.cpu)?)
}

fn cmd_mix(args: MixArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => MixConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => MixConfig::default(),
    };
    if let Some(style) = args.style {
        config.blend_style = style;
    }
    // The CLI drives frames itself, so render on every pose update.
    config.render_every_n_updates = 1;

    let backend = make_backend(args.backend, &config)?;
    let assets = Arc::new(BuiltinAssets::new());
    let mut hands = SyntheticHands::new(
        assets.hand_skeleton(shadowmix::Chirality::Left)?,
        assets.hand_skeleton(shadowmix::Chirality::Right)?,
        config.skeletons.hand.clone(),
        30.0,
    );

    let mut mix = MixManager::new(backend, assets, config);
    pollster::block_on(mix.setup(&args.video, args.kind))
        .with_context(|| format!("set up mix for '{}'", args.video))?;
    mix.load_model()?;
    let (_id, events) = mix.events().subscribe_channel();

    for _ in 0..args.frames {
        if !mix.step_video()? {
            mix.seek(0)?;
        }
        for ev in hands.next_events() {
            pollster::block_on(mix.update_pose(&ev))?;
        }
    }

    // One final pass once the pipeline is quiet, so the PNG reflects the last inputs.
    let compositor = mix.compositor()?;
    loop {
        while compositor.is_in_flight() {
            std::thread::yield_now();
        }
        while events.try_recv().is_ok() {}
        match mix.populate_if_idle()? {
            Some(CompositeOutcome::Submitted) => break wait_composite(&events)?,
            Some(CompositeOutcome::Dropped) => continue,
            _ => break,
        }
    }

    let display = mix.output_display()?;
    write_png(&args.out, display.size(), &display.read_rgba8()?)?;
    eprintln!("wrote {}", args.out.display());

    if let Some(raw_out) = &args.raw_out {
        let raw = mix.video_display()?;
        write_png(raw_out, raw.size(), &raw.read_rgba8()?)?;
        eprintln!("wrote {}", raw_out.display());
    }

    mix.clean();
    Ok(())
}

fn wait_composite(events: &crossbeam_channel::Receiver<PipelineEvent>) -> anyhow::Result<()> {
    loop {
        let ev = events
            .recv_timeout(Duration::from_secs(10))
            .context("timed out waiting for the final composite")?;
        if matches!(ev, PipelineEvent::CompositeCompleted { .. }) {
            return Ok(());
        }
    }
}

fn write_png(path: &std::path::Path, size: shadowmix::Size2, rgba: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        rgba,
        size.width,
        size.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let assets = BuiltinAssets::new();
    let source = assets.video(&args.video)?;
    let size = source.natural_size()?;
    println!(
        "{}: {}x{} @ {:.3} fps, {} frames",
        source.name(),
        size.width,
        size.height,
        source.fps(),
        source.frame_count()
    );
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    match args.check {
        Some(path) => {
            MixConfig::from_path(&path)
                .with_context(|| format!("validate config '{}'", path.display()))?;
            eprintln!("{} is valid", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&MixConfig::default())?),
    }
    Ok(())
}
