//! Headless pipeline runner
//!
//! Loads a pipeline document, runs it for a number of frames with an advancing
//! frame state and optionally exports the document's final image.
//!
//! # Usage
//! ```bash
//! run-pipeline pathtracer.json --shader-root shaders --frames 64 --export png
//! run-pipeline pathtracer.json --dry-run --strict
//! ```
//!
//! `--dry-run` checks the document and every shader include without a GPU and
//! prints the binding table of each pass.

use clap::{Parser, ValueEnum};
use compute_pipeline::backend::{GpuBackend, RecordingBackend, WgpuBackend};
use compute_pipeline::{Camera, ExportFormat, FrameState, PassStatus, PipelineConfig, PipelineManager, ReferenceCheck};
use std::path::PathBuf;

#[derive(Clone, Copy, ValueEnum)]
enum ExportArg {
    Raw,
    Png,
}

impl From<ExportArg> for ExportFormat {
    fn from(value: ExportArg) -> Self {
        match value {
            ExportArg::Raw => ExportFormat::Raw,
            ExportArg::Png => ExportFormat::Png,
        }
    }
}

#[derive(Parser)]
#[command(version, about = "Run a declarative compute pipeline headlessly")]
struct Args {
    /// Pipeline document, relative to the shader root
    document: PathBuf,

    /// Directory holding pipeline documents, shaders and includes
    #[arg(long, default_value = "shaders")]
    shader_root: PathBuf,

    /// Directory holding texture source files
    #[arg(long, default_value = "resources")]
    resource_root: PathBuf,

    /// Directory receiving exported images
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,

    /// Number of frames to run
    #[arg(long, short, default_value_t = 1)]
    frames: u32,

    /// Accumulate across frames instead of restarting every frame
    #[arg(long, short)]
    accumulate: bool,

    /// Export the final image after the last frame
    #[arg(long, short)]
    export: Option<ExportArg>,

    /// Fail when a pass references a missing or mismatched texture
    #[arg(long)]
    strict: bool,

    /// Validate without a GPU and print binding tables
    #[arg(long)]
    dry_run: bool,

    /// Maximum log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt().with_max_level(args.log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = PipelineConfig::default()
        .with_shader_root(&args.shader_root)
        .with_resource_root(&args.resource_root)
        .with_export_dir(&args.export_dir)
        .with_reference_check(if args.strict { ReferenceCheck::Strict } else { ReferenceCheck::Lenient });

    if args.dry_run {
        return dry_run(&args, config);
    }

    let backend = WgpuBackend::new()?;
    run(&args, PipelineManager::new(backend, config))
}

/// Loads the document and runs the requested frames on any backend
fn run<B: GpuBackend>(args: &Args, mut manager: PipelineManager<B>) -> Result<(), Box<dyn std::error::Error>> {
    manager.load(&args.document)?;

    let camera = Camera::default();
    let mut frame = FrameState::new(camera);
    let started = std::time::Instant::now();
    let mut issues = 0;
    for _ in 0..args.frames {
        frame.advance(camera, started.elapsed().as_secs_f32(), args.accumulate);
        let report = manager.run_frame(&frame);
        issues += report.diagnostics.len();
        tracing::debug!(frame = report.frame_index, dispatched = report.dispatched, skipped = report.skipped.len(), "frame done");
    }
    println!(
        "Ran {} frame(s) of {} pass(es) in {:.2?} ({} binding or dispatch issue(s))",
        args.frames,
        manager.passes().count(),
        started.elapsed(),
        issues
    );

    if let Some(format) = args.export {
        let path = manager.export_final_image(format.into())?;
        println!("Final image written to {}", path.display());
    }

    manager.destroy();
    Ok(())
}

/// Loads the document against the recording backend and prints what would run
fn dry_run(args: &Args, config: PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = PipelineManager::new(RecordingBackend::new(), config);
    manager.load(&args.document)?;

    for texture in manager.registry().iter() {
        let descriptor = texture.descriptor();
        println!("texture {:<24} {} {:<14} {}", descriptor.name, descriptor.dimension(), descriptor.extent.to_string(), descriptor.internal_format);
    }

    let mut failed = 0;
    for pass in manager.passes() {
        let status = match pass.status() {
            PassStatus::Ready => "ready".to_string(),
            PassStatus::Failed(log) => {
                failed += 1;
                format!("FAILED\n{log}")
            }
        };
        println!("pass {} dispatch {} {status}", pass.name(), pass.descriptor().dispatch);
        for slot in pass.bindings().slots() {
            println!("    {slot}");
        }
    }

    let report = manager.run_frame(&FrameState::default());
    for diagnostic in &report.diagnostics {
        println!("warning: {diagnostic}");
    }
    if failed > 0 {
        return Err(format!("{failed} pass(es) failed to compile").into());
    }
    Ok(())
}
