//! scowld - live expression watch daemon
//!
//! This daemon:
//! 1. Opens the configured frame source (synthetic or image directory)
//! 2. Runs one face pipeline call per frame
//! 3. Tracks how long each face holds the watched expression
//! 4. Rings the alarm when a face exceeds the duration limit
//! 5. Redraws the overlay every cycle
//!
//! Controls on stdin: Enter or `p` toggles pause, `q` quits. Ctrl-C quits.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use scowl_watch::{
    Alarm, AudioSink, CameraSource, Canvas, CaptureLoop, ControlEvent, DisplayList,
    EntityTracker, FacePipeline, FramePacer, OverlayRenderer, OverlayStyle, PipelineRegistry,
    ScriptedPipeline, SilentSink, StubPipeline, TerminalBell, WatchConfig,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Watch a camera feed for faces that hold an expression too long"
)]
struct Args {
    /// Frame source: stub://name, dir:///path or a directory of images.
    #[arg(long)]
    source: Option<String>,

    /// Face pipeline to use (stub, scripted).
    #[arg(long)]
    pipeline: Option<String>,

    /// Detection script (JSON Lines) for the scripted pipeline.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Save the latest overlay as an image (requires the render-image feature).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Font used for overlay labels in saved images.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Do not ring the terminal bell on alerts.
    #[arg(long)]
    no_bell: bool,

    /// List the available pipelines and exit.
    #[arg(long)]
    list_pipelines: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = WatchConfig::load()?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(pipeline) = args.pipeline {
        cfg.detection.pipeline = pipeline;
    }
    if let Some(script) = args.script {
        cfg.detection.script_path = Some(script);
    }
    if let Some(output) = args.output {
        cfg.render.output_path = Some(output);
    }
    if let Some(font) = args.font {
        cfg.render.font_path = Some(font);
    }
    if args.no_bell {
        cfg.audio.bell = false;
    }

    let mut registry = build_registry(&cfg)?;
    if args.list_pipelines {
        for name in registry.list() {
            println!("{}", name);
        }
        return Ok(());
    }
    cfg.validate()?;
    let pipeline = registry.take(&cfg.detection.pipeline)?;

    log::info!("scowld starting. source={}", cfg.source.url);
    log::info!(
        "watching expression={} threshold={} duration_ms={} cooldown_ms={}",
        cfg.alert.policy.expression,
        cfg.alert.policy.score_threshold,
        cfg.alert.policy.duration_limit_ms,
        cfg.alert.policy.cooldown_ms
    );

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(ControlEvent::Shutdown);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    spawn_stdin_controls(tx);

    match cfg.render.output_path.clone() {
        #[cfg(feature = "render-image")]
        Some(path) => {
            let mut canvas = scowl_watch::render::ImageCanvas::new().with_output(path);
            if let Some(font) = &cfg.render.font_path {
                canvas = canvas.with_font_file(font)?;
            }
            run(&cfg, pipeline, canvas, &rx)
        }
        #[cfg(not(feature = "render-image"))]
        Some(path) => {
            log::warn!(
                "render-image feature disabled; not writing overlays to {}",
                path.display()
            );
            run(&cfg, pipeline, DisplayList::new(), &rx)
        }
        None => run(&cfg, pipeline, DisplayList::new(), &rx),
    }
}

fn build_registry(cfg: &WatchConfig) -> Result<PipelineRegistry> {
    let mut registry = PipelineRegistry::new();
    registry.register(StubPipeline::new());
    if let Some(path) = &cfg.detection.script_path {
        let scripted = ScriptedPipeline::from_path(path)?.looping(true);
        registry.register(scripted);
    }
    Ok(registry)
}

fn run<K: Canvas>(
    cfg: &WatchConfig,
    pipeline: Box<dyn FacePipeline>,
    surface: K,
    control: &mpsc::Receiver<ControlEvent>,
) -> Result<()> {
    let tracker = EntityTracker::new(cfg.alert.policy.clone())
        .with_stale_ttl(cfg.alert.stale_entry_ttl_ms);
    let sink: Box<dyn AudioSink> = if cfg.audio.bell {
        Box::new(TerminalBell)
    } else {
        Box::new(SilentSink)
    };
    let alarm = Alarm::new(sink, cfg.audio.clip_ms);
    let renderer = OverlayRenderer::new(OverlayStyle::for_policy(&cfg.alert.policy));

    let mut capture = CaptureLoop::new(pipeline, tracker, renderer, alarm)
        .with_options(cfg.detection.options)
        .with_pacer(FramePacer::new(cfg.render.refresh_hz));

    let source = CameraSource::new(cfg.source.clone())?;
    capture
        .start(source, surface)
        .with_context(|| format!("failed to start capture from {}", cfg.source.url))?;
    log::info!("scowld running. Enter/p toggles pause, q quits");

    capture.run(control)?;

    let stats = capture.stats();
    log::info!(
        "scowld stopped. rendered={} failed={} alerts={} alarms={}",
        stats.cycles_rendered,
        stats.cycles_failed,
        stats.alerts_fired,
        capture.alarm().plays()
    );
    Ok(())
}

fn spawn_stdin_controls(tx: Sender<ControlEvent>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let event = match line.trim() {
                "" | "p" => ControlEvent::Toggle,
                "q" => ControlEvent::Shutdown,
                other => {
                    log::warn!("unknown command {:?} (Enter/p toggles pause, q quits)", other);
                    continue;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });
}
