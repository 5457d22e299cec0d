//! cabinwatchd - cabin watch daemon
//!
//! This daemon:
//! 1. Loads and validates the static configuration
//! 2. Waits for the lock gate, when one is configured
//! 3. Pulls frames from the configured source
//! 4. Runs the detector on each frame
//! 5. Raises the one-shot alert when the target label is seen
//! 6. Releases the camera and GPIO handles on every exit path

use anyhow::{anyhow, Result};
use clap::Parser;

use cabinwatch::detect::backends::select_backend;
use cabinwatch::{
    AlertDispatcher, Detector, DetectionController, Fault, FrameSource, LabelTable, LockGate,
    Recorder, TelegramNotifier, WatchConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "CABINWATCH_CONFIG")]
    config: Option<String>,
    /// Override the configured frame source (usb0, a file, a folder).
    #[arg(long)]
    source: Option<String>,
    /// Override the configured inference backend (scripted|tract).
    #[arg(long)]
    backend: Option<String>,
    /// Run without the lock gate even if the config enables it.
    #[arg(long, default_value_t = false)]
    no_gate: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("CABINWATCH_CONFIG", path);
    }

    let mut cfg = WatchConfig::load()?;
    if let Some(source) = args.source {
        cfg.source = source;
    }
    if let Some(backend) = args.backend {
        cfg.backend = backend;
    }
    if args.no_gate {
        cfg.gate.enabled = false;
    }

    log::info!(
        "cabinwatchd starting: source={} backend={} target={} min_confidence={}",
        cfg.source,
        cfg.backend,
        cfg.target_label,
        cfg.min_confidence
    );

    let labels = match &cfg.labels_path {
        Some(path) => LabelTable::from_file(path)?,
        None => LabelTable::single(&cfg.target_label),
    };
    if !labels.contains(&cfg.target_label) {
        return Err(Fault::Configuration(format!(
            "target label '{}' is not in the label table",
            cfg.target_label
        ))
        .into());
    }

    let mut backend = select_backend(&cfg)?;
    backend.warm_up()?;
    let detector = Detector::new(backend, labels);

    let notifier = TelegramNotifier::new(
        &cfg.alert.endpoint,
        &cfg.alert.bot_token,
        &cfg.alert.chat_id,
    )?;
    let dispatcher = AlertDispatcher::new(
        cfg.alert.policy,
        &cfg.target_label,
        &cfg.alert.message,
        Box::new(notifier),
    );

    let spec = cfg.source_spec()?;
    let source = FrameSource::open(&spec, cfg.resolution)?;

    let mut controller =
        DetectionController::new(source, detector, dispatcher, cfg.min_confidence);

    if cfg.gate.enabled {
        let gpio = open_gpio(&cfg)?;
        controller = controller.with_gate(LockGate::new(gpio, &cfg.gate));
    }
    if cfg.record {
        controller = controller.with_recorder(Recorder::create(&cfg.record_dir)?);
    }

    let quit = controller.quit_flag();
    ctrlc::set_handler(move || {
        quit.store(true, std::sync::atomic::Ordering::Relaxed);
    })
    .map_err(|e| anyhow!("failed to install signal handler: {}", e))?;

    let summary = controller.run()?;
    println!(
        "processed {} frames, avg fps {:.2}, alert {:?}",
        summary.frames_processed, summary.average_fps, summary.alert_state
    );
    Ok(())
}

fn open_gpio(cfg: &WatchConfig) -> Result<Box<dyn cabinwatch::GpioController>> {
    #[cfg(feature = "gate-rppal")]
    {
        let gpio = cabinwatch::gate::RppalGpio::new(&cfg.gate)?;
        return Ok(Box::new(gpio));
    }
    #[cfg(not(feature = "gate-rppal"))]
    {
        let _ = cfg;
        Err(Fault::Configuration(
            "the lock gate requires the gate-rppal feature".to_string(),
        )
        .into())
    }
}
