//! pad-relay: stream controller frames to a microcontroller console emulator.
//!
//! Live gamepad / playback file / macros -> hex frames over serial, one frame
//! per receiver acknowledgement.

mod combo;
mod convert;
mod error;
mod frame;
mod input;
mod macro_engine;
mod profile;
mod signal;
mod source;
mod stack;
mod transport;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};

use macro_engine::controller::MacroController;
use macro_engine::storage::{self, MacroSet};
use profile::{MappingProfile, TriggerPolicy};
use source::live::{self, GilrsPad};
use source::{FilePlayback, LiveSource};
use stack::InputStack;
use transport::{LinkOutcome, Pacer, TransportLoop};

#[derive(Parser)]
#[command(name = "pad-relay", about = "Gamepad -> serial frame relay for a console emulator")]
struct Args {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Relay frames to the receiver
    Run(RunArgs),
    /// List connected controllers
    List,
    /// Convert an nx-TAS script to a playback file
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        mapping: MappingArgs,
    },
}

#[derive(clap::Args)]
struct MappingArgs {
    /// Wide preset: deadzone 10000, any trigger movement counts as pressed
    #[arg(long)]
    wide: bool,

    /// Override the stick deadzone
    #[arg(long)]
    deadzone: Option<u16>,

    /// Override the trigger policy
    #[arg(long, value_enum)]
    trigger: Option<TriggerMode>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TriggerMode {
    /// Pressed above the deadzone magnitude
    Threshold,
    /// Pressed on any non-zero value
    Nonzero,
}

impl MappingArgs {
    fn profile(&self) -> MappingProfile {
        let mut profile = if self.wide {
            MappingProfile::switch_pro_wide()
        } else {
            MappingProfile::switch_pro()
        };
        if let Some(deadzone) = self.deadzone {
            profile = profile.with_deadzone(deadzone);
        }
        match self.trigger {
            Some(TriggerMode::Threshold) => {
                let threshold = profile.deadzone;
                profile = profile.with_trigger(TriggerPolicy::Threshold(threshold));
            }
            Some(TriggerMode::Nonzero) => profile = profile.with_trigger(TriggerPolicy::Nonzero),
            None => {}
        }
        profile
    }
}

#[derive(clap::Args)]
struct RunArgs {
    /// Controller index or exact name
    #[arg(short, long, default_value = "0")]
    controller: String,

    /// Serial port of the receiver
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,

    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Record every outgoing frame to this file
    #[arg(long)]
    record: Option<PathBuf>,

    /// Play this frame file instead of live input
    #[arg(long)]
    playback: Option<PathBuf>,

    /// Fall through to live input after playback ends
    #[arg(long)]
    keep_live: bool,

    /// No periodic progress output
    #[arg(short, long)]
    quiet: bool,

    /// Macro definition file (JSON)
    #[arg(long)]
    macros: Option<PathBuf>,

    /// Fixed frame rate; free-running when omitted
    #[arg(long)]
    fps: Option<f64>,

    #[command(flatten)]
    mapping: MappingArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match args.command {
        Command::Run(run_args) => run(run_args),
        Command::List => list(),
        Command::Convert {
            input,
            output,
            mapping,
        } => {
            convert::convert_tas(&input, &output, &mapping.profile())
                .with_context(|| format!("converting {}", input.display()))?;
            Ok(())
        }
    }
}

fn list() -> anyhow::Result<()> {
    let pads = live::list_controllers()?;
    if pads.is_empty() {
        println!("No controllers found");
    }
    for (index, name) in pads {
        println!("{index}: {name}");
    }
    Ok(())
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let profile = args.mapping.profile();
    info!("=== pad-relay ===");
    info!(
        "Profile {} (deadzone {}, triggers {:?})",
        profile.name, profile.deadzone, profile.trigger
    );

    // Baseline sources, bottom first. The controller is opened before the
    // serial port so a missing pad fails fast.
    let mut stack = InputStack::new();
    let needs_live = args.playback.is_none() || args.keep_live;
    if needs_live {
        let pad = GilrsPad::open(&args.controller)
            .with_context(|| format!("opening controller {:?}", args.controller))?;
        stack.push(Box::new(LiveSource::new(pad, profile.clone())));
    }
    if let Some(path) = &args.playback {
        stack.push(Box::new(FilePlayback::open(path)));
    }

    let macros = match &args.macros {
        Some(path) => storage::load_macros(path, &profile)
            .with_context(|| format!("loading macros from {}", path.display()))?,
        None => MacroSet::defaults(&profile, Path::new("."))?,
    };
    let mut controller = MacroController::new(stack, macros, profile);

    if let Some(path) = &args.record {
        controller
            .stack_mut()
            .start_recording(path)
            .with_context(|| format!("opening recording {}", path.display()))?;
    }

    let result = relay(&args, &mut controller);

    // sinks are closed on every exit path
    if let Err(e) = controller.close() {
        error!("[REC] Failed to close output files: {e}");
    }
    result
}

fn relay(args: &RunArgs, controller: &mut MacroController) -> anyhow::Result<()> {
    let pacer = match args.fps {
        Some(fps) => Pacer::fixed(fps)?,
        None => Pacer::free_running(),
    };
    if let Some(period) = pacer.period() {
        info!("[LINK] Paced at {:.1} ms/frame", period.as_secs_f64() * 1000.0);
    }

    let port = transport::open_serial(&args.port, args.baud)
        .with_context(|| format!("opening serial port {}", args.port))?;
    signal::install();

    let mut link = TransportLoop::new(port, pacer, signal::flag()).quiet(args.quiet);
    let report = link.run(controller)?;

    match report.outcome {
        LinkOutcome::Done => info!("All input consumed"),
        LinkOutcome::Interrupted => {
            if controller.macro_running() {
                warn!("[MACRO] Interrupted while {:?} was running", controller.stack().top_label());
            }
            info!("Shutting down");
        }
    }
    info!(
        "{} frames sent, {} receiver overrun(s)",
        report.frames_sent, report.overruns
    );
    Ok(())
}
