/// IMU Relay - streams full-body snapshots to the controller
///
/// Stop with Ctrl-C or by typing `stop` on stdin; both finish the current
/// cycle and release the sensor network and sockets before exiting.
use std::process::ExitCode;

use clap::Parser;
use tokio::io::BufReader;

use imu_relay_core::{
    config::StreamConfig, logging, stop, FrameCodec, Result, RunSummary, Session, SessionOptions,
    SimulatedFacade, SnapshotAssembler, StopSignal, StreamError, UdpTransport,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/relay.toml")]
    config: String,

    /// Do not listen for stop commands on stdin
    #[arg(long)]
    no_stdin: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match StreamConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            log::error!("Failed to load {}: {}", args.config, e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.logging.level);
    log::info!("Using config: {}", args.config);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(relay(config, !args.no_stdin));
    // The stdin reader may still be parked on a blocking read
    runtime.shutdown_background();

    match result {
        Ok(summary) => {
            log::info!("Relay finished: {:?}", summary.exit);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Relay failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn relay(config: StreamConfig, listen_stdin: bool) -> Result<RunSummary> {
    let layout = config.frame_layout();
    let codec = FrameCodec::new(layout);
    log::info!(
        "Frame layout: {} trackers, orientation={}, counters={} -> {} bytes",
        layout.trackers,
        layout.orientation,
        layout.counters,
        layout.frame_len()
    );

    let transport = UdpTransport::bind(
        config.send_bind()?,
        config.destination()?,
        config.loopback_bind()?,
        codec,
    )?;
    let assembler = SnapshotAssembler::new(config.registry(), config.orientation);
    let facade = SimulatedFacade::from_config(&config);

    let stop_signal = StopSignal::new();
    let interrupt = tokio::spawn(stop::watch_interrupt(stop_signal.clone()));
    let commands = listen_stdin.then(|| {
        log::info!("Type 'stop' and press Enter to end streaming");
        tokio::spawn(stop::watch_commands(
            BufReader::new(tokio::io::stdin()),
            stop_signal.clone(),
        ))
    });

    let session = Session::new(
        facade,
        transport,
        assembler,
        codec,
        stop_signal,
        SessionOptions {
            retry: config.connect,
            ..Default::default()
        },
    );

    let outcome = tokio::task::spawn_blocking(move || session.run())
        .await
        .map_err(|e| StreamError::Runtime(format!("pump task failed: {}", e)));

    interrupt.abort();
    if let Some(commands) = commands {
        commands.abort();
    }

    outcome?
}
