/// IMU Receiver - controller-side receiver that decodes relay frames and logs them
///
/// Uses the same configuration file as the relay so both ends agree on the
/// tracker count and optional blocks.
use std::net::UdpSocket;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use imu_relay_core::{
    config::StreamConfig, logging, receiver::Receiver, stop, Channel, DecodedFrame, FrameCodec,
    Result, StopSignal, StreamError,
};

/// Poll interval for noticing Ctrl-C while waiting for frames
const READ_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/relay.toml")]
    config: String,

    /// Address to listen on (defaults to the relay's destination)
    #[arg(short, long)]
    bind: Option<String>,
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

    let stop_signal = StopSignal::new();
    runtime.spawn(stop::watch_interrupt(stop_signal.clone()));

    let result = receive_loop(&config, args.bind.as_deref(), &stop_signal);
    runtime.shutdown_background();

    match result {
        Ok(frames) => {
            log::info!("Receiver finished after {} frames", frames);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Receiver failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn receive_loop(config: &StreamConfig, bind: Option<&str>, stop_signal: &StopSignal) -> Result<u64> {
    let codec = FrameCodec::new(config.frame_layout());
    let bind_addr = match bind {
        Some(addr) => addr
            .parse()
            .map_err(|e| StreamError::Config(format!("bind {:?}: {}", addr, e)))?,
        None => config.destination()?,
    };

    let socket = UdpSocket::bind(bind_addr)
        .map_err(|e| StreamError::Transport(format!("failed to bind {}: {}", bind_addr, e)))?;
    socket
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|e| StreamError::Transport(e.to_string()))?;
    log::info!("Listening on {} for {} byte frames", bind_addr, codec.frame_len());

    let names: Vec<&str> = config.devices.iter().map(|d| d.name.as_str()).collect();
    let mut frames = 0u64;

    while !stop_signal.is_requested() {
        let Some((bytes, sender)) = Receiver::try_receive_frame(&socket, codec.frame_len())? else {
            continue;
        };
        let frame = codec.decode(&bytes)?;
        frames += 1;
        log_frame(&frame, &names, sender);
    }
    Ok(frames)
}

fn log_frame(frame: &DecodedFrame, names: &[&str], sender: std::net::SocketAddr) {
    if let Some(counter) = &frame.counter {
        log::info!("Received from {}: counters {:?}", sender, counter.to_vec());
    }
    for (row, name) in names.iter().enumerate() {
        let acc = frame.acceleration.row(row);
        if acc.iter().all(|v| v.is_nan()) {
            log::debug!("  {:<12} missing", name);
        } else {
            log::debug!(
                "  {:<12} {} [{:.3}, {:.3}, {:.3}]",
                name,
                Channel::Acceleration.name(),
                acc[0],
                acc[1],
                acc[2]
            );
        }
    }
}
