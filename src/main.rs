use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use joseta_rs::protocol::frame::parse;
use joseta_rs::protocol::CommandEncoder;
use joseta_rs::util::hex::{decode_capture, encode_hex, format_hex_compact, pretty_hex};
use joseta_rs::{
    init_logger, log_error, log_info, log_warn, CallbackKind, CallbackMask, Command, Deframer,
    Driver, DriverConfig, ParsedRecord, SerialLink,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "joseta-cli")]
#[command(about = "CLI tool for the Joseta energy sensor board")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the driver on a serial port and print records until Ctrl-C
    Monitor {
        port: String,
        #[arg(short, long, default_value = "9600")]
        baudrate: u32,
        /// Initial RTC in seconds; defaults to the host clock
        #[arg(long)]
        rtc: Option<u64>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        purge_threshold: Option<usize>,
        #[arg(long)]
        stream_rate: Option<u8>,
        /// Print purge batches instead of single frames
        #[arg(long)]
        batches: bool,
        /// One JSON object per record
        #[arg(long)]
        json: bool,
    },
    /// De-frame a hex capture offline
    Decode {
        /// Hex bytes; `:`, `-` and `,` separators are accepted
        hex: Option<String>,
        /// Read the capture from a file instead
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Epoch added to frame timestamps
        #[arg(long, default_value = "0")]
        epoch: u64,
        #[arg(long)]
        json: bool,
        /// Print a hex dump of the whole capture first
        #[arg(long)]
        dump: bool,
    },
    /// Send a single command to the board
    Command {
        port: String,
        #[arg(short, long, default_value = "9600")]
        baudrate: u32,
        #[command(subcommand)]
        action: CommandAction,
    },
    /// Print the default configuration as JSON
    Config,
}

#[derive(Subcommand, Clone, Copy)]
enum CommandAction {
    Reset,
    Sync {
        #[arg(default_value = "0")]
        offset: u8,
    },
    Enable,
    Disable,
    Rate {
        seconds: u8,
    },
    Request {
        #[arg(default_value = "15")]
        address: u8,
    },
}

impl From<CommandAction> for Command {
    fn from(action: CommandAction) -> Self {
        match action {
            CommandAction::Reset => Command::Reset,
            CommandAction::Sync { offset } => Command::SyncTime(offset),
            CommandAction::Enable => Command::EnableStreaming,
            CommandAction::Disable => Command::DisableStreaming,
            CommandAction::Rate { seconds } => Command::StreamRate(seconds),
            CommandAction::Request { address } => Command::DataRequest(address),
        }
    }
}

#[derive(Serialize)]
struct RecordLine<'a> {
    kind: String,
    #[serde(flatten)]
    record: &'a ParsedRecord,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            port,
            baudrate,
            rtc,
            config,
            purge_threshold,
            stream_rate,
            batches,
            json,
        } => {
            let mut config = match config {
                Some(path) => DriverConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => DriverConfig::default(),
            };
            config.serial.port = port;
            config.serial.baudrate = baudrate;
            if let Some(threshold) = purge_threshold {
                config.purge_threshold = threshold;
            }
            if stream_rate.is_some() {
                config.stream_rate = stream_rate;
            }
            let rtc = rtc
                .unwrap_or_else(|| u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0));

            monitor(config, rtc, batches, json).await?;
        }
        Commands::Decode {
            hex,
            file,
            epoch,
            json,
            dump,
        } => {
            let text = match (hex, file) {
                (Some(hex), None) => hex,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                _ => bail!("give either a hex string or --file"),
            };
            let bytes = decode_capture(&text).context("parsing hex capture")?;
            if dump {
                println!("{}", pretty_hex(&bytes, 16));
            }
            decode(&bytes, epoch, json)?;
        }
        Commands::Command {
            port,
            baudrate,
            action,
        } => {
            let command = Command::from(action);
            let frame = command.encode()?;
            let serial = joseta_rs::SerialConfig {
                port,
                baudrate,
                ..Default::default()
            };
            let (sink, _receiver) = SerialLink::open(&serial)
                .with_context(|| format!("opening {}", serial.port))?
                .split();
            CommandEncoder::new(sink).send(command)?;
            log_info(&format!("sent {command:?}: {}", format_hex_compact(&frame)));
        }
        Commands::Config => {
            println!("{}", DriverConfig::default().to_json_pretty()?);
        }
    }

    Ok(())
}

async fn monitor(config: DriverConfig, rtc: u64, batches: bool, json: bool) -> anyhow::Result<()> {
    let (sink, receiver) = SerialLink::open(&config.serial)
        .with_context(|| format!("opening {}", config.serial.port))?
        .split();

    let driver = Driver::start(config, sink, rtc).context("starting driver")?;
    let handle = driver.handle();

    let mask = if batches {
        CallbackMask::PURGE | CallbackMask::ERROR
    } else {
        CallbackMask::FRAME | CallbackMask::ERROR
    };
    handle.set_callback(mask, move |kind, records| print_records(kind, records, json));

    let reader = receiver.spawn(handle.clone());
    log_info("monitoring, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    reader.stop().await?;
    let snapshot = handle.snapshot();
    driver.shutdown().await;
    log_info(&format!("final state: {}", serde_json::to_string(&snapshot)?));
    let stats = snapshot.stats;
    if stats.bytes_dropped + stats.records_dropped + stats.events_dropped > 0 {
        log_warn(&format!(
            "data lost: {} bytes, {} records, {} events",
            stats.bytes_dropped, stats.records_dropped, stats.events_dropped
        ));
    }
    if stats.commands_failed > 0 {
        log_error(&format!("{} commands failed to send", stats.commands_failed));
    }
    Ok(())
}

fn print_records(kind: CallbackKind, records: &[ParsedRecord], json: bool) {
    for record in records {
        if json {
            let line = RecordLine {
                kind: format!("{kind:?}"),
                record,
            };
            match serde_json::to_string(&line) {
                Ok(text) => println!("{text}"),
                Err(e) => log::error!("cannot serialize record: {e}"),
            }
        } else {
            let when = record
                .datetime()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| record.time.to_string());
            println!(
                "{kind:?} {when} V={} I={} phase={} temp={} occ={} relay={} err={}",
                record.voltage,
                record.current,
                record.phase,
                record.temp,
                record.occupancy,
                record.relay,
                record.error
            );
        }
    }
}

fn decode(bytes: &[u8], epoch: u64, json: bool) -> anyhow::Result<()> {
    let mut deframer = Deframer::new();
    let frames = deframer.feed_all(bytes);

    for (i, frame) in frames.iter().enumerate() {
        let fields = frame.fields();
        let crc = if frame.verify() {
            "ok".to_string()
        } else {
            format!("BAD (calculated {:04X})", frame.computed_crc())
        };
        if json {
            let record = parse(frame, epoch);
            println!(
                "{}",
                serde_json::json!({
                    "index": i,
                    "raw": encode_hex(frame.as_bytes()),
                    "crc_ok": frame.verify(),
                    "record": record,
                })
            );
        } else {
            println!(
                "#{i}: {} | flags={:02X} V={} I={} phase={} temp={} ts={} err={} crc={:04X} {crc}",
                format_hex_compact(frame.as_bytes()),
                fields.flags,
                fields.voltage,
                fields.current,
                fields.phase,
                fields.temperature,
                fields.timestamp,
                fields.error,
                fields.crc,
            );
        }
    }

    log_info(&format!(
        "{} frames, {} resyncs, {} bytes left unframed",
        frames.len(),
        deframer.resyncs(),
        deframer.buffered()
    ));
    let bad = frames.iter().filter(|f| !f.verify()).count();
    if bad > 0 {
        log_warn(&format!("{bad} frames failed the crc check"));
    }
    Ok(())
}
