// sonicast: encode files into audio transmissions and play them to acoustic receivers.

mod config;
mod player;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sonicast_core::frame::inspect;
use sonicast_core::{
    CompressedEncoder, FrameBody, PlaybackState, Session, Transmitter, WaveformSegment,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::player::{ExternalPlayer, LameProcess};

#[derive(Parser)]
#[command(name = "sonicast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: ~/.config/sonicast/config.toml, then /etc/sonicast/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output sample rate in Hz
    #[arg(long, global = true)]
    sample_rate: Option<u32>,

    /// Protocol version (1 or 2)
    #[arg(long, global = true)]
    protocol: Option<u8>,

    /// Low bit rate mode (pilot tone, slower tones)
    #[arg(long, global = true)]
    lbr: bool,

    /// Number of times to play the transmission
    #[arg(long, global = true)]
    repeat: Option<u32>,

    /// Container format (wav or mp3)
    #[arg(long, global = true)]
    format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file into an audio container
    Encode {
        /// Payload file
        input: PathBuf,

        /// Output file (default: input name with the container extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the frames and segments a payload is sent as
    Inspect {
        /// Payload file
        input: PathBuf,
    },

    /// Play a file through the configured player, repeating as configured
    Play {
        /// Payload file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref());
    if let Some(r) = cli.sample_rate {
        cfg.sample_rate = r;
    }
    if let Some(v) = cli.protocol {
        cfg.version = v;
    }
    if cli.lbr {
        cfg.low_bit_rate = true;
    }
    if let Some(n) = cli.repeat {
        cfg.repeat = n;
    }
    if let Some(f) = cli.format.clone() {
        cfg.format = f;
    }

    let session = session_from(&cfg)?;
    let encoder = cfg.mp3_encoder.clone();
    let tx = Transmitter::new(session).with_mp3_encoder(Box::new(
        move || -> Box<dyn CompressedEncoder> { Box::new(LameProcess::new(encoder.clone())) },
    ));

    match cli.command {
        Commands::Encode { input, output } => encode(&tx, &input, output),
        Commands::Inspect { input } => inspect_payload(&tx, &input),
        Commands::Play { input } => {
            let payload = read_payload(&input)?;
            let player = ExternalPlayer::new(cfg.player.clone(), cfg.player_args.clone())
                .context("creating player scratch directory")?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(play(&tx, payload, player))
        }
    }
}

fn session_from(cfg: &Config) -> Result<Session> {
    let session = sonicast_core::configure(
        cfg.sample_rate,
        cfg.version,
        cfg.low_bit_rate,
        cfg.repeat,
        &cfg.format,
    )?
    .to_builder()
    .timing(cfg.timing)
    .build()?;
    Ok(session)
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn encode(tx: &Transmitter, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let payload = read_payload(input)?;
    let format = tx.session().output_format();
    let output = output.unwrap_or_else(|| input.with_extension(format.extension()));
    let (bytes, mime) = tx.encode_to_container(&payload)?;
    std::fs::write(&output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    info!(
        path = %output.display(),
        mime,
        payload = payload.len(),
        bytes = bytes.len(),
        "wrote transmission"
    );
    Ok(())
}

fn inspect_payload(tx: &Transmitter, input: &Path) -> Result<()> {
    let payload = read_payload(input)?;
    let plan = tx.plan(&payload)?;
    let rate = plan.sample_rate() as f64;
    let mut offset = 0usize;
    for segment in plan.segments() {
        let at = offset as f64 / rate;
        match segment {
            WaveformSegment::Silence(n) => println!("{:9.3}s  silence   {:>8} samples", at, n),
            WaveformSegment::PilotTone(n) => println!("{:9.3}s  pilot     {:>8} samples", at, n),
            WaveformSegment::ModulatedFrame(f) => {
                let (frame, _) = inspect(&f.bytes)?;
                let what = match frame.body {
                    FrameBody::Control(c) => format!(
                        "control {} len={} hash={:08x} digest={}",
                        frame.version,
                        c.length,
                        c.content_hash,
                        c.content_digest.iter().map(|b| format!("{:02x}", b)).collect::<String>()
                    ),
                    FrameBody::Data(d) => {
                        format!("data    {} block={}", frame.version, d.block_index)
                    }
                };
                println!(
                    "{:9.3}s  {} footer={:08x} ({} bytes, {} samples)",
                    at,
                    what,
                    frame.footer,
                    f.bytes.len(),
                    f.samples.len()
                );
            }
        }
        offset += segment.len();
    }
    println!(
        "total: {} samples, {:.3}s at {} Hz",
        plan.total_samples(),
        plan.total_samples() as f64 / rate,
        plan.sample_rate()
    );
    Ok(())
}

async fn play(tx: &Transmitter, payload: Vec<u8>, mut player: ExternalPlayer) -> Result<()> {
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let mut playback = tx.play(
        &payload,
        &mut player,
        Box::new(move || {
            let _ = done_tx.send(());
        }),
    )?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    while playback.state() == PlaybackState::Playing {
        tokio::select! {
            status = player.wait_finished() => {
                let status = status.context("waiting for player")?;
                if !status.success() {
                    warn!(%status, "player exited with failure");
                }
                playback.on_playback_finished(&mut player)?;
            }
            res = &mut shutdown => {
                res?;
                playback.cancel(&mut player);
                bail!(
                    "interrupted after {} of {} plays",
                    playback.play_count(),
                    playback.repeat_count()
                );
            }
        }
    }
    if done_rx.await.is_ok() {
        info!(plays = playback.play_count(), "transmission complete");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
