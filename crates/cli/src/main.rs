use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rtsp::{ClientConfig, RtspError, Session};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(
    name = "rtsp-pull",
    about = "Pull access units from an RTSP server over interleaved TCP"
)]
struct Args {
    /// rtsp://[user[:password]@]host[:port]/path
    url: String,

    /// Stop after this many access units (0 = until the stream ends)
    #[arg(long, short, default_value_t = 0)]
    frames: u64,

    /// Upper bound between keep-alive requests, in seconds
    #[arg(long, default_value_t = 30)]
    keepalive: u64,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter = log_filter(args.verbose, std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rtsp-pull: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` directives on top of a default level picked by `--verbose`.
fn log_filter(verbose: bool, env: Option<&str>) -> EnvFilter {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(env.unwrap_or_default())
}

async fn run(args: &Args) -> rtsp::Result<()> {
    let config = ClientConfig {
        keepalive_interval: Duration::from_secs(args.keepalive),
        ..ClientConfig::default()
    };
    let mut session = Session::connect(&args.url, config).await?;
    session.options().await?;
    for stream in session.describe().await? {
        let codec = stream
            .codec_params()
            .map(|params| params.codec_name().to_string())
            .unwrap_or_else(|| stream.media().codec_name.clone());
        tracing::info!(
            track = stream.track(),
            media = %stream.media().media_type,
            codec = %codec,
            clock_rate = stream.clock_rate(),
            "track"
        );
    }
    session.setup().await?;
    session.play().await?;

    let mut received = 0u64;
    while args.frames == 0 || received < args.frames {
        let unit = tokio::select! {
            unit = session.read_access_unit() => unit,
            _ = tokio::signal::ctrl_c() => break,
        };
        match unit {
            Ok(unit) => {
                received += 1;
                println!(
                    "track={} time={:.3}s size={} key={}",
                    unit.track,
                    unit.time.as_secs_f64(),
                    unit.data.len(),
                    unit.key_frame
                );
            }
            Err(RtspError::CodecParametersChanged { track }) => {
                let params = session.rederive_codec_params(track)?;
                tracing::info!(track, codec = params.codec_name(), "codec parameters changed");
            }
            Err(e @ RtspError::TimestampOutOfOrder { .. }) => tracing::warn!(error = %e, "dropped unit"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::warn!(error = %e, "depacketization error"),
        }
    }

    tracing::info!(received, "stopping");
    session.teardown().await
}
