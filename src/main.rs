use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tidewatch::catalog::SeriesCatalog;
use tidewatch::config::Config;
use tidewatch::models::{ContentRef, VideoSource};
use tidewatch::playback::{PlaybackController, PlaybackEvent, PlaybackHandle, PlaybackState};
use tidewatch::player::SimulatedClock;
use tidewatch::services::{
    AniSkipProvider, BackendVideoSource, FilePreferenceStore, SkipTimingResolver,
    VideoSourceResolver,
};
use tidewatch::utils::AppError;

const USAGE: &str = "usage: tidewatch [episode|movie:<id>|special:<id>] [duration-seconds] [rate]";
const DEFAULT_DURATION_SECS: u64 = 1420;

struct Args {
    content: ContentRef,
    duration: Duration,
    rate: f64,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let content = match args.next() {
        Some(arg) => arg.parse().context(USAGE)?,
        None => ContentRef::Episode(1),
    };
    let duration = match args.next() {
        Some(arg) => Duration::from_secs(arg.parse().context(USAGE)?),
        None => Duration::from_secs(DEFAULT_DURATION_SECS),
    };
    let rate = match args.next() {
        Some(arg) => arg.parse().context(USAGE)?,
        None => 1.0,
    };
    Ok(Args {
        content,
        duration,
        rate,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tidewatch=debug")),
        )
        .init();

    let args = parse_args()?;
    info!("Starting tidewatch");

    let config = Config::load()?;
    let preferences = Arc::new(FilePreferenceStore::open_default()?);
    let fallback = config
        .playback
        .fallback_intro()
        .context("fallback_intro_start must be before fallback_intro_end")?;
    let provider = Arc::new(AniSkipProvider::from_config(&config.network)?);
    let resolver = Arc::new(SkipTimingResolver::new(provider, fallback));
    let catalog = Arc::new(SeriesCatalog::from_config(&config.catalog));
    let videos = BackendVideoSource::from_config(&config.network)?;

    if !catalog.contains(&args.content) {
        warn!("{} is not in the catalog", args.content);
    }

    let (handle, controller) =
        PlaybackController::new(&config, preferences, resolver, catalog);
    tokio::spawn(controller.run());

    let mut events = handle.subscribe();
    let mut current = args.content;
    loop {
        let ticker = match resolve_source(&videos, current).await {
            Ok(source) => Some(start_session(&handle, current, source, &args).await?),
            Err(e) => {
                let clock = Arc::new(SimulatedClock::new());
                handle.open_failed(current, clock, e).await?;
                None
            }
        };

        let next = tokio::select! {
            next = follow(&handle, &mut events) => next,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                None
            }
        };
        if let Some(ticker) = ticker {
            ticker.abort();
        }

        match next {
            Some(next) => current = next,
            None => break,
        }
    }

    handle.close().await?;
    info!("Bye");
    Ok(())
}

/// Unreachable backends and unknown content fail the session; any other
/// resolver problem plays without a video source
async fn resolve_source(
    videos: &BackendVideoSource,
    content: ContentRef,
) -> Result<Option<VideoSource>, AppError> {
    match videos.resolve(&content).await {
        Ok(source) => Ok(Some(source)),
        Err(e @ AppError::NetworkUnavailable(_)) => Err(e),
        Err(e) if e.is_terminal() => Err(e),
        Err(e) => {
            warn!("Playing {} without a video source: {}", content, e);
            Ok(None)
        }
    }
}

async fn start_session(
    handle: &PlaybackHandle,
    content: ContentRef,
    source: Option<VideoSource>,
    args: &Args,
) -> Result<JoinHandle<()>> {
    let clock = Arc::new(SimulatedClock::new());
    let session = handle.open(content, clock.clone(), source).await?;
    info!("Session {} playing {}", session, content);

    clock.load_metadata(args.duration);
    Ok(clock.spawn_realtime(args.rate))
}

/// Log notifications until the session navigates somewhere or is over
async fn follow(
    handle: &PlaybackHandle,
    events: &mut broadcast::Receiver<PlaybackEvent>,
) -> Option<ContentRef> {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Missed {} notifications", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        };
        match &event {
            PlaybackEvent::Error(message) => error!("{}", message),
            other => info!("{:?}", other),
        }

        match event {
            PlaybackEvent::Navigate(next) => return Some(next),
            PlaybackEvent::Error(_) | PlaybackEvent::PromptDismissed => return None,
            PlaybackEvent::Ended => {
                let snapshot = handle.snapshot().await.ok().flatten();
                if snapshot.is_some_and(|s| s.state == PlaybackState::Ended) {
                    info!("Nothing plays next");
                    return None;
                }
            }
            _ => {}
        }
    }
}
