use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use animation::{load_gif_path, LoopCount};
use coordinator::{Binding, CacheManager, ManagedBinding};
use playconfig::{DisplayEntry, PlaybackConfig};
use scheduler::{main_context, FrameScheduler, IntervalTicker};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::paths::AppPaths;
use crate::surface::CountingSurface;

struct Session {
    path: PathBuf,
    binding: Arc<ManagedBinding>,
    surface: Arc<CountingSurface>,
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let memory_limit = cli.memory_limit.unwrap_or(config.memory_limit);
    let interval = cli.interval.unwrap_or(config.tick_interval);

    let mut displays = config.displays;
    displays.extend(cli.gifs.iter().map(DisplayEntry::new));
    if displays.is_empty() {
        bail!("no GIF files supplied; pass paths or list [[displays]] in the config");
    }

    let manager = CacheManager::new(memory_limit)
        .context("failed to start cache manager")?
        .with_priming(true);
    let mut sessions = Vec::with_capacity(displays.len());
    for entry in &displays {
        let session = open_session(entry, cli.paused)?;
        if !manager.register(session.binding.clone()) {
            tracing::warn!(path = %entry.path.display(), "display already registered");
        }
        sessions.push(session);
    }

    let stats = manager.stats();
    tracing::info!(
        displays = stats.bindings,
        total_bytes = stats.total_size,
        limit_bytes = stats.memory_limit,
        cache_enabled = stats.cache_enabled,
        interval_ms = interval.as_millis() as u64,
        ticks = cli.ticks,
        "starting playback"
    );

    let (main, main_queue) = main_context();
    let scheduler = FrameScheduler::new(&manager, main);
    let mut ticker = IntervalTicker::new(interval).with_limit(cli.ticks);
    let ticks = scheduler.drive(&mut ticker, &main_queue);

    for session in &sessions {
        println!(
            "{}  frames={} index={} shown={} presented={} cached={} finished={}",
            session.path.display(),
            session.binding.animation().frame_count(),
            session.binding.current_index(),
            session.surface.last_index(),
            session.surface.presented(),
            session.binding.has_frame_cache(),
            session.binding.is_finished(),
        );
    }

    let stats = manager.stats();
    println!(
        "ticks={} total_bytes={} limit_bytes={} cache_enabled={}",
        ticks, stats.total_size, stats.memory_limit, stats.cache_enabled
    );

    manager.clear();
    Ok(())
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<PlaybackConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let paths = AppPaths::discover()?;
            let default = paths.config_file();
            if !default.exists() {
                tracing::debug!(
                    dir = %paths.config_dir().display(),
                    "no config file; using defaults"
                );
                return Ok(PlaybackConfig::default());
            }
            default
        }
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = PlaybackConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load config file at {}", path.display()))?;
    tracing::debug!(path = %path.display(), displays = config.displays.len(), "loaded config");
    Ok(config)
}

fn open_session(entry: &DisplayEntry, force_paused: bool) -> Result<Session> {
    let animation = load_gif_path(&entry.path)
        .with_context(|| format!("failed to load {}", entry.path.display()))?;
    let surface = Arc::new(CountingSurface::default());
    let mut binding = ManagedBinding::new(Arc::new(animation), surface.clone())
        .with_context(|| format!("failed to prepare {}", entry.path.display()))?;
    if let Some(raw) = entry.loop_count {
        binding = binding.with_loop_count(LoopCount::from_raw(raw)?);
    }
    binding.set_displaying(entry.displaying);
    if entry.paused || force_paused {
        binding.pause();
    }

    tracing::info!(
        path = %entry.path.display(),
        binding = %binding.id(),
        frames = binding.animation().frame_count(),
        bytes = binding.byte_size(),
        loop_count = %binding.loop_count(),
        "opened display"
    );

    Ok(Session {
        path: entry.path.clone(),
        binding: Arc::new(binding),
        surface,
    })
}
