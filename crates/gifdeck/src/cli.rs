use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "gifdeck",
    author,
    version,
    about = "Play animated GIFs headlessly under a shared frame-cache budget"
)]
pub struct Cli {
    /// GIF files to play, in addition to any `[[displays]]` in the config.
    #[arg(value_name = "GIF")]
    pub gifs: Vec<PathBuf>,

    /// Playback config (TOML). Defaults to `config.toml` in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Decoded-frame cache budget (e.g. `64MiB`; a bare number is megabytes).
    #[arg(long, value_name = "SIZE", value_parser = parse_memory_limit)]
    pub memory_limit: Option<u64>,

    /// Tick cadence (e.g. `16ms`).
    #[arg(long, value_name = "DURATION", value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Number of ticks to run before exiting.
    #[arg(long, value_name = "N", default_value_t = 120)]
    pub ticks: u64,

    /// Register every display paused.
    #[arg(long)]
    pub paused: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_memory_limit(value: &str) -> Result<u64, String> {
    let bytes = playconfig::parse_byte_size(value)?;
    if bytes == 0 {
        return Err("memory limit must be greater than zero".into());
    }
    Ok(bytes)
}

pub fn parse_interval(value: &str) -> Result<Duration, String> {
    let interval = playconfig::parse_duration(value)?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".into());
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memory_limit_units() {
        assert_eq!(parse_memory_limit("2MiB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_memory_limit("3").unwrap(), 3 * 1024 * 1024);
        assert!(parse_memory_limit("0").is_err());
        assert!(parse_memory_limit("lots").is_err());
    }

    #[test]
    fn parses_interval() {
        assert_eq!(parse_interval("16ms").unwrap(), Duration::from_millis(16));
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("soon").is_err());
    }

    #[test]
    fn accepts_positional_gifs_and_flags() {
        let cli = Cli::try_parse_from([
            "gifdeck",
            "--ticks",
            "5",
            "--memory-limit",
            "1MiB",
            "a.gif",
            "b.gif",
        ])
        .unwrap();
        assert_eq!(cli.ticks, 5);
        assert_eq!(cli.memory_limit, Some(1024 * 1024));
        assert_eq!(cli.gifs, vec![PathBuf::from("a.gif"), PathBuf::from("b.gif")]);
        assert!(!cli.paused);
    }
}
