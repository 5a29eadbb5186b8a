use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};
use tempfile::TempDir;

fn write_gif(dir: &Path, name: &str, frame_count: usize) -> PathBuf {
    let path = dir.join(name);
    let file = fs::File::create(&path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite).unwrap();
    let frames = (0..frame_count).map(|i| {
        let buffer = RgbaImage::from_pixel(4, 2, Rgba([(i * 60) as u8, 10, 10, 255]));
        Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(50, 1))
    });
    encoder.encode_frames(frames).unwrap();
    path
}

fn gifdeck(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gifdeck"))
        .env("GIFDECK_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run gifdeck")
}

#[test]
fn plays_gifs_within_budget() {
    let root = TempDir::new().unwrap();
    let spinner = write_gif(root.path(), "spinner.gif", 3);
    let banner = write_gif(root.path(), "banner.gif", 2);

    let output = gifdeck(
        root.path(),
        &[
            "--ticks",
            "3",
            "--interval",
            "5ms",
            spinner.to_str().unwrap(),
            banner.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("spinner.gif  frames=3"), "{stdout}");
    assert!(stdout.contains("banner.gif  frames=2"), "{stdout}");
    assert!(stdout.contains("presented=3 cached=true"), "{stdout}");
    assert!(stdout.contains("ticks=3 total_bytes=160"), "{stdout}");
    assert!(stdout.contains("cache_enabled=true"), "{stdout}");
}

#[test]
fn tight_budget_disables_caching() {
    let root = TempDir::new().unwrap();
    let spinner = write_gif(root.path(), "spinner.gif", 3);

    let output = gifdeck(
        root.path(),
        &[
            "--ticks",
            "2",
            "--interval",
            "5ms",
            "--memory-limit",
            "10B",
            spinner.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("cached=false"), "{stdout}");
    assert!(stdout.contains("limit_bytes=10 cache_enabled=false"), "{stdout}");
}

#[test]
fn reads_displays_from_config_file() {
    let root = TempDir::new().unwrap();
    let spinner = write_gif(root.path(), "spinner.gif", 3);
    let config = root.path().join("deck.toml");
    fs::write(
        &config,
        format!(
            "version = 1\nmemory_limit = \"1MiB\"\ntick_interval = \"5ms\"\n\n[[displays]]\npath = {:?}\npaused = true\n",
            spinner.to_str().unwrap()
        ),
    )
    .unwrap();

    let output = gifdeck(
        root.path(),
        &["--ticks", "4", "--config", config.to_str().unwrap()],
    );

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("index=0 shown=0 presented=4"), "{stdout}");
    assert!(stdout.contains("limit_bytes=1048576"), "{stdout}");
}

#[test]
fn missing_gif_fails() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("missing.gif");

    let output = gifdeck(root.path(), &["--ticks", "1", missing.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("missing.gif"), "{stderr}");
}

#[test]
fn nothing_to_play_fails() {
    let root = TempDir::new().unwrap();

    let output = gifdeck(root.path(), &["--ticks", "1"]);

    assert!(!output.status.success());
}
