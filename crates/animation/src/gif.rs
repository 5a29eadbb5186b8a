use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;

use crate::{AnimatedImage, AnimationError, FrameInfo, LoopCount, PackedFrames};

const LOOP_EXTENSION_IDS: [&[u8]; 2] = [b"NETSCAPE2.0", b"ANIMEXTS1.0"];

pub fn load_gif_path(path: &Path) -> Result<AnimatedImage, AnimationError> {
    let bytes = fs::read(path).map_err(|source| AnimationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let animation = load_gif_bytes(&bytes)?;
    tracing::debug!(
        path = %path.display(),
        frames = animation.frame_count(),
        bytes = animation.byte_size(),
        loop_count = %animation.loop_count(),
        "loaded gif"
    );
    Ok(animation)
}

pub fn load_gif_bytes(bytes: &[u8]) -> Result<AnimatedImage, AnimationError> {
    let decoder = GifDecoder::new(Cursor::new(bytes))?;
    let decoded = decoder.into_frames().collect_frames()?;

    let mut infos = Vec::with_capacity(decoded.len());
    let mut images = Vec::with_capacity(decoded.len());
    for frame in decoded {
        let (numer, denom) = frame.delay().numer_denom_ms();
        let delay = Duration::from_secs_f64(f64::from(numer) / f64::from(denom.max(1)) / 1000.0);
        let buffer = frame.into_buffer();
        infos.push(FrameInfo::new(buffer.width(), buffer.height(), delay));
        images.push(buffer);
    }

    AnimatedImage::new(
        infos,
        Arc::new(PackedFrames::new(images)),
        netscape_loop_count(bytes),
    )
}

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_SEPARATOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;
const APPLICATION_LABEL: u8 = 0xFF;
const SCREEN_DESCRIPTOR_END: usize = 13;

/// Reads the loop budget from the GIF application extension.
///
/// Walks the block structure from the header, so look-alike bytes inside
/// comments or image data are never mistaken for the extension. An encoded
/// count of `0` means loop forever; a missing extension means the animation
/// plays once.
pub fn netscape_loop_count(bytes: &[u8]) -> LoopCount {
    find_loop_extension(bytes).unwrap_or(LoopCount::Finite(0))
}

fn find_loop_extension(bytes: &[u8]) -> Option<LoopCount> {
    if !bytes.starts_with(b"GIF") {
        return None;
    }
    let screen_flags = *bytes.get(10)?;
    let mut pos = SCREEN_DESCRIPTOR_END + color_table_len(screen_flags);

    loop {
        match *bytes.get(pos)? {
            EXTENSION_INTRODUCER => {
                let label = *bytes.get(pos + 1)?;
                pos += 2;
                if label == APPLICATION_LABEL {
                    if let Some(count) = application_loop_count(bytes, pos) {
                        return Some(count);
                    }
                }
                pos = skip_sub_blocks(bytes, pos)?;
            }
            IMAGE_SEPARATOR => {
                let image_flags = *bytes.get(pos + 9)?;
                // descriptor, local colour table, LZW minimum code size
                pos += 10 + color_table_len(image_flags) + 1;
                pos = skip_sub_blocks(bytes, pos)?;
            }
            TRAILER => return None,
            other => {
                tracing::debug!(offset = pos, block = other, "unexpected gif block; ignoring loop count");
                return None;
            }
        }
    }
}

fn color_table_len(flags: u8) -> usize {
    if flags & 0x80 == 0 {
        0
    } else {
        3 << ((flags & 0x07) + 1)
    }
}

fn skip_sub_blocks(bytes: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = usize::from(*bytes.get(pos)?);
        pos += 1;
        if len == 0 {
            return Some(pos);
        }
        pos += len;
    }
}

fn application_loop_count(bytes: &[u8], pos: usize) -> Option<LoopCount> {
    let header = bytes.get(pos..pos + 12)?;
    if header[0] != 11 || !LOOP_EXTENSION_IDS.iter().any(|id| *id == &header[1..]) {
        return None;
    }
    match bytes.get(pos + 12..pos + 16)? {
        [0x03, 0x01, lo, hi] => Some(match u16::from_le_bytes([*lo, *hi]) {
            0 => LoopCount::Infinite,
            n => LoopCount::Finite(u32::from(n)),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::{GifEncoder, Repeat};
    use image::{Delay, Frame, Rgba, RgbaImage};

    fn encode_gif(frame_count: usize, repeat: Repeat) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            encoder.set_repeat(repeat).unwrap();
            let frames = (0..frame_count).map(|i| {
                let buffer = RgbaImage::from_pixel(4, 2, Rgba([(i * 60) as u8, 0, 0, 255]));
                Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(50, 1))
            });
            encoder.encode_frames(frames).unwrap();
        }
        out
    }

    #[test]
    fn decodes_frames_and_delays() {
        let bytes = encode_gif(3, Repeat::Infinite);
        let animation = load_gif_bytes(&bytes).unwrap();
        assert_eq!(animation.frame_count(), 3);
        assert_eq!(animation.loop_count(), LoopCount::Infinite);
        assert_eq!(animation.frame_duration(1), Duration::from_millis(50));
        assert_eq!(animation.byte_size(), 3 * 4 * 2 * 4);
        assert_eq!(animation.decode_frame(2).unwrap().dimensions(), (4, 2));
    }

    /// Minimal 1x1 GIF: header, screen descriptor with a two-entry global
    /// colour table, `blocks`, one image and the trailer.
    fn gif_with_blocks(blocks: &[&[u8]]) -> Vec<u8> {
        let mut bytes = b"GIF89a\x01\x00\x01\x00\x80\x00\x00".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        for block in blocks {
            bytes.extend_from_slice(block);
        }
        bytes.extend_from_slice(b"\x2c\x00\x00\x00\x00\x01\x00\x01\x00\x00");
        bytes.extend_from_slice(b"\x02\x02\x4c\x01\x00");
        bytes.push(0x3b);
        bytes
    }

    #[test]
    fn reads_finite_loop_extension() {
        let extension: &[u8] = b"\x21\xff\x0bNETSCAPE2.0\x03\x01\x07\x00\x00";
        let bytes = gif_with_blocks(&[extension]);
        assert_eq!(netscape_loop_count(&bytes), LoopCount::Finite(7));
    }

    #[test]
    fn zero_loop_extension_means_infinite() {
        let extension: &[u8] = b"\x21\xff\x0bANIMEXTS1.0\x03\x01\x00\x00\x00";
        let bytes = gif_with_blocks(&[extension]);
        assert_eq!(netscape_loop_count(&bytes), LoopCount::Infinite);
    }

    #[test]
    fn missing_extension_plays_once() {
        assert_eq!(netscape_loop_count(&gif_with_blocks(&[])), LoopCount::Finite(0));
        assert_eq!(netscape_loop_count(b"GIF89a\x00\x00"), LoopCount::Finite(0));
    }

    #[test]
    fn loop_marker_inside_comment_is_ignored() {
        let comment: &[u8] = b"\x21\xfe\x0fNETSCAPE2.0\x03\x01\x00\x00\x00";
        assert_eq!(netscape_loop_count(&gif_with_blocks(&[comment])), LoopCount::Finite(0));

        let real: &[u8] = b"\x21\xff\x0bNETSCAPE2.0\x03\x01\x02\x00\x00";
        assert_eq!(
            netscape_loop_count(&gif_with_blocks(&[comment, real])),
            LoopCount::Finite(2)
        );
    }

    #[test]
    fn reads_loop_count_written_by_encoder() {
        let bytes = encode_gif(2, Repeat::Finite(3));
        assert_eq!(netscape_loop_count(&bytes), LoopCount::Finite(3));
        assert_eq!(load_gif_bytes(&bytes).unwrap().loop_count(), LoopCount::Finite(3));
    }

    #[test]
    fn corrupt_data_is_rejected() {
        assert!(matches!(
            load_gif_bytes(b"not a gif"),
            Err(AnimationError::Decode(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_gif_path(Path::new("/definitely/not/here.gif")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.gif"));
    }
}
