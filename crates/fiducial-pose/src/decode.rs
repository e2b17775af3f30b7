//! Conversion of incoming image messages into RGB buffers.

use fiducial_pose_core::msgs::{Header, ImageMessage};
use image::RgbImage;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageDecodeError {
    #[error("unsupported image encoding \"{0}\"")]
    UnsupportedEncoding(String),
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("row step {step} is shorter than {min} bytes")]
    StepTooShort { step: u32, min: usize },
    #[error("image buffer holds {got} bytes, expected at least {expected}")]
    BufferTooShort { expected: usize, got: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    Mono,
}

impl Layout {
    fn parse(encoding: &str) -> Option<Self> {
        match encoding {
            "rgb8" => Some(Layout::Rgb),
            "bgr8" => Some(Layout::Bgr),
            "rgba8" => Some(Layout::Rgba),
            "bgra8" => Some(Layout::Bgra),
            "mono8" | "8UC1" => Some(Layout::Mono),
            _ => None,
        }
    }

    fn channels(self) -> usize {
        match self {
            Layout::Mono => 1,
            Layout::Rgb | Layout::Bgr => 3,
            Layout::Rgba | Layout::Bgra => 4,
        }
    }

    fn to_rgb(self, px: &[u8]) -> [u8; 3] {
        match self {
            Layout::Rgb | Layout::Rgba => [px[0], px[1], px[2]],
            Layout::Bgr | Layout::Bgra => [px[2], px[1], px[0]],
            Layout::Mono => [px[0], px[0], px[0]],
        }
    }
}

/// Decode an 8-bit image message into packed RGB, honoring the row step.
pub fn decode_rgb8(msg: &ImageMessage) -> Result<RgbImage, ImageDecodeError> {
    let layout = Layout::parse(&msg.encoding)
        .ok_or_else(|| ImageDecodeError::UnsupportedEncoding(msg.encoding.clone()))?;
    if msg.width == 0 || msg.height == 0 {
        return Err(ImageDecodeError::InvalidDimensions {
            width: msg.width,
            height: msg.height,
        });
    }
    let width = msg.width as usize;
    let height = msg.height as usize;
    let row_bytes = width * layout.channels();
    let step = msg.step as usize;
    if step < row_bytes {
        return Err(ImageDecodeError::StepTooShort {
            step: msg.step,
            min: row_bytes,
        });
    }
    let expected = step * (height - 1) + row_bytes;
    if msg.data.len() < expected {
        return Err(ImageDecodeError::BufferTooShort {
            expected,
            got: msg.data.len(),
        });
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in msg.data.chunks(step).take(height) {
        for px in row[..row_bytes].chunks_exact(layout.channels()) {
            rgb.extend_from_slice(&layout.to_rgb(px));
        }
    }
    RgbImage::from_raw(msg.width, msg.height, rgb).ok_or(ImageDecodeError::InvalidDimensions {
        width: msg.width,
        height: msg.height,
    })
}

/// Wrap an RGB buffer as an `rgb8` message with the given header.
pub fn encode_rgb8(image: &RgbImage, header: Header) -> ImageMessage {
    ImageMessage {
        header,
        height: image.height(),
        width: image.width(),
        encoding: "rgb8".to_string(),
        is_bigendian: false,
        step: image.width() * 3,
        data: image.as_raw().clone(),
    }
}
