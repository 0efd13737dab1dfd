//! Planar float images and TIFF frame I/O.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{TiffEncoder, colortype};

use crate::common::Buffer2;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("{path}: No such file.")]
    NotFound { path: PathBuf },

    #[error("Failed to access image file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TIFF codec error in {path}: {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("{path}: Unsupported color type {color_type}")]
    UnsupportedColorType { path: PathBuf, color_type: String },

    #[error("{path}: Unsupported sample format {format}")]
    UnsupportedSampleFormat { path: PathBuf, format: String },

    #[error("Cannot write an image with {0} channels (expected 1 or 3)")]
    UnsupportedChannelCount(usize),
}

/// Multi-channel image stored as one `f32` plane per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarImage {
    width: usize,
    height: usize,
    channels: Vec<Buffer2<f32>>,
}

impl PlanarImage {
    pub fn new(width: usize, height: usize, num_channels: usize) -> Self {
        Self {
            width,
            height,
            channels: (0..num_channels)
                .map(|_| Buffer2::new_default(width, height))
                .collect(),
        }
    }

    pub fn from_channels(channels: Vec<Buffer2<f32>>) -> Self {
        assert!(!channels.is_empty(), "An image needs at least one channel");
        let width = channels[0].width();
        let height = channels[0].height();
        assert!(
            channels
                .iter()
                .all(|c| c.width() == width && c.height() == height),
            "All channels must have the same dimensions"
        );
        Self {
            width,
            height,
            channels,
        }
    }

    /// Splits interleaved samples into planes.
    pub fn from_interleaved(width: usize, height: usize, num_channels: usize, samples: &[f32]) -> Self {
        assert_eq!(samples.len(), width * height * num_channels);
        let channels = (0..num_channels)
            .map(|c| {
                let plane = samples
                    .iter()
                    .skip(c)
                    .step_by(num_channels)
                    .copied()
                    .collect();
                Buffer2::new(width, height, plane)
            })
            .collect();
        Self {
            width,
            height,
            channels,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channel(&self, c: usize) -> &Buffer2<f32> {
        &self.channels[c]
    }

    #[inline]
    pub fn channel_mut(&mut self, c: usize) -> &mut Buffer2<f32> {
        &mut self.channels[c]
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize, c: usize) -> f32 {
        self.channels[c][(x, y)]
    }

    pub fn subtract(&mut self, value: f32) {
        for plane in &mut self.channels {
            plane.pixels_mut().iter_mut().for_each(|v| *v -= value);
        }
    }

    pub fn into_channels(self) -> Vec<Buffer2<f32>> {
        self.channels
    }
}

/// Source of frame pixel data, one call per input file.
pub trait FrameLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<PlanarImage, ImageError>;
}

/// Reads TIFF frames. Unsigned integer samples are scaled to [0,1].
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffFrameLoader;

impl FrameLoader for TiffFrameLoader {
    fn load(&self, path: &Path) -> Result<PlanarImage, ImageError> {
        load_tiff(path)
    }
}

pub fn load_tiff(path: &Path) -> Result<PlanarImage, ImageError> {
    let tiff_err = |source| ImageError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    if !path.exists() {
        return Err(ImageError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = Decoder::new(file)
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    let color_type = decoder.colortype().map_err(tiff_err)?;
    let num_channels = match color_type {
        tiff::ColorType::Gray(_) => 1,
        tiff::ColorType::GrayA(_) => 2,
        tiff::ColorType::RGB(_) => 3,
        tiff::ColorType::RGBA(_) => 4,
        other => {
            return Err(ImageError::UnsupportedColorType {
                path: path.to_path_buf(),
                color_type: format!("{other:?}"),
            });
        }
    };
    let (w, h) = decoder.dimensions().map_err(tiff_err)?;

    let samples: Vec<f32> = match decoder.read_image().map_err(tiff_err)? {
        DecodingResult::U8(buf) => scale_unsigned(&buf, u8::MAX as f32),
        DecodingResult::U16(buf) => scale_unsigned(&buf, u16::MAX as f32),
        DecodingResult::U32(buf) => buf
            .iter()
            .map(|&v| (v as f64 / u32::MAX as f64) as f32)
            .collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.iter().map(|&v| v as f32).collect(),
        other => {
            return Err(ImageError::UnsupportedSampleFormat {
                path: path.to_path_buf(),
                format: sample_format_name(&other).to_string(),
            });
        }
    };

    Ok(PlanarImage::from_interleaved(
        w as usize,
        h as usize,
        num_channels,
        &samples,
    ))
}

fn scale_unsigned<T: Copy + Into<f32>>(buf: &[T], max: f32) -> Vec<f32> {
    buf.iter().map(|&v| v.into() / max).collect()
}

fn sample_format_name(result: &DecodingResult) -> &'static str {
    match result {
        DecodingResult::U8(_) => "u8",
        DecodingResult::U16(_) => "u16",
        DecodingResult::U32(_) => "u32",
        DecodingResult::U64(_) => "u64",
        DecodingResult::F32(_) => "f32",
        DecodingResult::F64(_) => "f64",
        DecodingResult::I8(_) => "i8",
        DecodingResult::I16(_) => "i16",
        DecodingResult::I32(_) => "i32",
        DecodingResult::I64(_) => "i64",
        _ => "unknown",
    }
}

/// Writes a 32-bit float gray (1 channel) or RGB (3 channels) TIFF.
pub fn save_tiff(image: &PlanarImage, path: &Path) -> Result<(), ImageError> {
    let tiff_err = |source| ImageError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let n = image.num_channels();
    if n != 1 && n != 3 {
        return Err(ImageError::UnsupportedChannelCount(n));
    }

    let mut interleaved = Vec::with_capacity(image.width() * image.height() * n);
    for i in 0..image.width() * image.height() {
        for c in 0..n {
            interleaved.push(image.channel(c).pixels()[i]);
        }
    }

    let file = File::create(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    let mut encoder = TiffEncoder::new(&mut writer).map_err(tiff_err)?;
    let (w, h) = (image.width() as u32, image.height() as u32);
    if n == 1 {
        encoder
            .write_image::<colortype::Gray32Float>(w, h, &interleaved)
            .map_err(tiff_err)?;
    } else {
        encoder
            .write_image::<colortype::RGB32Float>(w, h, &interleaved)
            .map_err(tiff_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved_splits_planes() {
        let samples = [0.1, 0.2, 0.3, 1.1, 1.2, 1.3];
        let img = PlanarImage::from_interleaved(2, 1, 3, &samples);
        assert_eq!(img.num_channels(), 3);
        assert_eq!(img.sample(0, 0, 0), 0.1);
        assert_eq!(img.sample(1, 0, 0), 1.1);
        assert_eq!(img.sample(1, 0, 2), 1.3);
    }

    #[test]
    fn test_subtract_pedestal() {
        let mut img = PlanarImage::from_interleaved(2, 1, 1, &[0.5, 0.25]);
        img.subtract(0.25);
        assert_eq!(img.channel(0).pixels(), &[0.25, 0.0]);
    }

    #[test]
    #[should_panic(expected = "All channels must have the same dimensions")]
    fn test_from_channels_rejects_mixed_sizes() {
        PlanarImage::from_channels(vec![Buffer2::new_default(2, 2), Buffer2::new_default(3, 2)]);
    }

    #[test]
    fn test_tiff_round_trip_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let samples: Vec<f32> = (0..4 * 3 * 3).map(|i| i as f32 / 36.0).collect();
        let img = PlanarImage::from_interleaved(4, 3, 3, &samples);

        save_tiff(&img, &path).unwrap();
        let loaded = TiffFrameLoader.load(&path).unwrap();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_load_u16_gray_is_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray16.tif");
        {
            let mut file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(&mut file).unwrap();
            encoder
                .write_image::<colortype::Gray16>(2, 1, &[0u16, u16::MAX])
                .unwrap();
        }
        let loaded = load_tiff(&path).unwrap();
        assert_eq!(loaded.channel(0).pixels(), &[0.0, 1.0]);
    }

    #[test]
    fn test_missing_file_and_bad_channel_count() {
        let err = load_tiff(Path::new("/nonexistent/frame.tif")).unwrap_err();
        assert_eq!(err.to_string(), "/nonexistent/frame.tif: No such file.");

        let dir = tempfile::tempdir().unwrap();
        let img = PlanarImage::new(2, 2, 2);
        let err = save_tiff(&img, &dir.path().join("x.tif")).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedChannelCount(2)));
    }
}
