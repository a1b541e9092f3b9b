//! PNG in/out for frames and ridge masks.
//!
//! Frames are BGR in memory; files on disk are RGB (or grayscale for masks).

use std::path::Path;

use eyre::{Result, WrapErr};
use image::{GrayImage, RgbImage};
use lasergauge_core::image::Mask;
use lasergauge_traits::Frame;

/// Load an image file as a 3-channel BGR frame.
pub fn load_bgr(path: &Path) -> Result<Frame> {
    let img = image::open(path)
        .wrap_err_with(|| format!("open image {}", path.display()))?
        .to_rgb8();
    let (w, h) = img.dimensions();
    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    Frame::from_vec(w as usize, h as usize, 3, data)
        .wrap_err_with(|| format!("decode image {}", path.display()))
}

/// Save a frame as PNG; 3-channel frames are taken as BGR.
pub fn save_frame(path: &Path, frame: &Frame) -> Result<()> {
    let (w, h) = (dim(frame.width())?, dim(frame.height())?);
    let written = match frame.channels() {
        1 => GrayImage::from_raw(w, h, frame.as_bytes().to_vec())
            .ok_or_else(|| eyre::eyre!("frame buffer does not match its shape"))?
            .save(path),
        3 => {
            let mut data = frame.as_bytes().to_vec();
            for px in data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            RgbImage::from_raw(w, h, data)
                .ok_or_else(|| eyre::eyre!("frame buffer does not match its shape"))?
                .save(path)
        }
        n => eyre::bail!("cannot save a {n}-channel frame as PNG"),
    };
    written.wrap_err_with(|| format!("write image {}", path.display()))
}

pub fn save_mask(path: &Path, mask: &Mask) -> Result<()> {
    GrayImage::from_raw(dim(mask.width())?, dim(mask.height())?, mask.as_bytes().to_vec())
        .ok_or_else(|| eyre::eyre!("mask buffer does not match its shape"))?
        .save(path)
        .wrap_err_with(|| format!("write mask {}", path.display()))
}

fn dim(n: usize) -> Result<u32> {
    u32::try_from(n).wrap_err("image dimension too large")
}
