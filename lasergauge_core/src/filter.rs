//! Spatial and temporal filters.
//!
//! - `gaussian_blur`: separable Gaussian with reflect-101 borders.
//! - `temporal_median`: per-pixel median across a burst of frames.

use std::sync::Arc;

use lasergauge_traits::Frame;

use crate::image::Plane;

/// Sigma derived from kernel size when none is given.
#[inline]
pub fn auto_sigma(ksize: usize) -> f64 {
    0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian kernel of odd length `ksize`.
pub fn gaussian_kernel(ksize: usize, sigma: f64) -> Vec<f32> {
    let ksize = ksize.max(1);
    let sigma = if sigma > 0.0 { sigma } else { auto_sigma(ksize) };
    let center = (ksize as f64 - 1.0) * 0.5;
    let scale = -0.5 / (sigma * sigma);
    let raw: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - center;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Index into `0..n` mirroring at the edges without repeating them
/// (`gfedcb|abcdefgh|gfedcba`).
#[inline]
fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    let mut i = i;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

fn convolve_line(src: &[f32], dst: &mut [f32], kernel: &[f32]) {
    let n = src.len();
    let half = (kernel.len() / 2) as isize;
    for (i, out) in dst.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (k, w) in kernel.iter().enumerate() {
            let j = reflect_101(i as isize + k as isize - half, n);
            acc += w * src[j];
        }
        *out = acc;
    }
}

/// Separable Gaussian blur with kernel `(kw, kh)`.
///
/// `sigma <= 0` derives sigma for each direction from its kernel size.
pub fn gaussian_blur(src: &Plane, kernel: (usize, usize), sigma: f64) -> Plane {
    let (w, h) = (src.width(), src.height());
    let kx = gaussian_kernel(kernel.0, sigma);
    let ky = gaussian_kernel(kernel.1, sigma);

    let mut tmp = Plane::zeros(w, h);
    for y in 0..h {
        let start = y * w;
        convolve_line(
            src.row(y),
            &mut tmp.as_mut_slice()[start..start + w],
            &kx,
        );
    }

    let mut out = Plane::zeros(w, h);
    let mut col_out = vec![0.0f32; h];
    for x in 0..w {
        let col = tmp.column(x);
        convolve_line(&col, &mut col_out, &ky);
        let data = out.as_mut_slice();
        for (y, v) in col_out.iter().enumerate() {
            data[y * w + x] = *v;
        }
    }
    out
}

/// Per-pixel median over `frames`.
///
/// Even counts average the two middle values, rounded down. Returns `None`
/// for an empty burst or when the frames differ in shape.
pub fn temporal_median(frames: &[Arc<Frame>]) -> Option<Frame> {
    let first = frames.first()?;
    if frames.iter().any(|f| !f.same_shape(first)) {
        return None;
    }
    let n = frames.len();
    let len = first.as_bytes().len();
    let mut out = vec![0u8; len];
    let mut column = vec![0u8; n];
    for (i, px) in out.iter_mut().enumerate() {
        for (slot, f) in column.iter_mut().zip(frames) {
            *slot = f.as_bytes()[i];
        }
        column.sort_unstable();
        *px = if n % 2 == 1 {
            column[n / 2]
        } else {
            let lo = u16::from(column[n / 2 - 1]);
            let hi = u16::from(column[n / 2]);
            ((lo + hi) / 2) as u8
        };
    }
    Frame::from_vec(first.width(), first.height(), first.channels(), out).ok()
}
