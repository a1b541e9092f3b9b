//! Single-channel working buffers used by the detector.

use lasergauge_traits::Frame;

/// Row-major `f32` plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Build from a row-major buffer; `None` when the length does not match.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Per-pixel `on - off` of one channel, clamped at zero.
    ///
    /// Returns `None` if the frames differ in shape or lack the channel.
    /// Single-channel frames always use their only channel.
    pub fn positive_difference(on: &Frame, off: &Frame, channel: usize) -> Option<Self> {
        if !on.same_shape(off) {
            return None;
        }
        let ch = if on.channels() == 1 { 0 } else { channel };
        if ch >= on.channels() {
            return None;
        }
        let stride = on.channels();
        let data = on
            .as_bytes()
            .chunks_exact(stride)
            .zip(off.as_bytes().chunks_exact(stride))
            .map(|(a, b)| f32::from(a[ch].saturating_sub(b[ch])))
            .collect();
        Some(Self {
            width: on.width(),
            height: on.height(),
            data,
        })
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
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    pub fn column(&self, x: usize) -> Vec<f32> {
        (0..self.height).map(|y| self.get(x, y)).collect()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Location and value of the global maximum; first in row-major order on ties.
    pub fn max_location(&self) -> Option<(usize, usize, f32)> {
        let (idx, v) = self
            .data
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, v)| match best {
                Some((_, bv)) if v <= bv => best,
                _ => Some((i, v)),
            })?;
        Some((idx % self.width, idx / self.width, v))
    }
}

/// Binary ridge mask, 0 or 255 per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn set(&mut self, x: usize, y: usize) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = 255;
        }
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x] != 0
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
