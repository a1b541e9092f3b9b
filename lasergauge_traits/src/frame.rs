use std::fmt;

/// An 8-bit image with interleaved channels, row-major.
///
/// Three-channel frames are stored in BGR order, the layout most camera
/// stacks deliver.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    ZeroSized,
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::ZeroSized => write!(f, "frame dimensions must be non-zero"),
            FrameError::LengthMismatch { expected, actual } => {
                write!(f, "frame buffer has {actual} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl Frame {
    pub fn from_vec(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(FrameError::ZeroSized);
        }
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Frame with every byte set to `value`.
    pub fn filled(width: usize, height: usize, channels: usize, value: u8) -> Result<Self, FrameError> {
        Self::from_vec(width, height, channels, vec![value; width * height * channels])
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
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Value at `(x, y)` in channel `c`. Panics when out of bounds.
    #[inline]
    pub fn at(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[(y * self.width + x) * self.channels + c]
    }

    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffer() {
        let err = Frame::from_vec(4, 2, 3, vec![0; 10]).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                expected: 24,
                actual: 10
            }
        );
    }

    #[test]
    fn indexes_interleaved_channels() {
        let mut data = vec![0u8; 2 * 2 * 3];
        // pixel (1, 1), red channel in BGR
        data[(2 + 1) * 3 + 2] = 200;
        let f = Frame::from_vec(2, 2, 3, data).unwrap();
        assert_eq!(f.at(1, 1, 2), 200);
        assert_eq!(f.at(1, 1, 0), 0);
    }
}
