//! Laser-line peak detector.
//!
//! Stateless: given a laser-on and a laser-off frame, extracts one subpixel
//! ridge point per scan-line and reports the point closest to the image
//! centre as the canonical reading.

use lasergauge_traits::Frame;

use crate::config::{Axis, DetectionCfg};
use crate::filter::gaussian_blur;
use crate::image::{Mask, Plane};
use crate::types::Point2;

/// Ridge extracted from one on/off pair. Only produced when at least one
/// scan-line carried signal.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub mask: Mask,
    /// Global maximum of the blurred difference image (diagnostic).
    pub bright_point: Point2,
    /// Ridge point nearest the image centre.
    pub closest_point: Point2,
    pub points: Vec<Point2>,
}

impl DetectionResult {
    /// Result carrying a single ridge point, for callers that synthesize readings.
    pub fn from_point(point: Point2, width: usize, height: usize) -> Self {
        let mut mask = Mask::new(width, height);
        set_rounded(&mut mask, &point);
        Self {
            mask,
            bright_point: point,
            closest_point: point,
            points: vec![point],
        }
    }
}

/// Parabolic refinement of a discrete peak at `idx`.
///
/// Falls back to `idx` at either boundary or when the three samples are
/// collinear.
pub fn subpixel_quadratic(idx: usize, values: &[f32]) -> f64 {
    if idx == 0 || idx + 1 >= values.len() {
        return idx as f64;
    }
    let l = f64::from(values[idx - 1]);
    let c = f64::from(values[idx]);
    let r = f64::from(values[idx + 1]);
    let denom = l - 2.0 * c + r;
    if denom == 0.0 {
        return idx as f64;
    }
    idx as f64 + 0.5 * (l - r) / denom
}

/// First index of the maximum value.
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if v <= bv => best,
            _ => Some((i, v)),
        })
}

fn set_rounded(mask: &mut Mask, p: &Point2) {
    let x = p.x.round();
    let y = p.y.round();
    if x >= 0.0 && y >= 0.0 {
        mask.set(x as usize, y as usize);
    }
}

#[derive(Debug, Clone)]
pub struct LaserDetector {
    min_intensity: f32,
    kernel: (usize, usize),
    sigma: f64,
    channel: usize,
    subpixel: bool,
}

impl Default for LaserDetector {
    fn default() -> Self {
        Self::new(&DetectionCfg::default())
    }
}

impl LaserDetector {
    pub fn new(cfg: &DetectionCfg) -> Self {
        Self {
            min_intensity: cfg.min_intensity,
            kernel: cfg.blur_kernel,
            sigma: cfg.blur_sigma,
            channel: cfg.laser_channel,
            subpixel: cfg.subpixel,
        }
    }

    /// Blurred, clamped `on - off` intensity of the laser channel.
    pub fn response(&self, on: &Frame, off: &Frame) -> Option<Plane> {
        let diff = Plane::positive_difference(on, off, self.channel)?;
        Some(gaussian_blur(&diff, self.kernel, self.sigma))
    }

    fn refine(&self, idx: usize, line: &[f32]) -> f64 {
        if self.subpixel {
            subpixel_quadratic(idx, line)
        } else {
            idx as f64
        }
    }

    /// Detect the laser line; `None` when no scan-line exceeds the threshold
    /// or the frames cannot be compared.
    pub fn detect_line(&self, on: &Frame, off: &Frame, axis: Axis) -> Option<DetectionResult> {
        let blurred = self.response(on, off)?;
        let (w, h) = (blurred.width(), blurred.height());

        let mut points = Vec::new();
        match axis {
            Axis::Y => {
                for y in 0..h {
                    let row = blurred.row(y);
                    if let Some((idx, peak)) = argmax(row)
                        && peak > self.min_intensity
                    {
                        points.push(Point2::new(self.refine(idx, row), y as f64));
                    }
                }
            }
            Axis::X => {
                for x in 0..w {
                    let col = blurred.column(x);
                    if let Some((idx, peak)) = argmax(&col)
                        && peak > self.min_intensity
                    {
                        points.push(Point2::new(x as f64, self.refine(idx, &col)));
                    }
                }
            }
        }

        if points.is_empty() {
            tracing::trace!(axis = axis.as_str(), "no scan-line above threshold");
            return None;
        }

        let center = Point2::new(w as f64 / 2.0, h as f64 / 2.0);
        let closest_point = points
            .iter()
            .copied()
            .fold(None, |best: Option<(Point2, f64)>, p| {
                let d = p.distance_sq(&center);
                match best {
                    Some((_, bd)) if d >= bd => best,
                    _ => Some((p, d)),
                }
            })
            .map(|(p, _)| p)?;

        let bright_point = blurred
            .max_location()
            .map(|(x, y, _)| Point2::new(x as f64, y as f64))?;

        let mut mask = Mask::new(w, h);
        for p in &points {
            set_rounded(&mut mask, p);
        }

        tracing::trace!(
            ridge_points = points.len(),
            closest_x = closest_point.x,
            closest_y = closest_point.y,
            "laser line detected"
        );
        Some(DetectionResult {
            mask,
            bright_point,
            closest_point,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[10.0, 50.0, 10.0], 1, 1.0)]
    #[case(&[10.0, 30.0, 50.0], 2, 2.0)]
    #[case(&[50.0, 30.0, 10.0], 0, 0.0)]
    #[case(&[20.0, 20.0, 20.0], 1, 1.0)]
    fn subpixel_cases(#[case] values: &[f32], #[case] idx: usize, #[case] expected: f64) {
        assert_eq!(subpixel_quadratic(idx, values), expected);
    }

    #[test]
    fn subpixel_is_exact_for_parabola() {
        // y = 100 - (x - 2.3)^2 sampled at 1, 2, 3
        let f = |x: f64| (100.0 - (x - 2.3) * (x - 2.3)) as f32;
        let values = [f(0.0), f(1.0), f(2.0), f(3.0)];
        let refined = subpixel_quadratic(2, &values);
        assert!((refined - 2.3).abs() < 1e-4, "{refined}");
    }

    /// BGR frame with a vertical stripe at column `x0` on the red channel.
    fn stripe_frame(w: usize, h: usize, x0: usize, level: u8) -> Frame {
        let mut data = vec![0u8; w * h * 3];
        for y in 0..h {
            for dx in 0..3usize {
                let x = x0 + dx - 1;
                let v = if dx == 1 { level } else { level / 2 };
                data[(y * w + x) * 3 + 2] = v;
            }
        }
        Frame::from_vec(w, h, 3, data).unwrap()
    }

    #[test]
    fn identical_frames_yield_nothing() {
        let f = stripe_frame(32, 24, 10, 200);
        let det = LaserDetector::default();
        assert!(det.detect_line(&f, &f, Axis::Y).is_none());
    }

    #[test]
    fn finds_vertical_stripe_scanning_rows() {
        let off = Frame::filled(40, 30, 3, 0).unwrap();
        let on = stripe_frame(40, 30, 12, 200);
        let cfg = DetectionCfg {
            blur_kernel: (5, 5),
            ..DetectionCfg::default()
        };
        let res = LaserDetector::new(&cfg)
            .detect_line(&on, &off, Axis::Y)
            .expect("stripe");
        assert_eq!(res.points.len(), 30);
        assert!((res.closest_point.x - 12.0).abs() < 1e-3);
        assert_eq!(res.closest_point.y, 15.0);
        assert_eq!(res.bright_point.x, 12.0);
        assert!(res.mask.is_set(12, 0));
        assert_eq!(res.mask.count(), 30);
    }

    #[test]
    fn threshold_rejects_faint_signal() {
        let off = Frame::filled(20, 10, 3, 0).unwrap();
        let on = stripe_frame(20, 10, 8, 6);
        let cfg = DetectionCfg {
            blur_kernel: (1, 1),
            min_intensity: 10.0,
            ..DetectionCfg::default()
        };
        assert!(LaserDetector::new(&cfg).detect_line(&on, &off, Axis::Y).is_none());
    }

    #[test]
    fn closest_point_is_nearest_to_centre() {
        // Single-channel diagonal-ish ridge: two separate row segments.
        let (w, h) = (20usize, 10usize);
        let mut on = vec![0u8; w * h];
        for y in 0..h {
            let x = if y < 5 { 3 } else { 11 };
            on[y * w + x] = 250;
        }
        let on = Frame::from_vec(w, h, 1, on).unwrap();
        let off = Frame::filled(w, h, 1, 0).unwrap();
        let cfg = DetectionCfg {
            blur_kernel: (1, 1),
            ..DetectionCfg::default()
        };
        let res = LaserDetector::new(&cfg).detect_line(&on, &off, Axis::Y).unwrap();
        assert_eq!(res.closest_point, Point2::new(11.0, 5.0));
    }

    #[test]
    fn axis_x_scans_columns() {
        let (w, h) = (12usize, 16usize);
        let mut on = vec![0u8; w * h];
        for x in 0..w {
            on[7 * w + x] = 200;
        }
        let on = Frame::from_vec(w, h, 1, on).unwrap();
        let off = Frame::filled(w, h, 1, 0).unwrap();
        let cfg = DetectionCfg {
            blur_kernel: (1, 1),
            ..DetectionCfg::default()
        };
        let res = LaserDetector::new(&cfg).detect_line(&on, &off, Axis::X).unwrap();
        assert_eq!(res.points.len(), w);
        assert_eq!(res.closest_point, Point2::new(6.0, 7.0));
    }
}
