use std::sync::Arc;

use lasergauge_core::detector::subpixel_quadratic;
use lasergauge_core::filter::temporal_median;
use lasergauge_traits::Frame;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LEVEL: i16 = 128;

fn noisy_frame(rng: &mut StdRng, w: usize, h: usize, amp: i16) -> Frame {
    let data = (0..w * h)
        .map(|_| (LEVEL + rng.gen_range(-amp..=amp)) as u8)
        .collect();
    Frame::from_vec(w, h, 1, data).unwrap()
}

fn variance(f: &Frame) -> f64 {
    let n = f.as_bytes().len() as f64;
    f.as_bytes()
        .iter()
        .map(|&v| {
            let d = f64::from(v) - f64::from(LEVEL);
            d * d
        })
        .sum::<f64>()
        / n
}

proptest! {
    #[test]
    fn median_of_noisy_frames_has_lower_variance(
        seed in any::<u64>(),
        count in prop::sample::select(vec![3usize, 5, 7, 9]),
        amp in 8i16..60,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let frames: Vec<Arc<Frame>> = (0..count)
            .map(|_| Arc::new(noisy_frame(&mut rng, 24, 24, amp)))
            .collect();
        let median = temporal_median(&frames).unwrap();
        let mv = variance(&median);
        for f in &frames {
            prop_assert!(mv < variance(f), "median {} vs frame {}", mv, variance(f));
        }
    }

    #[test]
    fn median_of_identical_frames_is_the_frame(value in any::<u8>(), count in 1usize..8) {
        let f = Arc::new(Frame::filled(5, 4, 3, value).unwrap());
        let frames = vec![f.clone(); count];
        prop_assert_eq!(temporal_median(&frames).unwrap(), (*f).clone());
    }

    #[test]
    fn subpixel_stays_within_half_a_pixel(
        l in 0.0f32..100.0,
        c in 100.0f32..200.0,
        r in 0.0f32..100.0,
    ) {
        let refined = subpixel_quadratic(1, &[l, c, r]);
        prop_assert!((refined - 1.0).abs() <= 0.5);
    }
}
