//! Sub-pixel camera jitter for temporal anti-aliasing.

use glam::{Mat4, Vec2};

/// Fixed 8-point Poisson disc in `[0, 1]²`, cycled by frame number.
pub const POISSON_SAMPLES: [Vec2; 8] = [
    Vec2::new(0.655_897_4, 0.955_76),
    Vec2::new(0.944_576_7, 0.455_478_9),
    Vec2::new(0.203_683_17, 0.017_714_973),
    Vec2::new(0.383_628_75, 0.379_284_57),
    Vec2::new(0.945_473_56, 0.779_431_96),
    Vec2::new(0.570_420_56, 0.576_156_5),
    Vec2::new(0.674_354_5, 0.286_346_9),
    Vec2::new(0.347_776_13, 0.734_938_5),
];

/// Clip-space offset for `frame_number` at `width`×`height`.
///
/// Each sample is remapped to `[-1, 1]` and divided by the resolution, so
/// the shift stays within one pixel.
#[must_use]
pub fn jitter_offset(frame_number: u64, width: u32, height: u32) -> Vec2 {
    let s = POISSON_SAMPLES[(frame_number % POISSON_SAMPLES.len() as u64) as usize];
    Vec2::new(
        (s.x * 2.0 - 1.0) / width as f32,
        (s.y * 2.0 - 1.0) / height as f32,
    )
}

/// Translation applied after the view-projection; identity when temporal AA
/// is off.
#[must_use]
pub fn jitter_matrix(frame_number: u64, width: u32, height: u32, temporal_aa: bool) -> Mat4 {
    if !temporal_aa {
        return Mat4::IDENTITY;
    }
    Mat4::from_translation(jitter_offset(frame_number, width, height).extend(0.0))
}

/// Applies the jitter to an unjittered view-projection.
#[inline]
#[must_use]
pub fn jittered_view_projection(view_projection: Mat4, jitter: Mat4) -> Mat4 {
    jitter * view_projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_pattern_repeats_every_eight_frames() {
        for n in 0..8 {
            assert_eq!(jitter_offset(n, 1920, 1080), jitter_offset(n + 8, 1920, 1080));
        }
        assert_ne!(jitter_offset(0, 1920, 1080), jitter_offset(1, 1920, 1080));
    }

    #[test]
    fn test_offset_within_one_pixel() {
        for n in 0..8 {
            let o = jitter_offset(n, 640, 480);
            assert!(o.x.abs() <= 1.0 / 640.0);
            assert!(o.y.abs() <= 1.0 / 480.0);
        }
    }

    #[test]
    fn test_disabled_is_identity() {
        assert_eq!(jitter_matrix(3, 100, 100, false), Mat4::IDENTITY);
    }

    #[test]
    fn test_jitter_shifts_clip_position() {
        let vp = Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0);
        let jitter = jitter_matrix(0, 100, 100, true);
        let p = Vec4::new(0.0, 0.0, -1.0, 1.0);
        let a = vp * p;
        let b = jittered_view_projection(vp, jitter) * p;
        let offset = jitter_offset(0, 100, 100);
        assert!((b.x / b.w - a.x / a.w - offset.x).abs() < 1e-6);
        assert!((b.y / b.w - a.y / a.w - offset.y).abs() < 1e-6);
    }
}
