//! Small numeric helpers shared by the frame handlers.

/// Interpolate between two `f32` values.
///
/// `progress` is expected in `[0, 1]` but is not clamped, so overshooting
/// curves can carry values past either end.
pub fn interpolate_f32(start: f32, end: f32, progress: f32) -> f32 {
    start * (1.0 - progress) + end * progress
}

/// Clamp a value to the unit interval.
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Convert a unit opacity into the 0-255 range used by scene nodes.
///
/// Values outside `[0, 1]` saturate.
pub fn opacity_u8(amount: f32) -> u8 {
    (255.0 * clamp_unit(amount)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_f32_endpoints() {
        assert_eq!(interpolate_f32(10.0, 20.0, 0.0), 10.0);
        assert_eq!(interpolate_f32(10.0, 20.0, 1.0), 20.0);
        assert_eq!(interpolate_f32(10.0, 20.0, 0.5), 15.0);
    }

    #[test]
    fn test_interpolate_f32_overshoot() {
        assert!(interpolate_f32(0.0, 100.0, 1.1) > 100.0);
    }

    #[test]
    fn test_opacity_u8_saturates() {
        assert_eq!(opacity_u8(-0.5), 0);
        assert_eq!(opacity_u8(1.0), 255);
        assert_eq!(opacity_u8(2.0), 255);
        assert_eq!(opacity_u8(0.5), 127);
    }
}
