//! Time values and normalization of user-editable numeric fields

/// Milliseconds on the timeline. Starts are whole numbers, durations may be infinite.
pub type Ms = f64;

/// Duration given to a frame whose duration is unknown
pub const DEFAULT_FRAME_DURATION: Ms = 500.0;

/// Normalizes a start time: NaN and non-finite values become 0, negatives clamp to 0,
/// fractions are floored.
pub fn sanitize_start(value: f64) -> Ms {
    if !value.is_finite() {
        return 0.0;
    }
    value.max(0.0).floor()
}

/// Normalizes a duration: NaN falls back to `default`, values clamp to `min`,
/// fractions are floored. `+∞` is kept.
pub fn sanitize_duration(value: f64, min: Ms, default: Ms) -> Ms {
    if value.is_nan() {
        return default;
    }
    value.max(min).floor()
}

/// Normalizes a list offset: any whole number, NaN and infinities become 0.
pub fn sanitize_offset(value: f64) -> Ms {
    if !value.is_finite() {
        return 0.0;
    }
    value.floor()
}

/// Clamps `value` into `[min, max]` and floors it, NaN becomes `min`.
pub fn sanitize_bounded(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_normalization() {
        assert_eq!(sanitize_start(12.7), 12.0);
        assert_eq!(sanitize_start(-40.0), 0.0);
        assert_eq!(sanitize_start(f64::NAN), 0.0);
        assert_eq!(sanitize_start(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_duration_normalization() {
        assert_eq!(sanitize_duration(0.0, 1.0, DEFAULT_FRAME_DURATION), 1.0);
        assert_eq!(sanitize_duration(99.9, 1.0, DEFAULT_FRAME_DURATION), 99.0);
        assert_eq!(sanitize_duration(f64::NAN, 1.0, DEFAULT_FRAME_DURATION), 500.0);
        assert_eq!(sanitize_duration(f64::INFINITY, 1.0, 500.0), f64::INFINITY);
        assert_eq!(sanitize_duration(f64::NEG_INFINITY, 0.0, 500.0), 0.0);
    }

    #[test]
    fn test_offset_and_bounded() {
        assert_eq!(sanitize_offset(-3.5), -4.0);
        assert_eq!(sanitize_offset(f64::NAN), 0.0);
        assert_eq!(sanitize_bounded(300.0, 0.0, 255.0), 255.0);
        assert_eq!(sanitize_bounded(f64::NAN, 0.0, 255.0), 0.0);
    }
}
