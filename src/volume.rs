//! Distance-based volume modulation.
//!
//! A speaker plays at its base volume while the listener is within the
//! full-volume distance, fades linearly as the listener walks away, and is
//! silent beyond the mute distance. The audio server takes integer percent.

/// Linear attenuation factor in `[0, 1]` for a listener at `distance`.
///
/// Requires `full_volume_distance < mute_distance` (enforced when the
/// speaker configuration is loaded).
pub fn attenuation(distance: f64, full_volume_distance: f64, mute_distance: f64) -> f64 {
    let clamped = distance.clamp(full_volume_distance, mute_distance);
    1.0 - (clamped - full_volume_distance) / (mute_distance - full_volume_distance)
}

/// Output volume as the integer percentage sent to the audio device.
///
/// `base_volume` is the user-requested volume in `[0, 1]`; callers reject
/// negative values before getting here. The result saturates at 100.
pub fn output_percent(
    distance: f64,
    full_volume_distance: f64,
    mute_distance: f64,
    base_volume: f64,
) -> u8 {
    let output = base_volume * attenuation(distance, full_volume_distance, mute_distance);
    (output * 100.0).round().min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: f64 = 1000.0;
    const MUTE: f64 = 5000.0;

    #[test]
    fn full_volume_at_or_below_near_threshold() {
        for d in [0.0, 500.0, FULL] {
            assert_eq!(output_percent(d, FULL, MUTE, 0.8), 80, "at {d}");
        }
    }

    #[test]
    fn silent_at_or_beyond_mute_threshold() {
        for d in [MUTE, 7500.0, 1.0e9] {
            assert_eq!(output_percent(d, FULL, MUTE, 0.8), 0, "at {d}");
        }
    }

    #[test]
    fn linear_in_between() {
        // Halfway along the ramp.
        assert_eq!(output_percent(3000.0, FULL, MUTE, 1.0), 50);
        // Quarter along the ramp.
        assert_eq!(output_percent(2000.0, FULL, MUTE, 1.0), 75);
    }

    #[test]
    fn non_increasing_in_distance() {
        let mut last = u8::MAX;
        let mut d = 0.0;
        while d <= 6000.0 {
            let v = output_percent(d, FULL, MUTE, 0.9);
            assert!(v <= last, "volume rose from {last} to {v} at {d}");
            last = v;
            d += 50.0;
        }
    }

    #[test]
    fn scales_with_base_volume() {
        assert_eq!(output_percent(3000.0, FULL, MUTE, 0.5), 25);
        assert_eq!(output_percent(0.0, FULL, MUTE, 0.0), 0);
    }

    #[test]
    fn percent_saturates_at_100() {
        assert_eq!(output_percent(0.0, FULL, MUTE, 1.5), 100);
    }

    #[test]
    fn attenuation_stays_in_unit_interval() {
        for d in [-100.0, 0.0, 999.9, 1000.1, 4999.9, 5000.1, 1.0e12] {
            let a = attenuation(d, FULL, MUTE);
            assert!((0.0..=1.0).contains(&a), "attenuation {a} at {d}");
        }
    }
}
