//! Parameter to node mapping
//!
//! Pure functions from a parameter value to node settings. Tempo and pitch
//! belong to the playing source, so they map to no graph node.

use super::topology::NodeKind;
use crate::params::Field;

/// Largest echo wet gain (echo = 100)
pub const MAX_WET_GAIN: f64 = 0.75;
/// Largest echo feedback gain (echo = 100)
pub const MAX_FEEDBACK_GAIN: f64 = 0.5;
/// Largest noise gain (noise = 100)
pub const MAX_NOISE_GAIN: f64 = 0.15;

/// Quadratic volume curve: 100% is unity, 300% is 9x
pub fn volume_gain(volume: f64) -> f64 {
    let v = volume / 100.0;
    v * v
}

pub fn noise_gain(noise: f64) -> f64 {
    noise / 100.0 * MAX_NOISE_GAIN
}

pub fn wet_gain(echo: f64) -> f64 {
    echo / 100.0 * MAX_WET_GAIN
}

pub fn feedback_gain(echo: f64) -> f64 {
    echo / 100.0 * MAX_FEEDBACK_GAIN
}

/// Effective speed of the source: tempo scaled by the detune ratio
pub fn playback_rate(tempo: f64, semitones: f64) -> f64 {
    tempo * 2f64.powf(semitones / 12.0)
}

/// Node settings for one field; empty for transport fields
pub fn node_targets(field: Field, value: f64) -> Vec<(NodeKind, f64)> {
    match field {
        Field::Frequency => vec![(NodeKind::LowPass, value)],
        Field::Volume => vec![(NodeKind::VolumeGain, volume_gain(value))],
        Field::Noise => vec![(NodeKind::NoiseGain, noise_gain(value))],
        Field::Echo => vec![
            (NodeKind::WetGain, wet_gain(value)),
            (NodeKind::FeedbackGain, feedback_gain(value)),
        ],
        Field::Tempo | Field::Pitch => Vec::new(),
    }
}

/// Time for the echo loop to decay below -60 dB
///
/// Each pass through the loop arrives one delay later and is scaled by
/// `wet * feedback`; the first pass is scaled by `wet` alone.
pub fn echo_tail_secs(echo: f64, delay_secs: f64) -> f64 {
    const FLOOR: f64 = 0.001;

    let wet = wet_gain(echo);
    if wet <= FLOOR {
        return 0.0;
    }
    let loop_gain = wet * feedback_gain(echo);
    if loop_gain <= 0.0 {
        return delay_secs;
    }
    // First pass n with wet * g^(n-1) < FLOOR
    let passes = ((FLOOR / wet).ln() / loop_gain.ln()).floor() + 2.0;
    passes * delay_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test_case(0.0, 0.0)]
    #[test_case(50.0, 0.25)]
    #[test_case(100.0, 1.0)]
    #[test_case(150.0, 2.25)]
    #[test_case(300.0, 9.0)]
    fn test_volume_curve(volume: f64, gain: f64) {
        assert_relative_eq!(volume_gain(volume), gain);
    }

    #[test]
    fn test_feedback_always_below_unity() {
        for echo in 0..=100 {
            let fb = feedback_gain(f64::from(echo));
            assert!(fb < 1.0 && fb <= MAX_FEEDBACK_GAIN);
            assert!(fb * wet_gain(f64::from(echo)) < 1.0);
        }
    }

    #[test]
    fn test_transport_fields_map_to_nothing() {
        assert!(node_targets(Field::Tempo, 1.5).is_empty());
        assert!(node_targets(Field::Pitch, 3.0).is_empty());
    }

    #[test]
    fn test_echo_drives_two_nodes() {
        let targets = node_targets(Field::Echo, 40.0);
        assert_eq!(targets.len(), 2);
        assert_relative_eq!(targets[0].1, 0.3);
        assert_relative_eq!(targets[1].1, 0.2);
    }

    #[test]
    fn test_playback_rate() {
        assert_relative_eq!(playback_rate(1.0, 0.0), 1.0);
        assert_relative_eq!(playback_rate(1.0, 12.0), 2.0);
        assert_relative_eq!(playback_rate(1.5, -12.0), 0.75);
    }

    #[test]
    fn test_echo_tail() {
        assert_eq!(echo_tail_secs(0.0, 0.5), 0.0);

        // echo 100: wet 0.75, loop 0.375 -> 0.75 * 0.375^7 < 0.001
        let tail = echo_tail_secs(100.0, 0.5);
        assert_relative_eq!(tail, 4.0);
        assert!(echo_tail_secs(20.0, 0.5) < tail);
    }
}
