//! Sample table generation.
//!
//! When no input file is given, we generate a single-instance table holding a
//! pulse: a sin² ramp up, a flat plateau, and a sin² ramp down. The offset
//! shape pads the pulse with zero-power samples on both sides. The CSV is
//! written the way the pulse generators write it, with spaces around the
//! delimiter (`Table Instance ; 1`, `; 0.25`).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// `count` evenly spaced points from `start` to `end` inclusive.
fn linspace(start: f32, end: f32, count: usize) -> impl Iterator<Item = f32> {
    let step = if count > 1 {
        (end - start) / (count - 1) as f32
    } else {
        0.0
    };
    (0..count).map(move |i| start + step * i as f32)
}

/// Pulse shape of the generated table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PulseShape {
    /// Ramp, plateau, ramp
    #[default]
    Plateau,
    /// Zero-power lead-in and tail around the plateau pulse
    Offset,
}

impl FromStr for PulseShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plateau" => Ok(PulseShape::Plateau),
            "offset" => Ok(PulseShape::Offset),
            other => Err(format!("unknown pulse shape: {}", other)),
        }
    }
}

impl fmt::Display for PulseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseShape::Plateau => write!(f, "plateau"),
            PulseShape::Offset => write!(f, "offset"),
        }
    }
}

/// A sin² ramp of `ramp_points` up to `high_power`, `high_points` at
/// `high_power`, and the mirrored ramp back down.
pub fn sin_square_with_plateau(ramp_points: usize, high_points: usize, high_power: f32) -> Vec<f32> {
    general_sigmoid_offset(0, ramp_points, high_points, high_power)
}

/// The plateau pulse with `offset_points` zero samples before and after it.
pub fn general_sigmoid_offset(
    offset_points: usize,
    ramp_points: usize,
    high_points: usize,
    high_power: f32,
) -> Vec<f32> {
    let mut pulse = Vec::with_capacity(2 * offset_points + 2 * ramp_points + high_points);
    pulse.extend(std::iter::repeat(0.0).take(offset_points));
    pulse.extend(linspace(0.0, FRAC_PI_2, ramp_points).map(|a| high_power * a.sin().powi(2)));
    pulse.extend(std::iter::repeat(high_power).take(high_points));
    pulse.extend(linspace(0.0, FRAC_PI_2, ramp_points).map(|a| high_power * a.cos().powi(2)));
    pulse.extend(std::iter::repeat(0.0).take(offset_points));
    pulse
}

/// Render samples as a single-instance table-definition file.
pub fn render_csv(samples: &[f32]) -> String {
    let mut text = String::from("Table Instance ; 1\n");
    for sample in samples {
        text.push_str("; ");
        text.push_str(&sample.to_string());
        text.push('\n');
    }
    text
}

/// Generate a sample table of `sample_count` samples.
///
/// Offset length, ramp length and peak power are drawn from `seed`.
pub fn generate_sample_table(seed: u64, sample_count: usize, shape: PulseShape) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let sample_count = sample_count.max(2);
    let offset_points = match shape {
        PulseShape::Plateau => 0,
        PulseShape::Offset => rng.gen_range(0..=sample_count / 6),
    };
    let pulse_points = sample_count - 2 * offset_points;
    let ramp_points = rng.gen_range(pulse_points / 8..=pulse_points / 3).max(1);
    let high_points = pulse_points - 2 * ramp_points;
    let high_power: f32 = rng.gen_range(0.5..=2.0);

    render_csv(&general_sigmoid_offset(
        offset_points,
        ramp_points,
        high_points,
        high_power,
    ))
}

/// Write a generated table to a file.
pub fn write_sample_file(path: &std::path::Path, text: &str) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lut_transfer_core::ingest::ingest_table;
    use lut_transfer_core::table::TableInstance;

    #[test]
    fn test_pulse_shape() {
        let pulse = sin_square_with_plateau(5, 3, 2.0);

        assert_eq!(pulse.len(), 13);
        assert_eq!(pulse[0], 0.0);
        assert!((pulse[4] - 2.0).abs() < 1e-6);
        assert!(pulse[5..8].iter().all(|&p| p == 2.0));
        assert!((pulse[8] - 2.0).abs() < 1e-6);
        assert!(pulse[12].abs() < 1e-6);
    }

    #[test]
    fn test_offset_pulse_shape() {
        let pulse = general_sigmoid_offset(4, 5, 3, 2.0);

        assert_eq!(pulse.len(), 4 + 5 + 3 + 5 + 4);
        assert!(pulse[..4].iter().all(|&p| p == 0.0));
        assert!(pulse[pulse.len() - 4..].iter().all(|&p| p == 0.0));
        assert_eq!(&pulse[4..17], sin_square_with_plateau(5, 3, 2.0).as_slice());
    }

    #[test]
    fn test_zero_offset_is_plateau() {
        assert_eq!(general_sigmoid_offset(0, 7, 2, 1.5), sin_square_with_plateau(7, 2, 1.5));
    }

    #[test]
    fn test_pulse_shape_names() {
        assert_eq!("plateau".parse::<PulseShape>(), Ok(PulseShape::Plateau));
        assert_eq!("offset".parse::<PulseShape>(), Ok(PulseShape::Offset));
        assert!("square".parse::<PulseShape>().is_err());
        assert_eq!(PulseShape::Offset.to_string(), "offset");
    }

    #[test]
    fn test_generated_table_validates() {
        for shape in [PulseShape::Plateau, PulseShape::Offset] {
            for size in [2, 3, 13, 100, 1000] {
                let text = generate_sample_table(999, size, shape);
                let tables = ingest_table(&text).unwrap();
                let column = tables.get(TableInstance::new(1).unwrap()).unwrap();
                assert_eq!(column.len(), size);
            }
        }
    }

    #[test]
    fn test_offset_table_starts_at_zero() {
        for seed in 0..20 {
            let text = generate_sample_table(seed, 600, PulseShape::Offset);
            let tables = ingest_table(&text).unwrap();
            let samples = tables.get(TableInstance::new(1).unwrap()).unwrap().samples();
            assert_eq!(samples[0], 0.0);
            assert!(samples[samples.len() - 1].abs() < 1e-6);
            assert!(samples.iter().any(|&p| p >= 0.5));
        }
    }

    #[test]
    fn test_determinism() {
        assert_eq!(
            generate_sample_table(12345, 500, PulseShape::Plateau),
            generate_sample_table(12345, 500, PulseShape::Plateau)
        );
    }

    #[test]
    fn test_different_seeds() {
        assert_ne!(
            generate_sample_table(1, 500, PulseShape::Plateau),
            generate_sample_table(2, 500, PulseShape::Plateau)
        );
    }
}
