//! Array-of-structs vs. struct-of-arrays field sum.
//!
//! Summing one field of an AoS array drags the other two fields through
//! the cache with it - a third of every line does work. The SoA layout
//! keeps each field contiguous, so a field-wise pass streams exactly the
//! bytes it needs and the prefetcher sees one linear stream.
//!
//! Both sides build their data before the clock starts; the measured loop
//! is a pure read scan.

use super::SuiteConfig;
use crate::harness::{Harness, ScenarioOutcome};

/// Particles per array unless overridden.
pub const DEFAULT_PARTICLES: usize = 100_000_000;

/// Full passes over the x field per trial unless overridden.
pub const DEFAULT_PASSES: u64 = 1;

/// One particle, fields interleaved in memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Particle {
    /// Position x.
    pub x: f32,
    /// Position y.
    pub y: f32,
    /// Position z.
    pub z: f32,
}

/// The same particles, each field in its own contiguous array.
#[derive(Debug, Default)]
pub struct ParticlesSoa {
    /// All x positions.
    pub x: Vec<f32>,
    /// All y positions.
    pub y: Vec<f32>,
    /// All z positions.
    pub z: Vec<f32>,
}

impl ParticlesSoa {
    /// `count` particles with the same field values as [`aos_particles`].
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            x: (0..count).map(x_value).collect(),
            y: vec![0.0; count],
            z: vec![0.0; count],
        }
    }
}

/// `count` particles with deterministic x values.
#[must_use]
pub fn aos_particles(count: usize) -> Vec<Particle> {
    (0..count)
        .map(|i| Particle {
            x: x_value(i),
            ..Particle::default()
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn x_value(i: usize) -> f32 {
    // Small cycle keeps the f32 sum exact for any realistic count.
    (i % 7) as f32
}

fn sum_to_checksum(sum: f32) -> u64 {
    u64::from(sum.to_bits())
}

/// Run the AoS and SoA field-sum scenarios.
pub fn scenarios(harness: &Harness, config: &SuiteConfig) -> Vec<ScenarioOutcome> {
    let count = config.objects.unwrap_or(DEFAULT_PARTICLES);
    let passes = config.iterations.unwrap_or(DEFAULT_PASSES);

    let particles = aos_particles(count);
    let aos = harness.run_workload("soa_vs_aos/aos", config.trials, passes, |passes| {
        let mut sum = 0f32;
        for _ in 0..passes {
            for particle in &particles {
                sum += particle.x;
            }
        }
        sum_to_checksum(sum)
    });
    drop(particles);

    let soa = ParticlesSoa::new(count);
    let soa = harness.run_workload("soa_vs_aos/soa", config.trials, passes, |passes| {
        let mut sum = 0f32;
        for _ in 0..passes {
            for &x in &soa.x {
                sum += x;
            }
        }
        sum_to_checksum(sum)
    });

    vec![aos, soa]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_agree_on_the_sum() {
        let harness = Harness::new();
        let config = SuiteConfig {
            trials: 1,
            objects: Some(10_000),
            iterations: Some(2),
            ..SuiteConfig::default()
        };

        let outcomes = scenarios(&harness, &config);
        let aos = outcomes[0].result().expect("aos completes");
        let soa = outcomes[1].result().expect("soa completes");
        assert_eq!(aos.checksum, soa.checksum);
        assert_ne!(aos.checksum, 0);
    }

    #[test]
    fn test_soa_mirrors_aos_values() {
        let aos = aos_particles(100);
        let soa = ParticlesSoa::new(100);
        for (particle, &x) in aos.iter().zip(&soa.x) {
            assert!((particle.x - x).abs() < f32::EPSILON);
        }
    }
}
