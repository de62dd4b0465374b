use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// System resource readings, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Source of cpu/memory readings taken during a scenario's steady state.
pub trait ResourceSampler: Send + Sync + 'static {
    fn sample(&self) -> ResourceSample;
}

/// Randomized readings: cpu in `[20, 100)`, memory in `[30, 100)`.
///
/// Measures nothing; it stands in for a telemetry-backed sampler so that the
/// bottleneck and scoring pipeline has inputs.
#[derive(Debug)]
pub struct SyntheticSampler {
    rng: Mutex<StdRng>,
}

impl SyntheticSampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl ResourceSampler for SyntheticSampler {
    fn sample(&self) -> ResourceSample {
        let mut rng = self.rng.lock();
        ResourceSample {
            cpu_percent: rng.gen_range(20.0..100.0),
            memory_percent: rng.gen_range(30.0..100.0),
        }
    }
}

/// Always returns the same reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedSampler(pub ResourceSample);

impl FixedSampler {
    pub fn new(cpu_percent: f64, memory_percent: f64) -> Self {
        Self(ResourceSample {
            cpu_percent,
            memory_percent,
        })
    }
}

impl ResourceSampler for FixedSampler {
    fn sample(&self) -> ResourceSample {
        self.0
    }
}
