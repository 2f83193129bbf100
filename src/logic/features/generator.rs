//! Synthetic traffic generator
//!
//! Draws feature vectors for the two traffic regimes and blends them
//! according to the shared attack state.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::vector::{FeatureVector, Regime, TrafficSample};

/// Probability that an active attack shows up in a given sample
pub const ATTACK_VISIBILITY: f64 = 0.7;

/// Intensity added per escalation step
pub const ESCALATION_STEP: f64 = 0.2;

const BENIGN_POOL_SIZE: usize = 100;
const ATTACKER_POOL_SIZE: usize = 50;

// ============================================================================
// ATTACK STATE
// ============================================================================

/// Snapshot of the simulated attack
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AttackState {
    pub active: bool,
    pub intensity: f64,
}

/// Attack-state control shared by every stream of one service context
#[derive(Debug, Default)]
pub struct AttackControl {
    state: Mutex<AttackState>,
}

impl AttackControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the attack at the given intensity, clamped to [0, 1]
    pub fn start(&self, intensity: f64) -> AttackState {
        let mut state = self.state.lock();
        state.active = true;
        state.intensity = intensity.clamp(0.0, 1.0);
        *state
    }

    pub fn stop(&self) -> AttackState {
        let mut state = self.state.lock();
        *state = AttackState::default();
        *state
    }

    /// Raise intensity by one step, capped at 1.0. No-op while inactive.
    pub fn escalate(&self) -> AttackState {
        let mut state = self.state.lock();
        if state.active {
            state.intensity = (state.intensity + ESCALATION_STEP).min(1.0);
        }
        *state
    }

    pub fn snapshot(&self) -> AttackState {
        *self.state.lock()
    }
}

// ============================================================================
// GENERATOR
// ============================================================================

/// Seedable traffic generator, one per stream session
pub struct FeatureGenerator {
    rng: StdRng,
    benign_pool: Vec<String>,
    attacker_pool: Vec<String>,
}

impl FeatureGenerator {
    /// Generator with a fixed seed; identical seeds give identical streams
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let benign_pool = (0..BENIGN_POOL_SIZE)
            .map(|_| format!("192.168.{}.{}", rng.gen_range(1..=255), rng.gen_range(1..=255)))
            .collect();
        let attacker_pool = (0..ATTACKER_POOL_SIZE)
            .map(|_| format!("10.0.{}.{}", rng.gen_range(1..=255), rng.gen_range(1..=255)))
            .collect();

        Self { rng, benign_pool, attacker_pool }
    }

    /// Normal cloud traffic
    pub fn sample_normal(&mut self) -> TrafficSample {
        let v = self.normal_vector();
        let source_ip = pick(&mut self.rng, &self.benign_pool);
        build_sample(v, source_ip, Regime::Normal)
    }

    /// Flood traffic; `intensity` scales the packet rate
    pub fn sample_attack(&mut self, intensity: f64) -> TrafficSample {
        let rng = &mut self.rng;
        let v = FeatureVector::from_values([
            gaussian(rng, 500.0 * intensity, 100.0),
            gaussian(rng, 0.05, 0.02),
            gaussian(rng, 0.9, 0.05),
            rng.gen_range(1.0..3.0),
            gaussian(rng, 0.95, 0.03),
            gaussian(rng, 50.0, 10.0),
        ]);
        let source_ip = pick(&mut self.rng, &self.attacker_pool);
        build_sample(v, source_ip, Regime::Attack)
    }

    /// Blended sample: attack regime with `ATTACK_VISIBILITY` while active
    pub fn sample(&mut self, attack_active: bool, intensity: f64) -> TrafficSample {
        if attack_active && self.rng.gen_bool(ATTACK_VISIBILITY) {
            self.sample_attack(intensity)
        } else {
            self.sample_normal()
        }
    }

    /// Sample against a shared attack state
    pub fn sample_with(&mut self, state: AttackState) -> TrafficSample {
        self.sample(state.active, state.intensity)
    }

    /// Normal-regime vectors for scorer training
    pub fn training_data(&mut self, n_samples: usize) -> Vec<FeatureVector> {
        (0..n_samples).map(|_| self.normal_vector()).collect()
    }

    fn normal_vector(&mut self) -> FeatureVector {
        let rng = &mut self.rng;
        FeatureVector::from_values([
            gaussian(rng, 50.0, 10.0),
            gaussian(rng, 0.3, 0.1),
            gaussian(rng, 0.4, 0.1),
            rng.gen_range(1.0..10.0),
            gaussian(rng, 0.5, 0.1),
            gaussian(rng, 100.0, 20.0),
        ])
    }
}

fn gaussian(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    Normal::new(mean, std_dev)
        .map(|dist| dist.sample(rng))
        .unwrap_or(mean)
}

fn pick(rng: &mut StdRng, pool: &[String]) -> String {
    pool.choose(rng).cloned().unwrap_or_default()
}

fn build_sample(v: FeatureVector, source_ip: String, regime: Regime) -> TrafficSample {
    let [packet_rate, ip_entropy, syn_ratio, unique_ips, protocol_ratio, avg_packet_size] = v.values;
    TrafficSample {
        packet_rate,
        ip_entropy,
        syn_ratio,
        unique_ips,
        protocol_ratio,
        avg_packet_size,
        source_ip,
        timestamp: Utc::now(),
        regime,
    }
}
