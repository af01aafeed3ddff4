//! A small agent that makes the launcher runnable without an external learner.
//!
//! The value function is a linear model fitted toward a hidden linear target,
//! every worker sees the same target since it's derived from a fixed seed.

use std::{
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
};

use agent::{Agent, Result};
use anyhow::{Context, bail, ensure};
use comms::{Base, Blob, Family};
use log::warn;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

const TARGET_SEED: u64 = 0x5eed;
const DIM: usize = 8;
const EPISODE_LEN: u64 = 32;
const LEARNING_RATE: f32 = 0.05;

/// A linear value function agent.
pub struct LinearAgent {
    v: Vec<f32>,
    target_v: Vec<f32>,
    grad: Vec<f32>,
    acc: Vec<f32>,
    samples: usize,
    truth: Vec<f32>,
    rng: StdRng,
    optimizer: bool,
    remaining: u64,
    dir: PathBuf,
}

#[derive(Serialize)]
struct Checkpoint<'a> {
    label: &'a str,
    step: u64,
    v: &'a [f32],
    target_v: &'a [f32],
    distance: f32,
}

impl LinearAgent {
    /// Creates an agent whose experience is drawn from the OS entropy source.
    ///
    /// # Arguments
    /// * `dir` - Where checkpoints are written.
    pub fn new(dir: PathBuf) -> Self {
        Self::with_rng(StdRng::from_os_rng(), dir)
    }

    /// Creates an agent with reproducible experience.
    pub fn seeded(seed: u64, dir: PathBuf) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), dir)
    }

    fn with_rng(rng: StdRng, dir: PathBuf) -> Self {
        let mut target_rng = StdRng::seed_from_u64(TARGET_SEED);
        let truth = (0..DIM).map(|_| target_rng.random_range(-1.0..1.0)).collect();

        Self {
            v: vec![0.; DIM],
            target_v: vec![0.; DIM],
            grad: vec![0.; DIM],
            acc: vec![0.; DIM],
            samples: 0,
            truth,
            rng,
            optimizer: false,
            remaining: 0,
            dir,
        }
    }

    /// The euclidean distance between the value function and the hidden target.
    pub fn distance(&self) -> f32 {
        self.v
            .iter()
            .zip(&self.truth)
            .map(|(w, t)| (w - t).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    fn encode(weights: &[f32]) -> Blob {
        Blob::new(bytemuck::cast_slice(weights).to_vec())
    }

    fn decode(blob: &Blob) -> Result<Vec<f32>> {
        let bytes = blob.as_bytes();
        ensure!(
            bytes.len() == DIM * size_of::<f32>(),
            "expected {DIM} weights, got {} bytes",
            bytes.len()
        );

        Ok(bytes
            .chunks_exact(size_of::<f32>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

impl Agent for LinearAgent {
    fn has(&self, family: Family) -> bool {
        matches!(family, Family::V | Family::TargetV)
    }

    fn params(&self, family: Family) -> Blob {
        match family {
            Family::V => Self::encode(&self.v),
            Family::TargetV => Self::encode(&self.target_v),
            _ => Blob::default(),
        }
    }

    fn set_params(&mut self, family: Family, blob: Blob) -> Result<()> {
        let weights = Self::decode(&blob).with_context(|| format!("invalid {family} weights"))?;

        match family {
            Family::V => self.v = weights,
            Family::TargetV => self.target_v = weights,
            _ => bail!("{family} isn't held by this agent"),
        }

        Ok(())
    }

    fn grads(&self, base: Base) -> Blob {
        match base {
            Base::V => Self::encode(&self.grad),
            _ => Blob::default(),
        }
    }

    fn set_grads(&mut self, base: Base, blob: Blob) {
        if base != Base::V {
            return;
        }

        match Self::decode(&blob) {
            Ok(grad) => self.grad = grad,
            Err(e) => {
                warn!("discarding gradient, the slot is zeroed: {e}");
                self.grad.fill(0.);
            }
        }
    }

    fn create_optimizer(&mut self, base: Base) -> Result<()> {
        ensure!(base == Base::V, "no {base:?} function to optimize");
        self.optimizer = true;
        Ok(())
    }

    fn train(&mut self) -> Result<()> {
        if self.samples == 0 {
            self.grad.fill(0.);
            return Ok(());
        }

        let n = self.samples as f32;
        for (g, a) in self.grad.iter_mut().zip(&mut self.acc) {
            *g = *a / n;
            *a = 0.;
        }

        self.samples = 0;
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        if !self.optimizer {
            return Ok(());
        }

        for (w, g) in self.v.iter_mut().zip(&self.grad) {
            *w -= LEARNING_RATE * g;
        }

        Ok(())
    }

    fn step(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }

        let x: Vec<f32> = (0..DIM).map(|_| self.rng.random_range(-1.0..1.0)).collect();
        let dot = |w: &[f32]| w.iter().zip(&x).map(|(w, x)| w * x).sum::<f32>();
        let err = dot(&self.v) - dot(&self.truth);

        for (a, x) in self.acc.iter_mut().zip(&x) {
            *a += err * x;
        }

        self.samples += 1;
        self.remaining -= 1;
        Ok(true)
    }

    fn start_new_game(&mut self) -> Result<()> {
        self.remaining = EPISODE_LEN;
        Ok(())
    }

    fn update_target_func(&mut self) -> Result<()> {
        self.target_v.clone_from(&self.v);
        Ok(())
    }

    fn save(&mut self, label: &str, step: u64) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(format!("{label}{step}.json"));
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;

        let checkpoint = Checkpoint {
            label,
            step,
            v: &self.v,
            target_v: &self.target_v,
            distance: self.distance(),
        };

        serde_json::to_writer_pretty(BufWriter::new(file), &checkpoint)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(seed: u64) -> LinearAgent {
        LinearAgent::seeded(seed, std::env::temp_dir().join("asyn_train_demo"))
    }

    #[test]
    fn params_move_between_agents() {
        let mut a = agent(1);
        let mut b = agent(2);
        a.v = (0..DIM).map(|i| i as f32).collect();

        b.set_params(Family::V, a.params(Family::V)).unwrap();
        assert_eq!(b.v, a.v);
    }

    #[test]
    fn malformed_blobs_are_rejected() {
        let mut a = agent(1);
        assert!(a.set_params(Family::V, Blob::new(vec![0; 3])).is_err());
        assert!(a.set_params(Family::Q, a.params(Family::V)).is_err());
    }

    #[test]
    fn malformed_gradient_zeroes_the_slot() -> Result<()> {
        let mut a = agent(5);
        a.create_optimizer(Base::V)?;
        a.set_grads(Base::V, LinearAgent::encode(&[1.; DIM]));
        a.set_grads(Base::V, Blob::new(vec![0; 5]));

        let before = a.v.clone();
        a.update()?;

        assert_eq!(a.grads(Base::V), LinearAgent::encode(&[0.; DIM]));
        assert_eq!(a.v, before);
        Ok(())
    }

    #[test]
    fn training_approaches_the_target() -> Result<()> {
        let mut a = agent(7);
        a.create_optimizer(Base::V)?;
        let start = a.distance();

        for _ in 0..200 {
            a.start_new_game()?;
            while a.step()? {}
            a.train()?;
            a.update()?;
        }

        assert!(a.distance() < start / 2.);
        Ok(())
    }

    #[test]
    fn checkpoints_are_json() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("asyn_train_ckpt_{}", std::process::id()));
        let mut a = LinearAgent::seeded(3, dir.clone());
        a.save("test", 42)?;

        let text = fs::read_to_string(dir.join("test42.json"))?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(json["step"], 42);
        assert_eq!(json["v"].as_array().map(Vec::len), Some(DIM));

        fs::remove_dir_all(dir)?;
        Ok(())
    }
}
