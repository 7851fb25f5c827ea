//! Brain capability and the convolutional brain goopies ship with.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::vision::{Channel, PerceptionBuffer};

/// Errors raised when moving parameters between brains.
#[derive(Debug, Error, PartialEq)]
pub enum BrainError {
    #[error("snapshot is for vision width {found}, brain expects {expected}")]
    WidthMismatch { expected: usize, found: usize },
    #[error("snapshot holds {found} parameters, brain expects {expected}")]
    ParameterCount { expected: usize, found: usize },
}

/// Motion command produced by a brain. Both values lie in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorCommand {
    pub turn: f32,
    pub thrust: f32,
}

/// Serializable parameter record of a brain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainSnapshot {
    pub width: usize,
    pub parameters: Vec<f32>,
}

/// Decision-making capability owned by each goopie.
pub trait Brain: Send + Sync + fmt::Debug {
    /// Map perception plus internal scalars to a motion command.
    fn evaluate(&self, perception: &PerceptionBuffer, energy: f32, speed: f32) -> MotorCommand;

    /// Perturb parameters in place: each one independently with probability `probability`,
    /// by zero-mean gaussian noise of standard deviation `amount`.
    fn mutate(&mut self, rng: &mut dyn RngCore, probability: f32, amount: f32);

    fn snapshot(&self) -> BrainSnapshot;

    fn load_snapshot(&mut self, snapshot: &BrainSnapshot) -> Result<(), BrainError>;

    fn clone_box(&self) -> Box<dyn Brain>;

    fn clone_parameters_from(&mut self, other: &dyn Brain) -> Result<(), BrainError> {
        self.load_snapshot(&other.snapshot())
    }
}

impl Clone for Box<dyn Brain> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Standard normal sample via Box-Muller.
pub fn gaussian(rng: &mut dyn RngCore) -> f32 {
    let u1 = 1.0 - rng.gen_range(0.0f32..1.0);
    let u2 = rng.gen_range(0.0f32..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// Bernoulli-masked gaussian perturbation over a flat parameter slice.
/// Returns how many parameters were touched.
pub fn mutate_parameters(
    parameters: &mut [f32],
    rng: &mut dyn RngCore,
    probability: f32,
    amount: f32,
) -> usize {
    let probability = f64::from(probability.clamp(0.0, 1.0));
    let mut mutated = 0;
    for parameter in parameters.iter_mut() {
        if rng.gen_bool(probability) {
            *parameter += gaussian(rng) * amount;
            mutated += 1;
        }
    }
    mutated
}

/// 1x1 convolution across the three channels, average pooling by two, then a dense layer
/// over the pooled vision plus `[energy, speed]` squashed by `tanh`.
///
/// Parameters are stored flat: conv weights (3), conv bias (1), dense weights
/// (2 x inputs, row-major), dense biases (2).
#[derive(Debug, Clone, PartialEq)]
pub struct ConvBrain {
    width: usize,
    parameters: Vec<f32>,
}

impl ConvBrain {
    const CONV_WEIGHTS: usize = Channel::COUNT;
    const CONV_LEN: usize = Self::CONV_WEIGHTS + 1;
    const OUTPUTS: usize = 2;

    pub fn parameter_count(width: usize) -> usize {
        Self::CONV_LEN + Self::OUTPUTS * Self::dense_inputs(width) + Self::OUTPUTS
    }

    fn dense_inputs(width: usize) -> usize {
        width / 2 + 2
    }

    /// Uniform init in ±1/sqrt(fan_in) per layer.
    pub fn random(width: usize, rng: &mut dyn RngCore) -> Self {
        let conv_bound = 1.0 / (Self::CONV_WEIGHTS as f32).sqrt();
        let dense_bound = 1.0 / (Self::dense_inputs(width) as f32).sqrt();
        let parameters = (0..Self::parameter_count(width))
            .map(|i| {
                let bound = if i < Self::CONV_LEN { conv_bound } else { dense_bound };
                rng.gen_range(-bound..=bound)
            })
            .collect();
        Self { width, parameters }
    }

    pub fn from_snapshot(snapshot: &BrainSnapshot) -> Result<Self, BrainError> {
        let expected = Self::parameter_count(snapshot.width);
        if snapshot.parameters.len() != expected {
            return Err(BrainError::ParameterCount {
                expected,
                found: snapshot.parameters.len(),
            });
        }
        Ok(Self {
            width: snapshot.width,
            parameters: snapshot.parameters.clone(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn parameters(&self) -> &[f32] {
        &self.parameters
    }
}

impl Brain for ConvBrain {
    fn evaluate(&self, perception: &PerceptionBuffer, energy: f32, speed: f32) -> MotorCommand {
        let (conv, dense) = self.parameters.split_at(Self::CONV_LEN);
        let inputs = Self::dense_inputs(self.width);
        let (weights, biases) = dense.split_at(Self::OUTPUTS * inputs);

        let width = self.width.min(perception.width());
        let convolved: Vec<f32> = (0..width)
            .map(|i| {
                Channel::ALL
                    .iter()
                    .map(|c| conv[c.index()] * perception.cell(*c, i))
                    .sum::<f32>()
                    + conv[Self::CONV_WEIGHTS]
            })
            .collect();

        let mut features: Vec<f32> = convolved
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect();
        features.resize(inputs - 2, 0.0);
        features.push(energy);
        features.push(speed);

        let mut outputs = [0.0f32; Self::OUTPUTS];
        for (k, output) in outputs.iter_mut().enumerate() {
            let row = &weights[k * inputs..(k + 1) * inputs];
            let sum: f32 = row.iter().zip(&features).map(|(w, x)| w * x).sum();
            *output = (sum + biases[k]).tanh();
        }

        MotorCommand {
            turn: outputs[0],
            thrust: outputs[1],
        }
    }

    fn mutate(&mut self, rng: &mut dyn RngCore, probability: f32, amount: f32) {
        mutate_parameters(&mut self.parameters, rng, probability, amount);
    }

    fn snapshot(&self) -> BrainSnapshot {
        BrainSnapshot {
            width: self.width,
            parameters: self.parameters.clone(),
        }
    }

    fn load_snapshot(&mut self, snapshot: &BrainSnapshot) -> Result<(), BrainError> {
        if snapshot.width != self.width {
            return Err(BrainError::WidthMismatch {
                expected: self.width,
                found: snapshot.width,
            });
        }
        if snapshot.parameters.len() != self.parameters.len() {
            return Err(BrainError::ParameterCount {
                expected: self.parameters.len(),
                found: snapshot.parameters.len(),
            });
        }
        self.parameters.copy_from_slice(&snapshot.parameters);
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Brain> {
        Box::new(self.clone())
    }
}
