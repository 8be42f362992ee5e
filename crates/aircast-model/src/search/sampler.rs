//! Proposal of trial parameters.

use super::space::{Dimension, HyperParams, N_DIMENSIONS, SearchSpace};
use super::study::{Study, Trial};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution as _;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::fmt::Debug;

/// Proposes the parameters of the next trial from the trials so far.
pub trait Sampler: Debug + Send + Sync {
    /// Propose one point of `space`.
    fn sample(&mut self, space: &SearchSpace, study: &Study) -> HyperParams;
}

fn uniform_point(space: &SearchSpace, rng: &mut StdRng) -> HyperParams {
    let dims = space.dimensions();
    HyperParams::from_values(std::array::from_fn(|i| dims[i].distribution.sample_uniform(rng)))
}

/// Independent uniform sampling.
#[derive(Debug)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    /// Create a seeded sampler.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, space: &SearchSpace, _study: &Study) -> HyperParams {
        uniform_point(space, &mut self.rng)
    }
}

/// Tree-structured Parzen estimator.
///
/// Finished trials are split into a good set (the best `gamma(n)` completed
/// trials) and a bad set (the remaining completed trials plus pruned ones).
/// Each dimension gets one Parzen estimator per set; candidates are drawn
/// from the good estimator and the one maximizing `l(x) / g(x)` is proposed.
/// Dimensions are modelled independently.
#[derive(Debug)]
pub struct TpeSampler {
    rng: StdRng,
    n_startup_trials: usize,
    n_candidates: usize,
    gamma: f64,
    max_good: usize,
}

impl TpeSampler {
    /// Create a seeded sampler with 10 random startup trials, 24 candidates
    /// and `gamma(n) = min(ceil(0.1 n), 25)`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            n_startup_trials: 10,
            n_candidates: 24,
            gamma: 0.1,
            max_good: 25,
        }
    }

    /// Set the number of uniformly sampled trials before modelling starts.
    pub const fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set the number of candidates scored per proposal.
    pub const fn with_n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n;
        self
    }

    /// Set the fraction of completed trials forming the good set.
    pub const fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    fn n_good(&self, n_completed: usize) -> usize {
        ((self.gamma * n_completed as f64).ceil() as usize).min(self.max_good)
    }

    fn split<'a>(&self, study: &'a Study) -> (Vec<&'a Trial>, Vec<&'a Trial>) {
        let mut completed: Vec<&Trial> = study.completed().collect();
        completed.sort_by(|a, b| {
            a.value()
                .unwrap_or(f64::INFINITY)
                .total_cmp(&b.value().unwrap_or(f64::INFINITY))
        });
        let n_good = self.n_good(completed.len());
        let bad_completed = completed.split_off(n_good);
        let bad = bad_completed.into_iter().chain(study.pruned()).collect();
        (completed, bad)
    }

    fn sample_dimension(&mut self, dim: &Dimension, good: &[f64], bad: &[f64]) -> f64 {
        let (low, high) = dim.distribution.bounds();
        let l = ParzenEstimator::new(good, low, high);
        let g = ParzenEstimator::new(bad, low, high);

        let mut best = None;
        for _ in 0..self.n_candidates.max(1) {
            let x = l.sample(&mut self.rng);
            let score = l.log_pdf(x) - g.log_pdf(x);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((x, score));
            }
        }
        let x = best.map_or_else(|| dim.distribution.sample_uniform(&mut self.rng), |(x, _)| x);
        dim.distribution.snap(x)
    }
}

impl Sampler for TpeSampler {
    fn sample(&mut self, space: &SearchSpace, study: &Study) -> HyperParams {
        let finished = study.completed().count() + study.pruned().count();
        if finished < self.n_startup_trials {
            return uniform_point(space, &mut self.rng);
        }
        let (good, bad) = self.split(study);
        if good.is_empty() {
            return uniform_point(space, &mut self.rng);
        }

        let good: Vec<[f64; N_DIMENSIONS]> = good.iter().map(|t| t.params.to_values()).collect();
        let bad: Vec<[f64; N_DIMENSIONS]> = bad.iter().map(|t| t.params.to_values()).collect();

        let dims = space.dimensions();
        let mut values = [0.0; N_DIMENSIONS];
        for (i, dim) in dims.iter().enumerate() {
            let good_i: Vec<f64> = good.iter().map(|v| v[i]).collect();
            let bad_i: Vec<f64> = bad.iter().map(|v| v[i]).collect();
            values[i] = self.sample_dimension(dim, &good_i, &bad_i);
        }
        HyperParams::from_values(values)
    }
}

/// Mixture of normals truncated to `[low, high]`, one per observation plus
/// a wide prior centred on the range.
#[derive(Debug)]
struct ParzenEstimator {
    low: f64,
    high: f64,
    components: Vec<Component>,
}

#[derive(Debug)]
struct Component {
    weight: f64,
    mu: f64,
    sigma: f64,
    normal: Normal,
    log_mass: f64,
}

impl ParzenEstimator {
    fn new(observations: &[f64], low: f64, high: f64) -> Self {
        let width = high - low;
        let prior_mu = 0.5 * (low + high);

        let mut mus: Vec<f64> = observations.iter().map(|x| x.clamp(low, high)).collect();
        mus.push(prior_mu);
        let mut order: Vec<usize> = (0..mus.len()).collect();
        order.sort_by(|&a, &b| mus[a].total_cmp(&mus[b]));

        // bandwidth: distance to the farther sorted neighbour, range ends included
        let min_sigma = width / (1.0 + observations.len() as f64).min(100.0);
        let mut sigmas = vec![width; mus.len()];
        for (rank, &i) in order.iter().enumerate() {
            let left = if rank == 0 { low } else { mus[order[rank - 1]] };
            let right = if rank + 1 == order.len() { high } else { mus[order[rank + 1]] };
            sigmas[i] = (mus[i] - left).max(right - mus[i]).clamp(min_sigma, width);
        }
        let prior = mus.len() - 1;
        sigmas[prior] = width;

        let weight = 1.0 / mus.len() as f64;
        let components = mus
            .iter()
            .zip(&sigmas)
            .filter_map(|(&mu, &sigma)| {
                let normal = Normal::new(mu, sigma).ok()?;
                let mass = normal.cdf(high) - normal.cdf(low);
                (mass > 0.0).then(|| Component {
                    weight,
                    mu,
                    sigma,
                    normal,
                    log_mass: mass.ln(),
                })
            })
            .collect();

        Self { low, high, components }
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let terms: Vec<f64> = self
            .components
            .iter()
            .map(|c| c.weight.ln() + c.normal.ln_pdf(x) - c.log_mass)
            .collect();
        log_sum_exp(&terms)
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.components.is_empty() {
            return rng.gen_range(self.low..=self.high);
        }
        let total: f64 = self.components.iter().map(|c| c.weight).sum();
        let mut pick = rng.gen_range(0.0..total);
        let component = self
            .components
            .iter()
            .find(|c| {
                pick -= c.weight;
                pick < 0.0
            })
            .unwrap_or(&self.components[self.components.len() - 1]);

        // rejection sampling from the truncated normal
        if let Ok(normal) = rand_distr::Normal::new(component.mu, component.sigma) {
            for _ in 0..100 {
                let x = normal.sample(rng);
                if (self.low..=self.high).contains(&x) {
                    return x;
                }
            }
        }
        component.mu.clamp(self.low, self.high)
    }
}

fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
}
