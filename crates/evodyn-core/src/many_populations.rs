//! Several populations, one per player role.
//!
//! Slot `k` of every profile is filled from population `k`, and population
//! `k` is scored only on slot `k`. Populations may have different numbers of
//! types; the kernel sees them through [`PaddedFrequencies`].

use evodyn_types::{PopulationSet, Simplex, SimplexError, TypeSet};

use crate::config::DynamicsConfig;
use crate::dynamics::{Dynamics, random_simplex, sampling_rng};
use crate::kernel::{CompensatedKernel, PaddedFrequencies, StepError, StepKernel};
use crate::payoff::PayoffFunction;
use crate::profile::{CacheError, PayoffCache, build_payoff_cache};

/// Asymmetric dynamics over one type set per population.
#[derive(Debug)]
pub struct ManyPopulations<F, K = CompensatedKernel> {
    types: Vec<TypeSet>,
    config: DynamicsConfig,
    payoff: F,
    kernel: K,
    cache: Option<PayoffCache>,
}

impl<F: PayoffFunction> ManyPopulations<F> {
    /// Dynamics with the default kernel.
    pub const fn new(types: Vec<TypeSet>, config: DynamicsConfig, payoff: F) -> Self {
        Self {
            types,
            config,
            payoff,
            kernel: CompensatedKernel,
            cache: None,
        }
    }
}

impl<F: PayoffFunction, K: StepKernel> ManyPopulations<F, K> {
    /// Swap the step kernel.
    pub fn with_kernel<K2: StepKernel>(self, kernel: K2) -> ManyPopulations<F, K2> {
        ManyPopulations {
            types: self.types,
            config: self.config,
            payoff: self.payoff,
            kernel,
            cache: self.cache,
        }
    }

    /// Number of populations.
    pub const fn populations(&self) -> usize {
        self.types.len()
    }

    /// Replicator parameters.
    pub const fn config(&self) -> &DynamicsConfig {
        &self.config
    }

    /// The step kernel.
    pub const fn kernel(&self) -> &K {
        &self.kernel
    }

    /// The payoff cache, once built.
    pub const fn cache(&self) -> Option<&PayoffCache> {
        self.cache.as_ref()
    }
}

impl<F: PayoffFunction, K: StepKernel> Dynamics for ManyPopulations<F, K> {
    type Population = PopulationSet;

    fn build_cache(&mut self) -> Result<(), CacheError> {
        if self.cache.is_none() {
            let counts: Vec<usize> = self.types.iter().map(TypeSet::len).collect();
            self.cache = Some(build_payoff_cache(&counts, &self.payoff)?);
        }
        Ok(())
    }

    fn check_population(&self, population: &PopulationSet) -> Result<(), SimplexError> {
        if population.len() != self.types.len() {
            return Err(SimplexError::PopulationCount {
                expected: self.types.len(),
                actual: population.len(),
            });
        }
        for (simplex, types) in population.iter().zip(&self.types) {
            simplex.check_dimension(types.len())?;
            Simplex::new(simplex.values().to_vec())?;
        }
        Ok(())
    }

    fn random_population(&self) -> PopulationSet {
        let mut rng = sampling_rng(self.config.seed);
        self.types
            .iter()
            .map(|types| random_simplex(&mut rng, types.len()))
            .collect()
    }

    fn null_population(&self) -> PopulationSet {
        self.types
            .iter()
            .map(|types| Simplex::zeros(types.len()))
            .collect()
    }

    fn populations_equal(&self, a: &PopulationSet, b: &PopulationSet) -> bool {
        a.approx_eq(b, self.config.effective_zero)
    }

    fn step(&self, population: &PopulationSet) -> Result<PopulationSet, StepError> {
        let cache = self.cache.as_ref().ok_or(StepError::CacheMissing)?;
        let padded = PaddedFrequencies::from_populations(population);
        let next = self
            .kernel
            .step_many(&padded, cache, self.config.background_rate)?;
        Ok(next.to_populations())
    }

    fn effective_zero(&self) -> f64 {
        self.config.effective_zero
    }

    fn type_sets(&self) -> &[TypeSet] {
        &self.types
    }
}
