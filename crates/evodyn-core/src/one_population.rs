//! One anonymous population playing a symmetric game against itself.

use evodyn_types::{Simplex, SimplexError, TypeSet};

use crate::config::DynamicsConfig;
use crate::dynamics::{Dynamics, random_simplex, sampling_rng};
use crate::kernel::{CompensatedKernel, StepError, StepKernel};
use crate::payoff::PayoffFunction;
use crate::profile::{CacheError, PayoffCache, build_payoff_cache};

/// Symmetric dynamics: every one of `interaction_arity` slots draws from the
/// same type set, and the expected payoff of a type is averaged over the slot
/// it occupies.
#[derive(Debug)]
pub struct OnePopulation<F, K = CompensatedKernel> {
    types: TypeSet,
    interaction_arity: usize,
    config: DynamicsConfig,
    payoff: F,
    kernel: K,
    cache: Option<PayoffCache>,
}

impl<F: PayoffFunction> OnePopulation<F> {
    /// Dynamics with the default kernel. The payoff cache is built later, by
    /// the generation machine.
    pub const fn new(
        types: TypeSet,
        interaction_arity: usize,
        config: DynamicsConfig,
        payoff: F,
    ) -> Self {
        Self {
            types,
            interaction_arity,
            config,
            payoff,
            kernel: CompensatedKernel,
            cache: None,
        }
    }
}

impl<F: PayoffFunction, K: StepKernel> OnePopulation<F, K> {
    /// Swap the step kernel.
    pub fn with_kernel<K2: StepKernel>(self, kernel: K2) -> OnePopulation<F, K2> {
        OnePopulation {
            types: self.types,
            interaction_arity: self.interaction_arity,
            config: self.config,
            payoff: self.payoff,
            kernel,
            cache: self.cache,
        }
    }

    /// The type set.
    pub const fn types(&self) -> &TypeSet {
        &self.types
    }

    /// Player slots per interaction.
    pub const fn interaction_arity(&self) -> usize {
        self.interaction_arity
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

impl<F: PayoffFunction, K: StepKernel> Dynamics for OnePopulation<F, K> {
    type Population = Simplex;

    fn build_cache(&mut self) -> Result<(), CacheError> {
        if self.cache.is_none() {
            let counts = vec![self.types.len(); self.interaction_arity];
            self.cache = Some(build_payoff_cache(&counts, &self.payoff)?);
        }
        Ok(())
    }

    fn check_population(&self, population: &Simplex) -> Result<(), SimplexError> {
        population.check_dimension(self.types.len())?;
        Simplex::new(population.values().to_vec()).map(drop)
    }

    fn random_population(&self) -> Simplex {
        random_simplex(&mut sampling_rng(self.config.seed), self.types.len())
    }

    fn null_population(&self) -> Simplex {
        Simplex::zeros(self.types.len())
    }

    fn populations_equal(&self, a: &Simplex, b: &Simplex) -> bool {
        a.approx_eq(b, self.config.effective_zero)
    }

    fn step(&self, population: &Simplex) -> Result<Simplex, StepError> {
        let cache = self.cache.as_ref().ok_or(StepError::CacheMissing)?;
        let next = self
            .kernel
            .step_one(population.values(), cache, self.config.background_rate)?;
        Ok(Simplex::from_raw(next))
    }

    fn effective_zero(&self) -> f64 {
        self.config.effective_zero
    }

    fn type_sets(&self) -> &[TypeSet] {
        core::slice::from_ref(&self.types)
    }
}
