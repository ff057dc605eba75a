//! Synthetic firms and the generator which draws them from the parameter distributions.
use crate::distribution::{ParameterDistribution, Sampler};
use crate::error::ValidationIssue;
use crate::id::FirmID;
use crate::parameters::ModelParameters;
use crate::sector::{Sector, SectorMap};
use crate::units::{Money, MoneyPerWorker};
use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand_chacha::ChaCha8Rng;

/// A synthetic firm
#[derive(Debug, Clone, PartialEq)]
pub struct Firm {
    /// Sequential identifier, starting at 1
    pub id: FirmID,
    /// The firm's sector
    pub sector: Sector,
    /// Average daily wage per worker (W)
    pub wage: MoneyPerWorker,
    /// Number of workers (N)
    pub workers: u32,
    /// Baseline daily revenue
    pub base_revenue: Money,
    /// Baseline daily non-labour cost
    pub base_cost: Money,
    /// Maximum sellable revenue in a day (K)
    pub capacity: Money,
    /// Cost of granting substitute rest for working the holiday (H)
    pub substitute_rest_cost: Money,
    /// Cost of making up the hours of an adopted bridge day (Hcomp)
    pub compensation_cost: Money,
}

impl Firm {
    /// The firm's daily payroll (N * W)
    pub fn payroll(&self) -> Money {
        self.wage.for_workers(self.workers)
    }

    /// Check the firm's attributes are consistent, returning the first problem found
    pub fn validate(&self) -> Result<(), ValidationIssue> {
        let positive = [
            ("wage", self.wage.value()),
            ("workers", f64::from(self.workers)),
            ("base_revenue", self.base_revenue.value()),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationIssue::NonPositive { field, value });
            }
        }

        let non_negative = [
            ("base_cost", self.base_cost),
            ("capacity", self.capacity),
            ("substitute_rest_cost", self.substitute_rest_cost),
            ("compensation_cost", self.compensation_cost),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= Money(0.0)) {
                return Err(ValidationIssue::Negative {
                    field,
                    value: value.value(),
                });
            }
        }

        if self.capacity < self.base_revenue {
            return Err(ValidationIssue::CapacityBelowBaseRevenue {
                capacity: self.capacity.value(),
                base_revenue: self.base_revenue.value(),
            });
        }

        Ok(())
    }
}

/// Samplers for the attributes of firms in one sector
#[derive(Debug, Clone)]
struct SectorSamplers {
    wage: Sampler,
    workers: Sampler,
    revenue: Sampler,
    cost_ratio: Sampler,
    capacity_multiplier: Sampler,
    substitute_rest_factor: Sampler,
    compensation_factor: Sampler,
}

impl SectorSamplers {
    /// Create the samplers for `sector` from the parameter distributions
    fn new(params: &ModelParameters, sector: Sector) -> Result<Self> {
        let sampler = |table: &SectorMap<ParameterDistribution>, name: &str| {
            table
                .get(&sector)
                .with_context(|| format!("No {name} distribution for sector {sector}"))
                .and_then(ParameterDistribution::sampler)
        };

        let gen_params = &params.firm_generation;
        let policy = &params.policy_costs;
        Ok(Self {
            wage: sampler(&gen_params.wage, "wage")?,
            workers: sampler(&gen_params.workers, "workers")?,
            revenue: sampler(&gen_params.revenue, "revenue")?,
            cost_ratio: sampler(&gen_params.cost_ratio, "cost_ratio")?,
            capacity_multiplier: sampler(&gen_params.capacity_multiplier, "capacity_multiplier")?,
            substitute_rest_factor: sampler(&policy.substitute_rest_factor, "substitute_rest_factor")?,
            compensation_factor: sampler(&policy.compensation_factor, "compensation_factor")?,
        })
    }

    /// Draw the attributes of a single firm
    fn draw(&self, id: FirmID, sector: Sector, rng: &mut ChaCha8Rng) -> Firm {
        let wage = MoneyPerWorker(self.wage.sample(rng));
        // Headcount is truncated towards zero
        let workers = self.workers.sample(rng) as u32;
        let base_revenue = Money(self.revenue.sample(rng));
        let cost_ratio = self.cost_ratio.sample(rng);
        let capacity_multiplier = self.capacity_multiplier.sample(rng);
        let substitute_rest_factor = self.substitute_rest_factor.sample(rng);
        let compensation_factor = self.compensation_factor.sample(rng);

        let payroll = wage.for_workers(workers);
        Firm {
            id,
            sector,
            wage,
            workers,
            base_revenue,
            base_cost: Money(base_revenue.value() * cost_ratio),
            capacity: Money(base_revenue.value() * capacity_multiplier),
            substitute_rest_cost: Money(payroll.value() * substitute_rest_factor),
            compensation_cost: Money(payroll.value() * compensation_factor),
        }
    }
}

/// Draws populations of synthetic firms
#[derive(Debug, Clone)]
pub struct FirmGenerator {
    sectors: Vec<Sector>,
    sector_index: WeightedIndex<f64>,
    samplers: Vec<SectorSamplers>,
}

impl FirmGenerator {
    /// Create a generator for the modelled sectors of the given (validated) parameters
    pub fn new(params: &ModelParameters) -> Result<Self> {
        let sectors = params.modelled_sectors();
        let weights = sectors.iter().map(|sector| params.sector_weights[sector]);
        let sector_index = WeightedIndex::new(weights)
            .map_err(|err| anyhow!("Invalid sector weights: {err}"))?;
        let samplers = sectors
            .iter()
            .map(|sector| SectorSamplers::new(params, *sector))
            .collect::<Result<_>>()?;

        Ok(Self {
            sectors,
            sector_index,
            samplers,
        })
    }

    /// Generate a population of firms.
    ///
    /// The population depends only on `num_firms`, `seed` and the parameters the generator was
    /// created with.
    pub fn generate(&self, num_firms: u32, seed: u64) -> Vec<Firm> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (1..=num_firms)
            .map(|id| {
                let idx = self.sector_index.sample(&mut rng);
                self.samplers[idx].draw(FirmID(id), self.sectors[idx], &mut rng)
            })
            .collect()
    }
}
