//! Demand and cost shocks, and the revenue and non-labour cost they produce on a modelled day.
use crate::calendar::DayType;
use crate::error::ConfigError;
use crate::firm::Firm;
use crate::parameters::ModelParameters;
use crate::sector::Sector;
use crate::units::{Dimensionless, Money};
use anyhow::Result;
use indexmap::IndexMap;

/// Fractional shocks for one sector on one day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayShock {
    /// Change in demand relative to baseline revenue (ΔD)
    pub demand: f64,
    /// Change in non-labour cost relative to baseline (ΔC)
    pub cost: f64,
}

impl DayShock {
    /// The factor applied to baseline revenue, clamped so it is never negative
    pub fn demand_factor(&self) -> Dimensionless {
        Dimensionless(1.0 + self.demand).max(Dimensionless(0.0))
    }

    /// The factor applied to baseline non-labour cost, clamped so it is never negative
    pub fn cost_factor(&self) -> Dimensionless {
        Dimensionless(1.0 + self.cost).max(Dimensionless(0.0))
    }
}

/// Shocks keyed by sector and day type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShockTable(IndexMap<(Sector, DayType), DayShock>);

impl ShockTable {
    /// Build the table from the parameters.
    ///
    /// A (sector, day type) pair is only included if both a demand and a cost shock are given.
    pub fn from_parameters(params: &ModelParameters) -> Self {
        let mut table = Self::default();
        for day_type in DayType::MODELLED {
            let (Some(demand), Some(cost)) = (
                params.demand_shocks.for_day(day_type),
                params.cost_shocks.for_day(day_type),
            ) else {
                continue;
            };

            for (sector, demand) in demand {
                if let Some(cost) = cost.get(sector) {
                    table.insert(
                        *sector,
                        day_type,
                        DayShock {
                            demand: *demand,
                            cost: *cost,
                        },
                    );
                }
            }
        }

        table
    }

    /// Add or replace a shock
    pub fn insert(&mut self, sector: Sector, day_type: DayType, shock: DayShock) {
        self.0.insert((sector, day_type), shock);
    }

    /// Look up the shock for a sector on a day.
    ///
    /// A missing entry is a configuration error.
    pub fn get(&self, sector: Sector, day_type: DayType) -> Result<DayShock> {
        match self.0.get(&(sector, day_type)) {
            Some(shock) => Ok(*shock),
            None => Err(ConfigError::MissingShock { sector, day_type }.into()),
        }
    }
}

/// What a firm would sell and spend (excluding labour) by operating on a given day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayOutcome {
    /// Observed revenue, capped at the firm's capacity
    pub revenue: Money,
    /// Observed non-labour cost
    pub cost: Money,
}

/// Compute a firm's observed revenue and non-labour cost for a modelled day.
///
/// Revenue is `min(R_base * (1 + ΔD), K)` and cost is `C_base * (1 + ΔC)`, with `1 + Δ` clamped to
/// zero when a shock is below -1.
///
/// # Arguments
///
/// * `firm` - The firm
/// * `day_type` - The modelled day
/// * `shocks` - Shocks for each sector and day type
pub fn compute_day_outcome(firm: &Firm, day_type: DayType, shocks: &ShockTable) -> Result<DayOutcome> {
    let shock = shocks.get(firm.sector, day_type)?;
    Ok(DayOutcome {
        revenue: (firm.base_revenue * shock.demand_factor()).min(firm.capacity),
        cost: firm.base_cost * shock.cost_factor(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{firm, model_parameters};
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    /// A table holding just the given shock for lodging on the holiday
    fn lodging_holiday(demand: f64, cost: f64) -> ShockTable {
        let mut shocks = ShockTable::default();
        shocks.insert(Sector::Lodging, DayType::Holiday, DayShock { demand, cost });
        shocks
    }

    #[fixture]
    fn shocks() -> ShockTable {
        lodging_holiday(0.1, 0.05)
    }

    #[rstest]
    fn test_compute_day_outcome(firm: Firm, shocks: ShockTable) {
        let outcome = compute_day_outcome(&firm, DayType::Holiday, &shocks).unwrap();
        assert_approx_eq!(Money, outcome.revenue, Money(1100.0));
        assert_approx_eq!(Money, outcome.cost, Money(420.0));
    }

    #[rstest]
    fn test_compute_day_outcome_capacity_clamp(mut firm: Firm) {
        firm.base_revenue = Money(100.0);
        firm.capacity = Money(110.0);
        let outcome =
            compute_day_outcome(&firm, DayType::Holiday, &lodging_holiday(0.5, 0.0)).unwrap();
        assert_eq!(outcome.revenue, Money(110.0));
    }

    #[rstest]
    fn test_compute_day_outcome_negative_factor_clamped(firm: Firm) {
        let outcome =
            compute_day_outcome(&firm, DayType::Holiday, &lodging_holiday(-1.5, -2.0)).unwrap();
        assert_eq!(outcome.revenue, Money(0.0));
        assert_eq!(outcome.cost, Money(0.0));
    }

    #[rstest]
    fn test_compute_day_outcome_missing_shock(firm: Firm, shocks: ShockTable) {
        let err = compute_day_outcome(&firm, DayType::Bridge, &shocks).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingShock {
                sector: Sector::Lodging,
                day_type: DayType::Bridge
            })
        );
    }

    #[rstest]
    fn test_revenue_monotonic_in_demand(firm: Firm) {
        let revenues: Vec<_> = (-20..=20)
            .map(|i| {
                let shocks = lodging_holiday(f64::from(i) * 0.1, 0.0);
                compute_day_outcome(&firm, DayType::Holiday, &shocks)
                    .unwrap()
                    .revenue
            })
            .collect();

        for pair in revenues.windows(2) {
            assert!(pair[1] >= pair[0]);
        }

        // Flat once capacity is reached
        assert_eq!(*revenues.last().unwrap(), firm.capacity);
    }

    #[rstest]
    fn test_from_parameters(model_parameters: ModelParameters) {
        let shocks = ShockTable::from_parameters(&model_parameters);
        let shock = shocks.get(Sector::Retail, DayType::Holiday).unwrap();
        assert_eq!(
            shock,
            DayShock {
                demand: model_parameters.demand_shocks.holiday[&Sector::Retail],
                cost: model_parameters.cost_shocks.holiday[&Sector::Retail]
            }
        );
        assert!(shocks.get(Sector::Transport, DayType::Holiday).is_err());
        assert!(shocks.get(Sector::Retail, DayType::Ordinary).is_err());
    }
}
