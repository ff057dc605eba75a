//! Fixtures for tests
use crate::firm::Firm;
use crate::id::FirmID;
use crate::parameters::ModelParameters;
use crate::sector::Sector;
use crate::units::{Money, MoneyPerWorker};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A small parameter document modelling two sectors
pub const MODEL_TOML: &str = r#"
[run]
num_firms = 200
seed = 1
num_seeds = 3

[sector_weights]
lodging = 1.0
retail = 3.0

[firm_generation.wage]
lodging = { dist = "uniform", min = 40.0, max = 60.0 }
retail = { dist = "fixed", value = 50.0 }

[firm_generation.workers]
lodging = { dist = "discrete", values = [5.0, 10.0, 20.0], weights = [1.0, 2.0, 1.0] }
retail = { dist = "lognormal", median = 8.0, sigma = 0.5, min = 1.0, max = 50.0 }

[firm_generation.revenue]
lodging = { dist = "lognormal", median = 2000.0, sigma = 0.4, min = 500.0, max = 8000.0 }
retail = { dist = "uniform", min = 500.0, max = 3000.0 }

[firm_generation.cost_ratio]
lodging = { dist = "uniform", min = 0.3, max = 0.5 }
retail = { dist = "uniform", min = 0.5, max = 0.7 }

[firm_generation.capacity_multiplier]
lodging = { dist = "uniform", min = 1.3, max = 1.8 }
retail = { dist = "uniform", min = 1.2, max = 1.5 }

[policy_costs.substitute_rest_factor]
lodging = { dist = "uniform", min = 0.3, max = 0.8 }
retail = { dist = "uniform", min = 0.3, max = 0.8 }

[policy_costs.compensation_factor]
lodging = { dist = "uniform", min = 0.5, max = 1.0 }
retail = { dist = "uniform", min = 0.5, max = 1.0 }

[demand_shocks.holiday]
lodging = 0.4
retail = -0.2

[demand_shocks.bridge]
lodging = 0.3
retail = 0.1

[cost_shocks.holiday]
lodging = 0.1
retail = 0.0

[cost_shocks.bridge]
lodging = 0.05
retail = 0.0
"#;

#[fixture]
pub fn model_parameters() -> ModelParameters {
    toml::from_str(MODEL_TOML).unwrap()
}

/// A lodging firm with a payroll of 500 and room to grow 20% above its baseline revenue
#[fixture]
pub fn firm() -> Firm {
    Firm {
        id: FirmID(1),
        sector: Sector::Lodging,
        wage: MoneyPerWorker(50.0),
        workers: 10,
        base_revenue: Money(1000.0),
        base_cost: Money(400.0),
        capacity: Money(1200.0),
        substitute_rest_cost: Money(100.0),
        compensation_cost: Money(300.0),
    }
}
