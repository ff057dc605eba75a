//! The discrete choices firms make on the holiday and the bridge day.
//!
//! Each day has a closed set of options. Every option is a pure function of the firm and the day's
//! outcome, giving its revenue, non-labour cost and labour cost. The firm picks the most profitable
//! option, with ties broken by a tolerance-based policy.
use crate::calendar::DayType;
use crate::demand::DayOutcome;
use crate::firm::Firm;
use crate::parameters::{LegalCostMultipliers, ModelParameters};
use crate::units::{Dimensionless, Money};
use serde_string_enum::SerializeLabeledStringEnum;
use std::fmt::{Debug, Display};
use strum::{EnumIter, IntoEnumIterator};

/// The options open to a firm on the holiday, in tie-break priority order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, SerializeLabeledStringEnum,
)]
pub enum HolidayOption {
    /// Close for the day, paying ordinary wages
    #[string = "close"]
    #[strum(serialize = "close")]
    Close,
    /// Open, paying double wages and granting substitute rest
    #[string = "open_sub"]
    #[strum(serialize = "open_sub")]
    OpenWithSubstituteRest,
    /// Open, paying triple wages with no substitute rest
    #[string = "open_no"]
    #[strum(serialize = "open_no")]
    OpenWithoutSubstituteRest,
}

/// The options open to a firm on the bridge day, in tie-break priority order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, SerializeLabeledStringEnum,
)]
pub enum BridgeOption {
    /// Work as on any ordinary day
    #[string = "operate"]
    #[strum(serialize = "operate")]
    OperateNormally,
    /// Close, with the hours to be made up later
    #[string = "adopt_bridge"]
    #[strum(serialize = "adopt_bridge")]
    AdoptNonWorkingDay,
}

/// The financial result of taking one option
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionOutcome {
    /// Revenue realised
    pub revenue: Money,
    /// Non-labour cost incurred
    pub non_labour_cost: Money,
    /// Labour cost incurred (including the cost of legal obligations)
    pub labour_cost: Money,
}

impl OptionOutcome {
    /// Profit from taking this option
    pub fn profit(&self) -> Money {
        self.revenue - self.non_labour_cost - self.labour_cost
    }

    /// An outcome in which nothing is sold or spent apart from labour
    fn closed(labour_cost: Money) -> Self {
        Self {
            revenue: Money(0.0),
            non_labour_cost: Money(0.0),
            labour_cost,
        }
    }

    /// An outcome in which the firm trades as usual for the day
    fn trading(day: &DayOutcome, labour_cost: Money) -> Self {
        Self {
            revenue: day.revenue,
            non_labour_cost: day.cost,
            labour_cost,
        }
    }
}

/// A firm's decision for one day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision<O> {
    /// The chosen option
    pub option: O,
    /// Revenue realised under the chosen option
    pub revenue: Money,
    /// Non-labour cost under the chosen option
    pub non_labour_cost: Money,
    /// Labour cost under the chosen option
    pub labour_cost: Money,
    /// Profit under the chosen option
    pub profit: Money,
}

impl<O> Decision<O> {
    fn new(option: O, outcome: &OptionOutcome) -> Self {
        Self {
            option,
            revenue: outcome.revenue,
            non_labour_cost: outcome.non_labour_cost,
            labour_cost: outcome.labour_cost,
            profit: outcome.profit(),
        }
    }
}

/// The set of options for one modelled day
pub trait DayOption: Copy + PartialEq + Debug + Display + IntoEnumIterator + 'static {
    /// The day on which these options apply
    const DAY_TYPE: DayType;

    /// The outcome of taking this option
    fn outcome(self, rules: &DecisionRules, firm: &Firm, day: &DayOutcome) -> OptionOutcome;

    /// The option to prefer when it ties for the highest profit, if any
    fn preferred_on_tie(rules: &DecisionRules) -> Option<Self>;
}

impl DayOption for HolidayOption {
    const DAY_TYPE: DayType = DayType::Holiday;

    fn outcome(self, rules: &DecisionRules, firm: &Firm, day: &DayOutcome) -> OptionOutcome {
        let multipliers = &rules.multipliers;
        let payroll = firm.payroll();
        match self {
            Self::Close => {
                let fraction = rules.online_sales_fraction;
                OptionOutcome {
                    revenue: day.revenue * fraction,
                    non_labour_cost: day.cost * fraction,
                    labour_cost: payroll * multipliers.holiday_close,
                }
            }
            Self::OpenWithSubstituteRest => OptionOutcome::trading(
                day,
                payroll * multipliers.holiday_open_with_substitute_rest
                    + firm.substitute_rest_cost,
            ),
            Self::OpenWithoutSubstituteRest => OptionOutcome::trading(
                day,
                payroll * multipliers.holiday_open_without_substitute_rest,
            ),
        }
    }

    fn preferred_on_tie(rules: &DecisionRules) -> Option<Self> {
        rules
            .prefer_substitute_rest
            .then_some(Self::OpenWithSubstituteRest)
    }
}

impl DayOption for BridgeOption {
    const DAY_TYPE: DayType = DayType::Bridge;

    fn outcome(self, rules: &DecisionRules, firm: &Firm, day: &DayOutcome) -> OptionOutcome {
        match self {
            Self::OperateNormally => {
                OptionOutcome::trading(day, firm.payroll() * rules.multipliers.bridge_operate)
            }
            Self::AdoptNonWorkingDay => OptionOutcome::closed(firm.compensation_cost),
        }
    }

    fn preferred_on_tie(rules: &DecisionRules) -> Option<Self> {
        rules
            .prefer_non_working_day
            .then_some(Self::AdoptNonWorkingDay)
    }
}

/// Decides when two profits are equal.
///
/// Two values are tied when `|a - b| <= max(absolute, relative * max(|a|, |b|))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiePolicy {
    /// Relative tolerance
    pub relative: f64,
    /// Absolute tolerance
    pub absolute: f64,
}

impl TiePolicy {
    /// Whether two profits are tied under this policy
    pub fn is_tied(&self, a: Money, b: Money) -> bool {
        let scale = a.abs().max(b.abs()).value();
        (a - b).abs().value() <= self.absolute.max(self.relative * scale)
    }
}

/// Pick the option to take from the evaluated options.
///
/// The tied set is every option whose profit ties with the maximum. If `preferred` is in the tied
/// set it is chosen, otherwise the first tied option in the order given.
///
/// # Panics
///
/// Panics if `evaluated` is empty.
pub fn select_option<O: DayOption>(
    evaluated: &[(O, OptionOutcome)],
    preferred: Option<O>,
    ties: &TiePolicy,
) -> Decision<O> {
    let best = evaluated
        .iter()
        .map(|(_, outcome)| outcome.profit())
        .reduce(|a, b| if b > a { b } else { a })
        .expect("At least one option must be evaluated");

    let mut tied = evaluated
        .iter()
        .filter(|(_, outcome)| ties.is_tied(outcome.profit(), best));
    let (option, outcome) = preferred
        .and_then(|preferred| tied.clone().find(|(option, _)| *option == preferred))
        .or_else(|| tied.next())
        .expect("Best option must tie with itself");

    Decision::new(*option, outcome)
}

/// The rules by which firms make decisions
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRules {
    multipliers: LegalCostMultipliers,
    online_sales_fraction: Dimensionless,
    prefer_substitute_rest: bool,
    prefer_non_working_day: bool,
    ties: TiePolicy,
}

impl DecisionRules {
    /// Take the decision rules from the parameters
    pub fn from_parameters(params: &ModelParameters) -> Self {
        let behaviour = &params.behaviour;
        Self {
            multipliers: params.legal_cost_multipliers.clone(),
            online_sales_fraction: Dimensionless(behaviour.online_sales_fraction),
            prefer_substitute_rest: behaviour.holiday_tie_breaker_prefer_substitute_rest,
            prefer_non_working_day: behaviour.bridge_tie_breaker_prefer_non_working_day,
            ties: TiePolicy {
                relative: behaviour.tie_relative_tolerance,
                absolute: behaviour.tie_absolute_tolerance,
            },
        }
    }

    /// Evaluate every option for a day, in priority order
    pub fn evaluate<O: DayOption>(&self, firm: &Firm, day: &DayOutcome) -> Vec<(O, OptionOutcome)> {
        O::iter()
            .map(|option| (option, option.outcome(self, firm, day)))
            .collect()
    }

    /// Choose the most profitable option for a day
    pub fn decide<O: DayOption>(&self, firm: &Firm, day: &DayOutcome) -> Decision<O> {
        let evaluated = self.evaluate::<O>(firm, day);
        select_option(&evaluated, O::preferred_on_tie(self), &self.ties)
    }

    /// Whether substitute rest costs a firm at least as much as paying the full holiday premium.
    ///
    /// Normally opening without substitute rest costs more in labour; when it does not, `H` is
    /// dominating and the parameters are likely misconfigured.
    pub fn substitute_rest_dominated(&self, firm: &Firm) -> bool {
        let payroll = firm.payroll();
        let with_rest = payroll * self.multipliers.holiday_open_with_substitute_rest
            + firm.substitute_rest_cost;
        let without_rest = payroll * self.multipliers.holiday_open_without_substitute_rest;
        without_rest <= with_rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{firm, model_parameters};
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn rules(model_parameters: ModelParameters) -> DecisionRules {
        DecisionRules::from_parameters(&model_parameters)
    }

    /// The day outcome for the example firm with ΔD = 0.1 and ΔC = 0.05
    #[fixture]
    fn day() -> DayOutcome {
        DayOutcome {
            revenue: Money(1100.0),
            cost: Money(420.0),
        }
    }

    fn profits<O: DayOption>(evaluated: &[(O, OptionOutcome)]) -> Vec<f64> {
        evaluated.iter().map(|(_, o)| o.profit().value()).collect()
    }

    #[rstest]
    fn test_holiday_example(rules: DecisionRules, firm: Firm, day: DayOutcome) {
        let evaluated = rules.evaluate::<HolidayOption>(&firm, &day);
        let profits = profits(&evaluated);
        assert_approx_eq!(f64, profits[0], -500.0);
        assert_approx_eq!(f64, profits[1], -420.0);
        assert_approx_eq!(f64, profits[2], -820.0);

        let decision = rules.decide::<HolidayOption>(&firm, &day);
        assert_eq!(decision.option, HolidayOption::OpenWithSubstituteRest);
        assert_approx_eq!(Money, decision.profit, Money(-420.0));
        assert_approx_eq!(Money, decision.labour_cost, Money(1100.0));
        assert_eq!(decision.revenue, Money(1100.0));
        assert_eq!(decision.non_labour_cost, Money(420.0));
    }

    #[rstest]
    fn test_holiday_close_online_sales(
        mut model_parameters: ModelParameters,
        firm: Firm,
        day: DayOutcome,
    ) {
        model_parameters.behaviour.online_sales_fraction = 0.5;
        let rules = DecisionRules::from_parameters(&model_parameters);
        let outcome = HolidayOption::Close.outcome(&rules, &firm, &day);
        assert_eq!(outcome.revenue, Money(550.0));
        assert_eq!(outcome.non_labour_cost, Money(210.0));
        assert_approx_eq!(Money, outcome.profit(), Money(550.0 - 210.0 - 500.0));
    }

    #[rstest]
    fn test_bridge(rules: DecisionRules, firm: Firm, day: DayOutcome) {
        // Operating: 1100 - 420 - 500 = 180; adopting: -300
        let decision = rules.decide::<BridgeOption>(&firm, &day);
        assert_eq!(decision.option, BridgeOption::OperateNormally);
        assert_approx_eq!(Money, decision.profit, Money(180.0));

        let quiet_day = DayOutcome {
            revenue: Money(100.0),
            cost: Money(50.0),
        };
        let decision = rules.decide::<BridgeOption>(&firm, &quiet_day);
        assert_eq!(decision.option, BridgeOption::AdoptNonWorkingDay);
        assert_eq!(decision.labour_cost, firm.compensation_cost);
        assert_eq!(decision.revenue, Money(0.0));
        assert_eq!(decision.profit, -firm.compensation_cost);
    }

    /// A day on which closing and opening with substitute rest are exactly as profitable:
    /// close = -500; open_sub = 1020 - 420 - 1100 = -500; open_no = 1020 - 420 - 1500 = -900
    #[fixture]
    fn tied_day() -> DayOutcome {
        DayOutcome {
            revenue: Money(1020.0),
            cost: Money(420.0),
        }
    }

    #[rstest]
    fn test_holiday_tie_default(rules: DecisionRules, firm: Firm, tied_day: DayOutcome) {
        let decision = rules.decide::<HolidayOption>(&firm, &tied_day);
        assert_eq!(decision.option, HolidayOption::Close);
    }

    #[rstest]
    fn test_holiday_tie_prefer_substitute_rest(
        mut model_parameters: ModelParameters,
        firm: Firm,
        tied_day: DayOutcome,
    ) {
        model_parameters
            .behaviour
            .holiday_tie_breaker_prefer_substitute_rest = true;
        let rules = DecisionRules::from_parameters(&model_parameters);
        let decision = rules.decide::<HolidayOption>(&firm, &tied_day);
        assert_eq!(decision.option, HolidayOption::OpenWithSubstituteRest);
    }

    #[rstest]
    fn test_holiday_preference_ignored_without_tie(
        mut model_parameters: ModelParameters,
        firm: Firm,
    ) {
        model_parameters
            .behaviour
            .holiday_tie_breaker_prefer_substitute_rest = true;
        let rules = DecisionRules::from_parameters(&model_parameters);
        let day = DayOutcome {
            revenue: Money(0.0),
            cost: Money(0.0),
        };
        let decision = rules.decide::<HolidayOption>(&firm, &day);
        assert_eq!(decision.option, HolidayOption::Close);
    }

    /// A bridge day on which operating and adopting are equally profitable:
    /// operate = 700 - 500 - 500 = -300; adopt = -300
    #[fixture]
    fn tied_bridge_day() -> DayOutcome {
        DayOutcome {
            revenue: Money(700.0),
            cost: Money(500.0),
        }
    }

    #[rstest]
    #[case(false, BridgeOption::OperateNormally)]
    #[case(true, BridgeOption::AdoptNonWorkingDay)]
    fn test_bridge_tie(
        mut model_parameters: ModelParameters,
        firm: Firm,
        tied_bridge_day: DayOutcome,
        #[case] prefer_non_working_day: bool,
        #[case] expected: BridgeOption,
    ) {
        model_parameters
            .behaviour
            .bridge_tie_breaker_prefer_non_working_day = prefer_non_working_day;
        let rules = DecisionRules::from_parameters(&model_parameters);
        let decision = rules.decide::<BridgeOption>(&firm, &tied_bridge_day);
        assert_eq!(decision.option, expected);
    }

    #[rstest]
    #[case(-500.0, -500.0, true)]
    #[case(-500.0, -500.0 + 1e-9, true)]
    #[case(-500.0, -499.0, false)]
    #[case(0.0, 1e-11, true)]
    #[case(0.0, 1e-9, false)]
    fn test_tie_policy(#[case] a: f64, #[case] b: f64, #[case] expected: bool) {
        let ties = TiePolicy {
            relative: 1e-10,
            absolute: 1e-10,
        };
        assert_eq!(ties.is_tied(Money(a), Money(b)), expected);
    }

    #[test]
    fn test_select_option_near_tie() {
        let outcome = |profit| OptionOutcome {
            revenue: Money(profit),
            non_labour_cost: Money(0.0),
            labour_cost: Money(0.0),
        };
        // Open without substitute rest is marginally better, but only by rounding noise
        let evaluated = [
            (HolidayOption::Close, outcome(-1000.0)),
            (HolidayOption::OpenWithSubstituteRest, outcome(-300.0)),
            (HolidayOption::OpenWithoutSubstituteRest, outcome(-300.0 + 1e-12)),
        ];
        let ties = TiePolicy {
            relative: 1e-10,
            absolute: 1e-10,
        };
        let decision = select_option(&evaluated, None, &ties);
        assert_eq!(decision.option, HolidayOption::OpenWithSubstituteRest);

        let ties = TiePolicy {
            relative: 0.0,
            absolute: 0.0,
        };
        let decision = select_option(&evaluated, None, &ties);
        assert_eq!(decision.option, HolidayOption::OpenWithoutSubstituteRest);
    }

    #[rstest]
    fn test_chosen_option_is_optimal(rules: DecisionRules, firm: Firm) {
        for revenue in (0..30).map(|i| f64::from(i) * 100.0) {
            let day = DayOutcome {
                revenue: Money(revenue),
                cost: Money(revenue * 0.4),
            };
            let decision = rules.decide::<HolidayOption>(&firm, &day);
            for (_, outcome) in rules.evaluate::<HolidayOption>(&firm, &day) {
                assert!(decision.profit >= outcome.profit());
            }
            let decision = rules.decide::<BridgeOption>(&firm, &day);
            for (_, outcome) in rules.evaluate::<BridgeOption>(&firm, &day) {
                assert!(decision.profit >= outcome.profit());
            }
        }
    }

    #[rstest]
    fn test_substitute_rest_dominated(rules: DecisionRules, mut firm: Firm) {
        assert!(!rules.substitute_rest_dominated(&firm));
        firm.substitute_rest_cost = firm.payroll();
        assert!(rules.substitute_rest_dominated(&firm));
    }
}
