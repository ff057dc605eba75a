//! This module defines the unit types used for monetary quantities and their conversions.
use float_cmp::{ApproxEq, F64Margin};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Div, Mul, Neg};

/// Represents a dimensionless quantity (e.g. a multiplier, a ratio or a fractional shock).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Default,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
pub struct Dimensionless(pub f64);

impl Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl Dimensionless {
    /// Creates a new dimensionless quantity from an f64 value.
    pub fn new(val: f64) -> Self {
        Self(val)
    }

    /// Returns the value as an f64.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether the value is finite
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Returns the larger of two quantities
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

impl From<Dimensionless> for f64 {
    fn from(val: Dimensionless) -> Self {
        val.0
    }
}

impl ApproxEq for Dimensionless {
    type Margin = F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        self.0.approx_eq(other.0, margin)
    }
}

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::Display,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from an f64 value.
            pub fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as an f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// Returns the smaller of two quantities
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            /// Returns the larger of two quantities
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// Returns the absolute value
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }
        }

        impl Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> $name {
                $name(iter.map(|x| x.0).sum())
            }
        }

        impl Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }

        impl ApproxEq for $name {
            type Margin = F64Margin;

            fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
                self.0.approx_eq(other.0, margin)
            }
        }
    };
}

// Money in local currency (PEN) for a single day
unit_struct!(Money);
// Daily wage per worker
unit_struct!(MoneyPerWorker);

impl MoneyPerWorker {
    /// The total for a workforce of the given size
    pub fn for_workers(self, workers: u32) -> Money {
        Money(self.0 * f64::from(workers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_for_workers() {
        assert_eq!(MoneyPerWorker(50.0).for_workers(10), Money(500.0));
        assert_eq!(MoneyPerWorker(50.0).for_workers(0), Money(0.0));
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money(1100.0);
        let b = Money(420.0);
        assert_eq!(a - b, Money(680.0));
        assert_eq!(-b, Money(-420.0));
        assert_eq!(Dimensionless(2.0) * b, Money(840.0));
        assert_eq!(b * Dimensionless(0.5), Money(210.0));
        assert_approx_eq!(Dimensionless, b / a, Dimensionless(420.0 / 1100.0));
        assert_eq!(a.min(b), b);
        assert_eq!([a, b].into_iter().sum::<Money>(), Money(1520.0));
    }
}
