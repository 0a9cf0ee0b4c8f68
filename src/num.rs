//! Infinitesimal-extended rationals.
//!
//! A [`DeltaRational`] is a pair `q + δ·ε` of exact rationals where `ε`
//! denotes a positive infinitesimal, smaller than every positive rational.
//! Ordering is lexicographic on `(q, δ)`, which is exactly what makes the
//! encoding of strict inequalities work: `x < c` holds iff `x ≤ c − ε`.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// An exact rational extended with a coefficient on the infinitesimal `ε`.
///
/// Values are always finite; absent bounds are represented as `None` at
/// the use sites rather than with infinite rationals.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeltaRational {
    real: BigRational,
    delta: BigRational,
}

impl DeltaRational {
    /// Create `real + delta·ε`.
    #[must_use]
    pub fn new(real: BigRational, delta: BigRational) -> Self {
        Self { real, delta }
    }

    /// Create a purely rational value (`δ = 0`).
    #[must_use]
    pub fn rational(real: BigRational) -> Self {
        Self {
            real,
            delta: BigRational::zero(),
        }
    }

    /// Create the rational `n` (`δ = 0`).
    #[must_use]
    pub fn from_integer(n: i64) -> Self {
        Self::rational(BigRational::from_integer(BigInt::from(n)))
    }

    /// The zero value.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            real: BigRational::zero(),
            delta: BigRational::zero(),
        }
    }

    /// Whether both components are zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.real.is_zero() && self.delta.is_zero()
    }

    /// The rational component.
    #[must_use]
    pub fn real(&self) -> &BigRational {
        &self.real
    }

    /// The coefficient on `ε`.
    #[must_use]
    pub fn delta(&self) -> &BigRational {
        &self.delta
    }

    /// Whether the value is purely rational (`δ = 0`).
    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.delta.is_zero()
    }
}

impl Default for DeltaRational {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<BigRational> for DeltaRational {
    fn from(real: BigRational) -> Self {
        Self::rational(real)
    }
}

impl Add for DeltaRational {
    type Output = DeltaRational;

    fn add(self, rhs: DeltaRational) -> DeltaRational {
        DeltaRational {
            real: self.real + rhs.real,
            delta: self.delta + rhs.delta,
        }
    }
}

impl Sub for DeltaRational {
    type Output = DeltaRational;

    fn sub(self, rhs: DeltaRational) -> DeltaRational {
        DeltaRational {
            real: self.real - rhs.real,
            delta: self.delta - rhs.delta,
        }
    }
}

impl AddAssign for DeltaRational {
    fn add_assign(&mut self, rhs: DeltaRational) {
        self.real += rhs.real;
        self.delta += rhs.delta;
    }
}

impl SubAssign for DeltaRational {
    fn sub_assign(&mut self, rhs: DeltaRational) {
        self.real -= rhs.real;
        self.delta -= rhs.delta;
    }
}

impl Neg for DeltaRational {
    type Output = DeltaRational;

    fn neg(self) -> DeltaRational {
        DeltaRational {
            real: -self.real,
            delta: -self.delta,
        }
    }
}

/// Scaling by a finite rational scales both components.
impl Mul<&BigRational> for &DeltaRational {
    type Output = DeltaRational;

    fn mul(self, rhs: &BigRational) -> DeltaRational {
        DeltaRational {
            real: &self.real * rhs,
            delta: &self.delta * rhs,
        }
    }
}

/// Division by a nonzero finite rational divides both components.
impl Div<&BigRational> for &DeltaRational {
    type Output = DeltaRational;

    fn div(self, rhs: &BigRational) -> DeltaRational {
        DeltaRational {
            real: &self.real / rhs,
            delta: &self.delta / rhs,
        }
    }
}

impl fmt::Display for DeltaRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delta.is_zero() {
            write!(f, "{}", self.real)
        } else if self.delta.is_positive() {
            if self.delta.is_one() {
                write!(f, "{} + ε", self.real)
            } else {
                write!(f, "{} + {}ε", self.real, self.delta)
            }
        } else {
            let mag = -self.delta.clone();
            if mag.is_one() {
                write!(f, "{} - ε", self.real)
            } else {
                write!(f, "{} - {}ε", self.real, mag)
            }
        }
    }
}
