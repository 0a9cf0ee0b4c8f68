//! Linear expressions over solver variables.
//!
//! A [`LinExpr`] is the formal sum `Σ cᵢ·xᵢ + k` with nonzero rational
//! coefficients and unique variable keys. Terms live in a map ordered by
//! variable id, so iteration is deterministic and two expressions equal up
//! to commutativity produce byte-identical [`LinExpr::canonical_key`]
//! output — the property the solver's slack memo relies on.

use crate::VarId;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::fmt::Write as _;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A formal sum `Σ cᵢ·xᵢ + k` with nonzero rational coefficients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinExpr {
    terms: BTreeMap<VarId, BigRational>,
    constant: BigRational,
}

impl LinExpr {
    /// The empty expression (zero).
    #[must_use]
    pub fn new() -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: BigRational::zero(),
        }
    }

    /// The constant expression `k`.
    #[must_use]
    pub fn constant(k: BigRational) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: k,
        }
    }

    /// The single-variable expression `x`.
    #[must_use]
    pub fn var(x: VarId) -> Self {
        Self::term(x, BigRational::one())
    }

    /// The single-term expression `c·x`.
    #[must_use]
    pub fn term(x: VarId, c: BigRational) -> Self {
        let mut e = Self::new();
        e.add_term(x, c);
        e
    }

    /// Coefficient of `x`, if present.
    #[must_use]
    pub fn coeff(&self, x: VarId) -> Option<&BigRational> {
        self.terms.get(&x)
    }

    /// Add `c·x` to the expression, dropping the term if it cancels.
    pub fn add_term(&mut self, x: VarId, c: BigRational) {
        if c.is_zero() {
            return;
        }
        match self.terms.entry(x) {
            Entry::Vacant(e) => {
                e.insert(c);
            }
            Entry::Occupied(mut e) => {
                *e.get_mut() += c;
                if e.get().is_zero() {
                    e.remove();
                }
            }
        }
    }

    /// Remove the term for `x`, returning its coefficient.
    pub fn remove_term(&mut self, x: VarId) -> Option<BigRational> {
        self.terms.remove(&x)
    }

    /// The constant term.
    #[must_use]
    pub fn constant_term(&self) -> &BigRational {
        &self.constant
    }

    /// Take the constant term out, leaving zero behind.
    pub fn take_constant(&mut self) -> BigRational {
        std::mem::replace(&mut self.constant, BigRational::zero())
    }

    /// Add `k` to the constant term.
    pub fn add_constant(&mut self, k: BigRational) {
        self.constant += k;
    }

    /// Iterate over `(variable, coefficient)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &BigRational)> {
        self.terms.iter().map(|(&x, c)| (x, c))
    }

    /// Iterate over the variables mentioned, in ascending id order.
    pub fn support(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.keys().copied()
    }

    /// Number of terms (the constant does not count).
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the expression has no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether the expression is a bare constant (possibly zero).
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Multiply the whole expression by `c`.
    pub fn scale(&mut self, c: &BigRational) {
        if c.is_zero() {
            self.terms.clear();
            self.constant = BigRational::zero();
            return;
        }
        for coeff in self.terms.values_mut() {
            *coeff *= c;
        }
        self.constant *= c;
    }

    /// Add `factor · other` to this expression, cancelling terms that
    /// become zero.
    pub fn add_scaled(&mut self, other: &LinExpr, factor: &BigRational) {
        if factor.is_zero() {
            return;
        }
        for (x, c) in other.iter() {
            self.add_term(x, factor * c);
        }
        self.constant += factor * &other.constant;
    }

    /// A stable textual key, byte-identical for expressions equal up to
    /// commutativity. Used by the solver to memoize slack variables.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        let mut key = String::new();
        for (x, c) in self.iter() {
            let _ = write!(key, "{}*{};", c, x.id());
        }
        let _ = write!(key, "{}", self.constant);
        key
    }
}

impl Default for LinExpr {
    fn default() -> Self {
        Self::new()
    }
}

impl AddAssign<&LinExpr> for LinExpr {
    fn add_assign(&mut self, rhs: &LinExpr) {
        for (x, c) in rhs.iter() {
            self.add_term(x, c.clone());
        }
        self.constant += &rhs.constant;
    }
}

impl SubAssign<&LinExpr> for LinExpr {
    fn sub_assign(&mut self, rhs: &LinExpr) {
        for (x, c) in rhs.iter() {
            self.add_term(x, -c.clone());
        }
        self.constant -= &rhs.constant;
    }
}

impl Add for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: LinExpr) -> LinExpr {
        self += &rhs;
        self
    }
}

impl Sub for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: LinExpr) -> LinExpr {
        self -= &rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(mut self) -> LinExpr {
        let minus_one = -BigRational::one();
        self.scale(&minus_one);
        self
    }
}

impl Mul<&BigRational> for &LinExpr {
    type Output = LinExpr;

    fn mul(self, rhs: &BigRational) -> LinExpr {
        let mut e = self.clone();
        e.scale(rhs);
        e
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (x, c) in self.iter() {
            let negative = c.is_negative();
            let mag = if negative { -c.clone() } else { c.clone() };
            if first {
                if negative {
                    write!(f, "-")?;
                }
                first = false;
            } else if negative {
                write!(f, " - ")?;
            } else {
                write!(f, " + ")?;
            }
            if mag.is_one() {
                write!(f, "{x}")?;
            } else {
                write!(f, "{mag}*{x}")?;
            }
        }
        if first {
            write!(f, "{}", self.constant)?;
        } else if self.constant.is_positive() {
            write!(f, " + {}", self.constant)?;
        } else if self.constant.is_negative() {
            write!(f, " - {}", -self.constant.clone())?;
        }
        Ok(())
    }
}
