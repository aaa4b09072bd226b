//! Affine term algebra over opaque variable handles.
//!
//! A [`Polynomial`] is an ordered list of [`Term`]s read as their sum. Like
//! terms are never collapsed: insertion order is kept so that printed and
//! realized programs are reproducible, and every consumer (evaluation,
//! realization, derivatives) sums repeated variables itself.
//!
//! ```text
//! Term        = coefficient · variable^exponent     exponent ∈ {0, 1}
//! Polynomial  = Σ terms
//! ```
//!
//! Terms with an exponent above one can be represented but never realized:
//! evaluation and backend realization fail with
//! [`SolverError::UnsupportedExponent`].

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use crate::{SolverError, SolverResult};

/// Requirements on a backend's variable handle.
///
/// Handles are only ever compared for identity; the algebra never looks
/// inside them.
pub trait VariableHandle: Copy + Eq + Hash + Ord + fmt::Debug {}

impl<T: Copy + Eq + Hash + Ord + fmt::Debug> VariableHandle for T {}

/// `coefficient · variable^exponent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term<V> {
    coefficient: f64,
    variable: Option<V>,
    exponent: u32,
}

impl<V: VariableHandle> Term<V> {
    pub fn constant(coefficient: f64) -> Self {
        Self {
            coefficient,
            variable: None,
            exponent: 0,
        }
    }

    pub fn linear(coefficient: f64, variable: V) -> Self {
        Self {
            coefficient,
            variable: Some(variable),
            exponent: 1,
        }
    }

    /// A term with an arbitrary exponent. Only exponents 0 and 1 can be realized.
    pub fn with_exponent(coefficient: f64, variable: V, exponent: u32) -> Self {
        Self {
            coefficient,
            variable: Some(variable),
            exponent,
        }
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    pub fn variable(&self) -> Option<V> {
        if self.exponent == 0 {
            None
        } else {
            self.variable
        }
    }

    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    pub fn is_constant(&self) -> bool {
        self.variable().is_none()
    }

    pub fn negate(&self) -> Self {
        self.scale(-1.0)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            coefficient: self.coefficient * factor,
            ..*self
        }
    }

    /// Coefficient of `variable` if this term is linear in it, else 0.
    pub fn partial_derivative(&self, variable: V) -> f64 {
        if self.exponent == 1 && self.variable == Some(variable) {
            self.coefficient
        } else {
            0.0
        }
    }

    /// Fails for exponents outside {0, 1}.
    pub fn check_realizable(&self) -> SolverResult<()> {
        if self.exponent > 1 {
            return Err(SolverError::UnsupportedExponent {
                exponent: self.exponent,
            });
        }
        Ok(())
    }

    pub fn evaluate(&self, mut value_of: impl FnMut(V) -> f64) -> SolverResult<f64> {
        self.check_realizable()?;
        Ok(match self.variable() {
            Some(v) => self.coefficient * value_of(v),
            None => self.coefficient,
        })
    }
}

/// Sum of terms; see the module documentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial<V> {
    terms: Vec<Term<V>>,
}

impl<V> Default for Polynomial<V> {
    fn default() -> Self {
        Self { terms: Vec::new() }
    }
}

impl<V: VariableHandle> Polynomial<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_terms(terms: Vec<Term<V>>) -> Self {
        Self { terms }
    }

    pub fn constant(value: f64) -> Self {
        Self::from_terms(vec![Term::constant(value)])
    }

    pub fn variable(variable: V) -> Self {
        Self::from_terms(vec![Term::linear(1.0, variable)])
    }

    /// `Σ coefficient_i · v_i`.
    pub fn linear_sum(entries: impl IntoIterator<Item = (f64, V)>) -> Self {
        Self::from_terms(entries.into_iter().map(|(c, v)| Term::linear(c, v)).collect())
    }

    /// `Σ v_i` with unit coefficients.
    pub fn sum_of(variables: impl IntoIterator<Item = V>) -> Self {
        Self::linear_sum(variables.into_iter().map(|v| (1.0, v)))
    }

    pub fn terms(&self) -> &[Term<V>] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Append a term (like terms are kept separate).
    pub fn add_term(&mut self, term: Term<V>) -> &mut Self {
        self.terms.push(term);
        self
    }

    /// Append every term of `other`.
    pub fn add(&mut self, other: &Polynomial<V>) -> &mut Self {
        self.terms.extend_from_slice(&other.terms);
        self
    }

    pub fn negate(&self) -> Self {
        self.scale(-1.0)
    }

    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::from_terms(self.terms.iter().map(|t| t.scale(factor)).collect())
    }

    /// Sum of the coefficients of every term linear in `variable`.
    pub fn partial_derivative(&self, variable: V) -> f64 {
        self.terms.iter().map(|t| t.partial_derivative(variable)).sum()
    }

    /// Constant terms plus the terms whose variable is in `variables`.
    pub fn restrict_to(&self, variables: &HashSet<V>) -> Self {
        Self::from_terms(
            self.terms
                .iter()
                .filter(|t| t.variable().map_or(true, |v| variables.contains(&v)))
                .copied()
                .collect(),
        )
    }

    /// True iff the non-constant terms reference exactly one distinct variable.
    pub fn is_single_variable(&self) -> bool {
        self.variables().len() == 1
    }

    /// Distinct variables in order of first appearance.
    pub fn variables(&self) -> Vec<V> {
        let mut seen = HashSet::new();
        self.terms
            .iter()
            .filter_map(|t| t.variable())
            .filter(|v| seen.insert(*v))
            .collect()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.iter().all(|t| t.is_constant())
    }

    /// Sum of the constant terms.
    pub fn constant_part(&self) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.is_constant())
            .map(|t| t.coefficient())
            .sum()
    }

    pub fn check_realizable(&self) -> SolverResult<()> {
        self.terms.iter().try_for_each(|t| t.check_realizable())
    }

    pub fn evaluate(&self, mut value_of: impl FnMut(V) -> f64) -> SolverResult<f64> {
        self.terms
            .iter()
            .try_fold(0.0, |acc, t| Ok(acc + t.evaluate(&mut value_of)?))
    }
}

impl<V: VariableHandle> From<V> for Polynomial<V> {
    fn from(variable: V) -> Self {
        Polynomial::variable(variable)
    }
}

impl<V: VariableHandle> fmt::Display for Polynomial<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            match (term.variable, term.exponent) {
                (_, 0) | (None, _) => write!(f, "{}", term.coefficient)?,
                (Some(v), 1) => write!(f, "{}*{:?}", term.coefficient, v)?,
                (Some(v), e) => write!(f, "{}*{:?}^{}", term.coefficient, v, e)?,
            }
        }
        Ok(())
    }
}

impl<V: VariableHandle> AddAssign for Polynomial<V> {
    fn add_assign(&mut self, rhs: Polynomial<V>) {
        self.terms.extend(rhs.terms);
    }
}

impl<V: VariableHandle> AddAssign<f64> for Polynomial<V> {
    fn add_assign(&mut self, rhs: f64) {
        self.terms.push(Term::constant(rhs));
    }
}

impl<V: VariableHandle> Add for Polynomial<V> {
    type Output = Polynomial<V>;

    fn add(mut self, rhs: Polynomial<V>) -> Self::Output {
        self += rhs;
        self
    }
}

impl<V: VariableHandle> Add<f64> for Polynomial<V> {
    type Output = Polynomial<V>;

    fn add(mut self, rhs: f64) -> Self::Output {
        self += rhs;
        self
    }
}

impl<V: VariableHandle> Sub for Polynomial<V> {
    type Output = Polynomial<V>;

    fn sub(mut self, rhs: Polynomial<V>) -> Self::Output {
        self += rhs.negate();
        self
    }
}

impl<V: VariableHandle> Sub<f64> for Polynomial<V> {
    type Output = Polynomial<V>;

    fn sub(mut self, rhs: f64) -> Self::Output {
        self += -rhs;
        self
    }
}

impl<V: VariableHandle> Neg for Polynomial<V> {
    type Output = Polynomial<V>;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl<V: VariableHandle> Mul<f64> for Polynomial<V> {
    type Output = Polynomial<V>;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}
