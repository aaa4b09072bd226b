//! McCormick envelopes for bilinear products.
//!
//! For `z = x·y` with `x ∈ [xL, xU]` and `y ∈ [yL, yU]`:
//!
//! ```text
//! z ≤ xU·y + yL·x − xU·yL
//! z ≤ xL·y + yU·x − xL·yU
//! z ≥ xL·y + yL·x − xL·yL
//! z ≥ xU·y + yU·x − xU·yU
//! ```
//!
//! The envelope over-approximates the product; it is exact when either
//! factor sits at one of its bounds (binary factors in particular).

use metaopt_solver::{Polynomial, SolverCapability, VariableHandle, VariableKind};

use crate::error::{EncodingError, EncodingResult};

/// Closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> EncodingResult<Self> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(EncodingError::InvalidBounds { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// `[0, 1]`
    pub fn unit() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Envelope bounds on `x·y` at a concrete point: `(lower, upper)`.
pub fn envelope_bounds(x: f64, y: f64, xb: Bounds, yb: Bounds) -> (f64, f64) {
    let upper = f64::min(
        xb.upper * y + yb.lower * x - xb.upper * yb.lower,
        xb.lower * y + yb.upper * x - xb.lower * yb.upper,
    );
    let lower = f64::max(
        xb.lower * y + yb.lower * x - xb.lower * yb.lower,
        xb.upper * y + yb.upper * x - xb.upper * yb.upper,
    );
    (lower, upper)
}

/// Emit the four envelope inequalities relating `z` to `x·y`.
///
/// Infinite bounds are rejected, the envelope needs finite corners.
pub fn add_mccormick_envelope<S>(
    solver: &mut S,
    x: impl Into<Polynomial<S::Var>>,
    xb: Bounds,
    y: impl Into<Polynomial<S::Var>>,
    yb: Bounds,
    z: impl Into<Polynomial<S::Var>>,
) -> EncodingResult<()>
where
    S: SolverCapability,
{
    for b in [xb, yb] {
        if !b.lower.is_finite() || !b.upper.is_finite() {
            return Err(EncodingError::InvalidBounds {
                lower: b.lower,
                upper: b.upper,
            });
        }
    }
    let (x, y, z) = (x.into(), y.into(), z.into());

    // z − (xU·y + yL·x − xU·yL) ≤ 0
    solver.add_leq_zero(plane(&z, &x, &y, xb.upper, yb.lower))?;
    // z − (xL·y + yU·x − xL·yU) ≤ 0
    solver.add_leq_zero(plane(&z, &x, &y, xb.lower, yb.upper))?;
    // (xL·y + yL·x − xL·yL) − z ≤ 0
    solver.add_leq_zero(plane(&z, &x, &y, xb.lower, yb.lower).negate())?;
    // (xU·y + yU·x − xU·yU) − z ≤ 0
    solver.add_leq_zero(plane(&z, &x, &y, xb.upper, yb.upper).negate())?;
    Ok(())
}

/// `z − (a·y + b·x − a·b)`
fn plane<V: VariableHandle>(
    z: &Polynomial<V>,
    x: &Polynomial<V>,
    y: &Polynomial<V>,
    a: f64,
    b: f64,
) -> Polynomial<V> {
    z.copy() - y.scale(a) - x.scale(b) + a * b
}

/// Fresh variable `z` relaxing `x·y`, bounded by the envelope corners.
pub fn relax_product<S>(
    solver: &mut S,
    name: &str,
    x: impl Into<Polynomial<S::Var>>,
    xb: Bounds,
    y: impl Into<Polynomial<S::Var>>,
    yb: Bounds,
) -> EncodingResult<S::Var>
where
    S: SolverCapability,
{
    let z = solver.create_variable(name, VariableKind::Continuous);
    add_mccormick_envelope(solver, x, xb, y, yb, Polynomial::variable(z))?;
    Ok(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaopt_solver::{LpSolver, LpSolverConfig};
    use proptest::prelude::*;

    #[test]
    fn test_bounds_validation() {
        assert!(matches!(
            Bounds::new(2.0, 1.0),
            Err(EncodingError::InvalidBounds { .. })
        ));
        assert!(Bounds::new(f64::NAN, 1.0).is_err());
        assert!(Bounds::new(1.0, 1.0).is_ok());
    }

    #[test]
    fn test_envelope_emits_four_rows() {
        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let x = solver.create_variable("x", VariableKind::Continuous);
        let y = solver.create_variable("y", VariableKind::Binary);
        let z = relax_product(
            &mut solver,
            "z",
            x,
            Bounds::new(0.0, 10.0).unwrap(),
            y,
            Bounds::unit(),
        )
        .unwrap();
        assert_eq!(solver.num_constraints(), 4);
        assert!(solver.contains(z));
    }

    #[test]
    fn test_infinite_bounds_rejected() {
        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let x = solver.create_variable("x", VariableKind::Continuous);
        let y = solver.create_variable("y", VariableKind::Continuous);
        let err = relax_product(
            &mut solver,
            "z",
            x,
            Bounds::new(0.0, f64::INFINITY).unwrap(),
            y,
            Bounds::unit(),
        )
        .unwrap_err();
        assert!(matches!(err, EncodingError::InvalidBounds { .. }));
        assert_eq!(solver.num_constraints(), 0);
    }

    #[test]
    fn test_binary_factor_makes_envelope_exact() {
        // maximize z with x = 7 and y binary fixed to 1: z must equal 7
        let mut solver = LpSolver::new(LpSolverConfig::new(100.0)).unwrap();
        let x = solver.create_variable("x", VariableKind::Continuous);
        let y = solver.create_variable("y", VariableKind::Binary);
        solver.add_eq_zero(Polynomial::variable(x) - 7.0).unwrap();
        solver.add_eq_zero(Polynomial::variable(y) - 1.0).unwrap();
        let z = relax_product(
            &mut solver,
            "z",
            x,
            Bounds::new(0.0, 10.0).unwrap(),
            y,
            Bounds::unit(),
        )
        .unwrap();
        solver.set_objective(Polynomial::variable(z)).unwrap();
        let solution = solver.maximize().unwrap();
        assert!((solution.value(z).unwrap() - 7.0).abs() < 1e-4);
    }

    fn interval() -> impl Strategy<Value = Bounds> {
        (-100.0f64..100.0, 0.0f64..50.0)
            .prop_map(|(lo, width)| Bounds::new(lo, lo + width).unwrap())
    }

    proptest! {
        #[test]
        fn envelope_contains_true_product(
            xb in interval(),
            yb in interval(),
            tx in 0.0f64..=1.0,
            ty in 0.0f64..=1.0,
        ) {
            let x = xb.lower() + tx * (xb.upper() - xb.lower());
            let y = yb.lower() + ty * (yb.upper() - yb.lower());
            let (lo, hi) = envelope_bounds(x, y, xb, yb);
            let product = x * y;
            let slack = 1e-9 * (1.0 + product.abs() + lo.abs() + hi.abs());
            prop_assert!(lo <= product + slack);
            prop_assert!(product <= hi + slack);
        }
    }
}
