//! Ability estimation under the three-parameter-logistic model.
//!
//! Stateless numeric functions over a response history. Estimation uses
//! Fisher scoring (Newton-Raphson with the expected information in place of
//! the observed Hessian), clamped to a fixed theta range so degenerate
//! response patterns (all correct, all incorrect) settle at a bound instead
//! of diverging. The estimator always returns a value; non-convergence is
//! reported through the `stable` flag, never an error.

use serde::{Deserialize, Serialize};

use crate::model::IrtParams;

/// Configuration for the numeric estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Lower clamp for theta.
    pub theta_min: f64,
    /// Upper clamp for theta.
    pub theta_max: f64,
    /// Iteration cap for the optimizer.
    pub max_iterations: u32,
    /// Convergence tolerance on the theta update.
    pub tolerance: f64,
    /// Standard error reported when no information is available
    /// (cold start, or a pool carrying none at the estimate).
    pub cold_start_se: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            theta_min: -4.0,
            theta_max: 4.0,
            max_iterations: 20,
            tolerance: 1e-3,
            cold_start_se: 10.0,
        }
    }
}

/// Result of an ability estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityEstimate {
    /// Maximum-likelihood ability estimate, clamped to the configured range.
    pub theta: f64,
    /// Standard error, `1/sqrt(total information)` at the estimate.
    pub se: f64,
    /// False when the optimizer hit the iteration cap without converging.
    /// Downstream callers log this; it is not fatal.
    pub stable: bool,
}

/// Probability of a correct response under the 3PL model:
/// `P(theta) = c + (1-c) / (1 + exp(-a*(theta-b)))`.
pub fn probability_3pl(theta: f64, params: &IrtParams) -> f64 {
    params.c + (1.0 - params.c) / (1.0 + (-params.a * (theta - params.b)).exp())
}

/// Fisher information contributed by one item at the given theta:
/// `I(theta) = a^2 * (P-c)^2 * (1-P) / ((1-c)^2 * P)`.
pub fn item_information(theta: f64, params: &IrtParams) -> f64 {
    let p = probability_3pl(theta, params);
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    let a = params.a;
    let c = params.c;
    a * a * (p - c).powi(2) * (1.0 - p) / ((1.0 - c).powi(2) * p)
}

/// Total test information over a set of items at the given theta.
pub fn test_information(theta: f64, items: &[IrtParams]) -> f64 {
    items.iter().map(|p| item_information(theta, p)).sum()
}

/// Estimate ability from an ordered response history.
///
/// Each entry pairs the answered item's parameters with the 0/1 correctness
/// of the response. Zero responses yields the population prior: theta 0 with
/// an uninformative standard error.
pub fn estimate_ability(
    history: &[(IrtParams, bool)],
    config: &EstimatorConfig,
) -> AbilityEstimate {
    if history.is_empty() {
        return AbilityEstimate {
            theta: 0.0,
            se: config.cold_start_se,
            stable: true,
        };
    }

    let mut theta = 0.0f64;
    let mut converged = false;

    for _ in 0..config.max_iterations {
        let mut gradient = 0.0f64;
        let mut information = 0.0f64;

        for (params, correct) in history {
            let p = probability_3pl(theta, params).clamp(1e-6, 1.0 - 1e-6);
            // dP/dtheta for the 3PL, expressed through P itself.
            let dp = params.a * (p - params.c) * (1.0 - p) / (1.0 - params.c);
            let u = if *correct { 1.0 } else { 0.0 };
            gradient += (u - p) * dp / (p * (1.0 - p));
            information += dp * dp / (p * (1.0 - p));
        }

        if information <= f64::EPSILON {
            // Flat likelihood; nothing to climb. Keep the current value.
            break;
        }

        let next = (theta + gradient / information).clamp(config.theta_min, config.theta_max);
        let delta = (next - theta).abs();
        theta = next;

        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    let total_info = test_information(
        theta,
        &history.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
    );
    let se = if total_info > f64::EPSILON {
        1.0 / total_info.sqrt()
    } else {
        config.cold_start_se
    };

    AbilityEstimate {
        theta,
        se,
        stable: converged,
    }
}
