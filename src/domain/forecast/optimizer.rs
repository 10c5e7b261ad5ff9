//! Nelder–Mead simplex minimiser with bounded restarts and a wall-clock budget.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::error::ModelFitError;

/// Time and restart allowance shared by every fit of one forecast request.
#[derive(Debug, Clone, Copy)]
pub struct FitBudget {
    deadline: Instant,
    budget: Duration,
    max_restarts: usize,
}

impl FitBudget {
    pub fn new(budget: Duration, max_restarts: usize) -> Self {
        Self {
            deadline: Instant::now() + budget,
            budget,
            max_restarts,
        }
    }

    pub fn max_restarts(&self) -> usize {
        self.max_restarts
    }

    pub fn check(&self) -> Result<(), ModelFitError> {
        if Instant::now() >= self.deadline {
            return Err(ModelFitError::Timeout {
                budget: self.budget,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    /// Iterations per run, multiplied by the problem dimension.
    pub iterations_per_dim: usize,
    /// Converged once the simplex spread in objective value is at most
    /// `f_tolerance * (1 + |best|)`.
    pub f_tolerance: f64,
    /// Offset of the initial vertices along coordinates that start at zero.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            iterations_per_dim: 200,
            f_tolerance: 1e-9,
            initial_step: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub restarts: usize,
}

struct Run {
    point: Vec<f64>,
    value: f64,
    iterations: usize,
    converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    /// Minimise `f` from `start`. A run that exhausts its iterations is
    /// restarted from its best vertex, at most `budget.max_restarts()` times.
    pub fn minimize<F>(&self, f: F, start: &[f64], budget: &FitBudget) -> Result<Minimum, ModelFitError>
    where
        F: Fn(&[f64]) -> f64,
    {
        let mut origin = start.to_vec();
        let mut iterations = 0;

        for attempt in 0..=budget.max_restarts() {
            let run = self.run(&f, &origin, budget)?;
            iterations += run.iterations;
            if run.converged {
                return Ok(Minimum {
                    point: run.point,
                    value: run.value,
                    iterations,
                    restarts: attempt,
                });
            }
            debug!(attempt, value = run.value, "simplex hit its iteration cap, restarting");
            origin = run.point;
        }

        Err(ModelFitError::NoConvergence {
            restarts: budget.max_restarts(),
        })
    }

    fn run<F>(&self, f: &F, origin: &[f64], budget: &FitBudget) -> Result<Run, ModelFitError>
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = origin.len();
        let start_value = f(origin);
        if !start_value.is_finite() {
            return Err(ModelFitError::NonFinite { what: "objective" });
        }
        if n == 0 {
            return Ok(Run {
                point: Vec::new(),
                value: start_value,
                iterations: 0,
                converged: true,
            });
        }

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((origin.to_vec(), start_value));
        for i in 0..n {
            let mut vertex = origin.to_vec();
            vertex[i] += if vertex[i].abs() > 1e-3 {
                0.1 * vertex[i]
            } else {
                self.initial_step
            };
            let value = f(&vertex);
            simplex.push((vertex, value));
        }

        let max_iterations = self.iterations_per_dim * n;
        for iteration in 0..max_iterations {
            budget.check()?;
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            if self.has_converged(&simplex) {
                let (point, value) = simplex.swap_remove(0);
                return Ok(Run {
                    point,
                    value,
                    iterations: iteration,
                    converged: true,
                });
            }

            let centroid = centroid(&simplex[..n]);
            let worst_value = simplex[n].1;
            let second_worst = simplex[n - 1].1;
            let best_value = simplex[0].1;

            let reflected = towards(&centroid, &simplex[n].0, -REFLECT);
            let reflected_value = f(&reflected);

            if reflected_value < best_value {
                let expanded = towards(&centroid, &reflected, EXPAND);
                let expanded_value = f(&expanded);
                simplex[n] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
                continue;
            }

            if reflected_value < second_worst {
                simplex[n] = (reflected, reflected_value);
                continue;
            }

            let (contracted, contracted_value) = if reflected_value < worst_value {
                let point = towards(&centroid, &reflected, CONTRACT);
                let value = f(&point);
                (point, value)
            } else {
                let point = towards(&centroid, &simplex[n].0, CONTRACT);
                let value = f(&point);
                (point, value)
            };

            if contracted_value < reflected_value.min(worst_value) {
                simplex[n] = (contracted, contracted_value);
                continue;
            }

            let best = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                vertex.0 = towards(&best, &vertex.0, SHRINK);
                vertex.1 = f(&vertex.0);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Ok(Run {
            point,
            value,
            iterations: max_iterations,
            converged: false,
        })
    }

    fn has_converged(&self, sorted: &[(Vec<f64>, f64)]) -> bool {
        let best = sorted[0].1;
        let worst = sorted[sorted.len() - 1].1;
        worst.is_finite() && worst - best <= self.f_tolerance * (1.0 + best.abs())
    }
}

fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dim = vertices[0].0.len();
    let mut centre = vec![0.0; dim];
    for (vertex, _) in vertices {
        for (c, v) in centre.iter_mut().zip(vertex) {
            *c += v;
        }
    }
    let count = vertices.len() as f64;
    centre.iter_mut().for_each(|c| *c /= count);
    centre
}

/// `from + scale * (to - from)`.
fn towards(from: &[f64], to: &[f64], scale: f64) -> Vec<f64> {
    from.iter().zip(to).map(|(a, b)| a + scale * (b - a)).collect()
}
