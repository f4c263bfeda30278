//! Optimisers for the multilayer perceptron, working on flattened
//! parameter vectors.
use crate::config::LearningRate;

/// Update rule applied once per mini-batch.
pub trait StochasticOptimizer {
    fn step(&mut self, params: &mut [f64], grads: &[f64]);

    /// Called after every batch with the number of samples seen so far.
    fn iteration_ends(&mut self, _time_step: usize) {}

    /// Called when the loss stopped improving; `true` means stop training.
    fn trigger_stopping(&mut self) -> bool {
        true
    }
}

/// Stochastic gradient descent with (optionally Nesterov) momentum.
pub struct Sgd {
    learning_rate_init: f64,
    learning_rate: f64,
    schedule: LearningRate,
    momentum: f64,
    nesterov: bool,
    power_t: f64,
    velocities: Vec<f64>,
}

impl Sgd {
    pub fn new(
        n_params: usize,
        learning_rate_init: f64,
        schedule: LearningRate,
        momentum: f64,
        nesterov: bool,
        power_t: f64,
    ) -> Self {
        Self {
            learning_rate_init,
            learning_rate: learning_rate_init,
            schedule,
            momentum,
            nesterov,
            power_t,
            velocities: vec![0.0; n_params],
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl StochasticOptimizer for Sgd {
    fn step(&mut self, params: &mut [f64], grads: &[f64]) {
        for ((p, v), g) in params.iter_mut().zip(self.velocities.iter_mut()).zip(grads) {
            *v = self.momentum * *v - self.learning_rate * g;
            *p += if self.nesterov {
                self.momentum * *v - self.learning_rate * g
            } else {
                *v
            };
        }
    }

    fn iteration_ends(&mut self, time_step: usize) {
        if self.schedule == LearningRate::InvScaling {
            self.learning_rate = self.learning_rate_init / ((time_step + 1) as f64).powf(self.power_t);
        }
    }

    fn trigger_stopping(&mut self) -> bool {
        if self.schedule != LearningRate::Adaptive || self.learning_rate <= 1e-6 {
            return true;
        }
        self.learning_rate /= 5.0;
        log::trace!("sgd: learning rate reduced to {}", self.learning_rate);
        false
    }
}

/// Adam with bias-corrected moment estimates.
pub struct Adam {
    learning_rate: f64,
    beta_1: f64,
    beta_2: f64,
    epsilon: f64,
    t: i32,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Adam {
    pub fn new(n_params: usize, learning_rate: f64, beta_1: f64, beta_2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta_1,
            beta_2,
            epsilon,
            t: 0,
            m: vec![0.0; n_params],
            v: vec![0.0; n_params],
        }
    }
}

impl StochasticOptimizer for Adam {
    fn step(&mut self, params: &mut [f64], grads: &[f64]) {
        self.t += 1;
        let lr = self.learning_rate * (1.0 - self.beta_2.powi(self.t)).sqrt() / (1.0 - self.beta_1.powi(self.t));
        for (((p, m), v), g) in params
            .iter_mut()
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .zip(grads)
        {
            *m = self.beta_1 * *m + (1.0 - self.beta_1) * g;
            *v = self.beta_2 * *v + (1.0 - self.beta_2) * g * g;
            *p -= lr * *m / (v.sqrt() + self.epsilon);
        }
    }
}

/// Result of an L-BFGS run.
pub struct LbfgsOutcome {
    pub params: Vec<f64>,
    pub loss: f64,
    pub n_iter: usize,
    pub converged: bool,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

const LBFGS_MEMORY: usize = 10;
const ARMIJO_C1: f64 = 1e-4;
const FTOL: f64 = 2.220446049250313e-9;

/// Minimise `f` (returning loss and gradient) with limited-memory BFGS and a
/// backtracking Armijo line search.
///
/// Stops when the largest gradient component drops below `gtol`, the relative
/// loss reduction becomes negligible, or the iteration/evaluation budget is
/// spent.
pub fn lbfgs<F>(mut f: F, x0: Vec<f64>, max_iter: usize, max_fun: usize, gtol: f64) -> LbfgsOutcome
where
    F: FnMut(&[f64]) -> (f64, Vec<f64>),
{
    let mut x = x0;
    let (mut fx, mut g) = f(&x);
    let mut n_fun = 1;
    let mut history: Vec<(Vec<f64>, Vec<f64>, f64)> = Vec::with_capacity(LBFGS_MEMORY);

    for iter in 0..max_iter {
        if g.iter().fold(0.0f64, |acc, v| acc.max(v.abs())) <= gtol {
            return LbfgsOutcome { params: x, loss: fx, n_iter: iter, converged: true };
        }

        // two-loop recursion
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(history.len());
        for (s, y, rho) in history.iter().rev() {
            let a = rho * dot(s, &q);
            q.iter_mut().zip(y).for_each(|(qi, yi)| *qi -= a * yi);
            alphas.push(a);
        }
        let gamma = match history.last() {
            Some((s, y, _)) => dot(s, y) / dot(y, y),
            None => 1.0 / g.iter().map(|v| v * v).sum::<f64>().sqrt().max(1.0),
        };
        q.iter_mut().for_each(|qi| *qi *= gamma);
        for ((s, y, rho), a) in history.iter().zip(alphas.iter().rev()) {
            let b = rho * dot(y, &q);
            q.iter_mut().zip(s).for_each(|(qi, si)| *qi += (a - b) * si);
        }
        let mut direction: Vec<f64> = q.into_iter().map(|v| -v).collect();
        let mut slope = dot(&g, &direction);
        if !(slope < 0.0) {
            // not a descent direction, restart from steepest descent
            history.clear();
            direction = g.iter().map(|v| -v).collect();
            slope = dot(&g, &direction);
        }

        let mut step = 1.0;
        let mut accepted = None;
        while n_fun < max_fun {
            let candidate: Vec<f64> = x.iter().zip(&direction).map(|(xi, di)| xi + step * di).collect();
            let (f_new, g_new) = f(&candidate);
            n_fun += 1;
            if f_new.is_finite() && f_new <= fx + ARMIJO_C1 * step * slope {
                accepted = Some((candidate, f_new, g_new));
                break;
            }
            step *= 0.5;
            if step < 1e-20 {
                break;
            }
        }
        let Some((x_new, f_new, g_new)) = accepted else {
            return LbfgsOutcome { params: x, loss: fx, n_iter: iter + 1, converged: false };
        };

        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if sy > 1e-10 {
            if history.len() == LBFGS_MEMORY {
                history.remove(0);
            }
            history.push((s, y, 1.0 / sy));
        }

        let reduction = (fx - f_new) / fx.abs().max(f_new.abs()).max(1.0);
        x = x_new;
        fx = f_new;
        g = g_new;
        log::trace!("lbfgs: iter={} loss={:.6}", iter + 1, fx);

        if reduction <= FTOL {
            return LbfgsOutcome { params: x, loss: fx, n_iter: iter + 1, converged: true };
        }
        if n_fun >= max_fun {
            return LbfgsOutcome { params: x, loss: fx, n_iter: iter + 1, converged: false };
        }
    }

    LbfgsOutcome { params: x, loss: fx, n_iter: max_iter, converged: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(x: &[f64]) -> (f64, Vec<f64>) {
        // (x0 - 3)^2 + 10 (x1 + 1)^2
        let f = (x[0] - 3.0).powi(2) + 10.0 * (x[1] + 1.0).powi(2);
        (f, vec![2.0 * (x[0] - 3.0), 20.0 * (x[1] + 1.0)])
    }

    #[test]
    fn test_lbfgs_minimises_quadratic() {
        let out = lbfgs(quadratic, vec![0.0, 0.0], 100, 1000, 1e-8);
        assert!((out.params[0] - 3.0).abs() < 1e-4);
        assert!((out.params[1] + 1.0).abs() < 1e-4);
        assert!(out.loss < 1e-8);
    }

    #[test]
    fn test_adam_moves_against_gradient() {
        let mut adam = Adam::new(1, 0.1, 0.9, 0.999, 1e-8);
        let mut p = vec![1.0];
        adam.step(&mut p, &[2.0]);
        // first bias-corrected step has magnitude ~ learning rate
        assert!((p[0] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_sgd_schedules() {
        let mut sgd = Sgd::new(1, 0.1, LearningRate::InvScaling, 0.9, true, 0.5);
        sgd.iteration_ends(3);
        assert!((sgd.learning_rate() - 0.05).abs() < 1e-12);

        let mut adaptive = Sgd::new(1, 0.1, LearningRate::Adaptive, 0.9, true, 0.5);
        assert!(!adaptive.trigger_stopping());
        assert!((adaptive.learning_rate() - 0.02).abs() < 1e-12);

        let mut constant = Sgd::new(1, 0.1, LearningRate::Constant, 0.9, false, 0.5);
        assert!(constant.trigger_stopping());
        let mut p = vec![0.0];
        constant.step(&mut p, &[1.0]);
        assert!((p[0] + 0.1).abs() < 1e-12);
    }
}
