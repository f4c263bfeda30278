use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{Activation, LearningRate, MlpParams, Solver};
use crate::error::{Result, TrialError};
use crate::models::classifier_trait::{ClassifierModel, Tunable};
use crate::models::optim::{lbfgs, Adam, Sgd, StochasticOptimizer};
use crate::models::utils::{
    check_fit_input, check_predict_input, decode_labels, encode_labels, param_bool, param_choice,
    param_f64, param_seed, param_usize,
};
use crate::params::ParamValue;

const NAME: &str = "MLPClassifier";

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn activate(activation: Activation, z: &mut Array2<f64>) {
    match activation {
        Activation::Identity => {}
        Activation::Logistic => z.mapv_inplace(sigmoid),
        Activation::Tanh => z.mapv_inplace(f64::tanh),
        Activation::Relu => z.mapv_inplace(|v| v.max(0.0)),
    }
}

/// Multiply `delta` by the activation derivative, expressed through the
/// activation's output.
fn backprop_activation(activation: Activation, output: &Array2<f64>, delta: &mut Array2<f64>) {
    match activation {
        Activation::Identity => {}
        Activation::Logistic => Zip::from(delta)
            .and(output)
            .for_each(|d, &a| *d *= a * (1.0 - a)),
        Activation::Tanh => Zip::from(delta)
            .and(output)
            .for_each(|d, &a| *d *= 1.0 - a * a),
        Activation::Relu => Zip::from(delta).and(output).for_each(|d, &a| {
            if a <= 0.0 {
                *d = 0.0
            }
        }),
    }
}

fn pack(weights: &[Array2<f64>], biases: &[Array1<f64>]) -> Vec<f64> {
    let mut theta = Vec::new();
    for (w, b) in weights.iter().zip(biases) {
        theta.extend(w.iter().copied());
        theta.extend(b.iter().copied());
    }
    theta
}

/// Fully connected layers with a single logistic output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Network {
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    activation: Activation,
}

impl Network {
    /// Glorot-uniform initialisation of weights and biases.
    fn init(layer_sizes: &[usize], activation: Activation, rng: &mut StdRng) -> Self {
        let factor = if activation == Activation::Logistic { 2.0 } else { 6.0 };
        let mut weights = Vec::with_capacity(layer_sizes.len() - 1);
        let mut biases = Vec::with_capacity(layer_sizes.len() - 1);
        for pair in layer_sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = (factor / (fan_in + fan_out) as f64).sqrt();
            let dist = Uniform::new(-bound, bound);
            weights.push(Array2::from_shape_fn((fan_in, fan_out), |_| dist.sample(rng)));
            biases.push(Array1::from_shape_fn(fan_out, |_| dist.sample(rng)));
        }
        Network {
            weights,
            biases,
            activation,
        }
    }

    fn pack(&self) -> Vec<f64> {
        pack(&self.weights, &self.biases)
    }

    fn unpack(&mut self, theta: &[f64]) {
        let mut values = theta.iter().copied();
        for (w, b) in self.weights.iter_mut().zip(self.biases.iter_mut()) {
            w.iter_mut().zip(values.by_ref()).for_each(|(dst, v)| *dst = v);
            b.iter_mut().zip(values.by_ref()).for_each(|(dst, v)| *dst = v);
        }
    }

    /// Activations of every layer, input included.
    fn forward(&self, x: ArrayView2<f64>) -> Vec<Array2<f64>> {
        let n_layers = self.weights.len();
        let mut acts = Vec::with_capacity(n_layers + 1);
        acts.push(x.to_owned());
        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let mut z = acts[i].dot(w) + b;
            if i + 1 == n_layers {
                z.mapv_inplace(sigmoid);
            } else {
                activate(self.activation, &mut z);
            }
            acts.push(z);
        }
        acts
    }

    fn positive_proba(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let mut acts = self.forward(x);
        match acts.pop() {
            Some(out) => out.column(0).to_owned(),
            None => Array1::zeros(x.nrows()),
        }
    }

    /// Mean log-loss plus L2 penalty, and its gradient in packed layout.
    fn loss_and_grads(&self, x: ArrayView2<f64>, y: ArrayView1<f64>, alpha: f64) -> (f64, Vec<f64>) {
        let n = x.nrows() as f64;
        let n_layers = self.weights.len();
        let acts = self.forward(x);
        let out = &acts[n_layers];

        let eps = f64::EPSILON;
        let mut loss = 0.0;
        for (p, t) in out.column(0).iter().zip(y.iter()) {
            let p = p.clamp(eps, 1.0 - eps);
            loss -= t * p.ln() + (1.0 - t) * (1.0 - p).ln();
        }
        loss /= n;
        let squared: f64 = self
            .weights
            .iter()
            .map(|w| w.iter().map(|v| v * v).sum::<f64>())
            .sum();
        loss += 0.5 * alpha * squared / n;

        let mut grad_w = vec![Array2::zeros((0, 0)); n_layers];
        let mut grad_b = vec![Array1::zeros(0); n_layers];
        let mut delta = out.clone();
        delta.column_mut(0).zip_mut_with(&y, |d, &t| *d -= t);
        for i in (0..n_layers).rev() {
            grad_w[i] = (acts[i].t().dot(&delta) + &self.weights[i] * alpha) / n;
            grad_b[i] = delta.sum_axis(Axis(0)) / n;
            if i > 0 {
                let mut next = delta.dot(&self.weights[i].t());
                backprop_activation(self.activation, &acts[i], &mut next);
                delta = next;
            }
        }
        (loss, pack(&grad_w, &grad_b))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedMlp {
    network: Network,
    classes: [i32; 2],
    n_features: usize,
    n_iter: usize,
    loss_curve: Vec<f64>,
}

struct Training {
    n_iter: usize,
    loss_curve: Vec<f64>,
    converged: bool,
}

/// Multilayer perceptron trained on log-loss with `lbfgs`, `sgd` or `adam`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpClassifier {
    params: MlpParams,
    fitted: Option<FittedMlp>,
}

impl MlpClassifier {
    pub fn new(params: MlpParams) -> Self {
        MlpClassifier {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &MlpParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Epochs (or L-BFGS iterations) run by the last fit.
    pub fn n_iter(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.n_iter)
    }

    /// Training loss per epoch; L-BFGS records only its final loss.
    pub fn loss_curve(&self) -> &[f64] {
        self.fitted.as_ref().map_or(&[], |f| f.loss_curve.as_slice())
    }

    fn validate_params(&self) -> Result<()> {
        let p = &self.params;
        if p.hidden_layer_sizes.iter().any(|&s| s == 0) {
            return Err(TrialError::invalid_parameter(
                NAME,
                "hidden_layer_sizes",
                ParamValue::Layers(p.hidden_layer_sizes.clone()),
                "layer sizes must be >= 1",
            ));
        }
        let checks: [(&str, f64, bool); 7] = [
            ("alpha", p.alpha, p.alpha >= 0.0),
            ("learning_rate_init", p.learning_rate_init, p.learning_rate_init > 0.0),
            ("tol", p.tol, p.tol >= 0.0),
            ("momentum", p.momentum, (0.0..=1.0).contains(&p.momentum)),
            ("beta_1", p.beta_1, (0.0..1.0).contains(&p.beta_1)),
            ("beta_2", p.beta_2, (0.0..1.0).contains(&p.beta_2)),
            ("epsilon", p.epsilon, p.epsilon > 0.0),
        ];
        for (name, value, ok) in checks {
            if !ok {
                return Err(TrialError::invalid_parameter(NAME, name, value, "out of range"));
            }
        }
        for (name, value) in [
            ("max_iter", p.max_iter),
            ("n_iter_no_change", p.n_iter_no_change),
            ("max_fun", p.max_fun),
            ("batch_size", p.batch_size.unwrap_or(1)),
        ] {
            if value == 0 {
                return Err(TrialError::invalid_parameter(NAME, name, 0, "must be >= 1"));
            }
        }
        Ok(())
    }

    fn train_stochastic<O: StochasticOptimizer>(
        &self,
        network: &mut Network,
        x: &Array2<f64>,
        target: &Array1<f64>,
        mut optimizer: O,
        rng: &mut StdRng,
    ) -> Training {
        let p = &self.params;
        let n = x.nrows();
        let batch_size = p.batch_size.map_or(n.min(200), |b| b.clamp(1, n));
        let mut order: Vec<usize> = (0..n).collect();
        let mut theta = network.pack();

        let mut loss_curve = Vec::new();
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut seen = 0;

        for epoch in 0..p.max_iter {
            if p.shuffle {
                order.shuffle(rng);
            }
            let mut accumulated = 0.0;
            for batch in order.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = target.select(Axis(0), batch);
                network.unpack(&theta);
                let (loss, grads) = network.loss_and_grads(xb.view(), yb.view(), p.alpha);
                optimizer.step(&mut theta, &grads);
                accumulated += loss * batch.len() as f64;
                seen += batch.len();
                optimizer.iteration_ends(seen);
            }
            network.unpack(&theta);

            let epoch_loss = accumulated / n as f64;
            loss_curve.push(epoch_loss);
            log::trace!("{}: epoch {} loss={:.6}", NAME, epoch + 1, epoch_loss);

            if epoch_loss > best_loss - p.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
            }
            if no_improvement > p.n_iter_no_change {
                if optimizer.trigger_stopping() {
                    return Training {
                        n_iter: epoch + 1,
                        loss_curve,
                        converged: true,
                    };
                }
                no_improvement = 0;
            }
        }

        Training {
            n_iter: p.max_iter,
            loss_curve,
            converged: false,
        }
    }

    fn train_lbfgs(&self, network: &mut Network, x: &Array2<f64>, target: &Array1<f64>) -> Training {
        let p = &self.params;
        let mut work = network.clone();
        let outcome = lbfgs(
            |theta: &[f64]| {
                work.unpack(theta);
                work.loss_and_grads(x.view(), target.view(), p.alpha)
            },
            network.pack(),
            p.max_iter,
            p.max_fun,
            p.tol,
        );
        network.unpack(&outcome.params);
        Training {
            n_iter: outcome.n_iter,
            loss_curve: vec![outcome.loss],
            converged: outcome.converged,
        }
    }
}

impl Default for MlpClassifier {
    fn default() -> Self {
        Self::new(MlpParams::default())
    }
}

impl ClassifierModel for MlpClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i32>) -> Result<()> {
        self.validate_params()?;
        let classes = check_fit_input(NAME, x, y)?;
        let target: Array1<f64> = encode_labels(y, &classes)
            .into_iter()
            .map(|v| v as f64)
            .collect();

        let mut rng = match self.params.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut layer_sizes = Vec::with_capacity(self.params.hidden_layer_sizes.len() + 2);
        layer_sizes.push(x.ncols());
        layer_sizes.extend(self.params.hidden_layer_sizes.iter().copied());
        layer_sizes.push(1);
        let mut network = Network::init(&layer_sizes, self.params.activation, &mut rng);

        let p = &self.params;
        let training = match p.solver {
            Solver::Lbfgs => self.train_lbfgs(&mut network, x, &target),
            Solver::Sgd => {
                let optimizer = Sgd::new(
                    network.pack().len(),
                    p.learning_rate_init,
                    p.learning_rate,
                    p.momentum,
                    p.nesterovs_momentum,
                    p.power_t,
                );
                self.train_stochastic(&mut network, x, &target, optimizer, &mut rng)
            }
            Solver::Adam => {
                let optimizer = Adam::new(
                    network.pack().len(),
                    p.learning_rate_init,
                    p.beta_1,
                    p.beta_2,
                    p.epsilon,
                );
                self.train_stochastic(&mut network, x, &target, optimizer, &mut rng)
            }
        };

        if !training.converged {
            log::debug!(
                "{}: stopped after {} iterations without converging",
                NAME,
                training.n_iter
            );
        }

        self.fitted = Some(FittedMlp {
            network,
            classes,
            n_features: x.ncols(),
            n_iter: training.n_iter,
            loss_curve: training.loss_curve,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let proba = self.predict_proba(x)?;
        let fitted = self.fitted.as_ref().ok_or_else(|| TrialError::NotFitted {
            model: NAME.to_string(),
        })?;
        Ok(decode_labels(&proba, &fitted.classes))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| TrialError::NotFitted {
            model: NAME.to_string(),
        })?;
        check_predict_input(NAME, x, fitted.n_features)?;

        let positive = fitted.network.positive_proba(x.view());
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, p) in positive.iter().enumerate() {
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = *p;
        }
        Ok(proba)
    }

    fn name(&self) -> &str {
        NAME
    }
}

fn param_range(name: &str, value: &ParamValue, lo: f64, hi: f64, hi_inclusive: bool) -> Result<f64> {
    let v = value
        .as_float()
        .ok_or_else(|| TrialError::invalid_parameter(NAME, name, value, "expected a number"))?;
    let in_range = v >= lo && if hi_inclusive { v <= hi } else { v < hi };
    if !in_range {
        let close = if hi_inclusive { ']' } else { ')' };
        return Err(TrialError::invalid_parameter(
            NAME,
            name,
            value,
            format!("must lie in [{}, {}{}", lo, hi, close),
        ));
    }
    Ok(v)
}

impl Tunable for MlpClassifier {
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let p = &mut self.params;
        match name {
            "hidden_layer_sizes" => {
                p.hidden_layer_sizes = match value {
                    ParamValue::Int(_) => vec![param_usize(NAME, name, value, 1)?],
                    ParamValue::Layers(sizes) if sizes.iter().all(|&s| s > 0) => sizes.clone(),
                    _ => {
                        return Err(TrialError::invalid_parameter(
                            NAME,
                            name,
                            value,
                            "expected positive layer sizes",
                        ))
                    }
                }
            }
            "activation" => {
                p.activation =
                    match param_choice(NAME, name, value, &["identity", "logistic", "tanh", "relu"])? {
                        "identity" => Activation::Identity,
                        "logistic" => Activation::Logistic,
                        "tanh" => Activation::Tanh,
                        _ => Activation::Relu,
                    }
            }
            "solver" => {
                p.solver = match param_choice(NAME, name, value, &["lbfgs", "sgd", "adam"])? {
                    "lbfgs" => Solver::Lbfgs,
                    "sgd" => Solver::Sgd,
                    _ => Solver::Adam,
                }
            }
            "alpha" => p.alpha = param_range(name, value, 0.0, f64::INFINITY, false)?,
            "batch_size" => {
                p.batch_size = match value {
                    ParamValue::None => None,
                    ParamValue::Str(s) if s == "auto" => None,
                    v => Some(param_usize(NAME, name, v, 1)?),
                }
            }
            "learning_rate" => {
                p.learning_rate =
                    match param_choice(NAME, name, value, &["constant", "invscaling", "adaptive"])? {
                        "constant" => LearningRate::Constant,
                        "invscaling" => LearningRate::InvScaling,
                        _ => LearningRate::Adaptive,
                    }
            }
            "learning_rate_init" => p.learning_rate_init = param_f64(NAME, name, value, 0.0)?,
            "power_t" => p.power_t = param_range(name, value, 0.0, f64::INFINITY, false)?,
            "max_iter" => p.max_iter = param_usize(NAME, name, value, 1)?,
            "shuffle" => p.shuffle = param_bool(NAME, name, value)?,
            "random_state" => p.random_state = param_seed(NAME, name, value)?,
            "tol" => p.tol = param_range(name, value, 0.0, f64::INFINITY, false)?,
            "momentum" => p.momentum = param_range(name, value, 0.0, 1.0, true)?,
            "nesterovs_momentum" => p.nesterovs_momentum = param_bool(NAME, name, value)?,
            "n_iter_no_change" => p.n_iter_no_change = param_usize(NAME, name, value, 1)?,
            "beta_1" => p.beta_1 = param_range(name, value, 0.0, 1.0, false)?,
            "beta_2" => p.beta_2 = param_range(name, value, 0.0, 1.0, false)?,
            "epsilon" => p.epsilon = param_f64(NAME, name, value, 0.0)?,
            "max_fun" => p.max_fun = param_usize(NAME, name, value, 1)?,
            _ => return Err(TrialError::invalid_parameter(NAME, name, value, "unknown parameter")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Array2<f64>, Array1<i32>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let (dx, dy) = (0.1 * (i % 5) as f64, 0.1 * (i / 5) as f64);
            data.extend([-2.0 + dx, -2.0 + dy]);
            labels.push(0);
            data.extend([2.0 - dx, 2.0 - dy]);
            labels.push(1);
        }
        (Array2::from_shape_vec((40, 2), data).unwrap(), Array1::from_vec(labels))
    }

    fn params(solver: Solver) -> MlpParams {
        MlpParams {
            hidden_layer_sizes: vec![8],
            solver,
            learning_rate_init: 0.01,
            max_iter: 500,
            random_state: Some(1234),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_solver_separates_blobs() {
        let (x, y) = separable();
        for solver in [Solver::Adam, Solver::Sgd, Solver::Lbfgs] {
            let mut model = MlpClassifier::new(params(solver));
            model.fit(&x, &y).unwrap();
            assert_eq!(model.predict(&x).unwrap(), y, "solver {:?}", solver);

            let proba = model.predict_proba(&x).unwrap();
            for row in proba.rows() {
                assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
            }
            assert!(model.n_iter().unwrap() >= 1);
        }
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = separable();
        let mut a = MlpClassifier::new(params(Solver::Adam));
        let mut b = MlpClassifier::new(params(Solver::Adam));
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let (x, y) = separable();
        let target: Array1<f64> = y.iter().map(|&v| v as f64).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let mut network = Network::init(&[2, 3, 2, 1], Activation::Tanh, &mut rng);
        let theta = network.pack();
        let (_, grads) = network.loss_and_grads(x.view(), target.view(), 0.1);

        let h = 1e-6;
        for k in 0..theta.len() {
            let mut plus = theta.clone();
            plus[k] += h;
            network.unpack(&plus);
            let (f_plus, _) = network.loss_and_grads(x.view(), target.view(), 0.1);
            let mut minus = theta.clone();
            minus[k] -= h;
            network.unpack(&minus);
            let (f_minus, _) = network.loss_and_grads(x.view(), target.view(), 0.1);
            let numeric = (f_plus - f_minus) / (2.0 * h);
            assert!((numeric - grads[k]).abs() < 1e-5, "param {}: {} vs {}", k, numeric, grads[k]);
        }
    }

    #[test]
    fn test_set_param_accepts_grid_values() {
        let mut model = MlpClassifier::default();
        model
            .set_param("hidden_layer_sizes", &ParamValue::Layers(vec![100, 50]))
            .unwrap();
        model.set_param("learning_rate", &ParamValue::from("invscaling")).unwrap();
        model.set_param("batch_size", &ParamValue::from("auto")).unwrap();
        model.set_param("alpha", &ParamValue::Float(0.05)).unwrap();
        assert_eq!(model.params().hidden_layer_sizes, vec![100, 50]);
        assert_eq!(model.params().learning_rate, LearningRate::InvScaling);
        assert_eq!(model.params().batch_size, None);

        assert!(model.set_param("momentum", &ParamValue::Float(1.5)).is_err());
        assert!(model.set_param("solver", &ParamValue::from("newton")).is_err());
        assert!(matches!(
            model.set_param("dropout", &ParamValue::Float(0.1)),
            Err(TrialError::InvalidParameter { .. })
        ));
    }
}
