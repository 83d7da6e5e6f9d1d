use crate::error::{AppError, Result};
use crate::ml::models::{Label, PredictionResult, SparseVector, TrainingConfig};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Sufficient decrease constant for the Armijo condition
const ARMIJO_C: f64 = 1e-4;

/// Smallest step the line search will try before giving up
const MIN_STEP: f64 = 1e-10;

/// CG stops once the residual is this fraction of the gradient norm
const CG_RELATIVE_TOLERANCE: f64 = 0.1;

/// Trait for trained binary classifiers over sparse feature vectors
pub trait Classifier: Send + Sync {
    /// Score one feature vector
    fn predict(&self, x: &SparseVector) -> Result<PredictionResult>;

    /// Number of features the model expects
    fn n_features(&self) -> usize;

    /// Score many feature vectors, failing on the first invalid one
    fn predict_batch(&self, xs: &[SparseVector]) -> Result<Vec<PredictionResult>> {
        xs.iter().map(|x| self.predict(x)).collect()
    }
}

/// Logistic regression hyper-parameters.
///
/// Minimises `½‖w‖² + C · Σ sᵢ · log(1 + exp(−ỹᵢ (w·xᵢ + b)))` with balanced
/// class weights `s_c = n / (2 · n_c)`. The bias is not regularised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,

    /// Maximum Newton iterations
    pub max_iter: usize,

    /// Relative gradient-norm tolerance
    pub tolerance: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tolerance: 1e-4,
        }
    }
}

/// Balanced per-class sample weights used during training
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub ham: f64,
    pub spam: f64,
}

impl ClassWeights {
    /// `n / (2 · n_c)` for each class
    pub fn balanced(n_ham: usize, n_spam: usize) -> Self {
        let n = (n_ham + n_spam) as f64;
        Self {
            ham: n / (2.0 * n_ham as f64),
            spam: n / (2.0 * n_spam as f64),
        }
    }

    pub fn of(&self, label: u8) -> f64 {
        if label == 1 {
            self.spam
        } else {
            self.ham
        }
    }
}

impl LogisticRegression {
    pub fn new(c: f64, max_iter: usize, tolerance: f64) -> Self {
        Self {
            c,
            max_iter,
            tolerance,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.regularization, config.max_iter, config.tolerance)
    }

    /// Fit coefficients and bias on labelled feature vectors (ham = 0, spam = 1).
    ///
    /// All input checks run before the first optimisation step. The solver
    /// is a truncated Newton method: conjugate gradient on the exact
    /// Hessian, then Armijo backtracking. Identical input gives bit-identical
    /// output.
    pub fn train(&self, x: &[SparseVector], y: &[u8]) -> Result<ClassifierState> {
        self.validate_params()?;
        let dim = validate_training_set(x, y)?;

        let n_spam = y.iter().filter(|&&label| label == 1).count();
        let n_ham = y.len() - n_spam;
        if n_spam == 0 || n_ham == 0 {
            let label = if n_spam == 0 { Label::Ham } else { Label::Spam };
            return Err(AppError::SingleClass {
                label: label.to_string(),
            });
        }

        let class_weights = ClassWeights::balanced(n_ham, n_spam);
        let objective = Objective::new(x, y, dim, self.c, &class_weights);

        // theta = [w; b]
        let mut theta = Array1::<f64>::zeros(dim + 1);
        let mut margins = objective.margins(&theta);
        let mut value = objective.value(&margins, &theta);

        let mut iterations = 0;
        let mut converged = false;
        let mut initial_norm: Option<f64> = None;

        loop {
            let gradient = objective.gradient(&margins, &theta);
            let grad_norm = l2_norm(&gradient);
            let threshold = self.tolerance * initial_norm.get_or_insert(grad_norm).max(1.0);

            if grad_norm <= threshold {
                converged = true;
                break;
            }
            if iterations >= self.max_iter {
                break;
            }

            let curvature = objective.curvature(&margins);
            let direction = objective.newton_direction(&curvature, &gradient, grad_norm);
            let slope = gradient.dot(&direction);
            if slope >= 0.0 {
                break;
            }

            let mut step = 1.0;
            let mut accepted = None;
            while step >= MIN_STEP {
                let candidate = &theta + &(&direction * step);
                let candidate_margins = objective.margins(&candidate);
                let candidate_value = objective.value(&candidate_margins, &candidate);
                if candidate_value <= value + ARMIJO_C * step * slope {
                    accepted = Some((candidate, candidate_margins, candidate_value));
                    break;
                }
                step *= 0.5;
            }

            iterations += 1;
            match accepted {
                Some((next, next_margins, next_value)) => {
                    theta = next;
                    margins = next_margins;
                    value = next_value;
                }
                None => break,
            }
        }

        let bias = theta[dim];
        let coefficients = theta.slice(ndarray::s![..dim]).to_owned();

        Ok(ClassifierState {
            coefficients,
            bias,
            class_weights,
            hyperparameters: *self,
            iterations,
            converged,
        })
    }

    fn validate_params(&self) -> Result<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(AppError::Configuration(format!(
                "Regularization strength C must be positive, got {}",
                self.c
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(AppError::Configuration(format!(
                "Tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iter == 0 {
            return Err(AppError::Configuration(
                "max_iter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check shapes, labels and values; returns the shared dimension
fn validate_training_set(x: &[SparseVector], y: &[u8]) -> Result<usize> {
    if x.is_empty() {
        return Err(AppError::Training("Training set is empty".to_string()));
    }
    if x.len() != y.len() {
        return Err(AppError::Training(format!(
            "Got {} feature vectors but {} labels",
            x.len(),
            y.len()
        )));
    }
    if let Some(bad) = y.iter().find(|&&label| label > 1) {
        return Err(AppError::InvalidInput(format!(
            "Labels must be 0 (ham) or 1 (spam), got {}",
            bad
        )));
    }

    let dim = x[0].dim();
    for vector in x {
        if vector.dim() != dim {
            return Err(AppError::DimensionMismatch {
                expected: dim,
                actual: vector.dim(),
            });
        }
        if !vector.is_finite() {
            return Err(AppError::InvalidInput(
                "Training vectors contain non-finite values".to_string(),
            ));
        }
    }

    Ok(dim)
}

/// Weighted logistic loss over a fixed training set, parameterised by
/// `theta = [w; b]`
struct Objective<'a> {
    x: &'a [SparseVector],
    y: &'a [u8],
    dim: usize,
    sample_weights: Vec<f64>,
}

impl<'a> Objective<'a> {
    fn new(
        x: &'a [SparseVector],
        y: &'a [u8],
        dim: usize,
        c: f64,
        class_weights: &ClassWeights,
    ) -> Self {
        let sample_weights = y.iter().map(|&label| c * class_weights.of(label)).collect();
        Self {
            x,
            y,
            dim,
            sample_weights,
        }
    }

    fn margins(&self, theta: &Array1<f64>) -> Vec<f64> {
        let bias = theta[self.dim];
        self.x
            .par_iter()
            .map(|x| x.dot(theta.view()) + bias)
            .collect()
    }

    fn value(&self, margins: &[f64], theta: &Array1<f64>) -> f64 {
        let penalty: f64 = theta.iter().take(self.dim).map(|w| w * w).sum::<f64>() * 0.5;
        let loss: f64 = margins
            .iter()
            .zip(self.y)
            .zip(&self.sample_weights)
            .map(|((&z, &label), &weight)| {
                let signed = if label == 1 { -z } else { z };
                weight * softplus(signed)
            })
            .sum();
        penalty + loss
    }

    fn gradient(&self, margins: &[f64], theta: &Array1<f64>) -> Array1<f64> {
        let mut gradient = theta.clone();
        gradient[self.dim] = 0.0;

        for (((x, &z), &label), &weight) in self
            .x
            .iter()
            .zip(margins)
            .zip(self.y)
            .zip(&self.sample_weights)
        {
            let residual = weight * (sigmoid(z) - label as f64);
            if residual == 0.0 {
                continue;
            }
            for (j, value) in x.iter() {
                gradient[j] += residual * value;
            }
            gradient[self.dim] += residual;
        }

        gradient
    }

    /// Per-sample second derivative of the weighted loss
    fn curvature(&self, margins: &[f64]) -> Vec<f64> {
        margins
            .iter()
            .zip(&self.sample_weights)
            .map(|(&z, &weight)| {
                let p = sigmoid(z);
                weight * p * (1.0 - p)
            })
            .collect()
    }

    fn hessian_product(&self, curvature: &[f64], v: &Array1<f64>) -> Array1<f64> {
        let mut product = v.clone();
        product[self.dim] = 0.0;
        let v_bias = v[self.dim];

        for (x, &d) in self.x.iter().zip(curvature) {
            if d == 0.0 {
                continue;
            }
            let scale = d * (x.dot(v.view()) + v_bias);
            for (j, value) in x.iter() {
                product[j] += scale * value;
            }
            product[self.dim] += scale;
        }

        product
    }

    /// Approximately solve `H · s = −g` with conjugate gradient
    fn newton_direction(
        &self,
        curvature: &[f64],
        gradient: &Array1<f64>,
        grad_norm: f64,
    ) -> Array1<f64> {
        let mut step = Array1::<f64>::zeros(gradient.len());
        let mut residual = gradient.mapv(|g| -g);
        let mut search = residual.clone();
        let mut rr = residual.dot(&residual);
        let stop = CG_RELATIVE_TOLERANCE * grad_norm;

        for _ in 0..gradient.len() {
            if rr.sqrt() <= stop {
                break;
            }
            let hp = self.hessian_product(curvature, &search);
            let curv = search.dot(&hp);
            if curv <= 0.0 {
                break;
            }
            let alpha = rr / curv;
            step.scaled_add(alpha, &search);
            residual.scaled_add(-alpha, &hp);

            let rr_next = residual.dot(&residual);
            let beta = rr_next / rr;
            search = &residual + &(&search * beta);
            rr = rr_next;
        }

        step
    }
}

fn l2_norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Logistic function, stable for large |z|
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^t)` without overflow
fn softplus(t: f64) -> f64 {
    if t > 0.0 {
        t + (-t).exp().ln_1p()
    } else {
        t.exp().ln_1p()
    }
}

/// Trained logistic regression model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierState {
    /// One weight per vocabulary feature
    pub coefficients: Array1<f64>,

    pub bias: f64,

    /// Class weights applied during training
    pub class_weights: ClassWeights,

    /// Hyper-parameters the model was trained with
    pub hyperparameters: LogisticRegression,

    /// Newton iterations performed
    pub iterations: usize,

    /// Whether the gradient tolerance was reached
    pub converged: bool,
}

impl ClassifierState {
    /// Linear score `w·x + b`
    pub fn decision_function(&self, x: &SparseVector) -> Result<f64> {
        if x.dim() != self.coefficients.len() {
            return Err(AppError::DimensionMismatch {
                expected: self.coefficients.len(),
                actual: x.dim(),
            });
        }
        if !x.is_finite() {
            return Err(AppError::InvalidInput(
                "Feature vector contains non-finite values".to_string(),
            ));
        }
        Ok(x.dot(self.coefficients.view()) + self.bias)
    }

    /// Classify one feature vector; spam iff the probability is at least 0.5
    pub fn predict(&self, x: &SparseVector) -> Result<PredictionResult> {
        let score = self.decision_function(x)?;
        let probability = sigmoid(score);
        let label = if probability >= 0.5 {
            Label::Spam
        } else {
            Label::Ham
        };

        Ok(PredictionResult {
            label,
            score,
            probability,
        })
    }

    /// Reject states that could not have come out of training
    pub fn validate(&self) -> Result<()> {
        if !self.bias.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err(AppError::ArtifactFormat(
                "Classifier contains non-finite weights".to_string(),
            ));
        }
        Ok(())
    }
}

impl Classifier for ClassifierState {
    fn predict(&self, x: &SparseVector) -> Result<PredictionResult> {
        ClassifierState::predict(self, x)
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[f64]) -> SparseVector {
        SparseVector::from_dense(values)
    }

    /// Spam lives on feature 0, ham on feature 1; feature 2 is shared noise
    fn toy_dataset() -> (Vec<SparseVector>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..6 {
            let noise = 0.1 * i as f64;
            x.push(vector(&[1.0, 0.0, noise]));
            y.push(1);
            x.push(vector(&[0.0, 1.0, noise]));
            y.push(0);
            x.push(vector(&[0.1, 0.9, 0.3]));
            y.push(0);
        }
        (x, y)
    }

    #[test]
    fn test_train_and_predict_separable_data() {
        let (x, y) = toy_dataset();
        let state = LogisticRegression::default().train(&x, &y).unwrap();

        assert_eq!(state.coefficients.len(), 3);
        assert!(state.converged);
        assert!(state.coefficients[0] > 0.0);
        assert!(state.coefficients[1] < 0.0);

        let spam = state.predict(&vector(&[1.0, 0.0, 0.0])).unwrap();
        let ham = state.predict(&vector(&[0.0, 1.0, 0.0])).unwrap();
        assert_eq!(spam.label, Label::Spam);
        assert_eq!(ham.label, Label::Ham);
        assert!(spam.probability > 0.5);
        assert!(ham.probability < 0.5);
    }

    #[test]
    fn test_balanced_class_weights() {
        let weights = ClassWeights::balanced(3, 1);
        assert!((weights.ham - 4.0 / 6.0).abs() < 1e-12);
        assert!((weights.spam - 2.0).abs() < 1e-12);

        let (x, y) = toy_dataset();
        let state = LogisticRegression::default().train(&x, &y).unwrap();
        // 12 ham, 6 spam
        assert!((state.class_weights.ham - 18.0 / 24.0).abs() < 1e-12);
        assert!((state.class_weights.spam - 18.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_solution_satisfies_tolerance() {
        let (x, y) = toy_dataset();
        let params = LogisticRegression::default();
        let state = params.train(&x, &y).unwrap();

        let weights = ClassWeights::balanced(12, 6);
        let objective = Objective::new(&x, &y, 3, params.c, &weights);

        let zero = Array1::<f64>::zeros(4);
        let g0 = l2_norm(&objective.gradient(&objective.margins(&zero), &zero));

        let mut theta = state.coefficients.to_vec();
        theta.push(state.bias);
        let theta = Array1::from_vec(theta);
        let g = l2_norm(&objective.gradient(&objective.margins(&theta), &theta));

        assert!(g <= params.tolerance * g0.max(1.0));
    }

    #[test]
    fn test_training_is_deterministic() {
        let (x, y) = toy_dataset();
        let first = LogisticRegression::default().train(&x, &y).unwrap();
        let second = LogisticRegression::default().train(&x, &y).unwrap();

        assert_eq!(first.bias.to_bits(), second.bias.to_bits());
        assert_eq!(first.coefficients, second.coefficients);
        assert_eq!(first.iterations, second.iterations);
    }

    #[test]
    fn test_single_class_fails() {
        let x = vec![vector(&[1.0, 0.0]), vector(&[0.0, 1.0])];

        let err = LogisticRegression::default().train(&x, &[0, 0]).unwrap_err();
        assert!(matches!(err, AppError::SingleClass { ref label } if label == "ham"));

        let err = LogisticRegression::default().train(&x, &[1, 1]).unwrap_err();
        assert!(matches!(err, AppError::SingleClass { ref label } if label == "spam"));
    }

    #[test]
    fn test_invalid_training_input() {
        let params = LogisticRegression::default();
        let x = vec![vector(&[1.0, 0.0]), vector(&[0.0, 1.0])];

        assert!(matches!(params.train(&[], &[]), Err(AppError::Training(_))));
        assert!(matches!(params.train(&x, &[1]), Err(AppError::Training(_))));
        assert!(matches!(
            params.train(&x, &[1, 2]),
            Err(AppError::InvalidInput(_))
        ));

        let ragged = vec![vector(&[1.0, 0.0]), vector(&[0.0, 1.0, 0.0])];
        assert!(matches!(
            params.train(&ragged, &[1, 0]),
            Err(AppError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));

        let nan = vec![vector(&[f64::NAN, 0.0]), vector(&[0.0, 1.0])];
        assert!(matches!(
            params.train(&nan, &[1, 0]),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_hyperparameters() {
        let (x, y) = toy_dataset();

        for params in [
            LogisticRegression::new(0.0, 100, 1e-4),
            LogisticRegression::new(1.0, 0, 1e-4),
            LogisticRegression::new(1.0, 100, f64::NAN),
        ] {
            assert!(matches!(
                params.train(&x, &y),
                Err(AppError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_max_iter_limits_work() {
        let (x, y) = toy_dataset();
        let state = LogisticRegression::new(1.0, 1, 1e-12).train(&x, &y).unwrap();

        assert_eq!(state.iterations, 1);
        assert!(!state.converged);
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let (x, y) = toy_dataset();
        let state = LogisticRegression::default().train(&x, &y).unwrap();

        let err = state.predict(&vector(&[1.0, 0.0])).unwrap_err();
        assert!(matches!(
            err,
            AppError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_predict_non_finite_input() {
        let (x, y) = toy_dataset();
        let state = LogisticRegression::default().train(&x, &y).unwrap();

        let err = state
            .predict(&vector(&[f64::INFINITY, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_zero_vector_follows_bias() {
        let (x, y) = toy_dataset();
        let state = LogisticRegression::default().train(&x, &y).unwrap();

        let result = state.predict(&SparseVector::zeros(3)).unwrap();
        assert_eq!(result.score, state.bias);
        assert_eq!(result.is_spam(), state.bias >= 0.0);
    }

    #[test]
    fn test_probability_and_label_agree() {
        let (x, y) = toy_dataset();
        let state = LogisticRegression::default().train(&x, &y).unwrap();

        for input in [
            [1.0, 0.0, 0.0],
            [0.5, 0.5, 0.5],
            [0.0, 0.0, 1.0],
            [0.2, 0.8, 0.0],
            [0.7, 0.7, 0.0],
        ] {
            let result = state.predict(&vector(&input)).unwrap();
            assert!((0.0..=1.0).contains(&result.probability));
            assert_eq!(result.is_spam(), result.probability >= 0.5);
        }
    }

    #[test]
    fn test_predict_batch_through_trait() {
        let (x, y) = toy_dataset();
        let state = LogisticRegression::default().train(&x, &y).unwrap();
        let model: &dyn Classifier = &state;

        let results = model.predict_batch(&x).unwrap();
        assert_eq!(results.len(), x.len());
        assert_eq!(model.n_features(), 3);
    }

    #[test]
    fn test_stable_numerics() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(softplus(800.0).is_finite());
        assert!((softplus(0.0) - 2.0f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn test_serde_round_trip_is_exact() {
        let (x, y) = toy_dataset();
        let state = LogisticRegression::default().train(&x, &y).unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let restored: ClassifierState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, state);
        assert!(restored.validate().is_ok());
    }
}
