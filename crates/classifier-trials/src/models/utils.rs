//! Input validation and hyperparameter coercion shared by the learners.
use ndarray::{Array1, Array2};

use crate::error::{Result, TrialError};
use crate::params::ParamValue;

/// Validate a training partition and return its two classes, sorted.
pub(crate) fn check_fit_input(model: &str, x: &Array2<f64>, y: &Array1<i32>) -> Result<[i32; 2]> {
    if x.nrows() != y.len() {
        return Err(TrialError::invalid_input(format!(
            "{}: X has {} rows but y has {} labels",
            model,
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(TrialError::invalid_input(format!(
            "{}: training data has shape {:?}",
            model,
            x.dim()
        )));
    }
    check_finite(model, x)?;

    let mut classes: Vec<i32> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    if classes.len() != 2 {
        return Err(TrialError::invalid_input(format!(
            "{}: binary classification needs exactly 2 classes, found {:?}",
            model, classes
        )));
    }
    Ok([classes[0], classes[1]])
}

/// Validate a prediction matrix against the fitted feature count.
pub(crate) fn check_predict_input(model: &str, x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(TrialError::invalid_input(format!(
            "{}: X has {} features, but the model was fitted with {}",
            model,
            x.ncols(),
            n_features
        )));
    }
    check_finite(model, x)
}

fn check_finite(model: &str, x: &Array2<f64>) -> Result<()> {
    if x.iter().any(|v| !v.is_finite()) {
        return Err(TrialError::invalid_input(format!(
            "{}: X contains NaN or infinity",
            model
        )));
    }
    Ok(())
}

/// Encode labels as 0 (first class) / 1 (second class).
pub(crate) fn encode_labels(y: &Array1<i32>, classes: &[i32; 2]) -> Vec<usize> {
    y.iter().map(|&l| usize::from(l == classes[1])).collect()
}

/// Turn positive-class probabilities into labels; ties go to the first class.
pub(crate) fn decode_labels(proba: &Array2<f64>, classes: &[i32; 2]) -> Array1<i32> {
    proba
        .rows()
        .into_iter()
        .map(|row| if row[1] > row[0] { classes[1] } else { classes[0] })
        .collect()
}

pub(crate) fn param_usize(model: &str, name: &str, value: &ParamValue, min: usize) -> Result<usize> {
    match value.as_int() {
        Some(v) if v >= min as i64 => Ok(v as usize),
        Some(_) => Err(TrialError::invalid_parameter(
            model,
            name,
            value,
            format!("must be an integer >= {}", min),
        )),
        None => Err(TrialError::invalid_parameter(model, name, value, "expected an integer")),
    }
}

pub(crate) fn param_f64(model: &str, name: &str, value: &ParamValue, min_exclusive: f64) -> Result<f64> {
    match value.as_float() {
        Some(v) if v.is_finite() && v > min_exclusive => Ok(v),
        Some(_) => Err(TrialError::invalid_parameter(
            model,
            name,
            value,
            format!("must be a finite number > {}", min_exclusive),
        )),
        None => Err(TrialError::invalid_parameter(model, name, value, "expected a number")),
    }
}

pub(crate) fn param_bool(model: &str, name: &str, value: &ParamValue) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| TrialError::invalid_parameter(model, name, value, "expected a boolean"))
}

/// Match a string option against its allowed spellings.
pub(crate) fn param_choice<'a>(
    model: &str,
    name: &str,
    value: &'a ParamValue,
    allowed: &[&str],
) -> Result<&'a str> {
    match value.as_str() {
        Some(s) if allowed.contains(&s) => Ok(s),
        _ => Err(TrialError::invalid_parameter(
            model,
            name,
            value,
            format!("must be one of {:?}", allowed),
        )),
    }
}

pub(crate) fn param_seed(model: &str, name: &str, value: &ParamValue) -> Result<Option<u64>> {
    match value {
        ParamValue::None => Ok(None),
        ParamValue::Int(v) if *v >= 0 => Ok(Some(*v as u64)),
        _ => Err(TrialError::invalid_parameter(
            model,
            name,
            value,
            "expected a non-negative integer or None",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_input_rejects_misaligned_rows() {
        let x = Array2::<f64>::zeros((3, 2));
        let y = Array1::from_vec(vec![0, 1]);
        assert!(matches!(
            check_fit_input("m", &x, &y),
            Err(TrialError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fit_input_rejects_single_class_and_nan() {
        let x = Array2::<f64>::zeros((2, 2));
        assert!(check_fit_input("m", &x, &Array1::from_vec(vec![1, 1])).is_err());

        let mut x = Array2::<f64>::zeros((2, 2));
        x[[0, 1]] = f64::NAN;
        assert!(check_fit_input("m", &x, &Array1::from_vec(vec![0, 1])).is_err());
    }

    #[test]
    fn test_label_encoding_roundtrip() {
        let classes = [-1, 1];
        let y = Array1::from_vec(vec![1, -1, 1]);
        assert_eq!(encode_labels(&y, &classes), vec![1, 0, 1]);

        let proba = Array2::from_shape_vec((2, 2), vec![0.2, 0.8, 0.5, 0.5]).unwrap();
        assert_eq!(decode_labels(&proba, &classes).to_vec(), vec![1, -1]);
    }

    #[test]
    fn test_param_coercion_errors_name_the_parameter() {
        let err = param_usize("KNN", "n_neighbors", &ParamValue::Int(0), 1).unwrap_err();
        assert!(err.to_string().contains("n_neighbors"));
        assert!(param_choice("KNN", "weights", &ParamValue::from("nearest"), &["uniform"]).is_err());
        assert_eq!(param_seed("MLP", "random_state", &ParamValue::None).unwrap(), None);
    }
}
