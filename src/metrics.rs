use crate::error::RoslError;
use crate::linalg::frobenius_norm;
use crate::Matrix;

fn check_shapes(a: &Matrix, b: &Matrix) -> Result<(), RoslError> {
    if a.dim() != b.dim() {
        return Err(RoslError::ShapeMismatch(format!(
            "matrices must have the same shape, got {:?} and {:?}",
            a.dim(),
            b.dim()
        )));
    }
    Ok(())
}

/// ||reference - approx||_F / ||reference||_F, or the absolute error when
/// `reference` is all zeros.
pub fn relative_error(reference: &Matrix, approx: &Matrix) -> Result<f64, RoslError> {
    check_shapes(reference, approx)?;

    let diff = reference - approx;
    let scale = frobenius_norm(reference);
    if scale == 0.0 {
        return Ok(frobenius_norm(&diff));
    }

    Ok(frobenius_norm(&diff) / scale)
}

pub fn mean_squared_error(x_true: &Matrix, x_pred: &Matrix) -> Result<f64, RoslError> {
    check_shapes(x_true, x_pred)?;

    let diff = x_true - x_pred;
    Ok(diff.mapv(|x| x * x).mean().unwrap_or(0.0))
}

/// Number of entries whose magnitude exceeds `threshold`.
pub fn count_nonzero(x: &Matrix, threshold: f64) -> usize {
    x.iter().filter(|v| v.abs() > threshold).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_relative_error() {
        let reference = array![[3.0, 0.0], [0.0, 4.0]];
        let approx = array![[3.0, 0.0], [0.0, 3.0]];

        let err = relative_error(&reference, &approx).unwrap();
        assert!((err - 0.2).abs() < 1e-10);
    }

    #[test]
    fn test_relative_error_zero_reference() {
        let reference = Matrix::zeros((2, 2));
        let approx = array![[0.0, 3.0], [4.0, 0.0]];

        let err = relative_error(&reference, &approx).unwrap();
        assert!((err - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_mean_squared_error() {
        let x_true = array![[1.0, 2.0], [3.0, 4.0]];
        let x_pred = array![[1.0, 2.0], [3.0, 2.0]];

        let mse = mean_squared_error(&x_true, &x_pred).unwrap();
        assert!((mse - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Matrix::zeros((2, 3));
        let b = Matrix::zeros((3, 2));
        assert!(matches!(mean_squared_error(&a, &b), Err(RoslError::ShapeMismatch(_))));
        assert!(matches!(relative_error(&a, &b), Err(RoslError::ShapeMismatch(_))));
    }

    #[test]
    fn test_count_nonzero() {
        let x = array![[0.0, 1e-9, -2.0], [0.5, 0.0, -1e-3]];
        assert_eq!(count_nonzero(&x, 0.0), 4);
        assert_eq!(count_nonzero(&x, 1e-6), 3);
        assert_eq!(count_nonzero(&x, 1.0), 1);
    }
}
