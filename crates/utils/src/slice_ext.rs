/// Extends float slices with the vector arithmetic used across the toolkit
///
/// Feature-space coordinates, shifts, bandwidths, and modes are all plain
/// `Vec<f64>` of varying rank, so the common operations live here rather
/// than on any particular type.
pub trait SliceExt {
    /// Euclidean norm of the slice
    ///
    /// ```rust
    /// # use wxtools_utils::SliceExt;
    /// assert_eq!([3.0, 4.0].norm(), 5.0);
    /// ```
    fn norm(&self) -> f64;

    /// Euclidean distance to another slice of the same length
    ///
    /// ```rust
    /// # use wxtools_utils::SliceExt;
    /// assert_eq!([1.0, 1.0].distance_to(&[4.0, 5.0]), 5.0);
    /// ```
    fn distance_to(&self, other: &[f64]) -> f64;

    /// Arithmetic mean, 0.0 for an empty slice
    fn mean(&self) -> f64;

    /// Smallest value, `f64::INFINITY` for an empty slice
    fn min_value(&self) -> f64;

    /// Largest value, `f64::NEG_INFINITY` for an empty slice
    fn max_value(&self) -> f64;
}

impl<S> SliceExt for S
where
    S: AsRef<[f64]>,
{
    fn norm(&self) -> f64 {
        self.as_ref().iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    fn distance_to(&self, other: &[f64]) -> f64 {
        debug_assert_eq!(self.as_ref().len(), other.len());
        self.as_ref()
            .iter()
            .zip(other)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    fn mean(&self) -> f64 {
        let values = self.as_ref();
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    fn min_value(&self) -> f64 {
        self.as_ref().iter().fold(f64::INFINITY, |a, &b| a.min(b))
    }

    fn max_value(&self) -> f64 {
        self.as_ref()
            .iter()
            .fold(f64::NEG_INFINITY, |a, &b| a.max(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_of_empty_slice_is_zero() {
        let empty: [f64; 0] = [];
        assert_eq!(empty.norm(), 0.0);
    }

    #[test]
    fn extrema() {
        let values = [2.0, -1.0, 7.0, 0.5];
        assert_eq!(values.min_value(), -1.0);
        assert_eq!(values.max_value(), 7.0);
        assert_eq!(values.mean(), 2.125);
    }
}
