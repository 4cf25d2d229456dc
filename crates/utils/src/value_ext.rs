use crate::f;

/// Extends numeric primitives with stricter formatting
pub trait ValueExt {
    /// Scientific notation with a fixed precision and padded exponent
    ///
    /// The standard `{:e}` output varies in exponent width and drops the
    /// sign on positive exponents, which makes columns ragged. This pins
    /// both down.
    ///
    /// ```rust
    /// # use wxtools_utils::ValueExt;
    /// assert_eq!((1.0).sci(5, 2), "1.00000e+00".to_string());
    /// assert_eq!((-0.00321).sci(2, 2), "-3.21e-03".to_string());
    /// ```
    fn sci(&self, precision: usize, exp_pad: usize) -> String;
}

impl<T: std::fmt::LowerExp> ValueExt for T {
    fn sci(&self, precision: usize, exp_pad: usize) -> String {
        let raw = f!("{self:.precision$e}");
        // the 'e' marker is guaranteed by the LowerExp format
        let (mantissa, exponent) = raw.split_once('e').expect("LowerExp always emits 'e'");
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        f!("{mantissa}e{sign}{digits:0>exp_pad$}")
    }
}
