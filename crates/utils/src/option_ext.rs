use crate::f;

/// Extends Option for log-friendly formatting
pub trait OptionExt {
    /// The contained value as a string, or "none"
    ///
    /// Saves unwrapping options purely to print them in parameter echoes.
    ///
    /// ```rust
    /// # use wxtools_utils::OptionExt;
    /// assert_eq!(Some(2).display(), "2");
    /// assert_eq!(None::<u32>.display(), "none");
    /// ```
    fn display(&self) -> String;
}

impl<T: std::fmt::Display> OptionExt for Option<T> {
    fn display(&self) -> String {
        self.as_ref()
            .map_or_else(|| "none".to_string(), |value| f!("{value}"))
    }
}
