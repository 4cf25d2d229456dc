//! Module for the closed kernel family

// standard library
use std::str::FromStr;

/// Kernel functions weighing samples by bandwidth-scaled distance
///
/// Kernels receive the normalised distance `‖Δ/h‖` that the range search
/// returns, so a distance of 1.0 sits exactly on the bandwidth ellipse.
/// The family is closed on purpose: the hot loop dispatches with a `match`
/// that inlines, rather than through a trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kernel {
    /// `exp(-u²/2)`, unnormalised
    #[default]
    Gaussian,
    /// `exp(-u²/2) / √(2π)`
    GaussianNormal,
    /// `3/4 (1 - u²)` inside the unit ball, zero outside
    Epanechnikov,
    /// 1 inside the unit ball, zero outside
    Uniform,
}

impl Kernel {
    /// Weight for a non-negative bandwidth-scaled distance
    ///
    /// ```rust
    /// # use wxtools_detect::Kernel;
    /// assert_eq!(Kernel::Uniform.apply(0.5), 1.0);
    /// assert_eq!(Kernel::Uniform.apply(1.5), 0.0);
    /// assert_eq!(Kernel::Gaussian.apply(0.0), 1.0);
    /// ```
    #[inline]
    pub fn apply(&self, distance: f64) -> f64 {
        match self {
            Self::Gaussian => (-0.5 * distance * distance).exp(),
            Self::GaussianNormal => {
                (-0.5 * distance * distance).exp() / (2.0 * std::f64::consts::PI).sqrt()
            }
            Self::Epanechnikov => {
                if distance <= 1.0 {
                    0.75 * (1.0 - distance * distance)
                } else {
                    0.0
                }
            }
            Self::Uniform => {
                if distance <= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl FromStr for Kernel {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gaussian" => Ok(Self::Gaussian),
            "gaussian-normal" => Ok(Self::GaussianNormal),
            "epanechnikov" => Ok(Self::Epanechnikov),
            "uniform" => Ok(Self::Uniform),
            _ => Err(format!("unknown kernel \"{s}\"")),
        }
    }
}

impl std::fmt::Display for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Gaussian => "gaussian",
            Self::GaussianNormal => "gaussian-normal",
            Self::Epanechnikov => "epanechnikov",
            Self::Uniform => "uniform",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Kernel::Gaussian)]
    #[case(Kernel::GaussianNormal)]
    #[case(Kernel::Epanechnikov)]
    #[case(Kernel::Uniform)]
    fn kernels_decrease_with_distance(#[case] kernel: Kernel) {
        assert!(kernel.apply(0.0) >= kernel.apply(0.5));
        assert!(kernel.apply(0.5) >= kernel.apply(1.0));
        assert!(kernel.apply(0.0) > 0.0);
    }

    #[test]
    fn compact_kernels_vanish_outside_the_ball() {
        assert_eq!(Kernel::Epanechnikov.apply(1.01), 0.0);
        assert_eq!(Kernel::Uniform.apply(1.01), 0.0);
    }

    #[rstest]
    #[case("gaussian", Kernel::Gaussian)]
    #[case("Gaussian-Normal", Kernel::GaussianNormal)]
    #[case("epanechnikov", Kernel::Epanechnikov)]
    #[case("uniform", Kernel::Uniform)]
    fn parse_round_trips(#[case] name: &str, #[case] expected: Kernel) {
        assert_eq!(name.parse::<Kernel>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<Kernel>().unwrap(), expected);
    }
}
