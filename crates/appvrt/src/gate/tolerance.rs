use std::fmt;

pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Maximum mismatch fraction that still counts as a pass.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Tolerance(f64);

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE)
    }
}

impl Tolerance {
    /// Accepts a fraction (`0.05`) or a percentage (`5`). Anything `>= 1` is
    /// read as a percentage, so `1` means 1%. Clamped to [0, 1]; non-finite
    /// input falls back to the default.
    pub fn new(raw: f64) -> Self {
        if !raw.is_finite() {
            return Self::default();
        }
        let fraction = if raw >= 1.0 { raw / 100.0 } else { raw };
        Self(fraction.clamp(0.0, 1.0))
    }

    /// Parse `"0.02"`, `"2"` or `"2%"`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let (number, percent) = match trimmed.strip_suffix('%') {
            Some(n) => (n.trim(), true),
            None => (trimmed, false),
        };
        let v: f64 = number
            .parse()
            .map_err(|_| format!("tolerance must be a number or percentage, got {raw:?}"))?;
        if !v.is_finite() {
            return Err(format!("tolerance must be finite, got {raw:?}"));
        }
        if percent {
            Ok(Self((v / 100.0).clamp(0.0, 1.0)))
        } else {
            Ok(Self::new(v))
        }
    }

    pub fn fraction(self) -> f64 {
        self.0
    }

    pub fn percent(self) -> f64 {
        self.0 * 100.0
    }

    /// Strictly greater: a mismatch equal to the tolerance passes.
    pub fn exceeded_by(self, mismatch: f64) -> bool {
        mismatch > self.0
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_means_one_percent() {
        assert_eq!(Tolerance::new(1.0).fraction(), 0.01);
        assert_eq!(Tolerance::new(5.0).fraction(), 0.05);
    }

    #[test]
    fn fractions_are_idempotent() {
        for v in [0.0, 0.001, 0.01, 0.25, 0.999] {
            let once = Tolerance::new(v);
            assert_eq!(once.fraction(), v);
            assert_eq!(Tolerance::new(once.fraction()), once);
        }
    }

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(Tolerance::new(-0.3).fraction(), 0.0);
        assert_eq!(Tolerance::new(250.0).fraction(), 1.0);
        assert_eq!(Tolerance::new(f64::NAN), Tolerance::default());
    }

    #[test]
    fn parse_accepts_percent_suffix() {
        assert_eq!(Tolerance::parse("2%").unwrap().fraction(), 0.02);
        assert_eq!(Tolerance::parse(" 0.5 % ").unwrap().fraction(), 0.005);
        assert_eq!(Tolerance::parse("0.03").unwrap().fraction(), 0.03);
        assert_eq!(Tolerance::parse("3").unwrap().fraction(), 0.03);
        assert!(Tolerance::parse("lots").is_err());
        assert!(Tolerance::parse("inf").is_err());
    }

    #[test]
    fn boundary_is_not_a_violation() {
        let t = Tolerance::new(0.01);
        assert!(!t.exceeded_by(0.01));
        assert!(t.exceeded_by(0.01 + f64::EPSILON));
        assert!(!t.exceeded_by(0.005));
    }

    #[test]
    fn displays_as_percent() {
        assert_eq!(Tolerance::default().to_string(), "1.00%");
    }
}
