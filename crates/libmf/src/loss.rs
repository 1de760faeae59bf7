//! Loss function identifiers.

use serde::{Deserialize, Serialize};

/// Loss functions understood by the engine.
///
/// Discriminants are the engine's `fun` identifiers and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Loss {
    /// Squared error (L2-norm).
    RealL2 = 0,
    /// Absolute error (L1-norm).
    RealL1 = 1,
    /// Generalized KL-divergence. Requires non-negative factors.
    RealKl = 2,
    /// Logarithmic error.
    BinaryLog = 5,
    /// Squared hinge loss.
    BinaryL2 = 6,
    /// Hinge loss.
    BinaryL1 = 7,
    /// Row-oriented pair-wise logarithmic loss.
    OneClassRow = 10,
    /// Column-oriented pair-wise logarithmic loss.
    OneClassCol = 11,
    /// Squared error over all entries.
    OneClassL2 = 12,
}

impl Loss {
    /// All loss functions, in identifier order.
    pub const ALL: [Self; 9] = [
        Self::RealL2,
        Self::RealL1,
        Self::RealKl,
        Self::BinaryLog,
        Self::BinaryL2,
        Self::BinaryL1,
        Self::OneClassRow,
        Self::OneClassCol,
        Self::OneClassL2,
    ];

    /// The engine identifier.
    #[must_use]
    pub const fn id(self) -> i32 {
        self as i32
    }

    /// Returns true if the engine only accepts non-negative factors for
    /// this loss.
    #[must_use]
    pub const fn requires_nmf(self) -> bool {
        matches!(self, Self::RealKl)
    }
}

impl TryFrom<i32> for Loss {
    type Error = i32;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Self::ALL.into_iter().find(|l| l.id() == id).ok_or(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        let ids: Vec<i32> = Loss::ALL.iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 5, 6, 7, 10, 11, 12]);
    }

    #[test]
    fn test_try_from() {
        assert_eq!(Loss::try_from(2), Ok(Loss::RealKl));
        assert_eq!(Loss::try_from(12), Ok(Loss::OneClassL2));
        assert_eq!(Loss::try_from(3), Err(3));
    }

    #[test]
    fn test_only_kl_requires_nmf() {
        let forced: Vec<Loss> = Loss::ALL.into_iter().filter(|l| l.requires_nmf()).collect();
        assert_eq!(forced, vec![Loss::RealKl]);
    }

    #[test]
    fn test_serde_names() {
        #[derive(Deserialize)]
        struct Wrap {
            loss: Loss,
        }
        let w: Wrap = toml::from_str("loss = \"real_kl\"").unwrap();
        assert_eq!(w.loss, Loss::RealKl);
        let w: Wrap = toml::from_str("loss = \"one_class_row\"").unwrap();
        assert_eq!(w.loss, Loss::OneClassRow);
    }
}
