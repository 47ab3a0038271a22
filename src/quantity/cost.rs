use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Amount of money in the tariff currency.
pub type Cost = Quantity<0, 0, 1>;

impl Cost {
    /// Cost of an operation that cannot be priced.
    pub const INFINITY: Self = Self(f64::INFINITY);

    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Debug for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}
