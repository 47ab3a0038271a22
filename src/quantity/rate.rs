use std::{
    fmt::{Debug, Display, Formatter},
    ops::Mul,
};

use crate::quantity::{Quantity, cost::Cost, power::Kilowatts};

/// Price per kilowatt: per kilowatt-hour for energy components, per billed kilowatt of demand
/// for power components.
pub type KilowattRate = Quantity<-1, 0, 1>;

impl Display for KilowattRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} /kW", self.0)
    }
}

impl Debug for KilowattRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}/kW", self.0)
    }
}

impl Mul<Kilowatts> for KilowattRate {
    type Output = Cost;

    fn mul(self, rhs: Kilowatts) -> Self::Output {
        Quantity(self.0 * rhs.0)
    }
}

impl Mul<KilowattRate> for Kilowatts {
    type Output = Cost;

    fn mul(self, rhs: KilowattRate) -> Self::Output {
        rhs * self
    }
}
