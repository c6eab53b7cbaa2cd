//! USD price sources.

use std::collections::HashMap;

use crate::types::Network;

/// Supplies a USD price for a network's native unit.
pub trait PriceSource: Send + Sync {
    fn usd_price(&self, network: &Network) -> Option<f64>;
}

/// Fixed price table, usually loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPrices {
    prices: HashMap<Network, f64>,
}

impl StaticPrices {
    pub fn new(prices: HashMap<Network, f64>) -> Self {
        Self { prices }
    }

    pub fn with_price(mut self, network: impl Into<Network>, usd: f64) -> Self {
        self.prices.insert(network.into(), usd);
        self
    }
}

impl PriceSource for StaticPrices {
    fn usd_price(&self, network: &Network) -> Option<f64> {
        self.prices.get(network).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_prices() {
        let prices = StaticPrices::default().with_price("ethereum", 2000.0);
        assert_eq!(prices.usd_price(&Network::from("ethereum")), Some(2000.0));
        assert_eq!(prices.usd_price(&Network::from("solana")), None);
    }
}
