use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::Side;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderId(pub u64);

/// One paper trade. Immutable once created; the ledger never amends or deletes
/// an order within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn place(id: OrderId, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            id,
            side,
            quantity,
            price,
            created_at: Utc::now(),
        }
    }

    /// Cost of a BUY, proceeds of a SELL.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }

    /// Contribution to realized PnL: proceeds count positive, cost negative.
    pub fn signed_notional(&self) -> Decimal {
        match self.side {
            Side::Buy => -self.notional(),
            Side::Sell => self.notional(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn should_compute_notional() {
        let o = Order::place(OrderId(1), Side::Buy, dec!(3), dec!(150));
        assert_eq!(o.notional(), dec!(450));
    }

    #[test]
    fn should_sign_notional_by_side() {
        let buy = Order::place(OrderId(1), Side::Buy, dec!(1), dec!(100));
        let sell = Order::place(OrderId(2), Side::Sell, dec!(1), dec!(150));

        assert_eq!(buy.signed_notional(), dec!(-100));
        assert_eq!(sell.signed_notional(), dec!(150));
    }
}
