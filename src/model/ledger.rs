use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::{Order, OrderId, Side};

/// The paper-trading ledger of a single account: a free balance and the order
/// history, most recent first. PnL is derived from the history on every read
/// and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    balance: Decimal,
    orders: Vec<Order>,
    #[serde(skip)]
    next_order_id: u64,
}

impl Ledger {
    pub fn open(starting_balance: Decimal) -> Self {
        Self {
            balance: starting_balance,
            orders: Vec::new(),
            next_order_id: 1,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Order history, most recent first.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Places a paper trade. A BUY whose cost exceeds the free balance is
    /// rejected and leaves the ledger untouched. A SELL always succeeds;
    /// there is deliberately no inventory or short-position check.
    pub fn place(&mut self, side: Side, quantity: Decimal, price: Decimal) -> bool {
        let total = quantity * price;
        if side == Side::Buy && self.balance < total {
            return false;
        }

        self.balance = match side {
            Side::Buy => self.balance - total,
            Side::Sell => self.balance + total,
        };

        let order = Order::place(OrderId(self.next_order_id), side, quantity, price);
        self.next_order_id += 1;
        self.orders.insert(0, order);
        true
    }

    /// Realized PnL proxy: signed sum of all order notionals. Not
    /// mark-to-market; no live price is consulted.
    pub fn pnl(&self) -> Decimal {
        self.orders.iter().map(Order::signed_notional).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger() -> Ledger {
        Ledger::open(dec!(10000))
    }

    #[test]
    fn should_open_with_the_starting_balance() {
        let l = ledger();
        assert_eq!(l.balance(), dec!(10000));
        assert!(l.orders().is_empty());
        assert_eq!(l.pnl(), dec!(0));
    }

    #[test]
    fn should_debit_a_buy() {
        let mut l = ledger();

        assert!(l.place(Side::Buy, dec!(1), dec!(100)));
        assert_eq!(l.balance(), dec!(9900));
        assert_eq!(l.orders().len(), 1);
    }

    #[test]
    fn should_reject_a_buy_beyond_the_balance() {
        let mut l = ledger();

        assert!(!l.place(Side::Buy, dec!(1), dec!(20000)));
        assert_eq!(l.balance(), dec!(10000));
        assert!(l.orders().is_empty());
    }

    #[test]
    fn should_accept_an_exact_balance_buy() {
        let mut l = ledger();

        assert!(l.place(Side::Buy, dec!(2), dec!(5000)));
        assert_eq!(l.balance(), dec!(0));
    }

    #[test]
    fn should_always_credit_a_sell() {
        let mut l = ledger();

        // No inventory check: selling without a position is allowed.
        assert!(l.place(Side::Sell, dec!(3), dec!(50)));
        assert_eq!(l.balance(), dec!(10150));
    }

    #[test]
    fn should_keep_history_most_recent_first() {
        let mut l = ledger();

        l.place(Side::Buy, dec!(1), dec!(100));
        l.place(Side::Sell, dec!(2), dec!(200));

        let sides: Vec<Side> = l.orders().iter().map(|o| o.side).collect();
        assert_eq!(sides, vec![Side::Sell, Side::Buy]);
        assert!(l.orders()[0].id.0 > l.orders()[1].id.0);
    }

    #[test]
    fn should_derive_pnl_as_the_signed_notional_sum() {
        let mut l = ledger();

        l.place(Side::Buy, dec!(2), dec!(100));
        l.place(Side::Sell, dec!(1), dec!(250));
        l.place(Side::Buy, dec!(1), dec!(40));

        assert_eq!(l.pnl(), dec!(-200) + dec!(250) - dec!(40));
    }

    #[test]
    fn should_walk_through_the_reference_session() {
        let mut l = ledger();

        assert!(l.place(Side::Buy, dec!(1), dec!(100)));
        assert_eq!(l.balance(), dec!(9900));

        assert!(!l.place(Side::Buy, dec!(1), dec!(20000)));
        assert_eq!(l.balance(), dec!(9900));

        assert!(l.place(Side::Sell, dec!(1), dec!(150)));
        assert_eq!(l.balance(), dec!(10050));
        assert_eq!(l.pnl(), dec!(50));
    }

    #[test]
    fn should_leave_the_ledger_unchanged_across_repeated_rejections() {
        let mut l = ledger();
        l.place(Side::Buy, dec!(99), dec!(100));

        for _ in 0..5 {
            assert!(!l.place(Side::Buy, dec!(2), dec!(100)));
        }

        assert_eq!(l.balance(), dec!(100));
        assert_eq!(l.orders().len(), 1);
    }
}
