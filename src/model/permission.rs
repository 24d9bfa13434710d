use serde::{Deserialize, Serialize};

use crate::model::Side;

/// Admin-rigged outcome bias for a customer's paper-trading sessions. Stored
/// per user and surfaced on the back-office dashboard; the default (and the
/// fallback for any unrecognized stored value) is all-loss.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradePermissionMode {
    #[serde(rename = "BUY_ALL_WIN")]
    BuyAllWin,
    #[serde(rename = "SELL_ALL_WIN")]
    SellAllWin,
    #[serde(rename = "RANDOM_WIN_LOSS")]
    RandomWinLoss,
    #[default]
    #[serde(rename = "ALL_LOSS")]
    AllLoss,
}

impl TradePermissionMode {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "BUY_ALL_WIN" => Self::BuyAllWin,
            "SELL_ALL_WIN" => Self::SellAllWin,
            "RANDOM_WIN_LOSS" => Self::RandomWinLoss,
            _ => Self::AllLoss,
        }
    }

    /// Whether a session on the given side is rigged to win. `None` for the
    /// random mode, which is decided elsewhere (loss-heavy by product rule).
    pub fn wins(&self, side: Side) -> Option<bool> {
        match self {
            Self::BuyAllWin => Some(side == Side::Buy),
            Self::SellAllWin => Some(side == Side::Sell),
            Self::RandomWinLoss => None,
            Self::AllLoss => Some(false),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BuyAllWin => "Buy all win",
            Self::SellAllWin => "Sell all win",
            Self::RandomWinLoss => "All random win/loss",
            Self::AllLoss => "All loss",
        }
    }

    pub fn session_label(&self) -> &'static str {
        match self {
            Self::BuyAllWin => "BUY win / SELL loss",
            Self::SellAllWin => "SELL win / BUY loss",
            Self::RandomWinLoss => "Random (loss-heavy)",
            Self::AllLoss => "BUY+SELL loss",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_normalize_known_modes_case_insensitively() {
        assert_eq!(
            TradePermissionMode::normalize("buy_all_win"),
            TradePermissionMode::BuyAllWin
        );
        assert_eq!(
            TradePermissionMode::normalize(" RANDOM_WIN_LOSS "),
            TradePermissionMode::RandomWinLoss
        );
    }

    #[test]
    fn should_fall_back_to_all_loss() {
        assert_eq!(
            TradePermissionMode::normalize("whatever"),
            TradePermissionMode::AllLoss
        );
        assert_eq!(TradePermissionMode::default(), TradePermissionMode::AllLoss);
    }

    #[test]
    fn should_bias_outcomes_by_side() {
        assert_eq!(TradePermissionMode::BuyAllWin.wins(Side::Buy), Some(true));
        assert_eq!(TradePermissionMode::BuyAllWin.wins(Side::Sell), Some(false));
        assert_eq!(TradePermissionMode::SellAllWin.wins(Side::Sell), Some(true));
        assert_eq!(TradePermissionMode::AllLoss.wins(Side::Buy), Some(false));
        assert_eq!(TradePermissionMode::RandomWinLoss.wins(Side::Buy), None);
    }
}
