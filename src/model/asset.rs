use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Assets the platform quotes. USDT doubles as the funding currency for topups
/// and the paper-trading ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    #[serde(rename = "USDT")]
    Usdt,
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "SOL")]
    Sol,
    #[serde(rename = "XRP")]
    Xrp,
}

impl Asset {
    pub const ALL: [Asset; 5] = [Asset::Usdt, Asset::Btc, Asset::Eth, Asset::Sol, Asset::Xrp];
}

impl Display for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Asset::Usdt => "USDT",
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Sol => "SOL",
            Asset::Xrp => "XRP",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_round_trip_wire_names() {
        for asset in Asset::ALL {
            let json = serde_json::to_string(&asset).unwrap();
            assert_eq!(json, format!("\"{}\"", asset));
            assert_eq!(serde_json::from_str::<Asset>(&json).unwrap(), asset);
        }
    }
}
