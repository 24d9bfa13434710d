use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Asset, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingKind {
    #[serde(rename = "DEPOSIT")]
    Deposit,
    #[serde(rename = "WITHDRAW")]
    Withdraw,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "REJECTED")]
    Rejected,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingAction {
    #[serde(rename = "APPROVE")]
    Approve,
    #[serde(rename = "DECLINE")]
    Decline,
}

/// A customer's deposit or withdraw request waiting in the back-office
/// approval queue. Money only moves when an admin approves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub kind: FundingKind,
    pub asset: Asset,
    pub amount: Decimal,
    pub wallet_address: String,
    pub status: FundingStatus,
    pub created_at: DateTime<Utc>,
}

impl FundingRequest {
    pub fn open(
        user_id: UserId,
        kind: FundingKind,
        asset: Asset,
        amount: Decimal,
        wallet_address: String,
    ) -> Self {
        Self {
            id: RequestId::random(),
            user_id,
            kind,
            asset,
            amount,
            wallet_address,
            status: FundingStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == FundingStatus::Pending
    }

    pub fn resolve(&mut self, action: FundingAction) {
        self.status = match action {
            FundingAction::Approve => FundingStatus::Confirmed,
            FundingAction::Decline => FundingStatus::Rejected,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn should_open_pending() {
        let r = FundingRequest::open(
            UserId::random(),
            FundingKind::Deposit,
            Asset::Usdt,
            dec!(500),
            "TSomeAddress".into(),
        );
        assert!(r.is_pending());
    }

    #[test]
    fn should_resolve_to_a_terminal_status() {
        let mut r = FundingRequest::open(
            UserId::random(),
            FundingKind::Withdraw,
            Asset::Btc,
            dec!(0.25),
            "bc1qsomewhere".into(),
        );

        r.resolve(FundingAction::Decline);
        assert_eq!(r.status, FundingStatus::Rejected);
        assert!(!r.is_pending());
    }
}
