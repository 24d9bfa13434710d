use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::model::{Asset, Ledger, Side, TradePermissionMode};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "CUSTOMER")]
    Customer,
    #[serde(rename = "SUBADMIN")]
    SubAdmin,
    #[serde(rename = "SUPERADMIN")]
    SuperAdmin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SubAdmin | Role::SuperAdmin)
    }
}

/// Multi-asset funding wallet. Separate from the paper ledger: topups and
/// approved deposits land here, the ledger only simulates trading.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Wallet {
    balances: BTreeMap<Asset, Decimal>,
}

impl Wallet {
    pub fn balance(&self, asset: Asset) -> Decimal {
        self.balances.get(&asset).copied().unwrap_or_default()
    }

    pub fn credit(&mut self, asset: Asset, amount: Decimal) {
        *self.balances.entry(asset).or_default() += amount;
    }

    /// Debits when funds suffice; returns false and leaves the wallet
    /// untouched otherwise.
    pub fn debit(&mut self, asset: Asset, amount: Decimal) -> bool {
        if self.balance(asset) < amount {
            return false;
        }
        *self.balances.entry(asset).or_default() -= amount;
        true
    }

    pub fn snapshot(&self) -> BTreeMap<Asset, Decimal> {
        let mut all = BTreeMap::new();
        for asset in Asset::ALL {
            all.insert(asset, self.balance(asset));
        }
        all
    }
}

#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    /// Sub-admin this customer is assigned to, if any.
    pub managed_by: Option<UserId>,
    pub password_hash: Option<String>,
    /// Sign-up referral code handed out when a sub-admin is created.
    pub invitation_code: Option<String>,
    pub buy_enabled: bool,
    pub sell_enabled: bool,
    pub permission_mode: TradePermissionMode,
    pub wallet: Wallet,
    pub ledger: Ledger,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn customer(username: String, email: Option<String>, starting_balance: Decimal) -> Self {
        Self {
            id: UserId::random(),
            username,
            email,
            role: Role::Customer,
            managed_by: None,
            password_hash: None,
            invitation_code: None,
            buy_enabled: true,
            sell_enabled: true,
            permission_mode: TradePermissionMode::default(),
            wallet: Wallet::default(),
            ledger: Ledger::open(starting_balance),
            created_at: Utc::now(),
        }
    }

    pub fn subadmin(username: String, password: &str, starting_balance: Decimal) -> Self {
        let mut account = Self::customer(username, None, starting_balance);
        account.role = Role::SubAdmin;
        account.password_hash = Some(hash_password(password));
        account.invitation_code = Some(invitation_code());
        account
    }

    pub fn superadmin(username: String, password: &str, starting_balance: Decimal) -> Self {
        let mut account = Self::subadmin(username, password, starting_balance);
        account.role = Role::SuperAdmin;
        account
    }

    pub fn side_enabled(&self, side: Side) -> bool {
        match side {
            Side::Buy => self.buy_enabled,
            Side::Sell => self.sell_enabled,
        }
    }

    /// Whether `admin` may act on this account: super-admins see everyone,
    /// sub-admins only their assigned customers.
    pub fn managed_visible_to(&self, admin: &UserAccount) -> bool {
        match admin.role {
            Role::SuperAdmin => true,
            Role::SubAdmin => self.managed_by == Some(admin.id),
            Role::Customer => false,
        }
    }
}

pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn invitation_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
