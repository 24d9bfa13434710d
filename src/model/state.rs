use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{
    Asset, ChatError, ChatMessage, FundingAction, FundingKind, FundingRequest, Order, RequestId,
    Role, SenderRole, Side, SupportDesk, SupportThread, ThreadId, TradePermissionMode,
    UserAccount, UserId,
};

/// Direction of an admin balance adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopupMode {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "SUBTRACT")]
    Subtract,
}

/// Business-rule rejection. Every variant maps to the `error` string of the
/// `{ ok: false, error }` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownUser,
    UnknownManager,
    NotASubAdmin,
    UsernameTaken,
    UsernameRequired,
    PasswordTooShort,
    TradingDisabled(Side),
    InsufficientBalance,
    InvalidAmount,
    UnknownRequest,
    AlreadyResolved,
    InsufficientFunds,
    AddressRequired,
    Chat(ChatError),
}

impl Rejection {
    pub fn message(&self) -> String {
        match self {
            Rejection::UnknownUser => "User not found".into(),
            Rejection::UnknownManager => "Sub-admin not found".into(),
            Rejection::NotASubAdmin => "Target is not a sub-admin".into(),
            Rejection::UsernameTaken => "Username is already taken".into(),
            Rejection::UsernameRequired => "Username is required".into(),
            Rejection::PasswordTooShort => "Password must be at least 8 characters".into(),
            Rejection::TradingDisabled(side) => format!("{} trading is disabled", side),
            Rejection::InsufficientBalance => "Insufficient balance".into(),
            Rejection::InvalidAmount => "Amount must be greater than zero".into(),
            Rejection::UnknownRequest => "Request not found".into(),
            Rejection::AlreadyResolved => "Request was already processed".into(),
            Rejection::InsufficientFunds => "Insufficient wallet funds".into(),
            Rejection::AddressRequired => "Wallet address is required".into(),
            Rejection::Chat(err) => err.message().into(),
        }
    }
}

impl From<ChatError> for Rejection {
    fn from(err: ChatError) -> Self {
        Rejection::Chat(err)
    }
}

/// Result of a successful order placement, captured under the same write
/// lock that mutated the ledger. `session_win` is the rigged outcome for the
/// trading session this order opens; `None` for the random mode.
#[derive(Debug, Clone)]
pub struct PlacedTrade {
    pub order: Order,
    pub balance: Decimal,
    pub pnl: Decimal,
    pub session_win: Option<bool>,
}

pub const MIN_PASSWORD_LEN: usize = 8;

/// The whole in-memory world. Mutated only by the desk loop; the API reads
/// it behind an `RwLock`.
#[derive(Debug)]
pub struct State {
    starting_balance: Decimal,
    users: Vec<UserAccount>,
    requests: Vec<FundingRequest>,
    support: SupportDesk,
    deposit_addresses: BTreeMap<Asset, String>,
}

impl State {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            starting_balance,
            users: Vec::new(),
            requests: Vec::new(),
            support: SupportDesk::default(),
            deposit_addresses: BTreeMap::new(),
        }
    }

    // ---- accounts ----

    pub fn users(&self) -> &[UserAccount] {
        &self.users
    }

    pub fn user(&self, id: UserId) -> Option<&UserAccount> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_mut(&mut self, id: UserId) -> Option<&mut UserAccount> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    pub fn subadmins(&self) -> impl Iterator<Item = &UserAccount> {
        self.users.iter().filter(|u| u.role == Role::SubAdmin)
    }

    fn username_taken(&self, username: &str) -> bool {
        self.users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(username))
    }

    pub fn seed_superadmin(&mut self, username: &str, password: &str) -> UserId {
        if let Some(existing) = self.users.iter().find(|u| u.role == Role::SuperAdmin) {
            return existing.id;
        }
        let account =
            UserAccount::superadmin(username.to_string(), password, self.starting_balance);
        let id = account.id;
        self.users.push(account);
        id
    }

    pub fn create_customer(
        &mut self,
        username: &str,
        email: Option<String>,
    ) -> Result<&UserAccount, Rejection> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Rejection::UsernameRequired);
        }
        if self.username_taken(username) {
            return Err(Rejection::UsernameTaken);
        }

        self.users.push(UserAccount::customer(
            username.to_string(),
            email,
            self.starting_balance,
        ));
        Ok(self.users.last().unwrap())
    }

    pub fn create_subadmin(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<&UserAccount, Rejection> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Rejection::UsernameRequired);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Rejection::PasswordTooShort);
        }
        if self.username_taken(username) {
            return Err(Rejection::UsernameTaken);
        }

        self.users.push(UserAccount::subadmin(
            username.to_string(),
            password,
            self.starting_balance,
        ));
        Ok(self.users.last().unwrap())
    }

    pub fn reset_subadmin_password(
        &mut self,
        subadmin_id: UserId,
        new_password: &str,
    ) -> Result<(), Rejection> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Rejection::PasswordTooShort);
        }
        let account = self.user_mut(subadmin_id).ok_or(Rejection::UnknownUser)?;
        if account.role != Role::SubAdmin {
            return Err(Rejection::NotASubAdmin);
        }
        account.password_hash = Some(crate::model::hash_password(new_password));
        Ok(())
    }

    /// Moves a customer between "unassigned" and a sub-admin manager.
    pub fn assign_manager(
        &mut self,
        user_id: UserId,
        managed_by: Option<UserId>,
    ) -> Result<&UserAccount, Rejection> {
        if let Some(manager_id) = managed_by {
            match self.user(manager_id) {
                Some(manager) if manager.role == Role::SubAdmin => {}
                Some(_) => return Err(Rejection::NotASubAdmin),
                None => return Err(Rejection::UnknownManager),
            }
        }

        let account = self.user_mut(user_id).ok_or(Rejection::UnknownUser)?;
        account.managed_by = managed_by;
        Ok(self.user(user_id).unwrap())
    }

    // ---- trading ----

    pub fn place_order(
        &mut self,
        user_id: UserId,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<PlacedTrade, Rejection> {
        if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
            return Err(Rejection::InvalidAmount);
        }

        let account = self.user_mut(user_id).ok_or(Rejection::UnknownUser)?;
        if !account.side_enabled(side) {
            return Err(Rejection::TradingDisabled(side));
        }

        // The ledger keeps its silent boolean contract; the only reason it
        // says no is the BUY balance check.
        if !account.ledger.place(side, quantity, price) {
            return Err(Rejection::InsufficientBalance);
        }

        let order = account.ledger.orders()[0].clone();
        Ok(PlacedTrade {
            order,
            balance: account.ledger.balance(),
            pnl: account.ledger.pnl(),
            session_win: account.permission_mode.wins(side),
        })
    }

    pub fn set_trade_permission(
        &mut self,
        user_id: UserId,
        mode: TradePermissionMode,
        buy_enabled: Option<bool>,
        sell_enabled: Option<bool>,
    ) -> Result<&UserAccount, Rejection> {
        let account = self.user_mut(user_id).ok_or(Rejection::UnknownUser)?;
        account.permission_mode = mode;
        if let Some(buy) = buy_enabled {
            account.buy_enabled = buy;
        }
        if let Some(sell) = sell_enabled {
            account.sell_enabled = sell;
        }
        Ok(self.user(user_id).unwrap())
    }

    // ---- funding ----

    pub fn requests(&self) -> &[FundingRequest] {
        &self.requests
    }

    pub fn topup(
        &mut self,
        user_id: UserId,
        asset: Asset,
        amount: Decimal,
        mode: TopupMode,
    ) -> Result<Decimal, Rejection> {
        if amount <= Decimal::ZERO {
            return Err(Rejection::InvalidAmount);
        }

        let account = self.user_mut(user_id).ok_or(Rejection::UnknownUser)?;
        match mode {
            TopupMode::Add => account.wallet.credit(asset, amount),
            TopupMode::Subtract => {
                if !account.wallet.debit(asset, amount) {
                    return Err(Rejection::InsufficientFunds);
                }
            }
        }
        Ok(account.wallet.balance(Asset::Usdt))
    }

    pub fn create_funding_request(
        &mut self,
        user_id: UserId,
        kind: FundingKind,
        asset: Asset,
        amount: Decimal,
        wallet_address: String,
    ) -> Result<&FundingRequest, Rejection> {
        if amount <= Decimal::ZERO {
            return Err(Rejection::InvalidAmount);
        }
        if wallet_address.trim().is_empty() {
            return Err(Rejection::AddressRequired);
        }
        if self.user(user_id).is_none() {
            return Err(Rejection::UnknownUser);
        }

        self.requests
            .push(FundingRequest::open(user_id, kind, asset, amount, wallet_address));
        Ok(self.requests.last().unwrap())
    }

    /// Approves or declines a pending request. Approval is the only moment
    /// money moves: a deposit credits the wallet, a withdraw debits it and
    /// fails when the wallet holds less than the amount.
    pub fn resolve_funding_request(
        &mut self,
        request_id: RequestId,
        action: FundingAction,
    ) -> Result<FundingRequest, Rejection> {
        let index = self
            .requests
            .iter()
            .position(|r| r.id == request_id)
            .ok_or(Rejection::UnknownRequest)?;
        if !self.requests[index].is_pending() {
            return Err(Rejection::AlreadyResolved);
        }

        if action == FundingAction::Approve {
            let (user_id, kind, asset, amount) = {
                let r = &self.requests[index];
                (r.user_id, r.kind, r.asset, r.amount)
            };
            let account = self.user_mut(user_id).ok_or(Rejection::UnknownUser)?;
            match kind {
                FundingKind::Deposit => account.wallet.credit(asset, amount),
                FundingKind::Withdraw => {
                    if !account.wallet.debit(asset, amount) {
                        return Err(Rejection::InsufficientFunds);
                    }
                }
            }
        }

        self.requests[index].resolve(action);
        Ok(self.requests[index].clone())
    }

    pub fn pending_requests(&self, kind: FundingKind) -> impl Iterator<Item = &FundingRequest> {
        self.requests
            .iter()
            .filter(move |r| r.kind == kind && r.is_pending())
    }

    // ---- deposit addresses ----

    pub fn deposit_address(&self, asset: Asset) -> Option<&str> {
        self.deposit_addresses.get(&asset).map(String::as_str)
    }

    pub fn set_deposit_address(&mut self, asset: Asset, address: String) {
        self.deposit_addresses.insert(asset, address);
    }

    // ---- support chat ----

    pub fn support(&self) -> &SupportDesk {
        &self.support
    }

    pub fn close_support_thread(&mut self, thread_id: ThreadId) -> Result<SupportThread, Rejection> {
        Ok(self.support.close(thread_id)?.clone())
    }

    pub fn send_chat_message(
        &mut self,
        thread_id: Option<ThreadId>,
        sender_role: SenderRole,
        sender_id: UserId,
        body: String,
    ) -> Result<ChatMessage, Rejection> {
        if self.user(sender_id).is_none() {
            return Err(Rejection::UnknownUser);
        }
        let message = self.support.send(thread_id, sender_role, sender_id, body)?;
        Ok(message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state() -> State {
        State::new(dec!(10000))
    }

    fn state_with_customer() -> (State, UserId) {
        let mut s = state();
        let id = s.create_customer("alice", None).unwrap().id;
        (s, id)
    }

    #[test]
    fn should_seed_the_superadmin_once() {
        let mut s = state();
        let first = s.seed_superadmin("root", "super-secret");
        let second = s.seed_superadmin("root", "super-secret");
        assert_eq!(first, second);
        assert_eq!(s.users().len(), 1);
    }

    #[test]
    fn should_refuse_duplicate_usernames_case_insensitively() {
        let mut s = state();
        s.create_customer("Alice", None).unwrap();
        let err = s.create_customer("alice", None).unwrap_err();
        assert_eq!(err, Rejection::UsernameTaken);
    }

    #[test]
    fn should_enforce_the_subadmin_password_floor() {
        let mut s = state();
        let err = s.create_subadmin("desk-a", "short").unwrap_err();
        assert_eq!(err, Rejection::PasswordTooShort);
    }

    #[test]
    fn should_only_assign_subadmins_as_managers() {
        let mut s = state();
        let customer = s.create_customer("alice", None).unwrap().id;
        let other_customer = s.create_customer("bob", None).unwrap().id;
        let manager = s.create_subadmin("desk-a", "password1").unwrap().id;

        let err = s.assign_manager(customer, Some(other_customer)).unwrap_err();
        assert_eq!(err, Rejection::NotASubAdmin);

        let moved = s.assign_manager(customer, Some(manager)).unwrap();
        assert_eq!(moved.managed_by, Some(manager));

        let unassigned = s.assign_manager(customer, None).unwrap();
        assert_eq!(unassigned.managed_by, None);
    }

    #[test]
    fn should_place_orders_through_the_ledger() {
        let (mut s, user) = state_with_customer();

        let placed = s.place_order(user, Side::Buy, dec!(1), dec!(100)).unwrap();
        assert_eq!(placed.balance, dec!(9900));
        assert_eq!(placed.pnl, dec!(-100));
    }

    #[test]
    fn should_report_the_rigged_session_outcome() {
        let (mut s, user) = state_with_customer();

        // Default mode is all-loss.
        let placed = s.place_order(user, Side::Buy, dec!(1), dec!(10)).unwrap();
        assert_eq!(placed.session_win, Some(false));

        s.set_trade_permission(user, TradePermissionMode::BuyAllWin, None, None)
            .unwrap();
        let buy = s.place_order(user, Side::Buy, dec!(1), dec!(10)).unwrap();
        let sell = s.place_order(user, Side::Sell, dec!(1), dec!(10)).unwrap();
        assert_eq!(buy.session_win, Some(true));
        assert_eq!(sell.session_win, Some(false));

        s.set_trade_permission(user, TradePermissionMode::RandomWinLoss, None, None)
            .unwrap();
        let random = s.place_order(user, Side::Buy, dec!(1), dec!(10)).unwrap();
        assert_eq!(random.session_win, None);
    }

    #[test]
    fn should_distinguish_rejection_causes_at_the_edge() {
        let (mut s, user) = state_with_customer();

        let err = s.place_order(user, Side::Buy, dec!(0), dec!(100)).unwrap_err();
        assert_eq!(err, Rejection::InvalidAmount);

        let err = s.place_order(user, Side::Buy, dec!(1), dec!(20000)).unwrap_err();
        assert_eq!(err, Rejection::InsufficientBalance);

        s.set_trade_permission(user, TradePermissionMode::AllLoss, None, Some(false))
            .unwrap();
        let err = s.place_order(user, Side::Sell, dec!(1), dec!(100)).unwrap_err();
        assert_eq!(err, Rejection::TradingDisabled(Side::Sell));
    }

    #[test]
    fn should_topup_and_subtract_with_a_funds_check() {
        let (mut s, user) = state_with_customer();

        let usdt = s.topup(user, Asset::Usdt, dec!(250), TopupMode::Add).unwrap();
        assert_eq!(usdt, dec!(250));

        let err = s
            .topup(user, Asset::Usdt, dec!(300), TopupMode::Subtract)
            .unwrap_err();
        assert_eq!(err, Rejection::InsufficientFunds);

        let usdt = s
            .topup(user, Asset::Usdt, dec!(100), TopupMode::Subtract)
            .unwrap();
        assert_eq!(usdt, dec!(150));
    }

    #[test]
    fn should_credit_a_deposit_only_on_approval() {
        let (mut s, user) = state_with_customer();
        let request_id = s
            .create_funding_request(user, FundingKind::Deposit, Asset::Usdt, dec!(500), "T1".into())
            .unwrap()
            .id;

        assert_eq!(s.user(user).unwrap().wallet.balance(Asset::Usdt), dec!(0));

        let resolved = s
            .resolve_funding_request(request_id, FundingAction::Approve)
            .unwrap();
        assert!(!resolved.is_pending());
        assert_eq!(s.user(user).unwrap().wallet.balance(Asset::Usdt), dec!(500));
    }

    #[test]
    fn should_decline_without_moving_money() {
        let (mut s, user) = state_with_customer();
        let request_id = s
            .create_funding_request(user, FundingKind::Deposit, Asset::Btc, dec!(1), "b1".into())
            .unwrap()
            .id;

        s.resolve_funding_request(request_id, FundingAction::Decline)
            .unwrap();
        assert_eq!(s.user(user).unwrap().wallet.balance(Asset::Btc), dec!(0));

        let err = s
            .resolve_funding_request(request_id, FundingAction::Approve)
            .unwrap_err();
        assert_eq!(err, Rejection::AlreadyResolved);
    }

    #[test]
    fn should_block_withdrawals_beyond_the_wallet() {
        let (mut s, user) = state_with_customer();
        s.topup(user, Asset::Usdt, dec!(100), TopupMode::Add).unwrap();

        let request_id = s
            .create_funding_request(
                user,
                FundingKind::Withdraw,
                Asset::Usdt,
                dec!(250),
                "T2".into(),
            )
            .unwrap()
            .id;

        let err = s
            .resolve_funding_request(request_id, FundingAction::Approve)
            .unwrap_err();
        assert_eq!(err, Rejection::InsufficientFunds);

        // The request is still pending and can be declined instead.
        assert!(s.requests()[0].is_pending());
    }
}
