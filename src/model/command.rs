use rust_decimal::Decimal;
use tokio::sync::oneshot;

use crate::model::{
    Asset, ChatMessage, FundingAction, FundingKind, FundingRequest, PlacedTrade, Rejection,
    RequestId, SenderRole, Side, SupportThread, ThreadId, TopupMode, TradePermissionMode, UserId,
};

pub type Reply<T> = oneshot::Sender<Result<T, Rejection>>;

/// Summary of a freshly created account, carried back to the handler that
/// asked for it.
#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub id: UserId,
    pub username: String,
    pub invitation_code: Option<String>,
}

/// Every mutation of the shared state travels through exactly one of these,
/// funneled into the desk loop; each variant carries its own reply channel.
#[derive(Debug)]
pub enum Command {
    PlaceOrder {
        user_id: UserId,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        reply: Reply<PlacedTrade>,
    },
    CreateCustomer {
        username: String,
        email: Option<String>,
        reply: Reply<CreatedAccount>,
    },
    CreateSubAdmin {
        username: String,
        password: String,
        reply: Reply<CreatedAccount>,
    },
    ResetSubAdminPassword {
        subadmin_id: UserId,
        new_password: String,
        reply: Reply<()>,
    },
    AssignManager {
        user_id: UserId,
        managed_by: Option<UserId>,
        reply: Reply<Option<UserId>>,
    },
    Topup {
        user_id: UserId,
        asset: Asset,
        amount: Decimal,
        mode: TopupMode,
        note: Option<String>,
        reply: Reply<Decimal>,
    },
    CreateFundingRequest {
        user_id: UserId,
        kind: FundingKind,
        asset: Asset,
        amount: Decimal,
        wallet_address: String,
        reply: Reply<FundingRequest>,
    },
    ResolveFundingRequest {
        request_id: RequestId,
        action: FundingAction,
        reply: Reply<FundingRequest>,
    },
    SetTradePermission {
        user_id: UserId,
        mode: TradePermissionMode,
        buy_enabled: Option<bool>,
        sell_enabled: Option<bool>,
        reply: Reply<TradePermissionMode>,
    },
    SetDepositAddress {
        asset: Asset,
        address: String,
        reply: Reply<()>,
    },
    SendChatMessage {
        thread_id: Option<ThreadId>,
        sender_role: SenderRole,
        sender_id: UserId,
        body: String,
        reply: Reply<ChatMessage>,
    },
    CloseSupportThread {
        thread_id: ThreadId,
        reply: Reply<SupportThread>,
    },
}
