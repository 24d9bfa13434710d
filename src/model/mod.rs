pub use api_context::ApiContext;
pub use asset::Asset;
pub use chat::{ChatError, ChatMessage, SenderRole, SupportDesk, SupportThread, ThreadId};
pub use command::{Command, CreatedAccount};
pub use funding::{FundingAction, FundingKind, FundingRequest, RequestId};
pub use journal::{Journal, JournalEvent};
pub use ledger::Ledger;
pub use order::{Order, OrderId};
pub use permission::TradePermissionMode;
pub use side::Side;
pub use state::{PlacedTrade, Rejection, State, TopupMode};
pub use user::{hash_password, Role, UserAccount, UserId};

mod api_context;
mod asset;
mod chat;
mod command;
mod funding;
mod journal;
mod ledger;
mod order;
mod permission;
mod side;
mod state;
mod user;
