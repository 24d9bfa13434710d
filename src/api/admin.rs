use std::collections::{BTreeMap, HashMap};

use hyper::{Body, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    ApiContext, Asset, Command, FundingAction, FundingKind, FundingRequest, Rejection, RequestId,
    Role, State, TopupMode, TradePermissionMode, UserAccount, UserId,
};

use super::auth::Session;
use super::error::HttpResult;
use super::{ok_response, parse_body, rejection_response};

/// Which approval queue an endpoint serves. Both queues share the same
/// request store, split by kind.
#[derive(Debug, Copy, Clone)]
pub(super) enum Queue {
    Deposit,
    Withdraw,
}

impl Queue {
    fn kind(self) -> FundingKind {
        match self {
            Queue::Deposit => FundingKind::Deposit,
            Queue::Withdraw => FundingKind::Withdraw,
        }
    }
}

fn managed_by_filter(query: &HashMap<String, String>) -> Option<UserId> {
    query
        .get("managedBy")
        .or_else(|| query.get("managed_by"))
        .and_then(|v| v.parse::<Uuid>().ok())
        .map(UserId)
}

/// The acting admin's account, straight from the live state. A session whose
/// account has disappeared is treated as an internal error rather than a 401:
/// the token was valid moments ago.
fn acting_admin<'a>(state: &'a State, session: &Session) -> HttpResult<&'a UserAccount> {
    state
        .user(session.user_id)
        .ok_or_else(super::error::internal_err)
}

// ---- users ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserRow {
    id: UserId,
    username: String,
    email: Option<String>,
    role: Role,
    managed_by: Option<UserId>,
    invitation_code: Option<String>,
    usdt_balance: Decimal,
    trade_balance: Decimal,
    pnl: Decimal,
    buy_enabled: bool,
    sell_enabled: bool,
    permission_mode: TradePermissionMode,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl UserRow {
    fn of(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role,
            managed_by: account.managed_by,
            invitation_code: account.invitation_code.clone(),
            usdt_balance: account.wallet.balance(Asset::Usdt),
            trade_balance: account.ledger.balance(),
            pnl: account.ledger.pnl(),
            buy_enabled: account.buy_enabled,
            sell_enabled: account.sell_enabled,
            permission_mode: account.permission_mode,
            created_at: account.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsersResponse {
    users: Vec<UserRow>,
}

pub(super) async fn list_users(
    context: &ApiContext,
    session: Session,
    query: &HashMap<String, String>,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;

    let state = context.read_state().await;
    let admin = acting_admin(&state, &session)?;
    let filter = managed_by_filter(query);

    let users: Vec<UserRow> = state
        .users()
        .iter()
        .filter(|u| u.role == Role::Customer)
        .filter(|u| u.managed_visible_to(admin))
        .filter(|u| filter.map_or(true, |manager| u.managed_by == Some(manager)))
        .map(UserRow::of)
        .collect();

    ok_response(&UsersResponse { users })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody {
    username: String,
    email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedAccountResponse {
    id: UserId,
    username: String,
    invitation_code: Option<String>,
}

pub(super) async fn create_user(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;
    let payload: CreateUserBody = parse_body(body).await?;

    let result = context
        .execute(|reply| Command::CreateCustomer {
            username: payload.username,
            email: payload.email,
            reply,
        })
        .await?;

    match result {
        Ok(created) => ok_response(&CreatedAccountResponse {
            id: created.id,
            username: created.username,
            invitation_code: created.invitation_code,
        }),
        Err(rejection) => rejection_response(&rejection),
    }
}

// ---- topup ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopupBody {
    user_id: Uuid,
    asset: Asset,
    amount: Decimal,
    mode: TopupMode,
    note: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopupResponse {
    new_usdt_balance: Decimal,
}

pub(super) async fn topup(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;
    let payload: TopupBody = parse_body(body).await?;
    let user_id = UserId(payload.user_id);

    if !target_visible(context, &session, user_id).await? {
        return rejection_response(&Rejection::UnknownUser);
    }

    let result = context
        .execute(|reply| Command::Topup {
            user_id,
            asset: payload.asset,
            amount: payload.amount,
            mode: payload.mode,
            note: payload.note,
            reply,
        })
        .await?;

    match result {
        Ok(new_usdt_balance) => ok_response(&TopupResponse { new_usdt_balance }),
        Err(rejection) => rejection_response(&rejection),
    }
}

/// Sub-admins only ever act on their own customers; a target outside that
/// scope reads the same as a target that does not exist.
async fn target_visible(
    context: &ApiContext,
    session: &Session,
    user_id: UserId,
) -> HttpResult<bool> {
    let state = context.read_state().await;
    let admin = acting_admin(&state, session)?;
    Ok(state
        .user(user_id)
        .map(|target| target.managed_visible_to(admin))
        .unwrap_or(false))
}

// ---- sub-admins ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubAdminRow {
    id: UserId,
    username: String,
    invitation_code: Option<String>,
    customers: usize,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubAdminsResponse {
    subadmins: Vec<SubAdminRow>,
}

pub(super) async fn list_subadmins(
    context: &ApiContext,
    session: Session,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;

    let state = context.read_state().await;
    let subadmins: Vec<SubAdminRow> = state
        .subadmins()
        .map(|sub| SubAdminRow {
            id: sub.id,
            username: sub.username.clone(),
            invitation_code: sub.invitation_code.clone(),
            customers: state
                .users()
                .iter()
                .filter(|u| u.managed_by == Some(sub.id))
                .count(),
            created_at: sub.created_at,
        })
        .collect();

    ok_response(&SubAdminsResponse { subadmins })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubAdminBody {
    username: String,
    password: String,
}

pub(super) async fn create_subadmin(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_superadmin()?;
    let payload: CreateSubAdminBody = parse_body(body).await?;

    let result = context
        .execute(|reply| Command::CreateSubAdmin {
            username: payload.username,
            password: payload.password,
            reply,
        })
        .await?;

    match result {
        Ok(created) => ok_response(&CreatedAccountResponse {
            id: created.id,
            username: created.username,
            invitation_code: created.invitation_code,
        }),
        Err(rejection) => rejection_response(&rejection),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordBody {
    subadmin_id: Uuid,
    new_password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordResponse {
    subadmin_id: UserId,
}

pub(super) async fn reset_subadmin_password(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_superadmin()?;
    let payload: ResetPasswordBody = parse_body(body).await?;
    let subadmin_id = UserId(payload.subadmin_id);

    let result = context
        .execute(|reply| Command::ResetSubAdminPassword {
            subadmin_id,
            new_password: payload.new_password,
            reply,
        })
        .await?;

    match result {
        Ok(()) => ok_response(&ResetPasswordResponse { subadmin_id }),
        Err(rejection) => rejection_response(&rejection),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignManagerBody {
    user_id: Uuid,
    managed_by: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignManagerResponse {
    user_id: UserId,
    managed_by: Option<UserId>,
}

pub(super) async fn assign_manager(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_superadmin()?;
    let payload: AssignManagerBody = parse_body(body).await?;
    let user_id = UserId(payload.user_id);

    let result = context
        .execute(|reply| Command::AssignManager {
            user_id,
            managed_by: payload.managed_by.map(UserId),
            reply,
        })
        .await?;

    match result {
        Ok(managed_by) => ok_response(&AssignManagerResponse {
            user_id,
            managed_by,
        }),
        Err(rejection) => rejection_response(&rejection),
    }
}

// ---- funding queues ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FundingRow {
    #[serde(flatten)]
    request: FundingRequest,
    username: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FundingQueueResponse {
    requests: Vec<FundingRow>,
    pending_count: usize,
}

pub(super) async fn list_funding_requests(
    context: &ApiContext,
    session: Session,
    query: &HashMap<String, String>,
    queue: Queue,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;

    let state = context.read_state().await;
    let admin = acting_admin(&state, &session)?;
    let filter = managed_by_filter(query);
    let kind = queue.kind();

    let visible = |request: &FundingRequest| {
        state
            .user(request.user_id)
            .map(|owner| {
                owner.managed_visible_to(admin)
                    && filter.map_or(true, |manager| owner.managed_by == Some(manager))
            })
            .unwrap_or(false)
    };

    let requests: Vec<FundingRow> = state
        .requests()
        .iter()
        .filter(|r| r.kind == kind)
        .filter(|r| visible(r))
        .map(|r| FundingRow {
            request: r.clone(),
            username: state.user(r.user_id).map(|u| u.username.clone()),
        })
        .collect();
    let pending_count = requests.iter().filter(|r| r.request.is_pending()).count();

    ok_response(&FundingQueueResponse {
        requests,
        pending_count,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveBody {
    request_id: Uuid,
    action: FundingAction,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedResponse {
    request: FundingRequest,
}

pub(super) async fn resolve_funding_request(
    context: &ApiContext,
    session: Session,
    body: Body,
    queue: Queue,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;
    let payload: ResolveBody = parse_body(body).await?;
    let request_id = RequestId(payload.request_id);

    // The request must belong to this queue and to a customer the acting
    // admin can see.
    {
        let state = context.read_state().await;
        let admin = acting_admin(&state, &session)?;
        let known = state.requests().iter().any(|r| {
            r.id == request_id
                && r.kind == queue.kind()
                && state
                    .user(r.user_id)
                    .map(|owner| owner.managed_visible_to(admin))
                    .unwrap_or(false)
        });
        if !known {
            return rejection_response(&Rejection::UnknownRequest);
        }
    }

    let result = context
        .execute(|reply| Command::ResolveFundingRequest {
            request_id,
            action: payload.action,
            reply,
        })
        .await?;

    match result {
        Ok(request) => ok_response(&ResolvedResponse { request }),
        Err(rejection) => rejection_response(&rejection),
    }
}

// ---- trade permissions ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionRow {
    user_id: UserId,
    username: String,
    permission_mode: TradePermissionMode,
    label: &'static str,
    session_label: &'static str,
    buy_enabled: bool,
    sell_enabled: bool,
}

impl PermissionRow {
    fn of(account: &UserAccount) -> Self {
        Self {
            user_id: account.id,
            username: account.username.clone(),
            permission_mode: account.permission_mode,
            label: account.permission_mode.label(),
            session_label: account.permission_mode.session_label(),
            buy_enabled: account.buy_enabled,
            sell_enabled: account.sell_enabled,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionsResponse {
    permissions: Vec<PermissionRow>,
}

pub(super) async fn list_trade_permissions(
    context: &ApiContext,
    session: Session,
    query: &HashMap<String, String>,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;

    let state = context.read_state().await;
    let admin = acting_admin(&state, &session)?;
    let filter = managed_by_filter(query);

    let permissions: Vec<PermissionRow> = state
        .users()
        .iter()
        .filter(|u| u.role == Role::Customer)
        .filter(|u| u.managed_visible_to(admin))
        .filter(|u| filter.map_or(true, |manager| u.managed_by == Some(manager)))
        .map(PermissionRow::of)
        .collect();

    ok_response(&PermissionsResponse { permissions })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetPermissionBody {
    user_id: Uuid,
    /// Raw mode string; anything unrecognized falls back to all-loss.
    permission_mode: String,
    buy_enabled: Option<bool>,
    sell_enabled: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetPermissionResponse {
    user_id: UserId,
    permission_mode: TradePermissionMode,
    label: &'static str,
}

pub(super) async fn set_trade_permission(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;
    let payload: SetPermissionBody = parse_body(body).await?;
    let user_id = UserId(payload.user_id);

    if !target_visible(context, &session, user_id).await? {
        return rejection_response(&Rejection::UnknownUser);
    }

    let result = context
        .execute(|reply| Command::SetTradePermission {
            user_id,
            mode: TradePermissionMode::normalize(&payload.permission_mode),
            buy_enabled: payload.buy_enabled,
            sell_enabled: payload.sell_enabled,
            reply,
        })
        .await?;

    match result {
        Ok(mode) => ok_response(&SetPermissionResponse {
            user_id,
            permission_mode: mode,
            label: mode.label(),
        }),
        Err(rejection) => rejection_response(&rejection),
    }
}

// ---- deposit addresses ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddressesResponse {
    addresses: BTreeMap<Asset, String>,
}

pub(super) async fn get_deposit_addresses(
    context: &ApiContext,
    session: Session,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;

    let state = context.read_state().await;
    let addresses = Asset::ALL
        .into_iter()
        .filter_map(|asset| {
            state
                .deposit_address(asset)
                .map(|addr| (asset, addr.to_string()))
        })
        .collect();

    ok_response(&AddressesResponse { addresses })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetAddressesBody {
    addresses: BTreeMap<Asset, String>,
}

pub(super) async fn set_deposit_addresses(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_superadmin()?;
    let payload: SetAddressesBody = parse_body(body).await?;

    for (asset, address) in payload.addresses {
        let result = context
            .execute(|reply| Command::SetDepositAddress {
                asset,
                address,
                reply,
            })
            .await?;
        if let Err(rejection) = result {
            return rejection_response(&rejection);
        }
    }

    get_deposit_addresses(context, session).await
}
