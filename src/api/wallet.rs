use hyper::{Body, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{ApiContext, Asset, Command, FundingKind, FundingRequest};

use super::auth::Session;
use super::error::{internal_err, HttpResult};
use super::{ok_response, parse_body, rejection_response};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WalletResponse {
    balances: BTreeMap<Asset, Decimal>,
    trade_balance: Decimal,
    pnl: Decimal,
    deposit_addresses: BTreeMap<Asset, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingRequestBody {
    asset: Asset,
    amount: Decimal,
    wallet_address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FundingRequestResponse {
    request: FundingRequest,
}

pub(super) async fn get_wallet(
    context: &ApiContext,
    session: Session,
) -> HttpResult<Response<Body>> {
    let state = context.read_state().await;
    let account = state.user(session.user_id).ok_or_else(internal_err)?;

    let deposit_addresses = Asset::ALL
        .into_iter()
        .filter_map(|asset| {
            state
                .deposit_address(asset)
                .map(|address| (asset, address.to_string()))
        })
        .collect();

    ok_response(&WalletResponse {
        balances: account.wallet.snapshot(),
        trade_balance: account.ledger.balance(),
        pnl: account.ledger.pnl(),
        deposit_addresses,
    })
}

pub(super) async fn request_deposit(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    create_request(context, session, body, FundingKind::Deposit).await
}

pub(super) async fn request_withdraw(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    create_request(context, session, body, FundingKind::Withdraw).await
}

async fn create_request(
    context: &ApiContext,
    session: Session,
    body: Body,
    kind: FundingKind,
) -> HttpResult<Response<Body>> {
    let payload: FundingRequestBody = parse_body(body).await?;

    let result = context
        .execute(|reply| Command::CreateFundingRequest {
            user_id: session.user_id,
            kind,
            asset: payload.asset,
            amount: payload.amount,
            wallet_address: payload.wallet_address,
            reply,
        })
        .await?;

    match result {
        Ok(request) => ok_response(&FundingRequestResponse { request }),
        Err(rejection) => rejection_response(&rejection),
    }
}
