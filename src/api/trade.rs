use hyper::{Body, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{ApiContext, Command, Order, Side};

use super::auth::Session;
use super::error::{internal_err, HttpResult};
use super::{ok_response, parse_body, rejection_response};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderRequest {
    side: Side,
    quantity: Decimal,
    price: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlacedResponse {
    order: Order,
    balance: Decimal,
    pnl: Decimal,
    /// Rigged outcome of the session this order opens; null for random mode.
    session_win: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrdersResponse {
    orders: Vec<Order>,
    balance: Decimal,
    pnl: Decimal,
}

pub(super) async fn place_order(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    let payload: PlaceOrderRequest = parse_body(body).await?;

    let result = context
        .execute(|reply| Command::PlaceOrder {
            user_id: session.user_id,
            side: payload.side,
            quantity: payload.quantity,
            price: payload.price,
            reply,
        })
        .await?;

    match result {
        Ok(placed) => ok_response(&PlacedResponse {
            order: placed.order,
            balance: placed.balance,
            pnl: placed.pnl,
            session_win: placed.session_win,
        }),
        Err(rejection) => rejection_response(&rejection),
    }
}

pub(super) async fn list_orders(
    context: &ApiContext,
    session: Session,
) -> HttpResult<Response<Body>> {
    let state = context.read_state().await;
    let account = state.user(session.user_id).ok_or_else(internal_err)?;

    ok_response(&OrdersResponse {
        orders: account.ledger.orders().to_vec(),
        balance: account.ledger.balance(),
        pnl: account.ledger.pnl(),
    })
}
