use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Write;

use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::http::HeaderValue;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use log::{debug, error, info};
use prometheus::{Encoder, TextEncoder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;

use crate::config::Config;
use crate::model::{ApiContext, Rejection};

use self::auth::authenticate;
use self::error::{BadRequest, HttpResult};

mod admin;
mod auth;
mod error;
mod support;
mod token;
mod trade;
mod wallet;

pub async fn api(config: Config, context: ApiContext) {
    let Ok(addr) = config.host.parse() else {
        error!("Could not parse APP_HOST: {}", config.host);
        return;
    };

    let make_service = make_service_fn(move |conn: &AddrStream| {
        // Shared with every invocation of `make_service`.
        let context = context.clone();
        let config = config.clone();

        let addr = conn.remote_addr();
        debug!("Connected {}", addr);

        let service =
            service_fn(move |req| handle(context.clone(), config.clone(), req));

        async move { Ok::<_, Infallible>(service) }
    });

    let server = Server::bind(&addr).serve(make_service);
    info!("Server is running on http://{}", addr);
    if let Err(e) = server.await {
        error!("Server error: {}", e);
    }
}

async fn handle(
    context: ApiContext,
    config: Config,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let time = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let res = match route(&context, &config, req).await {
        Ok(res) => res,
        Err(err) => err.into(),
    };

    let elapsed = time.elapsed();
    context
        .metrics()
        .observe_req_duration(&method, uri.path(), elapsed);
    debug!("{} {} {} {:?}", &method, uri.path(), res.status(), elapsed);
    Ok(res)
}

async fn route(
    context: &ApiContext,
    config: &Config,
    req: Request<Body>,
) -> HttpResult<Response<Body>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::GET && path == "/metrics" {
        return handle_metrics(context);
    }

    // Everything under /api rides an authenticated session.
    let secret = config.session_secret.as_bytes();
    let session = authenticate(context, &req, secret).await?;
    let query = parse_query(req.uri().query());

    match (&method, path.as_str()) {
        (&Method::GET, "/api/wallet") => wallet::get_wallet(context, session).await,
        (_, "/api/wallet") => method_not_allowed(&[Method::GET]),

        (&Method::POST, "/api/wallet/deposit") => {
            wallet::request_deposit(context, session, req.into_body()).await
        }
        (_, "/api/wallet/deposit") => method_not_allowed(&[Method::POST]),

        (&Method::POST, "/api/wallet/withdraw") => {
            wallet::request_withdraw(context, session, req.into_body()).await
        }
        (_, "/api/wallet/withdraw") => method_not_allowed(&[Method::POST]),

        (&Method::GET, "/api/trade/orders") => trade::list_orders(context, session).await,
        (&Method::POST, "/api/trade/orders") => {
            trade::place_order(context, session, req.into_body()).await
        }
        (_, "/api/trade/orders") => method_not_allowed(&[Method::GET, Method::POST]),

        (&Method::GET, "/api/support") => support::user_list(context, session, &query).await,
        (&Method::POST, "/api/support") => {
            support::user_send(context, session, req.into_body()).await
        }
        (_, "/api/support") => method_not_allowed(&[Method::GET, Method::POST]),

        (&Method::GET, "/api/admin/support") => {
            support::admin_list(context, session, &query).await
        }
        (&Method::POST, "/api/admin/support") => {
            support::admin_send(context, session, req.into_body()).await
        }
        (_, "/api/admin/support") => method_not_allowed(&[Method::GET, Method::POST]),

        (&Method::POST, "/api/admin/support/close") => {
            support::admin_close(context, session, req.into_body()).await
        }
        (_, "/api/admin/support/close") => method_not_allowed(&[Method::POST]),

        (&Method::GET, "/api/admin/users") => {
            admin::list_users(context, session, &query).await
        }
        (&Method::POST, "/api/admin/users") => {
            admin::create_user(context, session, req.into_body()).await
        }
        (_, "/api/admin/users") => method_not_allowed(&[Method::GET, Method::POST]),

        (&Method::POST, "/api/admin/topup") => {
            admin::topup(context, session, req.into_body()).await
        }
        (_, "/api/admin/topup") => method_not_allowed(&[Method::POST]),

        (&Method::GET, "/api/admin/subadmins") => {
            admin::list_subadmins(context, session).await
        }
        (&Method::POST, "/api/admin/subadmins") => {
            admin::create_subadmin(context, session, req.into_body()).await
        }
        (_, "/api/admin/subadmins") => method_not_allowed(&[Method::GET, Method::POST]),

        (&Method::POST, "/api/admin/subadmins/reset-password") => {
            admin::reset_subadmin_password(context, session, req.into_body()).await
        }
        (_, "/api/admin/subadmins/reset-password") => method_not_allowed(&[Method::POST]),

        (&Method::POST, "/api/admin/manage-users") => {
            admin::assign_manager(context, session, req.into_body()).await
        }
        (_, "/api/admin/manage-users") => method_not_allowed(&[Method::POST]),

        (&Method::GET, "/api/admin/deposit-requests") => {
            admin::list_funding_requests(context, session, &query, admin::Queue::Deposit).await
        }
        (&Method::POST, "/api/admin/deposit-requests") => {
            admin::resolve_funding_request(context, session, req.into_body(), admin::Queue::Deposit)
                .await
        }
        (_, "/api/admin/deposit-requests") => method_not_allowed(&[Method::GET, Method::POST]),

        (&Method::GET, "/api/admin/withdraw-requests") => {
            admin::list_funding_requests(context, session, &query, admin::Queue::Withdraw).await
        }
        (&Method::POST, "/api/admin/withdraw-requests") => {
            admin::resolve_funding_request(
                context,
                session,
                req.into_body(),
                admin::Queue::Withdraw,
            )
            .await
        }
        (_, "/api/admin/withdraw-requests") => method_not_allowed(&[Method::GET, Method::POST]),

        (&Method::GET, "/api/admin/trade-permission") => {
            admin::list_trade_permissions(context, session, &query).await
        }
        (&Method::POST, "/api/admin/trade-permission") => {
            admin::set_trade_permission(context, session, req.into_body()).await
        }
        (_, "/api/admin/trade-permission") => method_not_allowed(&[Method::GET, Method::POST]),

        (&Method::GET, "/api/admin/deposit-addresses") => {
            admin::get_deposit_addresses(context, session).await
        }
        (&Method::POST, "/api/admin/deposit-addresses") => {
            admin::set_deposit_addresses(context, session, req.into_body()).await
        }
        (_, "/api/admin/deposit-addresses") => method_not_allowed(&[Method::GET, Method::POST]),

        _ => not_found(),
    }
}

/// Reads and deserializes a JSON request body.
pub(super) async fn parse_body<T: DeserializeOwned>(body: Body) -> HttpResult<T> {
    let bytes = hyper::body::to_bytes(body).await?;
    serde_json::from_slice(&bytes).map_err(error::to_http_err(BadRequest))
}

pub(super) fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// `{ ok: true, ... }` success envelope.
pub(super) fn ok_response<T: Serialize>(payload: &T) -> HttpResult<Response<Body>> {
    let mut value = serde_json::to_value(payload)?;
    match value.as_object_mut() {
        Some(object) => {
            object.insert("ok".into(), json!(true));
        }
        None => return Err(Box::new(error::InternalServerError)),
    }
    Ok(json_response(StatusCode::OK, &value))
}

/// `{ ok: false, error }` business-rejection envelope. Still HTTP 200: the
/// clients read `ok`, not the status line.
pub(super) fn rejection_response(rejection: &Rejection) -> HttpResult<Response<Body>> {
    let value = json!({ "ok": false, "error": rejection.message() });
    Ok(json_response(StatusCode::OK, &value))
}

fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Body> {
    let body = serde_json::to_string(data).unwrap();
    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}

fn handle_metrics(context: &ApiContext) -> HttpResult<Response<Body>> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metrics = context.metrics().gather();

    encoder.encode(&metrics, &mut buffer)?;
    writeln!(&mut buffer, "# EOF")?;

    let res = Response::builder()
        .header(
            CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )
        .body(buffer.into())?;
    Ok(res)
}

fn method_not_allowed(allow: &[Method]) -> HttpResult<Response<Body>> {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;

    let allow_str = allow
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    res.headers_mut().insert(ALLOW, allow_str.parse()?);

    Ok(res)
}

fn not_found() -> HttpResult<Response<Body>> {
    let mut res = Response::default();
    *res.status_mut() = StatusCode::NOT_FOUND;
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_query_pairs() {
        let query = parse_query(Some("managed_by=abc&limit=50"));
        assert_eq!(query.get("managed_by").unwrap(), "abc");
        assert_eq!(query.get("limit").unwrap(), "50");
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn should_wrap_payloads_in_the_ok_envelope() {
        #[derive(Serialize)]
        struct Payload {
            answer: u32,
        }

        let res = ok_response(&Payload { answer: 42 }).unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
