//! HTTP read API over the rate core. hyper v1.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use ratewatch_common::{constants, Currency, RateMap};
use ratewatch_fx::{ExchangeRateCore, RateError};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, warn};

/// Path of the rates endpoint.
pub const RATES_PATH: &str = "/api/exchange-rates";

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Most target codes accepted in one request, duplicates included.
pub const MAX_TARGETS: usize = 50;

const MISSING_TARGETS: &str =
    "You must provide one or more target_currencies as a comma-separated list.";

/// Parsed rates request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatesQuery {
    pub base: Currency,
    pub targets: Vec<Currency>,
}

impl RatesQuery {
    /// Parse `base_currency` and `target_currencies` from a query string.
    ///
    /// Targets may be comma separated, repeated, or both. Empty segments are
    /// ignored and codes are upper-cased.
    pub fn parse(query: Option<&str>) -> Result<Self, String> {
        let mut base: Option<String> = None;
        let mut raw_targets: Vec<String> = Vec::new();

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
            match key.as_ref() {
                "base_currency" => base = Some(value.into_owned()),
                "target_currencies" | "target_currencies[]" => {
                    raw_targets.extend(crate::config::split_codes(&value));
                }
                _ => {}
            }
        }

        let base = match base.filter(|b| !b.trim().is_empty()) {
            Some(code) => Currency::parse(&code).map_err(|e| e.to_string())?,
            None => Currency::new(constants::DEFAULT_BASE_CURRENCY),
        };

        if raw_targets.is_empty() {
            return Err(MISSING_TARGETS.to_string());
        }
        if raw_targets.len() > MAX_TARGETS {
            return Err(format!(
                "At most {} target_currencies may be requested.",
                MAX_TARGETS
            ));
        }

        let targets = raw_targets
            .iter()
            .map(|code| Currency::parse(code))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;

        Ok(Self { base, targets })
    }
}

#[derive(Debug, Serialize)]
struct RatesBody {
    base: String,
    rates: BTreeMap<String, f64>,
    fetched: String,
}

impl RatesBody {
    fn new(base: &Currency, rates: &RateMap) -> Self {
        Self {
            base: base.code().to_string(),
            rates: rates
                .iter()
                .filter_map(|(target, rate)| rate.to_f64().map(|r| (target.code().to_string(), r)))
                .collect(),
            fetched: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            error!(error = %e, "Failed to encode response");
            (StatusCode::INTERNAL_SERVER_ERROR, br#"{"error":"internal error"}"#.to_vec())
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Rates API handler.
pub struct RatesApi {
    core: Arc<ExchangeRateCore>,
}

impl RatesApi {
    /// Create a handler over a shared core.
    pub fn new(core: Arc<ExchangeRateCore>) -> Self {
        Self { core }
    }

    /// Route and answer a request. Only the method, path and query are read.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        match (req.method(), req.uri().path()) {
            (&Method::GET, RATES_PATH) => self.get_rates(req.uri().query()).await,
            (_, RATES_PATH) => json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &ErrorBody::new("Method not allowed"),
            ),
            (&Method::GET, HEALTH_PATH) => {
                json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
            }
            _ => json_response(StatusCode::NOT_FOUND, &ErrorBody::new("Not found")),
        }
    }

    async fn get_rates(&self, query: Option<&str>) -> Response<Full<Bytes>> {
        let request = match RatesQuery::parse(query) {
            Ok(request) => request,
            Err(message) => {
                debug!(error = %message, "Rejected rates request");
                return json_response(StatusCode::BAD_REQUEST, &ErrorBody::new(message));
            }
        };

        match self.core.get_rates(&request.base, &request.targets).await {
            Ok(rates) => json_response(StatusCode::OK, &RatesBody::new(&request.base, &rates)),
            Err(RateError::InvalidInput(message)) => {
                json_response(StatusCode::BAD_REQUEST, &ErrorBody::new(message))
            }
            Err(e @ RateError::StoreUnavailable(_)) => {
                warn!(error = %e, "Rates unavailable");
                json_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &ErrorBody::new("Exchange rates are temporarily unavailable."),
                )
            }
            Err(e) => {
                error!(error = %e, "Unexpected error serving rates");
                json_response(StatusCode::INTERNAL_SERVER_ERROR, &ErrorBody::new("Internal error"))
            }
        }
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (socket, peer) = listener.accept().await?;
            let io = TokioIo::new(socket);
            let api = self.clone();
            let service = service_fn(move |req: Request<Incoming>| {
                let api = api.clone();
                async move { Ok::<_, Infallible>(api.handle(req).await) }
            });

            tokio::spawn(async move {
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(peer = %peer, error = %err, "Error serving connection");
                }
            });
        }
    }
}
