use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};
use chrono::Utc;
use coupon_core::{
    validate_application, Basket, Coupon, CouponCode, CouponError, CouponService, CouponStore,
    InterfaceError, NewCoupon, ValidationErrors,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info_span, warn, Instrument, Span};
use uuid::Uuid;

pub const API_PREFIX: &str = "/api/coupons";
pub const CREATE_PATH: &str = "/create";
pub const APPLY_PATH: &str = "/apply";
pub const FILTER_PATH: &str = "/filter";

const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct ApiState<S> {
    service: Arc<CouponService<S>>,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self { service: Arc::clone(&self.service) }
    }
}

pub fn router<S>(service: Arc<CouponService<S>>) -> Router
where
    S: CouponStore + 'static,
{
    Router::new()
        .route(&format!("{API_PREFIX}{CREATE_PATH}"), post(create_coupon::<S>))
        .route(&format!("{API_PREFIX}{APPLY_PATH}"), put(apply_coupon::<S>))
        .route(&format!("{API_PREFIX}{FILTER_PATH}"), post(filter_coupons::<S>))
        .with_state(ApiState { service })
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    pub code: Option<String>,
    pub discount: Option<Decimal>,
    pub min_basket_value: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketRequest {
    pub value: Option<Decimal>,
    pub applied_discount: Option<Decimal>,
    #[serde(default)]
    pub application_successful: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationRequest {
    pub code: Option<String>,
    pub basket: Option<BasketRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CouponFilterRequest {
    pub codes: Option<Vec<Option<String>>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDto {
    pub code: String,
    pub discount: Decimal,
    pub min_basket_value: Decimal,
}

impl From<Coupon> for CouponDto {
    fn from(coupon: Coupon) -> Self {
        Self {
            code: coupon.code.0,
            discount: coupon.discount,
            min_basket_value: coupon.min_basket_value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketDto {
    pub value: Decimal,
    pub applied_discount: Decimal,
    pub application_successful: bool,
}

impl From<Basket> for BasketDto {
    fn from(basket: Basket) -> Self {
        Self {
            value: basket.value,
            applied_discount: basket.applied_discount,
            application_successful: basket.application_successful,
        }
    }
}

impl CouponRequest {
    /// Missing fields are reported first so they win over the range checks on the
    /// zero placeholders used in their stead.
    fn into_new_coupon(self) -> Result<NewCoupon, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.is_none() {
            errors.add("code", "Coupon code cannot be null");
        }
        if self.discount.is_none() {
            errors.add("discount", "Coupon discount value cannot be null");
        }
        if self.min_basket_value.is_none() {
            errors.add("min_basket_value", "Minimum basket value cannot be null");
        }

        let coupon = NewCoupon::new(
            self.code.unwrap_or_default(),
            self.discount.unwrap_or(Decimal::ZERO),
            self.min_basket_value.unwrap_or(Decimal::ZERO),
        );
        if let Err(domain_errors) = coupon.validate() {
            errors.merge(domain_errors);
        }

        errors.into_result().map(|()| coupon)
    }
}

impl ApplicationRequest {
    fn into_parts(self) -> Result<(CouponCode, Basket), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.code.is_none() {
            errors.add("code", "Coupon code cannot be null");
        }

        let basket = match self.basket {
            Some(basket) => {
                if basket.value.is_none() {
                    errors.add("basket.value", "Basket value cannot be null");
                }
                if basket.applied_discount.is_none() {
                    errors.add("basket.applied_discount", "Applied discount value cannot be null");
                }
                Basket {
                    value: basket.value.unwrap_or(Decimal::ZERO),
                    applied_discount: basket.applied_discount.unwrap_or(Decimal::ZERO),
                    application_successful: basket.application_successful,
                }
            }
            None => {
                errors.add("basket", "Basket cannot be null");
                Basket::new(Decimal::ZERO, Decimal::ZERO)
            }
        };

        let code = CouponCode::new(self.code.unwrap_or_default());
        errors.merge(validate_application(&code, &basket));

        errors.into_result().map(|()| (code, basket))
    }
}

impl CouponFilterRequest {
    fn into_codes(self) -> Result<Vec<CouponCode>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let Some(codes) = self.codes else {
            errors.add("codes", "Code list cannot be null");
            return Err(errors);
        };

        let mut valid = Vec::with_capacity(codes.len());
        for (index, code) in codes.into_iter().enumerate() {
            match code {
                Some(code) => valid.push(CouponCode::new(code)),
                None => errors.add(format!("codes[{index}]"), "must not be null"),
            }
        }

        errors.into_result().map(|()| valid)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

#[derive(Debug, Serialize)]
struct UnprocessableBody {
    message: String,
    errors: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DefaultErrorBody {
    timestamp: String,
    path: String,
    status: u16,
    error: String,
    request_id: String,
}

#[derive(Debug)]
pub enum ApiError {
    Interface { error: InterfaceError, path: String },
    MalformedBody { detail: String, path: String, request_id: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Interface { error: InterfaceError::NotFound { .. }, .. } => StatusCode::NOT_FOUND,
            Self::Interface { error: InterfaceError::Conflict { .. }, .. } => StatusCode::CONFLICT,
            Self::Interface { error: InterfaceError::Unprocessable { .. }, .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Interface { error: InterfaceError::ServiceUnavailable { .. }, .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::MalformedBody { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

fn default_error_body(status: StatusCode, path: String, request_id: String) -> DefaultErrorBody {
    DefaultErrorBody {
        timestamp: Utc::now().to_rfc3339(),
        path,
        status: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        request_id,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::MalformedBody { detail, path, request_id } => {
                warn!(
                    event_name = "api.request.malformed",
                    correlation_id = %request_id,
                    path = %path,
                    detail = %detail,
                    "request body could not be decoded"
                );
                (status, Json(default_error_body(status, path, request_id))).into_response()
            }
            Self::Interface {
                error: InterfaceError::ServiceUnavailable { message, correlation_id },
                path,
            } => {
                error!(
                    event_name = "api.request.failed",
                    correlation_id = %correlation_id,
                    path = %path,
                    error = %message,
                    "coupon store unavailable"
                );
                (status, Json(default_error_body(status, path, correlation_id))).into_response()
            }
            Self::Interface {
                error: InterfaceError::Unprocessable { errors, correlation_id },
                path,
            } => {
                warn!(
                    event_name = "api.request.invalid",
                    correlation_id = %correlation_id,
                    path = %path,
                    errors = %errors,
                    "request failed validation"
                );
                let errors = errors
                    .iter()
                    .map(|(field, message)| (camel_case_path(field), message.to_string()))
                    .collect();
                (status, Json(UnprocessableBody { message: "Validation error".to_string(), errors }))
                    .into_response()
            }
            Self::Interface { error, path } => {
                warn!(
                    event_name = "api.request.rejected",
                    correlation_id = %error.correlation_id(),
                    path = %path,
                    status = status.as_u16(),
                    "request rejected"
                );
                (status, Json(MessageBody { message: error.user_message().to_string() }))
                    .into_response()
            }
        }
    }
}

/// `basket.applied_discount` -> `basket.appliedDiscount`
fn camel_case_path(field: &str) -> String {
    field.split('.').map(camel_case).collect::<Vec<_>>().join(".")
}

fn camel_case(segment: &str) -> String {
    let mut output = String::with_capacity(segment.len());
    let mut upper_next = false;
    for ch in segment.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            output.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            output.push(ch);
        }
    }
    output
}

struct RequestContext {
    path: String,
    request_id: String,
}

impl RequestContext {
    fn new(uri: &Uri, headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self { path: uri.path().to_string(), request_id }
    }

    fn fail(&self, error: CouponError) -> ApiError {
        ApiError::Interface {
            error: error.into_interface(self.request_id.clone()),
            path: self.path.clone(),
        }
    }

    /// Service events emitted inside this span carry the request's correlation id.
    fn span(&self) -> Span {
        info_span!("coupon_request", correlation_id = %self.request_id, path = %self.path)
    }

    fn malformed(&self, rejection: JsonRejection) -> ApiError {
        ApiError::MalformedBody {
            detail: rejection.body_text(),
            path: self.path.clone(),
            request_id: self.request_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_coupon<S: CouponStore + 'static>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    headers: HeaderMap,
    payload: Result<Json<CouponRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let context = RequestContext::new(&uri, &headers);
    let Json(request) = payload.map_err(|rejection| context.malformed(rejection))?;
    let new_coupon = request.into_new_coupon().map_err(|errors| context.fail(errors.into()))?;

    let created = state
        .service
        .create_coupon(new_coupon)
        .instrument(context.span())
        .await
        .map_err(|error| context.fail(error))?;

    let location = format!("{API_PREFIX}{CREATE_PATH}/{}", created.code);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(CouponDto::from(created)))
        .into_response())
}

async fn apply_coupon<S: CouponStore + 'static>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    headers: HeaderMap,
    payload: Result<Json<ApplicationRequest>, JsonRejection>,
) -> Result<Json<BasketDto>, ApiError> {
    let context = RequestContext::new(&uri, &headers);
    let Json(request) = payload.map_err(|rejection| context.malformed(rejection))?;
    let (code, basket) = request.into_parts().map_err(|errors| context.fail(errors.into()))?;

    let redeemed = state
        .service
        .apply_coupon(&code, &basket)
        .instrument(context.span())
        .await
        .map_err(|error| context.fail(error))?;

    Ok(Json(BasketDto::from(redeemed)))
}

async fn filter_coupons<S: CouponStore + 'static>(
    State(state): State<ApiState<S>>,
    uri: Uri,
    headers: HeaderMap,
    payload: Result<Json<CouponFilterRequest>, JsonRejection>,
) -> Result<Json<Vec<CouponDto>>, ApiError> {
    let context = RequestContext::new(&uri, &headers);
    let Json(request) = payload.map_err(|rejection| context.malformed(rejection))?;
    let codes = request.into_codes().map_err(|errors| context.fail(errors.into()))?;

    let coupons = state
        .service
        .get_coupons(&codes)
        .instrument(context.span())
        .await
        .map_err(|error| context.fail(error))?;

    Ok(Json(coupons.into_iter().map(CouponDto::from).collect()))
}
