use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::common::{
    created_response, no_content_response, not_found, success_response, trim_optional,
    validate_input,
};
use super::products::ExistsResponse;
use crate::{
    auth::AuthRouterExt,
    entities::{user::ROLE_ADMIN, vendor},
    errors::ApiError,
    services::vendors::VendorInput,
    AppState,
};

lazy_static! {
    static ref PHONE_PATTERN: Regex = Regex::new(r"^[\d\s\-\+\(\)]+$").unwrap();
}

fn validate_phone(phone: &String) -> Result<(), ValidationError> {
    if !PHONE_PATTERN.is_match(phone) {
        let mut error = ValidationError::new("phone");
        error.message = Some("Phone may only contain digits, spaces and + - ( )".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VendorResponse {
    pub id: i32,
    pub name: String,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<vendor::Model> for VendorResponse {
    fn from(model: vendor::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            address: model.address,
            contact_person: model.contact_person,
            phone: model.phone,
            email: model.email,
        }
    }
}

/// Body of vendor create and update requests
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VendorRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub contact_person: Option<String>,
    #[validate(length(max = 50), custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(length(max = 100), email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl VendorRequest {
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            address: trim_optional(self.address),
            contact_person: trim_optional(self.contact_person),
            phone: trim_optional(self.phone),
            email: trim_optional(self.email),
        }
    }
}

impl From<VendorRequest> for VendorInput {
    fn from(request: VendorRequest) -> Self {
        Self {
            name: request.name,
            address: request.address,
            contact_person: request.contact_person,
            phone: request.phone,
            email: request.email,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VendorSearchParams {
    /// Matched against name, address, contact person, phone and email
    #[serde(default)]
    pub term: String,
}

pub fn vendors_router(state: &AppState) -> Router<AppState> {
    let read = Router::new()
        .route("/", get(list_vendors))
        .route("/search", get(search_vendors))
        .route("/:id", get(get_vendor))
        .route("/exists/:id", get(vendor_exists))
        .with_auth(state.auth.clone());

    let admin = Router::new()
        .route("/", axum::routing::post(create_vendor))
        .route(
            "/:id",
            axum::routing::put(update_vendor).delete(delete_vendor),
        )
        .with_role(state.auth.clone(), ROLE_ADMIN);

    read.merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/vendors",
    responses(
        (status = 200, description = "Vendors ordered by name", body = crate::ApiResponse<Vec<VendorResponse>>),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vendors"
)]
pub async fn list_vendors(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let vendors = state.services.vendors.list().await?;
    let body: Vec<VendorResponse> = vendors.into_iter().map(Into::into).collect();
    Ok(success_response(body))
}

#[utoipa::path(
    get,
    path = "/api/vendors/search",
    params(VendorSearchParams),
    responses(
        (status = 200, description = "Matching vendors", body = crate::ApiResponse<Vec<VendorResponse>>)
    ),
    security(("bearer_auth" = [])),
    tag = "vendors"
)]
pub async fn search_vendors(
    State(state): State<AppState>,
    Query(params): Query<VendorSearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let vendors = state.services.vendors.search(&params.term).await?;
    let body: Vec<VendorResponse> = vendors.into_iter().map(Into::into).collect();
    Ok(success_response(body))
}

#[utoipa::path(
    get,
    path = "/api/vendors/{id}",
    params(("id" = i32, Path, description = "Vendor id")),
    responses(
        (status = 200, description = "Vendor found", body = crate::ApiResponse<VendorResponse>),
        (status = 404, description = "Vendor not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vendors"
)]
pub async fn get_vendor(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let vendor = state
        .services
        .vendors
        .get(id)
        .await?
        .ok_or_else(|| not_found("Vendor", id))?;
    Ok(success_response(VendorResponse::from(vendor)))
}

#[utoipa::path(
    get,
    path = "/api/vendors/exists/{id}",
    params(("id" = i32, Path, description = "Vendor id")),
    responses(
        (status = 200, description = "Existence flag", body = crate::ApiResponse<ExistsResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "vendors"
)]
pub async fn vendor_exists(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let exists = state.services.vendors.exists(id).await?;
    Ok(success_response(ExistsResponse { exists }))
}

#[utoipa::path(
    post,
    path = "/api/vendors",
    request_body = VendorRequest,
    responses(
        (status = 201, description = "Vendor created", body = crate::ApiResponse<VendorResponse>),
        (status = 400, description = "Invalid input, duplicate name or email", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vendors"
)]
pub async fn create_vendor(
    State(state): State<AppState>,
    Json(payload): Json<VendorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.normalized();
    validate_input(&payload)?;

    let vendor = state.services.vendors.create(payload.into()).await?;
    info!(vendor_id = vendor.id, "vendor created");
    Ok(created_response(VendorResponse::from(vendor)))
}

#[utoipa::path(
    put,
    path = "/api/vendors/{id}",
    params(("id" = i32, Path, description = "Vendor id")),
    request_body = VendorRequest,
    responses(
        (status = 200, description = "Vendor updated", body = crate::ApiResponse<VendorResponse>),
        (status = 400, description = "Invalid input, duplicate name or email", body = crate::errors::ErrorResponse),
        (status = 404, description = "Vendor not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vendors"
)]
pub async fn update_vendor(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<VendorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.normalized();
    validate_input(&payload)?;

    let vendor = state.services.vendors.update(id, payload.into()).await?;
    info!(vendor_id = id, "vendor updated");
    Ok(success_response(VendorResponse::from(vendor)))
}

#[utoipa::path(
    delete,
    path = "/api/vendors/{id}",
    params(("id" = i32, Path, description = "Vendor id")),
    responses(
        (status = 204, description = "Vendor deleted"),
        (status = 400, description = "Vendor has purchase orders", body = crate::errors::ErrorResponse),
        (status = 404, description = "Vendor not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vendors"
)]
pub async fn delete_vendor(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.services.vendors.delete(id).await? {
        return Err(not_found("Vendor", id));
    }
    info!(vendor_id = id, "vendor deleted");
    Ok(no_content_response())
}
