//! Customer API handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use liveshop_core::{CustomerId, CustomerStatus};

use super::{non_blank, parse_phone};
use crate::db::CustomerRepository;
use crate::error::AppError;
use crate::middleware::{RequireEditor, RequireStaff};
use crate::models::{Customer, CustomerFields, CustomerFilter, NewCustomer};
use crate::services::{ChangeAction, ChangeEvent};
use crate::state::AppState;

/// Largest page a client may ask for.
const MAX_PAGE_SIZE: i64 = 200;

/// Build the customers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(list).post(create))
        .route(
            "/api/customers/{id}",
            get(show).put(update).delete(delete),
        )
        .route("/api/customers/{id}/status", put(set_status))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Editable customer fields as sent by the client.
#[derive(Debug, Deserialize)]
pub struct CustomerBody {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub facebook_id: Option<String>,
    #[serde(default)]
    pub status: CustomerStatus,
}

impl CustomerBody {
    fn into_fields(self) -> Result<(CustomerFields, Option<String>, CustomerStatus), AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }
        let fields = CustomerFields {
            name,
            phone: parse_phone(self.phone.as_deref())?,
            address: non_blank(self.address),
            notes: non_blank(self.notes),
        };
        Ok((fields, non_blank(self.facebook_id), self.status))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: CustomerStatus,
}

fn customer_event(action: ChangeAction, id: CustomerId) -> ChangeEvent {
    ChangeEvent::new("customer", action, id.as_i32())
}

/// GET /api/customers
#[instrument(skip(state))]
pub async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let defaults = CustomerFilter::default();
    let filter = CustomerFilter {
        search: query.search,
        status: query.status,
        limit: query.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or(0).max(0),
    };

    let customers = CustomerRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(customers))
}

/// POST /api/customers
#[instrument(skip(state, body))]
pub async fn create(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Json(body): Json<CustomerBody>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    let (fields, facebook_id, status) = body.into_fields()?;
    let customer = CustomerRepository::new(state.pool())
        .create(&NewCustomer {
            fields,
            facebook_id,
            status,
        })
        .await?;

    state
        .changes()
        .publish(customer_event(ChangeAction::Insert, customer.id));
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /api/customers/{id}
pub async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>, AppError> {
    CustomerRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("customer {id}")))
}

/// PUT /api/customers/{id}
///
/// Status and Facebook ID are not changed here.
#[instrument(skip(state, body))]
pub async fn update(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(body): Json<CustomerBody>,
) -> Result<Json<Customer>, AppError> {
    let (fields, _, _) = body.into_fields()?;
    let customer = CustomerRepository::new(state.pool())
        .update(id, &fields)
        .await?;

    state
        .changes()
        .publish(customer_event(ChangeAction::Update, id));
    Ok(Json(customer))
}

/// PUT /api/customers/{id}/status
#[instrument(skip(state))]
pub async fn set_status(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Customer>, AppError> {
    let customer = CustomerRepository::new(state.pool())
        .set_status(id, body.status)
        .await?;

    state
        .changes()
        .publish(customer_event(ChangeAction::Update, id));
    Ok(Json(customer))
}

/// DELETE /api/customers/{id}
#[instrument(skip(state))]
pub async fn delete(
    RequireEditor(_): RequireEditor,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<StatusCode, AppError> {
    CustomerRepository::new(state.pool()).delete(id).await?;

    state
        .changes()
        .publish(customer_event(ChangeAction::Delete, id));
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(name: &str, phone: Option<&str>) -> CustomerBody {
        CustomerBody {
            name: name.to_string(),
            phone: phone.map(str::to_string),
            address: Some("  ".to_string()),
            notes: None,
            facebook_id: Some("1000123".to_string()),
            status: CustomerStatus::Vip,
        }
    }

    #[test]
    fn test_body_normalizes_fields() {
        let (fields, facebook_id, status) = body(" Lan Anh ", Some("+84 901 234 567"))
            .into_fields()
            .unwrap();
        assert_eq!(fields.name, "Lan Anh");
        assert_eq!(fields.phone.unwrap().as_str(), "0901234567");
        assert!(fields.address.is_none());
        assert_eq!(facebook_id.as_deref(), Some("1000123"));
        assert_eq!(status, CustomerStatus::Vip);
    }

    #[test]
    fn test_body_requires_name() {
        assert!(matches!(
            body("   ", None).into_fields(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_body_rejects_bad_phone() {
        assert!(matches!(
            body("Lan", Some("12345")).into_fields(),
            Err(AppError::BadRequest(_))
        ));
    }
}
