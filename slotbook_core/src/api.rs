//! JSON endpoints.
//!
//! Framework-agnostic request handling: each endpoint takes the raw JSON
//! body (and credential where needed) and returns a status code plus a JSON
//! body. Whatever transport sits in front only has to move bytes.

use crate::confirmation::ConfirmationHandler;
use crate::service::{parse_instant, ReservationService, ReserveRequest};
use crate::{Error, PaymentOutcome, ProviderId, Reservation, ReservationId, ReservationStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Endpoint response: HTTP-style status and JSON body
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

impl From<Error> for ApiResponse {
    fn from(err: Error) -> Self {
        let kind = err.kind();
        if kind.http_status() >= 500 {
            tracing::error!("Request failed: {}", err);
        }
        Self {
            status: kind.http_status(),
            body: json!({
                "success": false,
                "error": err.to_string(),
                "kind": kind,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveBody {
    #[serde(default, alias = "psychologistId")]
    provider_id: Option<String>,
    #[serde(default)]
    scheduled_at: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmBody {
    #[serde(default, alias = "bookingId")]
    reservation_id: Option<String>,
    #[serde(default, alias = "paymentStatus")]
    outcome: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody {
    #[serde(default, alias = "bookingId")]
    reservation_id: Option<String>,
}

/// Reservation as shown to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub id: ReservationId,
    pub provider_id: ProviderId,
    pub status: ReservationStatus,
    pub scheduled_at: String,
    pub payment_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<&Reservation> for ReservationView {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            provider_id: r.provider_id.clone(),
            status: r.status,
            scheduled_at: r.scheduled_at.to_rfc3339(),
            payment_reference: r.payment_reference.clone(),
            notes: r.notes.clone(),
        }
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body)
        .map_err(|e| Error::InvalidRequest(format!("request body is not valid JSON: {}", e)))
}

fn parse_reservation_id(raw: Option<String>) -> Result<ReservationId, Error> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::InvalidRequest("reservationId is required".into()))?;

    // An id that cannot exist is reported like an unknown one
    raw.parse()
        .map_err(|_| Error::NotFound(format!("reservation {} not found", raw.trim())))
}

/// The reservation engine's endpoints
#[derive(Clone)]
pub struct Endpoints {
    service: ReservationService,
    confirmations: ConfirmationHandler,
}

impl Endpoints {
    pub fn new(service: ReservationService, confirmations: ConfirmationHandler) -> Self {
        Self {
            service,
            confirmations,
        }
    }

    /// `Reserve`: `{ providerId, scheduledAt, notes? }` + credential
    pub fn reserve(&self, body: &str, credential: Option<&str>) -> ApiResponse {
        self.try_reserve(body, credential)
            .unwrap_or_else(ApiResponse::from)
    }

    fn try_reserve(&self, body: &str, credential: Option<&str>) -> Result<ApiResponse, Error> {
        let body: ReserveBody = parse_body(body)?;
        let request = ReserveRequest {
            provider_id: body.provider_id,
            scheduled_at: body.scheduled_at,
            notes: body.notes,
        };

        let reservation = self.service.reserve(&request, credential)?;
        Ok(ApiResponse::ok(json!({
            "success": true,
            "reservation": ReservationView::from(&reservation),
            "message": "Reservation created. Complete payment to confirm.",
        })))
    }

    /// `Confirm`: `{ reservationId, outcome: "success" | "failure" }`
    ///
    /// Trusted channel: no credential is checked.
    pub fn confirm(&self, body: &str) -> ApiResponse {
        self.try_confirm(body).unwrap_or_else(ApiResponse::from)
    }

    fn try_confirm(&self, body: &str) -> Result<ApiResponse, Error> {
        let body: ConfirmBody = parse_body(body)?;
        let outcome = body
            .outcome
            .ok_or_else(|| Error::InvalidRequest("reservationId and outcome are required".into()))?
            .parse::<PaymentOutcome>()
            .map_err(Error::InvalidRequest)?;
        let id = parse_reservation_id(body.reservation_id)?;

        let status = self.confirmations.apply(&id, outcome)?;
        Ok(ApiResponse::ok(json!({
            "success": true,
            "reservationId": id,
            "status": status,
        })))
    }

    /// `Cancel`: `{ reservationId }` + credential
    pub fn cancel(&self, body: &str, credential: Option<&str>) -> ApiResponse {
        self.try_cancel(body, credential)
            .unwrap_or_else(ApiResponse::from)
    }

    fn try_cancel(&self, body: &str, credential: Option<&str>) -> Result<ApiResponse, Error> {
        let body: CancelBody = parse_body(body)?;
        let id = parse_reservation_id(body.reservation_id)?;

        let reservation = self.service.cancel(&id, credential)?;
        Ok(ApiResponse::ok(json!({
            "success": true,
            "reservationId": reservation.id,
            "status": reservation.status,
        })))
    }

    /// `List`: the caller's reservations
    pub fn list(&self, credential: Option<&str>) -> ApiResponse {
        self.try_list(credential).unwrap_or_else(ApiResponse::from)
    }

    fn try_list(&self, credential: Option<&str>) -> Result<ApiResponse, Error> {
        let listing = self.service.list(credential)?;
        let upcoming: Vec<ReservationView> = listing.upcoming.iter().map(Into::into).collect();
        let past: Vec<ReservationView> = listing.past.iter().map(Into::into).collect();

        Ok(ApiResponse::ok(json!({
            "success": true,
            "upcoming": upcoming,
            "past": past,
        })))
    }

    /// Availability query for one slot
    pub fn availability(&self, provider_id: &str, scheduled_at: &str) -> ApiResponse {
        self.try_availability(provider_id, scheduled_at)
            .unwrap_or_else(ApiResponse::from)
    }

    fn try_availability(&self, provider_id: &str, scheduled_at: &str) -> Result<ApiResponse, Error> {
        if provider_id.trim().is_empty() {
            return Err(Error::InvalidRequest("providerId is required".into()));
        }
        let provider_id = ProviderId::new(provider_id.trim());
        let scheduled_at = parse_instant(scheduled_at)?;

        let available = self
            .service
            .availability()
            .is_available(&provider_id, scheduled_at)?;
        Ok(ApiResponse::ok(json!({
            "success": true,
            "providerId": provider_id,
            "scheduledAt": scheduled_at.to_rfc3339(),
            "available": available,
        })))
    }
}
