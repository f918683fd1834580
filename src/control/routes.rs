//! HTTP handlers of the control plane.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::control::ControlState;
use crate::envelope::Envelope;
use crate::error::ControlError;

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let msg = match &self {
            ControlError::MalformedBody { .. } => "Missing JSON data.",
            ControlError::InvalidPriority { .. } => "Invalid priority.",
            ControlError::MissingMode => "Missing mode name.",
            ControlError::UnknownMode { .. } => "Unknown mode name.",
        };
        (StatusCode::BAD_REQUEST, Json(Envelope::<()>::fail(msg))).into_response()
    }
}

/// `GET /` and `GET /id`.
pub(crate) async fn identify(State(st): State<ControlState>) -> Json<Envelope> {
    Json(Envelope::ok(json!({
        "service": st.service_id.as_ref(),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// `GET /mode/get`: the active mode, `null` before the first launch.
pub(crate) async fn get_mode(State(st): State<ControlState>) -> Json<Envelope> {
    let mode = st.handle.active_mode().await;
    Json(Envelope::ok(json!({ "mode": mode })))
}

/// `GET /mode/get_all`: every registered mode name.
pub(crate) async fn get_all(State(st): State<ControlState>) -> Json<Envelope> {
    Json(Envelope::ok(json!(st.handle.mode_names())))
}

/// `GET /mode/queue`: consistent snapshot of queue and activity.
pub(crate) async fn queue_snapshot(State(st): State<ControlState>) -> Json<Envelope> {
    let snap = st.handle.snapshot().await;
    Json(Envelope::ok(json!(snap)))
}

/// `POST /mode/queue` with `{"mode": "<name>", "priority": <int>?}`.
pub(crate) async fn queue_mode(
    State(st): State<ControlState>,
    body: Bytes,
) -> Result<Json<Envelope>, ControlError> {
    let req = parse_body(&body)?;
    let priority = parse_priority(req.get("priority"))?;
    let name = req
        .get("mode")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or(ControlError::MissingMode)?;

    st.handle.enqueue_by_name(&name, priority).await?;
    info!(mode = %name, ?priority, "mode queued via control plane");
    Ok(Json(Envelope::done(format!("Queued mode {name}."))))
}

fn parse_body(body: &[u8]) -> Result<serde_json::Map<String, Value>, ControlError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => Ok(map),
        Ok(_) => Err(ControlError::MalformedBody {
            reason: "expected a non-empty JSON object".to_string(),
        }),
        Err(e) => Err(ControlError::MalformedBody {
            reason: e.to_string(),
        }),
    }
}

/// Accepts a non-negative integer, or a string holding one; `null` means none.
fn parse_priority(raw: Option<&Value>) -> Result<Option<u32>, ControlError> {
    let Some(raw) = raw.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let parsed = match raw {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| ControlError::InvalidPriority {
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_accepts_ints_and_numeric_strings() {
        assert_eq!(parse_priority(None), Ok(None));
        assert_eq!(parse_priority(Some(&Value::Null)), Ok(None));
        assert_eq!(parse_priority(Some(&json!(0))), Ok(Some(0)));
        assert_eq!(parse_priority(Some(&json!(" 12 "))), Ok(Some(12)));
    }

    #[test]
    fn priority_rejects_negative_and_junk() {
        for bad in [json!(-1), json!("-3"), json!(1.5), json!("high"), json!([1])] {
            assert!(matches!(
                parse_priority(Some(&bad)),
                Err(ControlError::InvalidPriority { .. })
            ));
        }
    }

    #[test]
    fn body_must_be_a_json_object() {
        assert!(parse_body(b"").is_err());
        assert!(parse_body(b"{}").is_err());
        assert!(parse_body(b"[1]").is_err());
        assert!(parse_body(br#"{"mode":"away"}"#).is_ok());
    }
}
