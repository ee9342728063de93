//! Heartbeat routing.
//!
//! # Purpose
//! Forwards an adaptor status message onto the first binding of the adaptor's
//! exchange whose routing key contains the status text.
//!
//! # Notes
//! Queues are scanned in name order and keys in the order the broker reports
//! them, so the chosen binding is deterministic for a given topology. Matching is
//! a plain substring test: a status of `heart` matches `.heartbeat`.
use crate::app::ControlPlane;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::model::{HeartbeatRequest, HeartbeatRoute};
use courier_authz::AdaptorId;
use serde_json::json;

impl ControlPlane {
    /// Publish `{"id", "status"}` on the adaptor exchange with the first matching key.
    ///
    /// # Errors
    /// - [`ControlPlaneError::Validation`] for an empty status, a malformed id, or
    ///   when no bound key contains the status.
    /// - [`ControlPlaneError::NotFound`] when the exchange does not exist or has no
    ///   queue bound.
    /// - [`ControlPlaneError::Remote`] when listing or publishing fails.
    pub async fn publish_heartbeat(
        &self,
        request: &HeartbeatRequest,
    ) -> ControlPlaneResult<HeartbeatRoute> {
        if request.status.is_empty() {
            return Err(ControlPlaneError::validation("status must not be empty"));
        }
        let adaptor_id = AdaptorId::parse(&request.adaptor_id)?;
        let vhost = self.data_vhost_or(request.vhost.as_deref());

        self.broker
            .get_exchange(&vhost, adaptor_id.as_str())
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Exchange lookup failed", err))?;
        let bindings = self
            .broker
            .list_exchange_bindings(&vhost, adaptor_id.as_str())
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Listing bindings failed", err))?;

        let mut first_mismatch: Option<&str> = None;
        for (queue, routing_keys) in bindings.iter() {
            match routing_keys
                .iter()
                .find(|key| key.contains(request.status.as_str()))
            {
                Some(routing_key) => {
                    let body = json!({ "id": adaptor_id.as_str(), "status": request.status });
                    self.publisher
                        .publish(&vhost, adaptor_id.as_str(), routing_key, body.to_string().as_bytes())
                        .await
                        .map_err(|err| ControlPlaneError::remote("Heartbeat publish failed", err))?;
                    tracing::debug!(adaptor_id = %adaptor_id, %queue, %routing_key, "heartbeat forwarded");
                    return Ok(HeartbeatRoute {
                        queue: queue.to_string(),
                        routing_key: routing_key.clone(),
                    });
                }
                None => {
                    if first_mismatch.is_none() {
                        first_mismatch = routing_keys.first().map(String::as_str);
                    }
                }
            }
        }

        match first_mismatch {
            None if bindings.iter().all(|(_, keys)| keys.is_empty()) => Err(
                ControlPlaneError::not_found(format!("No queue bound to {adaptor_id}")),
            ),
            mismatch => Err(ControlPlaneError::validation(format!(
                "Routing key not matched: {}",
                mismatch.unwrap_or_default()
            ))),
        }
    }
}
