//! Consumer subscriptions.
//!
//! # Purpose
//! Streaming subscriptions give a consumer its own queue bound to the requested
//! routing keys. Callback subscriptions bind the keys to the shared callback
//! queue and record the webhook in the registry.
//!
//! # Subscription ids
//! `{domain}/{sha1(consumer)}/{alias}`, where `domain` is the part of the
//! consumer after the first `@` (the whole consumer when there is none).
use crate::app::ControlPlane;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use courier_authz::RoutingKey;
use sha1::{Digest, Sha1};

mod callback;
mod streaming;

pub fn subscription_id(consumer: &str, alias: &str) -> ControlPlaneResult<String> {
    if consumer.trim().is_empty() {
        return Err(ControlPlaneError::validation("consumer must not be empty"));
    }
    if alias.trim().is_empty() {
        return Err(ControlPlaneError::validation("name must not be empty"));
    }
    let domain = consumer
        .split_once('@')
        .map(|(_, domain)| domain)
        .unwrap_or(consumer);
    let digest = Sha1::digest(consumer.as_bytes());
    Ok(format!("{domain}/{digest:x}/{alias}"))
}

fn require_entities(entities: &[String]) -> ControlPlaneResult<()> {
    if entities.is_empty() {
        return Err(ControlPlaneError::validation("entities must not be empty"));
    }
    Ok(())
}

impl ControlPlane {
    /// Bind `queue` to each routing key in order, stopping at the first failure.
    ///
    /// Keys bound before the failure stay bound; callers decide whether to unwind.
    pub(crate) async fn bind_routing_keys(
        &self,
        vhost: &str,
        queue: &str,
        entities: &[String],
    ) -> ControlPlaneResult<()> {
        for raw in entities {
            let routing_key = RoutingKey::parse(raw).map_err(|_| {
                ControlPlaneError::validation(format!("Invalid routing key: {raw}"))
            })?;
            self.broker
                .bind_queue(vhost, routing_key.exchange(), queue, routing_key.as_str())
                .await
                .map_err(|err| {
                    tracing::warn!(%queue, routing_key = %raw, error = %err, "bind failed");
                    ControlPlaneError::remote("Binding failed", err)
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_uses_domain_and_sha1_of_consumer() {
        let id = subscription_id("user@org.com", "alias").expect("id");
        assert_eq!(id, "org.com/87f1341caf0852005b8353bdf3bc661feb11b513/alias");
    }

    #[test]
    fn id_without_at_uses_whole_consumer() {
        let id = subscription_id("service", "feed").expect("id");
        assert_eq!(id, "service/4cf5bc59bee9e1c44c6254b5f84e7f066bd8e5fe/feed");
    }

    #[test]
    fn id_is_deterministic() {
        assert_eq!(
            subscription_id("a@b.com", "x").expect("id"),
            subscription_id("a@b.com", "x").expect("id")
        );
        assert_ne!(
            subscription_id("a@b.com", "x").expect("id"),
            subscription_id("c@b.com", "x").expect("id")
        );
    }

    #[test]
    fn empty_parts_are_rejected() {
        assert!(matches!(
            subscription_id("", "x"),
            Err(ControlPlaneError::Validation(_))
        ));
        assert!(matches!(
            subscription_id("a@b.com", " "),
            Err(ControlPlaneError::Validation(_))
        ));
    }
}
