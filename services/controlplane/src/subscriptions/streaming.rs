//! Streaming subscriptions: one queue per subscription in the data vhost.
use super::{require_entities, subscription_id};
use crate::app::ControlPlane;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::model::{
    AppendStreamingRequest, DeleteStreamingRequest, StreamingBindings, StreamingRequest,
    StreamingSubscription, UserCredentials,
};
use crate::saga::Saga;
use courier_authz::PermissionOp;
use courier_mgmt::MgmtError;

impl ControlPlane {
    /// Create a streaming subscription queue bound to every requested key.
    ///
    /// # What it does
    /// Ensures the consumer exists, creates the queue, binds each key and grants
    /// the consumer read access. A failure after the queue exists deletes it.
    ///
    /// # Errors
    /// - [`ControlPlaneError::Validation`] for no entities or an invalid routing key.
    /// - [`ControlPlaneError::Conflict`] (`queue_exists`) when the queue exists.
    /// - [`ControlPlaneError::Remote`] for failed binds or grants.
    pub async fn register_streaming(
        &self,
        request: &StreamingRequest,
    ) -> ControlPlaneResult<StreamingSubscription> {
        require_entities(&request.entities)?;
        let subscription_id = subscription_id(&request.consumer, &request.name)?;
        let credentials = self
            .ensure_user(&request.consumer, &self.settings.internal_vhost)
            .await?;
        self.provision_stream(&subscription_id, &request.consumer, &request.entities)
            .await?;
        tracing::info!(%subscription_id, consumer = %request.consumer, "streaming subscription registered");
        Ok(self.streaming_response(subscription_id, credentials))
    }

    /// Replace a streaming subscription: drop the queue, then recreate it with the new keys.
    pub async fn update_streaming(
        &self,
        request: &StreamingRequest,
    ) -> ControlPlaneResult<StreamingSubscription> {
        require_entities(&request.entities)?;
        let subscription_id = subscription_id(&request.consumer, &request.name)?;
        match self
            .broker
            .delete_queue(&self.settings.data_vhost, &subscription_id)
            .await
        {
            Ok(()) | Err(MgmtError::NotFound(_)) => {}
            Err(err) => return Err(ControlPlaneError::remote("Queue deletion failed", err)),
        }
        let credentials = self
            .ensure_user(&request.consumer, &self.settings.internal_vhost)
            .await?;
        self.provision_stream(&subscription_id, &request.consumer, &request.entities)
            .await?;
        tracing::info!(%subscription_id, "streaming subscription replaced");
        Ok(self.streaming_response(subscription_id, credentials))
    }

    /// Bind additional keys to an existing subscription queue.
    ///
    /// Keys bound before a failing key stay bound.
    pub async fn append_streaming(
        &self,
        request: &AppendStreamingRequest,
    ) -> ControlPlaneResult<StreamingBindings> {
        let vhost = &self.settings.data_vhost;
        match self
            .broker
            .list_queue_bindings(vhost, &request.subscription_id)
            .await
        {
            Ok(_) => {}
            Err(MgmtError::NotFound(_)) => {
                return Err(ControlPlaneError::validation(format!(
                    "Subscription queue {} does not exist",
                    request.subscription_id
                )));
            }
            Err(err) => return Err(ControlPlaneError::remote("Listing bindings failed", err)),
        }
        require_entities(&request.entities)?;
        self.bind_routing_keys(vhost, &request.subscription_id, &request.entities)
            .await?;
        tracing::info!(
            subscription_id = %request.subscription_id,
            appended = request.entities.len(),
            "streaming subscription extended"
        );
        self.list_streaming(&request.subscription_id).await
    }

    /// Delete a subscription queue and revoke the consumer's read grant best-effort.
    pub async fn delete_streaming(&self, request: &DeleteStreamingRequest) -> ControlPlaneResult<()> {
        if request.subscription_id.trim().is_empty() {
            return Err(ControlPlaneError::validation("subscription id must not be empty"));
        }
        let vhost = &self.settings.data_vhost;
        self.broker
            .delete_queue(vhost, &request.subscription_id)
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Queue deletion failed", err))?;
        if let Err(err) = self
            .update_user_permissions(
                vhost,
                &request.consumer,
                PermissionOp::DeleteRead,
                &request.subscription_id,
            )
            .await
        {
            tracing::warn!(
                subscription_id = %request.subscription_id,
                consumer = %request.consumer,
                error = %err,
                "read grant revoke failed after subscription deletion"
            );
        }
        tracing::info!(subscription_id = %request.subscription_id, "streaming subscription deleted");
        Ok(())
    }

    pub async fn list_streaming(&self, subscription_id: &str) -> ControlPlaneResult<StreamingBindings> {
        let entities = self
            .broker
            .list_queue_bindings(&self.settings.data_vhost, subscription_id)
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Listing bindings failed", err))?;
        Ok(StreamingBindings {
            subscription_id: subscription_id.to_string(),
            entities,
        })
    }

    async fn provision_stream(
        &self,
        subscription_id: &str,
        consumer: &str,
        entities: &[String],
    ) -> ControlPlaneResult<()> {
        let vhost = &self.settings.data_vhost;
        match self.broker.create_queue(vhost, subscription_id).await {
            Ok(()) => {}
            Err(MgmtError::AlreadyExists(_)) => {
                return Err(ControlPlaneError::conflict(
                    "queue_exists",
                    format!("Queue {subscription_id} already exists"),
                ));
            }
            Err(err) => return Err(ControlPlaneError::remote("Queue creation failed", err)),
        }

        let mut saga = Saga::begin("streaming_subscription");
        {
            let broker = self.broker.clone();
            let vhost = vhost.clone();
            let queue = subscription_id.to_string();
            saga.on_failure(format!("delete queue {queue}"), move || async move {
                broker
                    .delete_queue(&vhost, &queue)
                    .await
                    .map_err(anyhow::Error::from)
            });
        }
        saga.guard(self.bind_routing_keys(vhost, subscription_id, entities))
            .await?;
        saga.guard(self.update_user_permissions(
            vhost,
            consumer,
            PermissionOp::AddRead,
            subscription_id,
        ))
        .await?;
        saga.complete();
        Ok(())
    }

    fn streaming_response(
        &self,
        subscription_id: String,
        credentials: UserCredentials,
    ) -> StreamingSubscription {
        let settings = &self.settings;
        StreamingSubscription {
            subscription_id,
            username: credentials.username,
            api_key: credentials.api_key,
            streaming_url: format!(
                "amqps://{}:{}/{}",
                settings.amqp_host, settings.amqp_port, settings.data_vhost
            ),
            host: settings.amqp_host.clone(),
            port: settings.amqp_port,
            vhost: settings.data_vhost.clone(),
        }
    }
}
