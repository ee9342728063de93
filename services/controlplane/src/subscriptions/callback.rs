//! Callback subscriptions: bindings on the shared callback queue plus a registry row.
//!
//! Every change publishes a [`CallbackNotification`] on the notification exchange
//! in the internal vhost so the callback dispatcher can reload its webhooks.
use super::{require_entities, subscription_id};
use crate::app::ControlPlane;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::model::{
    CallbackNotification, CallbackRequest, CallbackSubscription, CallbackSummary,
    DeleteCallbackRequest, NotificationOp,
};
use crate::saga::Saga;
use crate::store::StoreError;
use chrono::Utc;
use courier_mgmt::MgmtError;

impl ControlPlane {
    /// Register a callback subscription.
    ///
    /// # What it does
    /// 1. Rejects an id that already has a registry row, before any broker change.
    /// 2. Binds every key to the callback queue.
    /// 3. Inserts the registry row.
    /// 4. Publishes a `create` notification; if that fails the row is deleted.
    ///
    /// # Errors
    /// - [`ControlPlaneError::DuplicateSubscription`] when the id is taken.
    /// - [`ControlPlaneError::Validation`] for an invalid request or routing key.
    /// - [`ControlPlaneError::Remote`] for bind or publish failures.
    /// - [`ControlPlaneError::Persistence`] when the row cannot be written.
    pub async fn register_callback(
        &self,
        request: &CallbackRequest,
    ) -> ControlPlaneResult<CallbackSummary> {
        if request.callback_url.trim().is_empty() {
            return Err(ControlPlaneError::validation("callback url must not be empty"));
        }
        require_entities(&request.entities)?;
        let subscription_id = subscription_id(&request.consumer, &request.name)?;

        match self.store.get_callback(&subscription_id).await {
            Ok(_) => return Err(ControlPlaneError::DuplicateSubscription(subscription_id)),
            Err(StoreError::NotFound(_)) => {}
            Err(err) => {
                return Err(ControlPlaneError::persistence(
                    "Reading callback subscription failed",
                    err,
                ));
            }
        }

        self.bind_routing_keys(
            &self.settings.data_vhost,
            &self.settings.callback_queue,
            &request.entities,
        )
        .await?;

        let now = Utc::now();
        let row = CallbackSubscription {
            subscription_id: subscription_id.clone(),
            callback_url: request.callback_url.clone(),
            entities: request.entities.clone(),
            start_time: now,
            end_time: now,
            frequency: now,
        };
        match self.store.insert_callback(row.clone()).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(ControlPlaneError::DuplicateSubscription(subscription_id));
            }
            Err(err) => {
                return Err(ControlPlaneError::persistence(
                    "Saving callback subscription failed",
                    err,
                ));
            }
        }

        let mut saga = Saga::begin("callback_subscription");
        {
            let store = self.store.clone();
            let id = subscription_id.clone();
            saga.on_failure(format!("delete callback row {id}"), move || async move {
                store.delete_callback(&id).await.map_err(anyhow::Error::from)
            });
        }
        saga.guard(self.notify_callback(&subscription_id, NotificationOp::Create))
            .await?;
        saga.complete();

        tracing::info!(%subscription_id, "callback subscription registered");
        Ok(row.into())
    }

    /// Bind the new keys and replace the stored entity list.
    ///
    /// Keys dropped from the list are not unbound from the callback queue.
    pub async fn update_callback(
        &self,
        request: &CallbackRequest,
    ) -> ControlPlaneResult<CallbackSummary> {
        require_entities(&request.entities)?;
        let subscription_id = subscription_id(&request.consumer, &request.name)?;
        let mut row = self.store.get_callback(&subscription_id).await?;

        self.bind_routing_keys(
            &self.settings.data_vhost,
            &self.settings.callback_queue,
            &request.entities,
        )
        .await?;
        self.store
            .update_callback_entities(&subscription_id, &request.entities)
            .await?;
        row.entities = request.entities.clone();

        self.notify_callback(&subscription_id, NotificationOp::Update)
            .await?;
        tracing::info!(%subscription_id, "callback subscription updated");
        Ok(row.into())
    }

    pub async fn delete_callback(&self, request: &DeleteCallbackRequest) -> ControlPlaneResult<()> {
        let subscription_id = subscription_id(&request.consumer, &request.name)?;
        self.store.get_callback(&subscription_id).await?;
        self.store.delete_callback(&subscription_id).await?;
        if let Err(err) = self
            .notify_callback(&subscription_id, NotificationOp::Delete)
            .await
        {
            tracing::warn!(%subscription_id, error = %err, "delete notification not published");
        }
        tracing::info!(%subscription_id, "callback subscription deleted");
        Ok(())
    }

    pub async fn list_callback(
        &self,
        consumer: &str,
        name: &str,
    ) -> ControlPlaneResult<CallbackSummary> {
        let subscription_id = subscription_id(consumer, name)?;
        Ok(self.store.get_callback(&subscription_id).await?.into())
    }

    async fn notify_callback(
        &self,
        subscription_id: &str,
        operation: NotificationOp,
    ) -> ControlPlaneResult<()> {
        let message = CallbackNotification {
            subscription_id: subscription_id.to_string(),
            operation,
        }
        .to_message()
        .map_err(|_| {
            ControlPlaneError::remote("Notification encoding failed", MgmtError::InvalidPayload)
        })?;
        self.publisher
            .publish(
                &self.settings.internal_vhost,
                &self.settings.notification_exchange,
                operation.as_str(),
                &message,
            )
            .await
            .map_err(|err| ControlPlaneError::remote("Notification publish failed", err))
    }
}
