//! Adaptor provisioning.
//!
//! # Purpose
//! Registers and deletes adaptors. An adaptor owns one topic exchange named by
//! its id; registration grants the owner write access to it and binds it to
//! every system queue (the fan-out).
//!
//! # Key invariants
//! - A registration that fails after the exchange was created deletes the exchange.
//! - An existing exchange is a conflict and is never touched.
//! - Deletion revokes the owner's write grant best-effort; a failed revoke is logged only.
use crate::app::ControlPlane;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::model::{
    AdaptorBindings, AdaptorRegistration, DeleteAdaptorRequest, RegisterAdaptorRequest,
};
use crate::saga::Saga;
use courier_authz::{AdaptorId, PermissionOp};
use courier_mgmt::{ExchangeInfo, MgmtError};
use serde::{Deserialize, Serialize};

/// Status channels every adaptor publishes on, bound to the logs queue.
pub const STATUS_SUFFIXES: [&str; 3] = [".heartbeat", ".dataIssue", ".downstreamIssue"];

/// One resource declared by [`ControlPlane::bootstrap_topology`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TopologyEntry {
    pub kind: String,
    pub vhost: String,
    pub name: String,
    /// False when the resource already existed.
    pub created: bool,
}

fn require_owner(owner: &str) -> ControlPlaneResult<()> {
    if owner.trim().is_empty() {
        return Err(ControlPlaneError::validation("owner must not be empty"));
    }
    Ok(())
}

impl ControlPlane {
    /// `(queue, routing key)` pairs bound for a newly registered adaptor, in bind order.
    pub fn fan_out(&self, adaptor_id: &AdaptorId) -> Vec<(String, String)> {
        let settings = &self.settings;
        let mut bindings = vec![
            (settings.data_queue.clone(), adaptor_id.data_pattern()),
            (settings.latest_queue.clone(), adaptor_id.data_pattern()),
        ];
        for suffix in STATUS_SUFFIXES {
            bindings.push((settings.logs_queue.clone(), adaptor_id.status_key(suffix)));
        }
        bindings.push((settings.auditing_queue.clone(), adaptor_id.data_pattern()));
        bindings
    }

    /// Register an adaptor.
    ///
    /// # What it does
    /// 1. Validates the id and ensures the owner exists on the broker.
    /// 2. Creates the adaptor exchange.
    /// 3. Grants the owner write access to it.
    /// 4. Binds the exchange to every system queue.
    ///
    /// Any failure after step 2 deletes the exchange before the error is returned.
    ///
    /// # Errors
    /// - [`ControlPlaneError::Validation`] for a malformed id or missing owner.
    /// - [`ControlPlaneError::Conflict`] (`exchange_exists`) when the exchange exists.
    /// - [`ControlPlaneError::Remote`] for any failed management call.
    pub async fn register_adaptor(
        &self,
        request: &RegisterAdaptorRequest,
    ) -> ControlPlaneResult<AdaptorRegistration> {
        let adaptor_id = AdaptorId::parse(&request.adaptor_id)?;
        require_owner(&request.owner)?;
        let vhost = self.data_vhost_or(request.vhost.as_deref());

        let credentials = self.ensure_user(&request.owner, &vhost).await?;

        match self.broker.create_exchange(&vhost, adaptor_id.as_str()).await {
            Ok(()) => {}
            Err(MgmtError::AlreadyExists(_)) => {
                return Err(ControlPlaneError::conflict(
                    "exchange_exists",
                    format!("Exchange {adaptor_id} already exists"),
                ));
            }
            Err(err) => return Err(ControlPlaneError::remote("Exchange creation failed", err)),
        }

        let mut saga = Saga::begin("register_adaptor");
        {
            let broker = self.broker.clone();
            let vhost = vhost.clone();
            let exchange = adaptor_id.as_str().to_string();
            saga.on_failure(format!("delete exchange {exchange}"), move || async move {
                broker
                    .delete_exchange(&vhost, &exchange)
                    .await
                    .map_err(anyhow::Error::from)
            });
        }

        saga.guard(self.update_user_permissions(
            &vhost,
            &request.owner,
            PermissionOp::AddWrite,
            adaptor_id.as_str(),
        ))
        .await?;

        for (queue, routing_key) in self.fan_out(&adaptor_id) {
            saga.guard(async {
                self.broker
                    .bind_queue(&vhost, adaptor_id.as_str(), &queue, &routing_key)
                    .await
                    .map_err(|err| {
                        tracing::warn!(
                            adaptor_id = %adaptor_id,
                            %queue,
                            %routing_key,
                            error = %err,
                            "fan-out bind failed"
                        );
                        ControlPlaneError::remote("Queue binding failed", err)
                    })
            })
            .await?;
        }
        saga.complete();

        tracing::info!(adaptor_id = %adaptor_id, owner = %request.owner, %vhost, "adaptor registered");
        Ok(AdaptorRegistration {
            username: credentials.username,
            api_key: credentials.api_key,
            id: adaptor_id.to_string(),
            url: self.settings.amqp_host.clone(),
            port: self.settings.amqp_port,
            vhost,
        })
    }

    /// Delete an adaptor's exchange and revoke the owner's write grant.
    ///
    /// # Errors
    /// - [`ControlPlaneError::NotFound`] when the exchange does not exist; nothing is changed.
    /// - [`ControlPlaneError::Remote`] when the delete itself fails.
    pub async fn delete_adaptor(&self, request: &DeleteAdaptorRequest) -> ControlPlaneResult<()> {
        let adaptor_id = AdaptorId::parse(&request.adaptor_id)?;
        require_owner(&request.owner)?;
        let vhost = self.data_vhost_or(request.vhost.as_deref());

        self.broker
            .get_exchange(&vhost, adaptor_id.as_str())
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Exchange lookup failed", err))?;
        self.broker
            .delete_exchange(&vhost, adaptor_id.as_str())
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Exchange deletion failed", err))?;

        if let Err(err) = self
            .update_user_permissions(
                &vhost,
                &request.owner,
                PermissionOp::DeleteWrite,
                adaptor_id.as_str(),
            )
            .await
        {
            tracing::warn!(
                adaptor_id = %adaptor_id,
                owner = %request.owner,
                error = %err,
                "write grant revoke failed after adaptor deletion"
            );
        }
        tracing::info!(adaptor_id = %adaptor_id, %vhost, "adaptor deleted");
        Ok(())
    }

    pub async fn get_adaptor(
        &self,
        adaptor_id: &str,
        vhost: Option<&str>,
    ) -> ControlPlaneResult<ExchangeInfo> {
        let adaptor_id = AdaptorId::parse(adaptor_id)?;
        let vhost = self.data_vhost_or(vhost);
        self.broker
            .get_exchange(&vhost, adaptor_id.as_str())
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Exchange lookup failed", err))
    }

    pub async fn list_adaptor_bindings(
        &self,
        adaptor_id: &str,
        vhost: Option<&str>,
    ) -> ControlPlaneResult<AdaptorBindings> {
        let adaptor_id = AdaptorId::parse(adaptor_id)?;
        let vhost = self.data_vhost_or(vhost);
        let queues = self
            .broker
            .list_exchange_bindings(&vhost, adaptor_id.as_str())
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Listing bindings failed", err))?;
        Ok(AdaptorBindings {
            adaptor_id: adaptor_id.to_string(),
            queues,
        })
    }

    /// Declare the vhosts, system queues and notification exchange the control
    /// plane depends on. Resources that already exist are reported, not recreated.
    pub async fn bootstrap_topology(&self) -> ControlPlaneResult<Vec<TopologyEntry>> {
        let settings = self.settings.clone();
        let mut report = Vec::new();

        for vhost in [&settings.data_vhost, &settings.internal_vhost] {
            let created = declared(self.broker.create_vhost(vhost).await, "Vhost creation failed")?;
            report.push(entry("vhost", vhost, vhost, created));
        }

        let queues = [
            &settings.data_queue,
            &settings.latest_queue,
            &settings.logs_queue,
            &settings.auditing_queue,
            &settings.callback_queue,
        ];
        for queue in queues {
            let created = declared(
                self.broker.create_queue(&settings.data_vhost, queue).await,
                "Queue creation failed",
            )?;
            report.push(entry("queue", &settings.data_vhost, queue, created));
        }

        let created = declared(
            self.broker
                .create_exchange(&settings.internal_vhost, &settings.notification_exchange)
                .await,
            "Exchange creation failed",
        )?;
        report.push(entry(
            "exchange",
            &settings.internal_vhost,
            &settings.notification_exchange,
            created,
        ));

        let created_count = report.iter().filter(|entry| entry.created).count();
        tracing::info!(created = created_count, total = report.len(), "topology bootstrapped");
        Ok(report)
    }
}

fn declared(result: Result<(), MgmtError>, context: &str) -> ControlPlaneResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(MgmtError::AlreadyExists(_)) => Ok(false),
        Err(err) => Err(ControlPlaneError::remote(context, err)),
    }
}

fn entry(kind: &str, vhost: &str, name: &str, created: bool) -> TopologyEntry {
    TopologyEntry {
        kind: kind.to_string(),
        vhost: vhost.to_string(),
        name: name.to_string(),
        created,
    }
}
