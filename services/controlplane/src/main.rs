//! Courier control-plane command-line entry point.
//!
//! # Purpose
//! Loads configuration, builds the [`ControlPlane`], runs one operation and
//! prints its JSON result on stdout. Failures print the JSON error body and exit
//! non-zero; logs go to stderr.
use anyhow::Context;
use clap::{Parser, Subcommand};
use controlplane::config::ControlPlaneConfig;
use controlplane::model::{
    AdaptorBindings, AdaptorRegistration, AppendStreamingRequest, CallbackRequest,
    CallbackSummary, DeleteAdaptorRequest, DeleteCallbackRequest, DeleteStreamingRequest,
    HeartbeatRequest, HeartbeatRoute, PasswordReset, RegisterAdaptorRequest, StreamingBindings,
    StreamingRequest, StreamingSubscription,
};
use controlplane::provisioning::TopologyEntry;
use controlplane::{ControlPlane, ControlPlaneResult, build_state, observability};
use courier_mgmt::ExchangeInfo;
use serde::Serialize;
use serde_json::{Value, json};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "courier-controlplane")]
#[command(about = "Provision adaptors and subscriptions on the Courier broker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Declare vhosts, system queues and the notification exchange
    Bootstrap,
    /// Register an adaptor exchange for an owner
    RegisterAdaptor {
        #[arg(long)]
        adaptor_id: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        vhost: Option<String>,
    },
    DeleteAdaptor {
        #[arg(long)]
        adaptor_id: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        vhost: Option<String>,
    },
    GetAdaptor {
        #[arg(long)]
        adaptor_id: String,
        #[arg(long)]
        vhost: Option<String>,
    },
    ListAdaptorBindings {
        #[arg(long)]
        adaptor_id: String,
        #[arg(long)]
        vhost: Option<String>,
    },
    /// Create a streaming subscription queue
    RegisterStreaming {
        #[arg(long)]
        consumer: String,
        #[arg(long)]
        name: String,
        /// Routing key to bind; repeat for several
        #[arg(long = "entity")]
        entities: Vec<String>,
    },
    UpdateStreaming {
        #[arg(long)]
        consumer: String,
        #[arg(long)]
        name: String,
        #[arg(long = "entity")]
        entities: Vec<String>,
    },
    AppendStreaming {
        #[arg(long)]
        subscription_id: String,
        #[arg(long = "entity")]
        entities: Vec<String>,
    },
    DeleteStreaming {
        #[arg(long)]
        subscription_id: String,
        #[arg(long)]
        consumer: String,
    },
    ListStreaming {
        #[arg(long)]
        subscription_id: String,
    },
    /// Register a webhook subscription
    RegisterCallback {
        #[arg(long)]
        consumer: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        callback_url: String,
        #[arg(long = "entity")]
        entities: Vec<String>,
    },
    UpdateCallback {
        #[arg(long)]
        consumer: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        callback_url: String,
        #[arg(long = "entity")]
        entities: Vec<String>,
    },
    DeleteCallback {
        #[arg(long)]
        consumer: String,
        #[arg(long)]
        name: String,
    },
    ListCallback {
        #[arg(long)]
        consumer: String,
        #[arg(long)]
        name: String,
    },
    /// Forward an adaptor status message
    Heartbeat {
        #[arg(long)]
        adaptor_id: String,
        #[arg(long)]
        status: String,
        #[arg(long)]
        vhost: Option<String>,
    },
    /// Issue a new broker password for a user
    ResetPassword {
        #[arg(long)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let metrics = observability::init_observability();
    let config = ControlPlaneConfig::from_env_or_yaml().context("control plane config")?;
    let control_plane = build_state(&config).await?;

    let outcome = run(&control_plane, cli.command).await;
    tracing::debug!(metrics = %metrics.render(), "metrics snapshot");
    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err.to_response())?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Success payload of one command.
#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Topology(Vec<TopologyEntry>),
    Adaptor(AdaptorRegistration),
    Exchange(ExchangeInfo),
    AdaptorBindings(AdaptorBindings),
    Streaming(StreamingSubscription),
    StreamingBindings(StreamingBindings),
    Callback(CallbackSummary),
    Heartbeat(HeartbeatRoute),
    Password(PasswordReset),
    Deleted(Value),
}

async fn run(control_plane: &ControlPlane, command: Command) -> ControlPlaneResult<Output> {
    match command {
        Command::Bootstrap => Ok(Output::Topology(control_plane.bootstrap_topology().await?)),
        Command::RegisterAdaptor {
            adaptor_id,
            owner,
            vhost,
        } => Ok(Output::Adaptor(
            control_plane
                .register_adaptor(&RegisterAdaptorRequest {
                    adaptor_id,
                    owner,
                    vhost,
                })
                .await?,
        )),
        Command::DeleteAdaptor {
            adaptor_id,
            owner,
            vhost,
        } => {
            let request = DeleteAdaptorRequest {
                adaptor_id,
                owner,
                vhost,
            };
            control_plane.delete_adaptor(&request).await?;
            Ok(Output::Deleted(json!({ "adaptor_id": request.adaptor_id })))
        }
        Command::GetAdaptor { adaptor_id, vhost } => {
            Ok(Output::Exchange(control_plane.get_adaptor(&adaptor_id, vhost.as_deref()).await?))
        }
        Command::ListAdaptorBindings { adaptor_id, vhost } => Ok(Output::AdaptorBindings(
            control_plane
                .list_adaptor_bindings(&adaptor_id, vhost.as_deref())
                .await?,
        )),
        Command::RegisterStreaming {
            consumer,
            name,
            entities,
        } => Ok(Output::Streaming(
            control_plane
                .register_streaming(&StreamingRequest {
                    consumer,
                    name,
                    entities,
                })
                .await?,
        )),
        Command::UpdateStreaming {
            consumer,
            name,
            entities,
        } => Ok(Output::Streaming(
            control_plane
                .update_streaming(&StreamingRequest {
                    consumer,
                    name,
                    entities,
                })
                .await?,
        )),
        Command::AppendStreaming {
            subscription_id,
            entities,
        } => Ok(Output::StreamingBindings(
            control_plane
                .append_streaming(&AppendStreamingRequest {
                    subscription_id,
                    entities,
                })
                .await?,
        )),
        Command::DeleteStreaming {
            subscription_id,
            consumer,
        } => {
            let request = DeleteStreamingRequest {
                subscription_id,
                consumer,
            };
            control_plane.delete_streaming(&request).await?;
            Ok(Output::Deleted(json!({ "subscription_id": request.subscription_id })))
        }
        Command::ListStreaming { subscription_id } => {
            Ok(Output::StreamingBindings(control_plane.list_streaming(&subscription_id).await?))
        }
        Command::RegisterCallback {
            consumer,
            name,
            callback_url,
            entities,
        } => Ok(Output::Callback(
            control_plane
                .register_callback(&CallbackRequest {
                    consumer,
                    name,
                    callback_url,
                    entities,
                })
                .await?,
        )),
        Command::UpdateCallback {
            consumer,
            name,
            callback_url,
            entities,
        } => Ok(Output::Callback(
            control_plane
                .update_callback(&CallbackRequest {
                    consumer,
                    name,
                    callback_url,
                    entities,
                })
                .await?,
        )),
        Command::DeleteCallback { consumer, name } => {
            control_plane
                .delete_callback(&DeleteCallbackRequest {
                    consumer: consumer.clone(),
                    name: name.clone(),
                })
                .await?;
            Ok(Output::Deleted(json!({ "consumer": consumer, "name": name })))
        }
        Command::ListCallback { consumer, name } => {
            Ok(Output::Callback(control_plane.list_callback(&consumer, &name).await?))
        }
        Command::Heartbeat {
            adaptor_id,
            status,
            vhost,
        } => Ok(Output::Heartbeat(
            control_plane
                .publish_heartbeat(&HeartbeatRequest {
                    adaptor_id,
                    status,
                    vhost,
                })
                .await?,
        )),
        Command::ResetPassword { username } => {
            Ok(Output::Password(control_plane.reset_password(&username).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_repeated_entities() {
        let cli = Cli::try_parse_from([
            "courier-controlplane",
            "register-streaming",
            "--consumer",
            "u@org.com",
            "--name",
            "feed",
            "--entity",
            "a/b/c/d/e",
            "--entity",
            "a/b/c/d/f",
        ])
        .expect("parse");
        match cli.command {
            Command::RegisterStreaming { entities, .. } => assert_eq!(entities.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_requires_adaptor_id() {
        assert!(Cli::try_parse_from(["courier-controlplane", "register-adaptor", "--owner", "o"]).is_err());
    }
}
