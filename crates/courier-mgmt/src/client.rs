//! HTTP client for the broker management API.
//!
//! # Purpose
//! Implements [`BrokerAdmin`] and [`MessagePublisher`] over the management API
//! using `reqwest`, mapping response statuses to typed results.
//!
//! # Status mapping
//! - create: `201` succeeds, `204` and `400` mean the resource already exists.
//! - delete: `200`/`204` succeed.
//! - update: `200`/`201`/`204` succeed.
//! - any call: `404` is not-found; every other status is unexpected.
//!
//! # Security notes
//! - Requests carry HTTP basic auth; never log the configured password.
use crate::admin::{BrokerAdmin, MessagePublisher};
use crate::types::{
    BindingInfo, ExchangeBindings, ExchangeInfo, QueueArguments, UserInfo, VhostInfo,
};
use crate::{MgmtError, MgmtResult};
use async_trait::async_trait;
use courier_authz::PermissionGrant;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ManagementConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    pub queue_arguments: QueueArguments,
}

#[derive(Debug, Clone, Copy)]
enum Expect {
    Create,
    Delete,
    Update,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default)]
    routed: bool,
}

/// Name of an argument-less binding in the management API: the URL-encoded
/// routing key, or `~` when the key is empty. The result is path-encoded again
/// when pushed as a segment.
fn properties_key(routing_key: &str) -> String {
    if routing_key.is_empty() {
        "~".to_string()
    } else {
        urlencoding::encode(routing_key).into_owned()
    }
}

/// Management API client.
///
/// # Example
/// ```rust,no_run
/// use courier_mgmt::{BrokerAdmin, ManagementClient, ManagementConfig, QueueArguments};
/// use std::time::Duration;
///
/// async fn declare() -> courier_mgmt::MgmtResult<()> {
///     let client = ManagementClient::new(ManagementConfig {
///         base_url: "http://localhost:15672".to_string(),
///         username: "guest".to_string(),
///         password: "guest".to_string(),
///         timeout: Duration::from_secs(10),
///         queue_arguments: QueueArguments::default(),
///     })?;
///     client.create_vhost("prod").await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    base: Url,
    username: String,
    password: String,
    queue_arguments: QueueArguments,
}

impl ManagementClient {
    pub fn new(config: ManagementConfig) -> MgmtResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|_| MgmtError::InvalidUrl(config.base_url.clone()))?;
        if base.cannot_be_a_base() {
            return Err(MgmtError::InvalidUrl(config.base_url));
        }
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base,
            username: config.username,
            password: config.password,
            queue_arguments: config.queue_arguments,
        })
    }

    /// Build a URL under `/api`, percent-encoding each segment (a `/` vhost becomes `%2F`).
    fn url(&self, segments: &[&str]) -> MgmtResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| MgmtError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> MgmtResult<(String, reqwest::Response)> {
        let url = self.url(segments)?;
        let path = url.path().to_string();
        tracing::debug!(%method, %path, "management api request");
        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        Ok((path, response))
    }

    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
        expect: Expect,
        resource: String,
    ) -> MgmtResult<()> {
        let (path, response) = self.send(method, segments, body).await?;
        check_status(expect, response.status(), &path, resource)
    }

    async fn fetch<T: DeserializeOwned>(&self, segments: &[&str], resource: String) -> MgmtResult<T> {
        let (path, response) = self.send(Method::GET, segments, None).await?;
        match response.status() {
            StatusCode::OK => Ok(response.json::<T>().await?),
            StatusCode::NOT_FOUND => Err(MgmtError::NotFound(resource)),
            status => Err(MgmtError::UnexpectedStatus {
                path,
                status: status.as_u16(),
            }),
        }
    }
}

fn check_status(expect: Expect, status: StatusCode, path: &str, resource: String) -> MgmtResult<()> {
    match (expect, status.as_u16()) {
        (Expect::Create, 201) => Ok(()),
        (Expect::Create, 204 | 400) => Err(MgmtError::AlreadyExists(resource)),
        (Expect::Delete, 200 | 204) => Ok(()),
        (Expect::Update, 200 | 201 | 204) => Ok(()),
        (_, 404) => Err(MgmtError::NotFound(resource)),
        (_, status) => Err(MgmtError::UnexpectedStatus {
            path: path.to_string(),
            status,
        }),
    }
}

#[async_trait]
impl BrokerAdmin for ManagementClient {
    async fn create_exchange(&self, vhost: &str, name: &str) -> MgmtResult<()> {
        let body = json!({"type": "topic", "auto_delete": false, "durable": true});
        self.execute(
            Method::PUT,
            &["exchanges", vhost, name],
            Some(body),
            Expect::Create,
            format!("exchange {name}"),
        )
        .await
    }

    async fn get_exchange(&self, vhost: &str, name: &str) -> MgmtResult<ExchangeInfo> {
        self.fetch(&["exchanges", vhost, name], format!("exchange {name}"))
            .await
    }

    async fn delete_exchange(&self, vhost: &str, name: &str) -> MgmtResult<()> {
        self.execute(
            Method::DELETE,
            &["exchanges", vhost, name],
            None,
            Expect::Delete,
            format!("exchange {name}"),
        )
        .await
    }

    async fn list_exchange_bindings(
        &self,
        vhost: &str,
        name: &str,
    ) -> MgmtResult<ExchangeBindings> {
        let rows: Vec<BindingInfo> = self
            .fetch(
                &["exchanges", vhost, name, "bindings", "source"],
                format!("exchange {name}"),
            )
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn create_queue(&self, vhost: &str, name: &str) -> MgmtResult<()> {
        let body = json!({"durable": true, "arguments": self.queue_arguments});
        self.execute(
            Method::PUT,
            &["queues", vhost, name],
            Some(body),
            Expect::Create,
            format!("queue {name}"),
        )
        .await
    }

    async fn delete_queue(&self, vhost: &str, name: &str) -> MgmtResult<()> {
        self.execute(
            Method::DELETE,
            &["queues", vhost, name],
            None,
            Expect::Delete,
            format!("queue {name}"),
        )
        .await
    }

    async fn list_queue_bindings(&self, vhost: &str, name: &str) -> MgmtResult<Vec<String>> {
        let rows: Vec<BindingInfo> = self
            .fetch(&["queues", vhost, name, "bindings"], format!("queue {name}"))
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.routing_key)
            .filter(|key| key != name)
            .collect())
    }

    async fn bind_queue(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> MgmtResult<()> {
        self.execute(
            Method::POST,
            &["bindings", vhost, "e", exchange, "q", queue],
            Some(json!({"routing_key": routing_key})),
            Expect::Create,
            format!("binding {exchange} -> {queue}"),
        )
        .await
    }

    async fn unbind_queue(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
        routing_key: &str,
    ) -> MgmtResult<()> {
        let props = properties_key(routing_key);
        self.execute(
            Method::DELETE,
            &["bindings", vhost, "e", exchange, "q", queue, &props],
            None,
            Expect::Delete,
            format!("binding {exchange} -> {queue}"),
        )
        .await
    }

    async fn get_user(&self, name: &str) -> MgmtResult<UserInfo> {
        self.fetch(&["users", name], format!("user {name}")).await
    }

    async fn create_user(&self, name: &str, password: &str) -> MgmtResult<()> {
        self.execute(
            Method::PUT,
            &["users", name],
            Some(json!({"password": password, "tags": ""})),
            Expect::Create,
            format!("user {name}"),
        )
        .await
    }

    async fn update_user_password(&self, name: &str, password: &str) -> MgmtResult<()> {
        self.execute(
            Method::PUT,
            &["users", name],
            Some(json!({"password": password, "tags": ""})),
            Expect::Update,
            format!("user {name}"),
        )
        .await
    }

    async fn create_vhost(&self, name: &str) -> MgmtResult<()> {
        self.execute(
            Method::PUT,
            &["vhosts", name],
            None,
            Expect::Create,
            format!("vhost {name}"),
        )
        .await
    }

    async fn delete_vhost(&self, name: &str) -> MgmtResult<()> {
        self.execute(
            Method::DELETE,
            &["vhosts", name],
            None,
            Expect::Delete,
            format!("vhost {name}"),
        )
        .await
    }

    async fn list_vhosts(&self) -> MgmtResult<Vec<String>> {
        let vhosts: Vec<VhostInfo> = self.fetch(&["vhosts"], "vhosts".to_string()).await?;
        Ok(vhosts.into_iter().map(|vhost| vhost.name).collect())
    }

    async fn get_user_permissions(&self, vhost: &str, user: &str) -> MgmtResult<PermissionGrant> {
        self.fetch(
            &["permissions", vhost, user],
            format!("permissions for {user} on {vhost}"),
        )
        .await
    }

    async fn set_user_permissions(
        &self,
        vhost: &str,
        user: &str,
        grant: &PermissionGrant,
    ) -> MgmtResult<()> {
        let body = serde_json::to_value(grant).map_err(|_| MgmtError::InvalidPayload)?;
        self.execute(
            Method::PUT,
            &["permissions", vhost, user],
            Some(body),
            Expect::Update,
            format!("user {user}"),
        )
        .await
    }
}

#[async_trait]
impl MessagePublisher for ManagementClient {
    async fn publish(
        &self,
        vhost: &str,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> MgmtResult<()> {
        let payload = std::str::from_utf8(body).map_err(|_| MgmtError::InvalidPayload)?;
        let request = json!({
            "properties": {},
            "routing_key": routing_key,
            "payload": payload,
            "payload_encoding": "string",
        });
        let (path, response) = self
            .send(
                Method::POST,
                &["exchanges", vhost, exchange, "publish"],
                Some(request),
            )
            .await?;
        match response.status() {
            StatusCode::OK => {
                let outcome: PublishResponse = response.json().await?;
                if !outcome.routed {
                    tracing::debug!(%exchange, %routing_key, "published message was not routed");
                }
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(MgmtError::NotFound(format!("exchange {exchange}"))),
            status => Err(MgmtError::UnexpectedStatus {
                path,
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> MgmtResult<ManagementClient> {
        ManagementClient::new(ManagementConfig {
            base_url: base_url.to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            timeout: Duration::from_secs(1),
            queue_arguments: QueueArguments::default(),
        })
    }

    #[test]
    fn url_segments_are_percent_encoded() {
        let client = client("http://broker:15672").expect("client");
        let url = client
            .url(&["exchanges", "/", "org.com/abc/rs/sensor-1"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://broker:15672/api/exchanges/%2F/org.com%2Fabc%2Frs%2Fsensor-1"
        );
    }

    #[test]
    fn binding_properties_key_is_encoded_before_the_path() {
        assert_eq!(properties_key(""), "~");
        assert_eq!(properties_key("org/h/rs/g/i"), "org%2Fh%2Frs%2Fg%2Fi");
        let client = client("http://broker:15672").expect("client");
        let props = properties_key("org/h/rs/g/i");
        let url = client
            .url(&["bindings", "prod", "e", "ex", "q", "q1", &props])
            .expect("url");
        assert_eq!(url.path(), "/api/bindings/prod/e/ex/q/q1/org%252Fh%252Frs%252Fg%252Fi");
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let client = client("http://broker:15672/rabbit/").expect("client");
        let url = client.url(&["vhosts"]).expect("url");
        assert_eq!(url.path(), "/rabbit/api/vhosts");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            client("not a url"),
            Err(MgmtError::InvalidUrl(_))
        ));
        assert!(matches!(
            client("mailto:ops@example.com"),
            Err(MgmtError::InvalidUrl(_))
        ));
    }

    #[test]
    fn status_mapping() {
        let ok = |expect, code| check_status(expect, StatusCode::from_u16(code).expect("code"), "/p", "r".into());
        assert!(ok(Expect::Create, 201).is_ok());
        assert!(matches!(ok(Expect::Create, 204), Err(MgmtError::AlreadyExists(_))));
        assert!(matches!(ok(Expect::Create, 400), Err(MgmtError::AlreadyExists(_))));
        assert!(ok(Expect::Delete, 204).is_ok());
        assert!(ok(Expect::Update, 201).is_ok());
        assert!(ok(Expect::Update, 204).is_ok());
        assert!(matches!(ok(Expect::Delete, 404), Err(MgmtError::NotFound(_))));
        assert!(matches!(
            ok(Expect::Create, 500),
            Err(MgmtError::UnexpectedStatus { status: 500, .. })
        ));
        assert!(matches!(
            ok(Expect::Delete, 201),
            Err(MgmtError::UnexpectedStatus { status: 201, .. })
        ));
    }
}
