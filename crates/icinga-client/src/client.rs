//! Icinga2 API client
//!
//! Implements the Icinga2 object API for host groups, hosts and services.
//! Objects are addressed as `/v1/objects/<type>/<name>`; create uses PUT,
//! modify uses POST, delete uses DELETE with `cascade=1`.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::IcingaError;
use crate::icinga_trait::IcingaClientTrait;
use crate::models::*;

/// Connection settings for the Icinga2 API
#[derive(Debug, Clone)]
pub struct IcingaSettings {
    /// Base URL, e.g. `https://icinga:5665`
    pub url: String,
    pub username: String,
    pub password: String,
    /// Log request and response bodies at debug level
    pub debug: bool,
}

/// Icinga2 API client
#[derive(Debug)]
pub struct IcingaClient {
    client: Client,
    settings: IcingaSettings,
}

impl IcingaClient {
    /// Create a new Icinga client.
    ///
    /// Certificate verification is disabled: Icinga2 instances commonly run
    /// with self-signed certificates.
    pub fn new(settings: IcingaSettings) -> Result<Self, IcingaError> {
        if settings.url.is_empty() {
            return Err(IcingaError::InvalidConfig(
                "Icinga URL must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(IcingaError::Http)?;

        Ok(Self {
            client,
            settings: IcingaSettings {
                url: settings.url.trim_end_matches('/').to_string(),
                ..settings
            },
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .header("Accept", "application/json")
    }

    fn object_url(&self, object_type: &str, name: &str) -> String {
        format!("{}/v1/objects/{}/{}", self.settings.url, object_type, name)
    }

    fn list_url(&self, object_type: &str) -> String {
        format!("{}/v1/objects/{}", self.settings.url, object_type)
    }

    async fn read_body(
        &self,
        response: reqwest::Response,
        context: &str,
    ) -> Result<String, IcingaError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if self.settings.debug {
            debug!(%status, context, body = %body, "icinga response");
        }

        if status == StatusCode::NOT_FOUND {
            return Err(IcingaError::NotFound(context.to_string()));
        }
        if !status.is_success() {
            return Err(IcingaError::Api(format!("{context}: {status} - {body}")));
        }

        Ok(body)
    }

    async fn get_object<T, O>(&self, object_type: &str, name: &str) -> Result<O, IcingaError>
    where
        T: DeserializeOwned,
        O: From<ObjectResult<T>>,
    {
        let url = self.object_url(object_type, name);
        let response = self.request(Method::GET, &url).send().await?;
        let body = self
            .read_body(response, &format!("get {object_type} '{name}'"))
            .await?;

        let envelope: ResultsEnvelope<T> = serde_json::from_str(&body)?;
        envelope
            .results
            .into_iter()
            .next()
            .map(O::from)
            .ok_or_else(|| IcingaError::NotFound(format!("{object_type} '{name}'")))
    }

    async fn list_objects<T, O>(&self, object_type: &str) -> Result<Vec<O>, IcingaError>
    where
        T: DeserializeOwned,
        O: From<ObjectResult<T>>,
    {
        let url = self.list_url(object_type);
        let response = self.request(Method::GET, &url).send().await?;
        let body = self
            .read_body(response, &format!("list {object_type}"))
            .await?;

        let envelope: ResultsEnvelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.results.into_iter().map(O::from).collect())
    }

    async fn write_object<T: Serialize>(
        &self,
        method: Method,
        object_type: &str,
        name: &str,
        attrs: T,
    ) -> Result<(), IcingaError> {
        let url = self.object_url(object_type, name);
        if self.settings.debug {
            debug!(%url, "icinga write");
        }
        let response = self
            .request(method, &url)
            .json(&AttrsRequest { attrs })
            .send()
            .await?;
        self.read_body(response, &format!("write {object_type} '{name}'"))
            .await?;
        Ok(())
    }

    async fn delete_object(&self, object_type: &str, name: &str) -> Result<(), IcingaError> {
        let url = format!("{}?cascade=1", self.object_url(object_type, name));
        let response = self.request(Method::DELETE, &url).send().await?;
        self.read_body(response, &format!("delete {object_type} '{name}'"))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IcingaClientTrait for IcingaClient {
    async fn list_host_groups(&self) -> Result<Vec<HostGroup>, IcingaError> {
        self.list_objects::<HostGroupAttrs, HostGroup>("hostgroups")
            .await
    }

    async fn get_host_group(&self, name: &str) -> Result<HostGroup, IcingaError> {
        self.get_object::<HostGroupAttrs, HostGroup>("hostgroups", name)
            .await
    }

    async fn create_host_group(&self, hg: &HostGroup) -> Result<(), IcingaError> {
        let attrs = HostGroupAttrs {
            vars: Some(hg.vars.clone()),
        };
        self.write_object(Method::PUT, "hostgroups", &hg.name, attrs)
            .await
    }

    async fn update_host_group(&self, hg: &HostGroup) -> Result<(), IcingaError> {
        let attrs = HostGroupAttrs {
            vars: Some(hg.vars.clone()),
        };
        self.write_object(Method::POST, "hostgroups", &hg.name, attrs)
            .await
    }

    async fn delete_host_group(&self, name: &str) -> Result<(), IcingaError> {
        self.delete_object("hostgroups", name).await
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, IcingaError> {
        self.list_objects::<HostAttrs, Host>("hosts").await
    }

    async fn get_host(&self, name: &str) -> Result<Host, IcingaError> {
        self.get_object::<HostAttrs, Host>("hosts", name).await
    }

    async fn create_host(&self, host: &Host) -> Result<(), IcingaError> {
        self.write_object(Method::PUT, "hosts", &host.name, host_attrs(host))
            .await
    }

    async fn update_host(&self, host: &Host) -> Result<(), IcingaError> {
        self.write_object(Method::POST, "hosts", &host.name, host_attrs(host))
            .await
    }

    async fn delete_host(&self, name: &str) -> Result<(), IcingaError> {
        self.delete_object("hosts", name).await
    }

    async fn list_services(&self) -> Result<Vec<Service>, IcingaError> {
        self.list_objects::<ServiceAttrs, Service>("services").await
    }

    async fn get_service(&self, full_name: &str) -> Result<Service, IcingaError> {
        self.get_object::<ServiceAttrs, Service>("services", full_name)
            .await
    }

    async fn create_service(&self, service: &Service) -> Result<(), IcingaError> {
        self.write_object(
            Method::PUT,
            "services",
            &service.full_name(),
            service_attrs(service),
        )
        .await
    }

    async fn update_service(&self, service: &Service) -> Result<(), IcingaError> {
        self.write_object(
            Method::POST,
            "services",
            &service.full_name(),
            service_attrs(service),
        )
        .await
    }

    async fn delete_service(&self, full_name: &str) -> Result<(), IcingaError> {
        self.delete_object("services", full_name).await
    }
}

fn host_attrs(host: &Host) -> HostAttrs {
    HostAttrs {
        groups: host.groups.clone(),
        check_command: non_empty(&host.check_command),
        notes: non_empty(&host.notes),
        notes_url: non_empty(&host.notes_url),
        vars: Some(host.vars.clone()),
    }
}

fn service_attrs(service: &Service) -> ServiceAttrs {
    ServiceAttrs {
        check_command: non_empty(&service.check_command),
        notes: non_empty(&service.notes),
        notes_url: non_empty(&service.notes_url),
        vars: Some(service.vars.clone()),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
