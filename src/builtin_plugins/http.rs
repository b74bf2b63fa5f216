// src/builtin_plugins/http.rs - HTTP protocol plugin
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use tracing::info;

use crate::config::{Params, RouterDefaults};
use crate::error::ConfigError;
use crate::plugin::{parse_declared, ProtocolPlugin, RouterService};
use crate::validation::Validation;

pub const DEFAULT_HTTP_PORT: u16 = 4140;

/// The `http` protocol.
#[derive(Debug, Clone, Copy)]
pub struct HttpProtocol;

#[async_trait]
impl ProtocolPlugin for HttpProtocol {
    fn name(&self) -> &'static str {
        "http"
    }

    fn default_server_port(&self) -> Option<u16> {
        Some(DEFAULT_HTTP_PORT)
    }

    fn router_keys(&self) -> &'static [&'static str] {
        &["httpAccessLog", "maxHeadersKB"]
    }

    fn server_keys(&self) -> &'static [&'static str] {
        &["maxConcurrentRequests"]
    }

    fn client_keys(&self) -> &'static [&'static str] {
        &["hostHeader"]
    }

    fn parse_router_params(&self, fields: &Map<String, Value>) -> Validation<ConfigError, Params> {
        parse_declared(self.router_keys(), fields).and_then(|params| {
            if let Some(value) = params.get("maxHeadersKB") {
                if value.as_u64().is_none() {
                    return Validation::invalid(ConfigError::ParseError {
                        message: format!("maxHeadersKB must be a positive integer, got {}", value),
                        line: 0,
                        column: 0,
                    });
                }
            }
            Validation::valid(params)
        })
    }

    async fn build(&self, router: &RouterDefaults) -> anyhow::Result<Box<dyn RouterService>> {
        let service = HttpRouter {
            label: router.label.clone(),
            addrs: router.addrs(),
            access_log: router.params.get_str("httpAccessLog").map(str::to_string),
        };
        info!(label = %service.label, servers = service.addrs.len(), "http router initialized");
        Ok(Box::new(service))
    }
}

/// A serviceable HTTP router instance.
#[derive(Debug)]
pub struct HttpRouter {
    label: String,
    addrs: Vec<SocketAddr>,
    #[allow(dead_code)]
    access_log: Option<String>,
}

impl RouterService for HttpRouter {
    fn label(&self) -> &str {
        &self.label
    }

    fn addrs(&self) -> Vec<SocketAddr> {
        self.addrs.clone()
    }
}
