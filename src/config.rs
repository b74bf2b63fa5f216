// src/config.rs - Configuration schema and defaulting
//
// Each config type is the raw, partially-specified form read out of the
// document. Calling `with_defaults` derives an immutable Defaults view in
// which every optional field has been answered by the fallback chain:
// the object's own value, then a plugin-supplied default, then an
// ancestor-level default, then a hardcoded system default (loopback IP,
// ephemeral port, empty parameter bag).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::naming::{Dtab, Path};
use crate::plugin::{NamerPlugin, ProtocolPlugin};
use crate::validation::Validation;

/// Destination prefix applied when neither the router nor the linker sets
/// one.
pub const DEFAULT_DST_PREFIX: &str = "/svc";

/// Admin interface defaults.
pub const DEFAULT_ADMIN_PORT: u16 = 9990;

/// An opaque bag of plugin-specific parameters. The core stores and
/// forwards these; only the owning plugin's parser ever looked inside.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new(fields: Map<String, Value>) -> Self {
        Params(fields)
    }

    pub fn empty() -> Self {
        Params(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

/// TLS material served on a listen socket.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerTlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// One listen socket of a router.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
    /// Bind IP in text form; absent means loopback, `0.0.0.0` the wildcard.
    pub ip: Option<String>,
    /// Bind port; absent means ephemeral unless the protocol supplies one.
    pub port: Option<i64>,
    pub tls: Option<ServerTlsConfig>,
    pub params: Params,
}

/// A server with every field resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDefaults {
    pub ip: IpAddr,
    pub port: u16,
    pub tls: Option<ServerTlsConfig>,
    pub params: Params,
}

impl ServerDefaults {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Ephemeral servers are assigned a port at bind time and can never
    /// conflict.
    pub fn is_ephemeral(&self) -> bool {
        self.port == 0
    }
}

fn parse_ip(text: &str) -> Validation<ConfigError, IpAddr> {
    match text.parse::<IpAddr>() {
        Ok(ip) => Validation::valid(ip),
        Err(_) => Validation::invalid(ConfigError::ParseError {
            message: format!("invalid ip address '{}'", text),
            line: 0,
            column: 0,
        }),
    }
}

fn check_port(value: i64) -> Validation<ConfigError, u16> {
    if (1..=65535).contains(&value) {
        Validation::valid(value as u16)
    } else {
        Validation::invalid(ConfigError::InvalidPort { value })
    }
}

impl ServerConfig {
    pub fn with_defaults(&self, plugin: &dyn ProtocolPlugin) -> Validation<ConfigError, ServerDefaults> {
        let ip = match &self.ip {
            Some(text) => parse_ip(text),
            None => Validation::valid(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        };
        let port = match self.port {
            Some(value) => check_port(value),
            None => Validation::valid(plugin.default_server_port().unwrap_or(0)),
        };
        let tls = self.tls.clone();
        let params = self.params.clone();
        ip.zip(port).map(|(ip, port)| ServerDefaults {
            ip,
            port,
            tls,
            params,
        })
    }
}

/// Outbound TLS configuration of a router's client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientTlsConfig {
    pub disabled: bool,
    pub trust_certs: Vec<String>,
    pub common_name: Option<String>,
}

/// Outbound client configuration of a router.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    pub tls: Option<ClientTlsConfig>,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientDefaults {
    pub tls: Option<ClientTlsConfig>,
    pub params: Params,
}

impl ClientConfig {
    pub fn with_defaults(&self) -> Validation<ConfigError, ClientDefaults> {
        if let Some(tls) = &self.tls {
            // An enabled TLS section must pin the name it verifies.
            if !tls.disabled && tls.common_name.is_none() {
                return Validation::invalid(ConfigError::MissingRequiredField {
                    name: "commonName".to_string(),
                });
            }
        }
        Validation::valid(ClientDefaults {
            tls: self.tls.clone(),
            params: self.params.clone(),
        })
    }
}

/// One namer declaration: a plugin `kind` plus the path prefix it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct NamerConfig {
    pub kind: String,
    pub prefix: Option<String>,
    pub params: Params,
}

#[derive(Debug, Clone)]
pub struct NamerDefaults {
    pub kind: String,
    pub prefix: Path,
    pub params: Params,
    pub plugin: Arc<dyn NamerPlugin>,
}

impl NamerConfig {
    pub fn with_defaults(&self, plugin: &Arc<dyn NamerPlugin>) -> Validation<ConfigError, NamerDefaults> {
        let prefix = match &self.prefix {
            Some(text) => match Path::read(text) {
                Ok(path) => Validation::valid(path),
                Err(cause) => Validation::invalid(ConfigError::InvalidPath {
                    text: text.clone(),
                    cause,
                }),
            },
            None => match plugin.default_prefix() {
                Some(path) => Validation::valid(path),
                None => Validation::invalid(ConfigError::MissingPath),
            },
        };
        let kind = self.kind.clone();
        let params = self.params.clone();
        let plugin = plugin.clone();
        prefix.map(|prefix| NamerDefaults {
            kind,
            prefix,
            params,
            plugin,
        })
    }
}

/// One router declaration, generic fields only; everything the core did not
/// recognize went through the protocol plugin's parser into `params`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouterConfig {
    pub protocol: String,
    pub label: Option<String>,
    pub dst_prefix: Option<String>,
    pub dtab: Option<String>,
    pub servers: Vec<ServerConfig>,
    pub client: Option<ClientConfig>,
    pub params: Params,
}

/// A router with its fallback chain applied: label defaulted from the
/// protocol, destination prefix and fail-fast inherited from the linker,
/// the delegation table layered over the base table, and at least one
/// server present.
#[derive(Debug, Clone)]
pub struct RouterDefaults {
    pub label: String,
    pub protocol: Arc<dyn ProtocolPlugin>,
    pub dst_prefix: Path,
    pub dtab: Dtab,
    pub fail_fast: bool,
    pub servers: Vec<ServerDefaults>,
    pub client: Option<ClientDefaults>,
    pub params: Params,
}

impl RouterDefaults {
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.servers.iter().map(ServerDefaults::addr).collect()
    }
}

impl RouterConfig {
    pub fn with_defaults(
        &self,
        linker: &LinkerDefaults,
        plugin: &Arc<dyn ProtocolPlugin>,
    ) -> Validation<ConfigError, RouterDefaults> {
        let label = self
            .label
            .clone()
            .unwrap_or_else(|| plugin.name().to_string());

        let dst_prefix = match &self.dst_prefix {
            Some(text) => match Path::read(text) {
                Ok(path) => Validation::valid(path),
                Err(cause) => Validation::invalid(ConfigError::InvalidPath {
                    text: text.clone(),
                    cause,
                }),
            },
            None => Validation::valid(linker.dst_prefix.clone()),
        };

        let dtab = match &self.dtab {
            Some(text) => match Dtab::read(text) {
                Ok(table) => Validation::valid(linker.base_dtab.concat(&table)),
                Err(cause) => Validation::invalid(ConfigError::InvalidPath {
                    text: text.clone(),
                    cause,
                }),
            },
            None => Validation::valid(linker.base_dtab.clone()),
        };

        // A router must own at least one listen socket once initialized.
        let servers = if self.servers.is_empty() {
            vec![ServerConfig::default()]
        } else {
            self.servers.clone()
        };
        let servers = Validation::collect(
            servers
                .iter()
                .map(|server| server.with_defaults(plugin.as_ref())),
        );

        let client = match &self.client {
            Some(client) => client.with_defaults().map(Some),
            None => Validation::valid(None),
        };

        let protocol = plugin.clone();
        let fail_fast = linker.fail_fast;
        let params = self.params.clone();

        dst_prefix
            .zip(dtab)
            .zip(servers)
            .zip(client)
            .map(move |(((dst_prefix, dtab), servers), client)| RouterDefaults {
                label,
                protocol,
                dst_prefix,
                dtab,
                fail_fast,
                servers,
                client,
                params,
            })
    }
}

/// Admin interface declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminConfig {
    pub ip: Option<String>,
    pub port: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminDefaults {
    pub addr: SocketAddr,
}

impl Default for AdminDefaults {
    fn default() -> Self {
        AdminDefaults {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_ADMIN_PORT),
        }
    }
}

impl AdminConfig {
    pub fn with_defaults(&self) -> Validation<ConfigError, AdminDefaults> {
        let ip = match &self.ip {
            Some(text) => parse_ip(text),
            None => Validation::valid(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        };
        let port = match self.port {
            Some(value) => check_port(value),
            None => Validation::valid(DEFAULT_ADMIN_PORT),
        };
        ip.zip(port)
            .map(|(ip, port)| AdminDefaults {
                addr: SocketAddr::new(ip, port),
            })
    }
}

/// Linker-level fields that feed router defaulting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkerConfig {
    pub base_dtab: Option<String>,
    pub dst_prefix: Option<String>,
    pub fail_fast: Option<bool>,
}

/// The complete set of linker-level defaults. Routers cannot be parsed
/// before this exists, which is why the document reader defers the
/// `routers` subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkerDefaults {
    pub base_dtab: Dtab,
    pub dst_prefix: Path,
    pub fail_fast: bool,
}

impl Default for LinkerDefaults {
    fn default() -> Self {
        LinkerDefaults {
            base_dtab: Dtab::empty(),
            dst_prefix: Path::read(DEFAULT_DST_PREFIX).expect("default prefix is well-formed"),
            fail_fast: false,
        }
    }
}

impl LinkerConfig {
    pub fn with_defaults(&self) -> Validation<ConfigError, LinkerDefaults> {
        let base_dtab = match &self.base_dtab {
            Some(text) => match Dtab::read(text) {
                Ok(table) => Validation::valid(table),
                Err(cause) => Validation::invalid(ConfigError::InvalidPath {
                    text: text.clone(),
                    cause,
                }),
            },
            None => Validation::valid(Dtab::empty()),
        };
        let dst_prefix = match &self.dst_prefix {
            Some(text) => match Path::read(text) {
                Ok(path) => Validation::valid(path),
                Err(cause) => Validation::invalid(ConfigError::InvalidPath {
                    text: text.clone(),
                    cause,
                }),
            },
            None => Validation::valid(
                Path::read(DEFAULT_DST_PREFIX).expect("default prefix is well-formed"),
            ),
        };
        let fail_fast = self.fail_fast.unwrap_or(false);
        base_dtab
            .zip(dst_prefix)
            .map(move |(base_dtab, dst_prefix)| LinkerDefaults {
                base_dtab,
                dst_prefix,
                fail_fast,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_plugins::http::HttpProtocol;
    use crate::builtin_plugins::namers::FsNamerPlugin;

    fn http() -> Arc<dyn ProtocolPlugin> {
        Arc::new(HttpProtocol)
    }

    #[test]
    fn test_port_range() {
        for (port, ok) in [(1, true), (80, true), (65535, true), (0, false), (65536, false), (-1, false)] {
            let server = ServerConfig {
                port: Some(port),
                ..Default::default()
            };
            let result = server.with_defaults(&HttpProtocol);
            assert_eq!(result.is_valid(), ok, "port {}", port);
            if !ok {
                assert_eq!(result.errors(), vec![ConfigError::InvalidPort { value: port }]);
            }
        }
    }

    #[test]
    fn test_server_defaults_to_loopback_and_protocol_port() {
        let server = ServerConfig::default();
        let defaults = server.with_defaults(&HttpProtocol).into_result().unwrap();
        assert_eq!(defaults.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(Some(defaults.port), HttpProtocol.default_server_port());
    }

    #[test]
    fn test_server_bad_ip_is_rejected() {
        let server = ServerConfig {
            ip: Some("not-an-ip".to_string()),
            ..Default::default()
        };
        let errors = server.with_defaults(&HttpProtocol).errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_client_tls_requires_common_name() {
        let client = ClientConfig {
            tls: Some(ClientTlsConfig {
                disabled: false,
                trust_certs: vec!["/etc/ssl/ca.pem".to_string()],
                common_name: None,
            }),
            params: Params::empty(),
        };
        assert_eq!(
            client.with_defaults().errors(),
            vec![ConfigError::MissingRequiredField {
                name: "commonName".to_string()
            }]
        );

        let disabled = ClientConfig {
            tls: Some(ClientTlsConfig {
                disabled: true,
                ..Default::default()
            }),
            params: Params::empty(),
        };
        assert!(disabled.with_defaults().is_valid());
    }

    #[test]
    fn test_namer_prefix_fallback_chain() {
        let plugin: Arc<dyn NamerPlugin> = Arc::new(FsNamerPlugin);

        let explicit = NamerConfig {
            kind: "fs".to_string(),
            prefix: Some("/disco".to_string()),
            params: Params::empty(),
        };
        let defaults = explicit.with_defaults(&plugin).into_result().unwrap();
        assert_eq!(defaults.prefix.to_string(), "/disco");

        let derived = NamerConfig {
            kind: "fs".to_string(),
            prefix: None,
            params: Params::empty(),
        };
        let defaults = derived.with_defaults(&plugin).into_result().unwrap();
        assert_eq!(defaults.prefix.to_string(), "/fs");

        let malformed = NamerConfig {
            kind: "fs".to_string(),
            prefix: Some("no-slash".to_string()),
            params: Params::empty(),
        };
        let errors = malformed.with_defaults(&plugin).errors();
        assert!(matches!(errors[0], ConfigError::InvalidPath { .. }));
    }

    #[test]
    fn test_router_inherits_linker_defaults() {
        let linker = LinkerConfig {
            base_dtab: Some("/svc => /srv/prod".to_string()),
            dst_prefix: Some("/edge".to_string()),
            fail_fast: Some(true),
        }
        .with_defaults()
        .into_result()
        .unwrap();

        let router = RouterConfig {
            protocol: "http".to_string(),
            ..Default::default()
        };
        let defaults = router.with_defaults(&linker, &http()).into_result().unwrap();
        assert_eq!(defaults.label, "http");
        assert_eq!(defaults.dst_prefix.to_string(), "/edge");
        assert!(defaults.fail_fast);
        assert_eq!(defaults.dtab.len(), 1);
        // No servers declared: one default server materializes.
        assert_eq!(defaults.servers.len(), 1);
    }

    #[test]
    fn test_router_dtab_layers_over_base() {
        let linker = LinkerConfig {
            base_dtab: Some("/svc => /srv/base".to_string()),
            ..Default::default()
        }
        .with_defaults()
        .into_result()
        .unwrap();

        let router = RouterConfig {
            protocol: "http".to_string(),
            dtab: Some("/svc => /srv/router".to_string()),
            ..Default::default()
        };
        let defaults = router.with_defaults(&linker, &http()).into_result().unwrap();
        assert_eq!(defaults.dtab.len(), 2);
        let rewritten = defaults
            .dtab
            .rewrite(&Path::read("/svc/x").unwrap())
            .unwrap();
        assert_eq!(rewritten.to_string(), "/srv/router/x");
    }

    #[test]
    fn test_router_accumulates_server_errors() {
        let router = RouterConfig {
            protocol: "http".to_string(),
            servers: vec![
                ServerConfig {
                    port: Some(0),
                    ..Default::default()
                },
                ServerConfig {
                    port: Some(90000),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let errors = router
            .with_defaults(&LinkerDefaults::default(), &http())
            .errors();
        assert_eq!(
            errors,
            vec![
                ConfigError::InvalidPort { value: 0 },
                ConfigError::InvalidPort { value: 90000 },
            ]
        );
    }

    #[test]
    fn test_admin_defaults() {
        let admin = AdminConfig::default().with_defaults().into_result().unwrap();
        assert_eq!(admin.addr, "127.0.0.1:9990".parse().unwrap());

        let admin = AdminConfig {
            ip: Some("0.0.0.0".to_string()),
            port: Some(9000),
        };
        let defaults = admin.with_defaults().into_result().unwrap();
        assert_eq!(defaults.addr, "0.0.0.0:9000".parse().unwrap());

        let bad = AdminConfig {
            ip: None,
            port: Some(-4),
        };
        assert_eq!(
            bad.with_defaults().errors(),
            vec![ConfigError::InvalidPort { value: -4 }]
        );
    }

    #[test]
    fn test_linker_bad_base_dtab() {
        let linker = LinkerConfig {
            base_dtab: Some("/svc /srv".to_string()),
            ..Default::default()
        };
        let errors = linker.with_defaults().errors();
        assert!(matches!(errors[0], ConfigError::InvalidPath { .. }));
    }
}
