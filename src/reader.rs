// src/reader.rs - Document reader and linker assembler
//
// Compilation makes two passes over one parsed document tree. Pass 1 scans
// the top-level object: namers, admin and linker-level defaults are
// processed immediately, while the `routers` subtree is buffered. Pass 2
// replays the buffered routers, because a router's own defaulting depends
// on the complete set of linker-level defaults and namers. Routers are
// admitted one at a time in document order; each admission is checked
// against every router already accepted, so the later declaration is the
// one blamed for a conflict.

use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{
    AdminConfig, AdminDefaults, ClientConfig, ClientTlsConfig, LinkerConfig, LinkerDefaults,
    NamerConfig, NamerDefaults, RouterConfig, RouterDefaults, ServerConfig, ServerTlsConfig,
};
use crate::error::ConfigError;
use crate::linker::{Linker, NamerHandle, RouterHandle};
use crate::naming::{NameInterpreter, Namer, Path};
use crate::plugin::{NamerRegistry, ProtocolPlugin, ProtocolRegistry};
use crate::sockets;
use crate::validation::Validation;

const TOP_LEVEL_KEYS: &[&str] = &["admin", "baseDtab", "dstPrefix", "failFast", "namers", "routers"];
const ROUTER_KEYS: &[&str] = &["protocol", "label", "dstPrefix", "dtab", "servers", "client"];
const SERVER_KEYS: &[&str] = &["ip", "port", "tls"];
const CLIENT_KEYS: &[&str] = &["tls"];
const NAMER_KEYS: &[&str] = &["kind", "prefix"];
const ADMIN_KEYS: &[&str] = &["ip", "port"];
const SERVER_TLS_KEYS: &[&str] = &["certPath", "keyPath"];
const CLIENT_TLS_KEYS: &[&str] = &["disabled", "trustCerts", "commonName"];

/// Compile a configuration document into a validated topology.
///
/// The result is all-or-nothing: either every router was admitted and the
/// namer stack composed, or the full ordered list of everything wrong with
/// the document.
pub fn compile(
    text: &str,
    protocols: &ProtocolRegistry,
    namer_registry: &NamerRegistry,
) -> Result<Linker, Vec<ConfigError>> {
    let tree = parse_tree(text).map_err(|e| vec![e])?;
    let top = match tree.as_object() {
        Some(obj) => obj,
        None => return Err(vec![syntax("document root must be an object")]),
    };

    // Unrecognized top-level keys are fatal for the whole document.
    let unknown: Vec<ConfigError> = top
        .keys()
        .filter(|key| !TOP_LEVEL_KEYS.contains(&key.as_str()))
        .map(|key| ConfigError::UnknownParameter { name: key.clone() })
        .collect();
    if !unknown.is_empty() {
        return Err(unknown);
    }

    let mut errors: Vec<ConfigError> = Vec::new();

    // Pass 1: linker-level defaults, namers and admin. `routers` stays
    // buffered in the tree until these are complete.
    let linker_defaults = match parse_linker_defaults(top) {
        Validation::Valid(defaults) => defaults,
        Validation::Invalid(es) => {
            errors.extend(es);
            LinkerDefaults::default()
        }
    };

    let composed = parse_namers(top.get("namers"), namer_registry, &mut errors);

    let admin = match parse_admin(top.get("admin")) {
        Validation::Valid(admin) => admin,
        Validation::Invalid(es) => {
            errors.extend(es);
            AdminDefaults::default()
        }
    };

    // Pass 2: replay the routers subtree against the full default set.
    let mut admitted: Vec<RouterHandle> = Vec::new();
    let mut admitted_addrs: Vec<SocketAddr> = Vec::new();

    match top.get("routers") {
        Some(Value::Array(items)) => {
            for item in items {
                match parse_router(item, protocols, &linker_defaults) {
                    Validation::Valid(defaults) => {
                        match admit(&defaults, &admitted, &admitted_addrs) {
                            Ok(()) => {
                                debug!(label = %defaults.label, "router admitted");
                                admitted_addrs.extend(defaults.addrs());
                                admitted.push(RouterHandle::from_defaults(defaults));
                            }
                            Err(es) => errors.extend(es),
                        }
                    }
                    Validation::Invalid(es) => errors.extend(es),
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => errors.push(syntax("'routers' must be an array")),
    }

    if admitted.is_empty() {
        errors.push(ConfigError::NoRoutersSpecified);
    }

    if !errors.is_empty() {
        warn!(errors = errors.len(), "configuration rejected");
        return Err(errors);
    }

    let stack: Vec<(Path, Arc<dyn Namer>)> = composed
        .iter()
        .map(|(defaults, namer)| (defaults.prefix.clone(), namer.clone()))
        .collect();
    let namers = composed
        .into_iter()
        .map(|(defaults, _)| NamerHandle {
            kind: defaults.kind,
            prefix: defaults.prefix,
        })
        .collect();

    let linker = Linker {
        routers: admitted,
        namers,
        admin,
        interpreter: NameInterpreter::new(&stack),
    };
    info!(
        routers = linker.routers.len(),
        namers = linker.namers.len(),
        "configuration compiled"
    );
    Ok(linker)
}

/// Cross-object admission checks for one parsed router: label uniqueness
/// and socket conflicts against the accepted topology.
fn admit(
    defaults: &RouterDefaults,
    admitted: &[RouterHandle],
    admitted_addrs: &[SocketAddr],
) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    if admitted.iter().any(|r| r.label == defaults.label) {
        errors.push(ConfigError::DuplicateRouterLabel {
            label: defaults.label.clone(),
        });
    }
    errors.extend(sockets::check_conflicts(&defaults.addrs(), admitted_addrs).errors());
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse the document text into an untyped tree, auto-detecting JSON by the
/// first non-whitespace character.
fn parse_tree(text: &str) -> crate::error::Result<Value> {
    let looks_like_json = text.chars().find(|c| !c.is_whitespace()) == Some('{');
    if looks_like_json {
        serde_json::from_str(text).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        })
    } else {
        serde_yaml::from_str(text).map_err(|e| {
            let location = e.location();
            ConfigError::ParseError {
                message: e.to_string(),
                line: location.as_ref().map(|l| l.line()).unwrap_or(0),
                column: location.as_ref().map(|l| l.column()).unwrap_or(0),
            }
        })
    }
}

fn syntax(message: impl Into<String>) -> ConfigError {
    ConfigError::ParseError {
        message: message.into(),
        line: 0,
        column: 0,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn as_object<'v>(value: &'v Value, what: &str) -> Validation<ConfigError, &'v Map<String, Value>> {
    match value.as_object() {
        Some(obj) => Validation::valid(obj),
        None => Validation::invalid(syntax(format!(
            "{} must be an object, got {}",
            what,
            kind_name(value)
        ))),
    }
}

fn opt_str(obj: &Map<String, Value>, key: &str) -> Validation<ConfigError, Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Validation::valid(None),
        Some(Value::String(s)) => Validation::valid(Some(s.clone())),
        Some(other) => Validation::invalid(syntax(format!(
            "'{}' must be a string, got {}",
            key,
            kind_name(other)
        ))),
    }
}

fn opt_int(obj: &Map<String, Value>, key: &str) -> Validation<ConfigError, Option<i64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Validation::valid(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(value) => Validation::valid(Some(value)),
            None => Validation::invalid(syntax(format!("'{}' must be an integer", key))),
        },
        Some(other) => Validation::invalid(syntax(format!(
            "'{}' must be an integer, got {}",
            key,
            kind_name(other)
        ))),
    }
}

fn opt_bool(obj: &Map<String, Value>, key: &str) -> Validation<ConfigError, Option<bool>> {
    match obj.get(key) {
        None | Some(Value::Null) => Validation::valid(None),
        Some(Value::Bool(b)) => Validation::valid(Some(*b)),
        Some(other) => Validation::invalid(syntax(format!(
            "'{}' must be a boolean, got {}",
            key,
            kind_name(other)
        ))),
    }
}

/// Keys of `obj` not claimed by the core: these belong to the plugin.
fn extra_fields(obj: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Every undeclared key of a closed object, as `UnknownParameter` errors.
fn unknown_keys(obj: &Map<String, Value>, known: &[&str]) -> Vec<ConfigError> {
    obj.keys()
        .filter(|key| !known.contains(&key.as_str()))
        .map(|key| ConfigError::UnknownParameter { name: key.clone() })
        .collect()
}

fn parse_linker_defaults(top: &Map<String, Value>) -> Validation<ConfigError, LinkerDefaults> {
    opt_str(top, "baseDtab")
        .zip(opt_str(top, "dstPrefix"))
        .zip(opt_bool(top, "failFast"))
        .and_then(|((base_dtab, dst_prefix), fail_fast)| {
            LinkerConfig {
                base_dtab,
                dst_prefix,
                fail_fast,
            }
            .with_defaults()
        })
}

fn parse_admin(value: Option<&Value>) -> Validation<ConfigError, AdminDefaults> {
    let Some(value) = value else {
        return AdminConfig::default().with_defaults();
    };
    as_object(value, "'admin'").and_then(|obj| {
        let unknown = unknown_keys(obj, ADMIN_KEYS);
        if !unknown.is_empty() {
            return Validation::invalid_all(unknown);
        }
        opt_str(obj, "ip")
            .zip(opt_int(obj, "port"))
            .and_then(|(ip, port)| AdminConfig { ip, port }.with_defaults())
    })
}

/// Parse and instantiate the namer list in declaration order. Failed namers
/// are reported and skipped; their siblings still parse.
fn parse_namers(
    value: Option<&Value>,
    registry: &NamerRegistry,
    errors: &mut Vec<ConfigError>,
) -> Vec<(NamerDefaults, Arc<dyn Namer>)> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            errors.push(syntax(format!(
                "'namers' must be an array, got {}",
                kind_name(other)
            )));
            return Vec::new();
        }
    };

    let mut composed = Vec::new();
    for item in items {
        match parse_namer(item, registry) {
            Validation::Valid(entry) => composed.push(entry),
            Validation::Invalid(es) => errors.extend(es),
        }
    }
    composed
}

fn parse_namer(
    value: &Value,
    registry: &NamerRegistry,
) -> Validation<ConfigError, (NamerDefaults, Arc<dyn Namer>)> {
    as_object(value, "namer").and_then(|obj| {
        // The kind is a structural prerequisite: without a plugin there is
        // no parser for the remaining keys.
        let kind = match obj.get("kind") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => {
                return Validation::invalid(syntax(format!(
                    "'kind' must be a string, got {}",
                    kind_name(other)
                )))
            }
            None => {
                return Validation::invalid(ConfigError::MissingRequiredField {
                    name: "kind".to_string(),
                })
            }
        };
        let Some(plugin) = registry.get(&kind) else {
            return Validation::invalid(ConfigError::PluginNotFound { kind });
        };

        let params = plugin.parse_params(&extra_fields(obj, NAMER_KEYS));
        opt_str(obj, "prefix")
            .zip(params)
            .and_then(|(prefix, params)| {
                NamerConfig {
                    kind: kind.clone(),
                    prefix,
                    params,
                }
                .with_defaults(&plugin)
            })
            .and_then(|defaults| match defaults.plugin.make_namer(&defaults) {
                Ok(namer) => Validation::valid((defaults, namer)),
                Err(cause) => Validation::invalid(ConfigError::InvalidPath {
                    text: defaults.prefix.to_string(),
                    cause: format!("{:#}", cause),
                }),
            })
    })
}

fn parse_router(
    value: &Value,
    protocols: &ProtocolRegistry,
    linker: &LinkerDefaults,
) -> Validation<ConfigError, RouterDefaults> {
    as_object(value, "router").and_then(|obj| {
        // Protocol resolution short-circuits this router (there is no
        // parser for its keys without a plugin), but not its siblings.
        let protocol = match obj.get("protocol") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Validation::invalid(syntax(format!(
                    "'protocol' must be a string, got {}",
                    kind_name(other)
                )))
            }
            None => {
                return Validation::invalid(ConfigError::MissingRequiredField {
                    name: "protocol".to_string(),
                })
            }
        };
        let Some(plugin) = protocols.get(&protocol) else {
            return Validation::invalid(ConfigError::PluginNotFound { kind: protocol });
        };

        let servers = match obj.get("servers") {
            None | Some(Value::Null) => Validation::valid(Vec::new()),
            Some(Value::Array(items)) => Validation::collect(
                items
                    .iter()
                    .map(|item| parse_server(item, plugin.as_ref())),
            ),
            Some(other) => Validation::invalid(syntax(format!(
                "'servers' must be an array, got {}",
                kind_name(other)
            ))),
        };

        let client = match obj.get("client") {
            None | Some(Value::Null) => Validation::valid(None),
            Some(value) => parse_client(value, plugin.as_ref()).map(Some),
        };

        let params = plugin.parse_router_params(&extra_fields(obj, ROUTER_KEYS));

        opt_str(obj, "label")
            .zip(opt_str(obj, "dstPrefix"))
            .zip(opt_str(obj, "dtab"))
            .zip(servers)
            .zip(client)
            .zip(params)
            .and_then(
                move |(((((label, dst_prefix), dtab), servers), client), params)| {
                    RouterConfig {
                        protocol,
                        label,
                        dst_prefix,
                        dtab,
                        servers,
                        client,
                        params,
                    }
                    .with_defaults(linker, &plugin)
                },
            )
    })
}

fn parse_server(value: &Value, plugin: &dyn ProtocolPlugin) -> Validation<ConfigError, ServerConfig> {
    as_object(value, "server").and_then(|obj| {
        let tls = match obj.get("tls") {
            None | Some(Value::Null) => Validation::valid(None),
            Some(value) => parse_server_tls(value).map(Some),
        };
        let params = plugin.parse_server_params(&extra_fields(obj, SERVER_KEYS));
        opt_str(obj, "ip")
            .zip(opt_int(obj, "port"))
            .zip(tls)
            .zip(params)
            .map(|(((ip, port), tls), params)| ServerConfig {
                ip,
                port,
                tls,
                params,
            })
    })
}

fn parse_server_tls(value: &Value) -> Validation<ConfigError, ServerTlsConfig> {
    as_object(value, "server 'tls'").and_then(|obj| {
        let unknown = unknown_keys(obj, SERVER_TLS_KEYS);
        if !unknown.is_empty() {
            return Validation::invalid_all(unknown);
        }
        let required = |key: &str| match obj.get(key) {
            Some(Value::String(s)) => Validation::valid(s.clone()),
            Some(other) => Validation::invalid(syntax(format!(
                "'{}' must be a string, got {}",
                key,
                kind_name(other)
            ))),
            None => Validation::invalid(ConfigError::MissingRequiredField {
                name: key.to_string(),
            }),
        };
        required("certPath")
            .zip(required("keyPath"))
            .map(|(cert_path, key_path)| ServerTlsConfig {
                cert_path,
                key_path,
            })
    })
}

fn parse_client(value: &Value, plugin: &dyn ProtocolPlugin) -> Validation<ConfigError, ClientConfig> {
    as_object(value, "client").and_then(|obj| {
        let tls = match obj.get("tls") {
            None | Some(Value::Null) => Validation::valid(None),
            Some(value) => parse_client_tls(value).map(Some),
        };
        let params = plugin.parse_client_params(&extra_fields(obj, CLIENT_KEYS));
        tls.zip(params)
            .map(|(tls, params)| ClientConfig { tls, params })
    })
}

fn parse_client_tls(value: &Value) -> Validation<ConfigError, ClientTlsConfig> {
    as_object(value, "client 'tls'").and_then(|obj| {
        let unknown = unknown_keys(obj, CLIENT_TLS_KEYS);
        if !unknown.is_empty() {
            return Validation::invalid_all(unknown);
        }
        let trust_certs = match obj.get("trustCerts") {
            None | Some(Value::Null) => Validation::valid(Vec::new()),
            Some(Value::Array(items)) => Validation::collect(items.iter().map(|item| {
                match item.as_str() {
                    Some(path) => Validation::valid(path.to_string()),
                    None => Validation::invalid(syntax("'trustCerts' entries must be strings")),
                }
            })),
            Some(other) => Validation::invalid(syntax(format!(
                "'trustCerts' must be an array, got {}",
                kind_name(other)
            ))),
        };
        opt_bool(obj, "disabled")
            .zip(trust_certs)
            .zip(opt_str(obj, "commonName"))
            .map(|((disabled, trust_certs), common_name)| ClientTlsConfig {
                disabled: disabled.unwrap_or(false),
                trust_certs,
                common_name,
            })
    })
}
