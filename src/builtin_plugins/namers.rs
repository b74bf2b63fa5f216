// src/builtin_plugins/namers.rs - Builtin naming plugins
//
// `fs` consults a directory of address files on every lookup restart, so
// edits to the directory are picked up without recompiling the
// configuration. `static` carries its address table inline in the document.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{NamerDefaults, Params};
use crate::error::ConfigError;
use crate::naming::{BoundName, Namer, Path, Resolution};
use crate::plugin::{parse_declared, NamerPlugin};
use crate::validation::Validation;

/// Filesystem-backed namer: `/<prefix>/<name>/rest` binds to the addresses
/// listed in `<rootDir>/<name>`.
#[derive(Debug, Clone, Copy)]
pub struct FsNamerPlugin;

impl NamerPlugin for FsNamerPlugin {
    fn kind(&self) -> &'static str {
        "fs"
    }

    fn keys(&self) -> &'static [&'static str] {
        &["rootDir"]
    }

    fn parse_params(&self, fields: &Map<String, Value>) -> Validation<ConfigError, Params> {
        parse_declared(self.keys(), fields).and_then(|params| {
            if params.get_str("rootDir").is_none() {
                Validation::invalid(ConfigError::MissingRequiredField {
                    name: "rootDir".to_string(),
                })
            } else {
                Validation::valid(params)
            }
        })
    }

    fn make_namer(&self, config: &NamerDefaults) -> Result<Arc<dyn Namer>> {
        let root = PathBuf::from(
            config
                .params
                .get_str("rootDir")
                .context("rootDir is required")?,
        );
        if !root.is_dir() {
            bail!("rootDir '{}' is not a directory", root.display());
        }
        Ok(Arc::new(FsNamer { root }))
    }
}

struct FsNamer {
    root: PathBuf,
}

impl Namer for FsNamer {
    fn lookup(&self, residual: &Path) -> Resolution {
        let Some(name) = residual.elems().first().cloned() else {
            return Resolution::neg();
        };
        let rest = Path::from_elems(residual.elems()[1..].to_vec());
        let file = self.root.join(&name);

        Resolution::from_fn(move || {
            let addrs: Vec<SocketAddr> = std::fs::read_to_string(&file)
                .map(|contents| {
                    contents
                        .split_whitespace()
                        .filter_map(|token| token.parse().ok())
                        .collect()
                })
                .unwrap_or_default();
            let bound = if addrs.is_empty() {
                None
            } else {
                Some(BoundName::new(
                    Path::from_elems([name.clone()]),
                    rest.clone(),
                    addrs,
                ))
            };
            bound.into_iter()
        })
    }
}

/// Namer whose address table is declared inline:
/// `addrs: { web: ["10.0.0.1:8080"] }`.
#[derive(Debug, Clone, Copy)]
pub struct StaticNamerPlugin;

impl NamerPlugin for StaticNamerPlugin {
    fn kind(&self) -> &'static str {
        "static"
    }

    fn keys(&self) -> &'static [&'static str] {
        &["addrs"]
    }

    fn parse_params(&self, fields: &Map<String, Value>) -> Validation<ConfigError, Params> {
        parse_declared(self.keys(), fields).and_then(|params| {
            match params.get("addrs") {
                Some(Value::Object(_)) => Validation::valid(params),
                Some(_) => Validation::invalid(ConfigError::ParseError {
                    message: "addrs must be an object of name -> address list".to_string(),
                    line: 0,
                    column: 0,
                }),
                None => Validation::invalid(ConfigError::MissingRequiredField {
                    name: "addrs".to_string(),
                }),
            }
        })
    }

    fn make_namer(&self, config: &NamerDefaults) -> Result<Arc<dyn Namer>> {
        let Some(Value::Object(table)) = config.params.get("addrs") else {
            bail!("addrs is required");
        };
        let mut entries: HashMap<String, Vec<SocketAddr>> = HashMap::new();
        for (name, value) in table {
            let Some(list) = value.as_array() else {
                bail!("addresses for '{}' must be an array", name);
            };
            let mut addrs = Vec::with_capacity(list.len());
            for item in list {
                let text = item
                    .as_str()
                    .with_context(|| format!("address for '{}' must be a string", name))?;
                let addr = text
                    .parse()
                    .with_context(|| format!("bad address '{}' for '{}'", text, name))?;
                addrs.push(addr);
            }
            entries.insert(name.clone(), addrs);
        }
        Ok(Arc::new(StaticNamer { entries }))
    }
}

struct StaticNamer {
    entries: HashMap<String, Vec<SocketAddr>>,
}

impl Namer for StaticNamer {
    fn lookup(&self, residual: &Path) -> Resolution {
        let Some(name) = residual.elems().first() else {
            return Resolution::neg();
        };
        match self.entries.get(name) {
            Some(addrs) => Resolution::constant(BoundName::new(
                Path::from_elems([name.clone()]),
                Path::from_elems(residual.elems()[1..].to_vec()),
                addrs.clone(),
            )),
            None => Resolution::neg(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fs_defaults(root: &std::path::Path) -> NamerDefaults {
        let mut fields = Map::new();
        fields.insert(
            "rootDir".to_string(),
            Value::from(root.to_string_lossy().to_string()),
        );
        NamerDefaults {
            kind: "fs".to_string(),
            prefix: Path::read("/fs").unwrap(),
            params: Params::new(fields),
            plugin: Arc::new(FsNamerPlugin),
        }
    }

    #[test]
    fn test_fs_namer_binds_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("web")).unwrap();
        writeln!(file, "10.0.0.1:8080 10.0.0.2:8080").unwrap();

        let namer = FsNamerPlugin.make_namer(&fs_defaults(dir.path())).unwrap();
        let bound = namer
            .lookup(&Path::read("/web/users").unwrap())
            .first()
            .unwrap();
        assert_eq!(bound.id.to_string(), "/web");
        assert_eq!(bound.residual.to_string(), "/users");
        assert_eq!(bound.addrs.len(), 2);

        // Unknown name is negative.
        assert!(namer.lookup(&Path::read("/db").unwrap()).is_neg());
        // Empty residual cannot select a file.
        assert!(namer.lookup(&Path::empty()).is_neg());
    }

    #[test]
    fn test_fs_namer_restarts_reread_the_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("web"), "10.0.0.1:8080").unwrap();

        let namer = FsNamerPlugin.make_namer(&fs_defaults(dir.path())).unwrap();
        let resolution = namer.lookup(&Path::read("/web").unwrap());
        assert_eq!(resolution.first().unwrap().addrs.len(), 1);

        std::fs::write(dir.path().join("web"), "10.0.0.1:8080\n10.0.0.2:8080").unwrap();
        assert_eq!(resolution.first().unwrap().addrs.len(), 2);
    }

    #[test]
    fn test_fs_namer_missing_root_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(FsNamerPlugin.make_namer(&fs_defaults(&missing)).is_err());
    }

    #[test]
    fn test_fs_plugin_requires_root_dir_param() {
        let errors = FsNamerPlugin.parse_params(&Map::new()).errors();
        assert_eq!(
            errors,
            vec![ConfigError::MissingRequiredField {
                name: "rootDir".to_string()
            }]
        );
    }

    fn static_defaults(addrs: Value) -> NamerDefaults {
        let mut fields = Map::new();
        fields.insert("addrs".to_string(), addrs);
        NamerDefaults {
            kind: "static".to_string(),
            prefix: Path::read("/static").unwrap(),
            params: Params::new(fields),
            plugin: Arc::new(StaticNamerPlugin),
        }
    }

    #[test]
    fn test_static_namer_lookup() {
        let namer = StaticNamerPlugin
            .make_namer(&static_defaults(serde_json::json!({
                "web": ["10.0.0.1:8080"],
            })))
            .unwrap();

        let bound = namer.lookup(&Path::read("/web/x").unwrap()).first().unwrap();
        assert_eq!(bound.id.to_string(), "/web");
        assert_eq!(bound.residual.to_string(), "/x");
        assert_eq!(bound.addrs, vec!["10.0.0.1:8080".parse().unwrap()]);

        assert!(namer.lookup(&Path::read("/db").unwrap()).is_neg());
    }

    #[test]
    fn test_static_namer_rejects_bad_address() {
        let result = StaticNamerPlugin.make_namer(&static_defaults(serde_json::json!({
            "web": ["not-an-addr"],
        })));
        assert!(result.is_err());
    }
}
