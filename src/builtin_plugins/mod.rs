// src/builtin_plugins/mod.rs - Plugins shipped with the router
//
// External modules register through the same registries; these are just the
// set available out of the box.

use anyhow::Result;
use std::sync::Arc;

use crate::plugin::{NamerRegistry, ProtocolRegistry};

pub mod http;
pub mod namers;
pub mod thrift;

pub use http::HttpProtocol;
pub use namers::{FsNamerPlugin, StaticNamerPlugin};
pub use thrift::ThriftProtocol;

/// Register every builtin plugin. Called once at process start, before any
/// document is compiled.
pub fn register_defaults(protocols: &ProtocolRegistry, namers: &NamerRegistry) -> Result<()> {
    protocols.register("http", Arc::new(HttpProtocol))?;
    protocols.register("thrift", Arc::new(ThriftProtocol))?;
    namers.register("fs", Arc::new(FsNamerPlugin))?;
    namers.register("static", Arc::new(StaticNamerPlugin))?;
    tracing::debug!(
        protocols = protocols.len(),
        namers = namers.len(),
        "builtin plugins registered"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_defaults() {
        let protocols = ProtocolRegistry::new();
        let namers = NamerRegistry::new();
        register_defaults(&protocols, &namers).unwrap();

        assert!(protocols.contains("http"));
        assert!(protocols.contains("thrift"));
        assert!(namers.contains("fs"));
        assert!(namers.contains("static"));

        // A second discovery pass is a startup error.
        assert!(register_defaults(&protocols, &namers).is_err());
    }
}
