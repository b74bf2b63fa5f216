// src/linker.rs - The validated, fully-resolved topology
//
// A Linker is the only object handed to downstream runtime assembly: every
// default has been applied, every cross-reference checked, and the namer
// stack composed. It is immutable once constructed.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{AdminDefaults, ClientDefaults, Params, RouterDefaults, ServerDefaults};
use crate::naming::{Dtab, NameInterpreter, Path};
use crate::plugin::ProtocolPlugin;

/// One admitted router: conflict-free bind addresses plus the protocol
/// plugin handle its runtime instance is built from.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    pub label: String,
    pub protocol: Arc<dyn ProtocolPlugin>,
    pub dst_prefix: Path,
    pub dtab: Dtab,
    pub fail_fast: bool,
    pub servers: Vec<ServerDefaults>,
    pub client: Option<ClientDefaults>,
    pub params: Params,
}

impl RouterHandle {
    pub fn from_defaults(defaults: RouterDefaults) -> Self {
        RouterHandle {
            label: defaults.label,
            protocol: defaults.protocol,
            dst_prefix: defaults.dst_prefix,
            dtab: defaults.dtab,
            fail_fast: defaults.fail_fast,
            servers: defaults.servers,
            client: defaults.client,
            params: defaults.params,
        }
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.servers.iter().map(ServerDefaults::addr).collect()
    }
}

/// One composed namer, kept for reporting; resolution goes through the
/// interpreter.
#[derive(Debug, Clone)]
pub struct NamerHandle {
    pub kind: String,
    pub prefix: Path,
}

/// The compiled configuration: resolved routers, composed name resolver,
/// admin interface.
#[derive(Debug, Clone)]
pub struct Linker {
    pub routers: Vec<RouterHandle>,
    pub namers: Vec<NamerHandle>,
    pub admin: AdminDefaults,
    pub interpreter: NameInterpreter,
}

impl Linker {
    pub fn router(&self, label: &str) -> Option<&RouterHandle> {
        self.routers.iter().find(|r| r.label == label)
    }
}
