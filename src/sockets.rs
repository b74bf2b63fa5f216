// src/sockets.rs - Listen-socket conflict detection
//
// Routers are admitted into the topology one at a time in document order,
// and each new router's servers are checked against every server already
// accepted. All conflicts are collected, not just the first.

use std::net::SocketAddr;

use crate::error::ConfigError;
use crate::validation::Validation;

/// Whether two bind addresses would contend for the same socket.
///
/// Both ports must be concrete (non-zero) and equal, and either address is
/// the wildcard or the two addresses are identical. Ephemeral-port servers
/// never conflict with anything. The predicate is symmetric.
pub fn conflicts(a: SocketAddr, b: SocketAddr) -> bool {
    a.port() != 0
        && b.port() != 0
        && a.port() == b.port()
        && (a.ip().is_unspecified() || b.ip().is_unspecified() || a.ip() == b.ip())
}

/// Check a new router's bind addresses against each other and against every
/// previously admitted server. Pairs within the new router are reported as
/// `ConflictingServers`; collisions with the existing topology as
/// `ConflictingPorts`, blaming the newcomer.
pub fn check_conflicts(
    new: &[SocketAddr],
    admitted: &[SocketAddr],
) -> Validation<ConfigError, ()> {
    let mut errors = Vec::new();

    for (i, a) in new.iter().enumerate() {
        for b in &new[i + 1..] {
            if conflicts(*a, *b) {
                errors.push(ConfigError::ConflictingServers {
                    addr_a: *a,
                    addr_b: *b,
                });
            }
        }
    }

    for a in new {
        for b in admitted {
            if conflicts(*a, *b) {
                errors.push(ConfigError::ConflictingPorts {
                    addr_a: *a,
                    addr_b: *b,
                });
            }
        }
    }

    if errors.is_empty() {
        Validation::valid(())
    } else {
        Validation::invalid_all(errors)
    }
}
