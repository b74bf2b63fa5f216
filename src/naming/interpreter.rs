//! Composition of configured namers into one path-delegation resolver.
//!
//! Namers are folded in declaration order over a bottom resolver that fails
//! every lookup. Each fold step wraps the accumulator, so the last-declared
//! namer sits at the outermost layer and is consulted first: when two
//! namers' prefixes both cover a path, the later declaration governs.

use std::sync::Arc;

use super::{BoundName, Dtab, Path, Resolution};

/// Maximum delegation-table rewrites applied to a single lookup. A table
/// whose rules rewrite forever yields a negative resolution instead of
/// looping.
const MAX_REWRITES: usize = 8;

/// A namer resolves residual paths (its prefix already stripped) into bound
/// names, by consulting some identity source.
pub trait Namer: Send + Sync {
    fn lookup(&self, residual: &Path) -> Resolution;
}

trait Resolve: Send + Sync {
    fn resolve(&self, path: &Path) -> Resolution;
}

/// The bottom layer: negative for every path.
struct NullResolver;

impl Resolve for NullResolver {
    fn resolve(&self, _path: &Path) -> Resolution {
        Resolution::neg()
    }
}

/// One namer layered over the previously accumulated resolver. Paths under
/// `prefix` are intercepted entirely; everything else falls through.
struct PrefixLayer {
    prefix: Path,
    namer: Arc<dyn Namer>,
    fallback: Arc<dyn Resolve>,
}

impl Resolve for PrefixLayer {
    fn resolve(&self, path: &Path) -> Resolution {
        match path.strip_prefix(&self.prefix) {
            Some(residual) => {
                let prefix = self.prefix.clone();
                self.namer.lookup(&residual).map(move |bound| BoundName {
                    id: prefix.concat(&bound.id),
                    ..bound
                })
            }
            None => self.fallback.resolve(path),
        }
    }
}

/// The composed resolver handed to the runtime layer: applies a delegation
/// table, then dispatches to the configured namer stack.
#[derive(Clone)]
pub struct NameInterpreter {
    root: Arc<dyn Resolve>,
}

impl NameInterpreter {
    /// Compose an interpreter from namers in declaration order.
    pub fn new(namers: &[(Path, Arc<dyn Namer>)]) -> Self {
        let mut root: Arc<dyn Resolve> = Arc::new(NullResolver);
        for (prefix, namer) in namers {
            root = Arc::new(PrefixLayer {
                prefix: prefix.clone(),
                namer: namer.clone(),
                fallback: root,
            });
        }
        NameInterpreter { root }
    }

    /// Resolve a symbolic path under a delegation table.
    pub fn resolve(&self, dtab: &Dtab, path: &Path) -> Resolution {
        let mut current = path.clone();
        for _ in 0..MAX_REWRITES {
            match dtab.rewrite(&current) {
                Some(next) => current = next,
                None => return self.root.resolve(&current),
            }
        }
        // Still rewritable after the cap: delegation loop.
        Resolution::neg()
    }
}

impl std::fmt::Debug for NameInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NameInterpreter")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Binds every residual path, leaving the identity to the prefix layer.
    struct ConstNamer;

    impl Namer for ConstNamer {
        fn lookup(&self, residual: &Path) -> Resolution {
            Resolution::constant(BoundName::new(Path::empty(), residual.clone(), vec![]))
        }
    }

    fn namer_at(prefix: &str) -> (Path, Arc<dyn Namer>) {
        (Path::read(prefix).unwrap(), Arc::new(ConstNamer))
    }

    #[test]
    fn test_empty_interpreter_is_negative() {
        let interpreter = NameInterpreter::new(&[]);
        let result = interpreter.resolve(&Dtab::empty(), &Path::read("/svc/users").unwrap());
        assert!(result.is_neg());
    }

    #[test]
    fn test_last_declared_namer_wins() {
        // Declared [B /boo/urns, A /boo]: A is outermost and intercepts.
        let interpreter = NameInterpreter::new(&[namer_at("/boo/urns"), namer_at("/boo")]);
        let bound = interpreter
            .resolve(&Dtab::empty(), &Path::read("/boo/urns").unwrap())
            .first()
            .unwrap();
        assert_eq!(bound.id.to_string(), "/boo");
        assert_eq!(bound.residual.to_string(), "/urns");

        // Reversed declaration order: B is outermost now.
        let interpreter = NameInterpreter::new(&[namer_at("/boo"), namer_at("/boo/urns")]);
        let bound = interpreter
            .resolve(&Dtab::empty(), &Path::read("/boo/urns").unwrap())
            .first()
            .unwrap();
        assert_eq!(bound.id.to_string(), "/boo/urns");
        assert_eq!(bound.residual.to_string(), "/");
    }

    #[test]
    fn test_unmatched_prefix_falls_through() {
        let interpreter = NameInterpreter::new(&[namer_at("/a"), namer_at("/b")]);
        let result = interpreter.resolve(&Dtab::empty(), &Path::read("/a/x").unwrap());
        assert_eq!(result.first().unwrap().id.to_string(), "/a");

        let result = interpreter.resolve(&Dtab::empty(), &Path::read("/c/x").unwrap());
        assert!(result.is_neg());
    }

    #[test]
    fn test_dtab_rewrite_before_dispatch() {
        let interpreter = NameInterpreter::new(&[namer_at("/srv")]);
        let dtab = Dtab::read("/svc => /srv/prod").unwrap();
        let bound = interpreter
            .resolve(&dtab, &Path::read("/svc/users").unwrap())
            .first()
            .unwrap();
        assert_eq!(bound.id.to_string(), "/srv");
        assert_eq!(bound.residual.to_string(), "/prod/users");
    }

    #[test]
    fn test_delegation_loop_is_negative() {
        let interpreter = NameInterpreter::new(&[namer_at("/svc")]);
        let dtab = Dtab::read("/svc => /svc").unwrap();
        let result = interpreter.resolve(&dtab, &Path::read("/svc/users").unwrap());
        assert!(result.is_neg());
    }
}
