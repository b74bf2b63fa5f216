//! Symbolic names, delegation tables and resolution results.
//!
//! A [`Path`] is a slash-separated symbolic destination name (`/svc/users`).
//! A [`Dtab`] is an ordered list of rewrite rules that turn logical paths
//! into concrete ones before namer dispatch. Resolving a path yields a
//! [`Resolution`]: a lazily produced, restartable stream of [`BoundName`]
//! bindings.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

pub mod interpreter;

pub use interpreter::{NameInterpreter, Namer};

/// A slash-separated symbolic path. The empty path renders as `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    elems: Vec<String>,
}

fn valid_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '#' | '$' | '*' | ':')
}

impl Path {
    pub fn empty() -> Self {
        Path { elems: Vec::new() }
    }

    pub fn from_elems<I, S>(elems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path {
            elems: elems.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a path from its text form. The text must start with `/`, and
    /// segments must be non-empty runs of path characters.
    pub fn read(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty path".to_string());
        }
        if !text.starts_with('/') {
            return Err("path must start with '/'".to_string());
        }
        if text == "/" {
            return Ok(Path::empty());
        }
        let mut elems = Vec::new();
        for segment in text[1..].split('/') {
            if segment.is_empty() {
                return Err("empty path segment".to_string());
            }
            if let Some(c) = segment.chars().find(|c| !valid_path_char(*c)) {
                return Err(format!("invalid character '{}' in segment '{}'", c, segment));
            }
            elems.push(segment.to_string());
        }
        Ok(Path { elems })
    }

    pub fn elems(&self) -> &[String] {
        &self.elems
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Whether `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.elems.len() >= prefix.elems.len()
            && self.elems[..prefix.elems.len()] == prefix.elems[..]
    }

    /// The residual path after `prefix`, if `prefix` matches.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        if self.starts_with(prefix) {
            Some(Path {
                elems: self.elems[prefix.elems.len()..].to_vec(),
            })
        } else {
            None
        }
    }

    pub fn concat(&self, other: &Path) -> Path {
        let mut elems = self.elems.clone();
        elems.extend(other.elems.iter().cloned());
        Path { elems }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elems.is_empty() {
            return write!(f, "/");
        }
        for elem in &self.elems {
            write!(f, "/{}", elem)?;
        }
        Ok(())
    }
}

/// One delegation rule: paths under `prefix` are rewritten to `dst`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dentry {
    pub prefix: Path,
    pub dst: Path,
}

/// An ordered delegation table. Later entries take precedence over earlier
/// ones when more than one prefix matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dtab {
    entries: Vec<Dentry>,
}

impl Dtab {
    pub fn empty() -> Self {
        Dtab { entries: Vec::new() }
    }

    pub fn new(entries: Vec<Dentry>) -> Self {
        Dtab { entries }
    }

    /// Parse a delegation table from text: `;`-separated `prefix => dst`
    /// entries, with `#` comments running to end of line.
    pub fn read(text: &str) -> Result<Self, String> {
        let stripped: String = text
            .lines()
            .map(|line| match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut entries = Vec::new();
        for entry in stripped.split(';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (prefix, dst) = entry
                .split_once("=>")
                .ok_or_else(|| format!("missing '=>' in dtab entry '{}'", entry))?;
            let prefix = Path::read(prefix).map_err(|e| format!("bad prefix in '{}': {}", entry, e))?;
            let dst = Path::read(dst).map_err(|e| format!("bad destination in '{}': {}", entry, e))?;
            entries.push(Dentry { prefix, dst });
        }
        Ok(Dtab { entries })
    }

    pub fn entries(&self) -> &[Dentry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `other`'s entries after this table's. The appended entries win
    /// on overlap, so a router-level table layered over a base table
    /// overrides it.
    pub fn concat(&self, other: &Dtab) -> Dtab {
        let mut entries = self.entries.clone();
        entries.extend(other.entries.iter().cloned());
        Dtab { entries }
    }

    /// Apply the single highest-precedence matching rewrite, if any.
    pub fn rewrite(&self, path: &Path) -> Option<Path> {
        for dentry in self.entries.iter().rev() {
            if let Some(residual) = path.strip_prefix(&dentry.prefix) {
                return Some(dentry.dst.concat(&residual));
            }
        }
        None
    }
}

impl fmt::Display for Dtab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .entries
            .iter()
            .map(|d| format!("{} => {}", d.prefix, d.dst))
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// The terminal result of resolving one name: an opaque service identity
/// (`id`), the residual path left over after the identity was bound, and the
/// concrete addresses the identity currently maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundName {
    pub id: Path,
    pub residual: Path,
    pub addrs: Vec<SocketAddr>,
}

impl BoundName {
    pub fn new(id: Path, residual: Path, addrs: Vec<SocketAddr>) -> Self {
        BoundName { id, residual, addrs }
    }
}

type BindingIter = Box<dyn Iterator<Item = BoundName> + Send>;

/// A lazily produced, restartable stream of bindings. Each call to
/// [`Resolution::bindings`] restarts the stream from scratch, so a namer
/// backed by a live identity source re-consults it on every restart. A
/// resolution with no bindings is negative.
#[derive(Clone)]
pub struct Resolution {
    make: Arc<dyn Fn() -> BindingIter + Send + Sync>,
}

impl Resolution {
    /// A resolution that fails every lookup.
    pub fn neg() -> Self {
        Resolution {
            make: Arc::new(|| Box::new(std::iter::empty())),
        }
    }

    /// A resolution producing a single fixed binding.
    pub fn constant(bound: BoundName) -> Self {
        Resolution {
            make: Arc::new(move || Box::new(std::iter::once(bound.clone()))),
        }
    }

    /// A resolution that re-runs `f` on every restart.
    pub fn from_fn<F, I>(f: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = BoundName> + Send + 'static,
    {
        Resolution {
            make: Arc::new(move || Box::new(f())),
        }
    }

    /// Start (or restart) the binding stream.
    pub fn bindings(&self) -> BindingIter {
        (self.make)()
    }

    /// The first binding of a fresh stream, if any.
    pub fn first(&self) -> Option<BoundName> {
        self.bindings().next()
    }

    pub fn is_neg(&self) -> bool {
        self.first().is_none()
    }

    /// Transform every binding produced by the stream.
    pub fn map<F>(&self, f: F) -> Resolution
    where
        F: Fn(BoundName) -> BoundName + Send + Sync + 'static,
    {
        let make = self.make.clone();
        let f = Arc::new(f);
        Resolution {
            make: Arc::new(move || {
                let f = f.clone();
                Box::new((make)().map(move |bound| f(bound)))
            }),
        }
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_neg() {
            write!(f, "Resolution(neg)")
        } else {
            write!(f, "Resolution(bound)")
        }
    }
}
