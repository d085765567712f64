//! Logical Module Names
//!
//! A logical module name is a dot-separated identifier (`analysis.indicators`)
//! naming a unit of framework code independently of its file layout.
//! Every segment must be an identifier, so a name can never spell a path
//! outside the framework's source tree.

use std::fmt;
use std::str::FromStr;

use crate::error::ProxyError;

/// Validated dot-separated module name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleName {
    dotted: String,
}

impl ModuleName {
    /// Parse a dotted name.
    ///
    /// A malformed name has no candidate file anywhere, so it is reported
    /// the same way as a well-formed name with no file behind it.
    pub fn parse(raw: &str) -> Result<Self, ProxyError> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.split('.').all(is_identifier) {
            return Err(ProxyError::ModuleNotFound {
                name: raw.to_string(),
                candidates: Vec::new(),
            });
        }
        Ok(Self {
            dotted: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.dotted
    }

    /// Name segments, outermost package first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.dotted.split('.')
    }

    /// Outermost package segment.
    pub fn top_level(&self) -> &str {
        self.dotted.split('.').next().unwrap_or(&self.dotted)
    }

    /// Enclosing package, or `None` for a top-level name.
    pub fn parent(&self) -> Option<Self> {
        self.dotted.rsplit_once('.').map(|(parent, _)| Self {
            dotted: parent.to_string(),
        })
    }

    /// Append a (possibly dotted) child name.
    pub fn join(&self, child: &str) -> Result<Self, ProxyError> {
        Self::parse(&format!("{}.{}", self.dotted, child))
    }

    /// Key under which the module is registered, e.g. `framework.a.b`.
    pub fn qualified(&self, namespace: &str) -> String {
        format!("{namespace}.{}", self.dotted)
    }

    /// Resolve a relative import found inside this module.
    ///
    /// `level` is the number of leading dots and `rest` the text after
    /// them (possibly empty). A package's relative imports resolve against
    /// the package itself, a plain module's against its parent. Returns
    /// `None` when the import climbs above the top-level package.
    pub fn resolve_relative(&self, is_package: bool, level: usize, rest: &str) -> Option<Self> {
        let mut base = if is_package {
            Some(self.clone())
        } else {
            self.parent()
        };
        for _ in 1..level {
            base = base?.parent();
        }
        match (base, rest.is_empty()) {
            (Some(base), true) => Some(base),
            (Some(base), false) => base.join(rest).ok(),
            (None, _) => None,
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted)
    }
}

impl FromStr for ModuleName {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
