//! Step identity types: qualified names, phases, scopes, context keys.
//!
//! A qualified name pairs a namespace with a local name so that unrelated
//! modules can register steps without colliding. Names are unique per
//! (phase, scope); the same name appearing in both Start and Stop marks a
//! paired step whose two passes are ordered independently.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use strum_macros::Display;

/// The two independently-ordered passes a step may participate in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
pub enum Phase {
    Start,
    Stop,
}

/// How often a pass runs: once per process, or once per unit of work.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
pub enum Scope {
    Process,
    UnitOfWork,
}

/// A (namespace, local-name) pair identifying a step.
///
/// Ordering is lexicographic on namespace, then local name — the default
/// tie-break used by the scheduler.
///
/// # Examples
///
/// ```
/// use stagecraft::step::QualifiedName;
///
/// let name = QualifiedName::from("db:open-pool");
/// assert_eq!(name.namespace(), "db");
/// assert_eq!(name.local(), "open-pool");
/// assert_eq!(name.to_string(), "db:open-pool");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    namespace: String,
    local: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{}:{}", self.namespace, self.local)
        }
    }
}

impl fmt::Debug for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedName({})", self)
    }
}

impl From<&str> for QualifiedName {
    /// Parses `"namespace:local"`; a bare name gets the empty namespace.
    fn from(s: &str) -> Self {
        match s.split_once(':') {
            Some((namespace, local)) => Self::new(namespace, local),
            None => Self::new("", s),
        }
    }
}

impl From<String> for QualifiedName {
    fn from(s: String) -> Self {
        QualifiedName::from(s.as_str())
    }
}

/// Token identifying a context value type a step consumes or produces.
///
/// Used for implicit ordering: a step declaring an input is ordered after
/// the unique step declaring the matching output.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey {
    id: TypeId,
    type_name: &'static str,
}

impl ContextKey {
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.id
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)
    }
}

impl fmt::Debug for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextKey({})", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_parse() {
        let name = QualifiedName::from("web:session");
        assert_eq!(name.namespace(), "web");
        assert_eq!(name.local(), "session");

        let bare = QualifiedName::from("session");
        assert_eq!(bare.namespace(), "");
        assert_eq!(bare.local(), "session");
        assert_eq!(bare.to_string(), "session");
    }

    #[test]
    fn test_qualified_name_ordering() {
        let a = QualifiedName::from("app:zeta");
        let b = QualifiedName::from("db:alpha");
        assert!(a < b); // namespace compared first
        assert!(QualifiedName::from("db:a") < QualifiedName::from("db:b"));
    }

    #[test]
    fn test_qualified_name_serde() {
        let name = QualifiedName::from("db:open-pool");
        let json = serde_json::to_string(&name).unwrap();
        let back: QualifiedName = serde_json::from_str(&json).unwrap();
        assert_eq!(name, back);
    }

    #[test]
    fn test_context_key_identity() {
        struct Pool;
        struct Cache;
        assert_eq!(ContextKey::of::<Pool>(), ContextKey::of::<Pool>());
        assert_ne!(ContextKey::of::<Pool>(), ContextKey::of::<Cache>());
        assert!(ContextKey::of::<Pool>().type_name().contains("Pool"));
    }

    #[test]
    fn test_phase_scope_display() {
        assert_eq!(Phase::Start.to_string(), "Start");
        assert_eq!(Scope::UnitOfWork.to_string(), "UnitOfWork");
    }
}
