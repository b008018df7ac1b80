//! Query predicates evaluated against registered objects.
//!
//! A [`QueryExp`] is applied to each name selected by a query's name pattern.
//! Predicates run without any registry lock held and receive the server, so
//! they may read attributes through the normal dispatch path. An error from a
//! predicate counts as "no match".

use std::cmp::Ordering;
use std::fmt;
use std::ops::Not;

use mbeans_core::{ObjectName, Value};

use crate::error::ManagementError;
use crate::interceptor::MBeanServer;

/// A predicate over registered objects.
pub trait QueryExp: Send + Sync {
    /// # Errors
    ///
    /// Any error (for example, the attribute cannot be read) is treated by the
    /// server as a non-match.
    fn apply(&self, name: &ObjectName, server: &MBeanServer) -> Result<bool, ManagementError>;
}

impl<F> QueryExp for F
where
    F: Fn(&ObjectName, &MBeanServer) -> Result<bool, ManagementError> + Send + Sync,
{
    fn apply(&self, name: &ObjectName, server: &MBeanServer) -> Result<bool, ManagementError> {
        self(name, server)
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        })
    }
}

/// Composable query expression.
///
/// ```
/// use mbeans_server::Query;
///
/// let busy = Query::attr_gt("ActiveCount", 10).and(!Query::class_name_eq("test.Idle"));
/// assert_eq!(busy.to_string(), "(ActiveCount > 10 and not(class = test.Idle))");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Compares an attribute's current value with a constant. Values of
    /// incomparable kinds never match.
    AttrCompare {
        attribute: String,
        op: CompareOp,
        value: Value,
    },
    /// Declared class name equals the given string.
    ClassNameEq(String),
    /// Name is selected by the given pattern. An empty pattern domain means
    /// the server's default domain.
    NameMatches(ObjectName),
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
    Not(Box<Query>),
}

impl Query {
    #[must_use]
    pub fn attr_eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Eq, value)
    }

    #[must_use]
    pub fn attr_gt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Gt, value)
    }

    #[must_use]
    pub fn attr_ge(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Ge, value)
    }

    #[must_use]
    pub fn attr_lt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Lt, value)
    }

    #[must_use]
    pub fn attr_le(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Le, value)
    }

    #[must_use]
    pub fn class_name_eq(class_name: impl Into<String>) -> Self {
        Self::ClassNameEq(class_name.into())
    }

    #[must_use]
    pub fn name_matches(pattern: ObjectName) -> Self {
        Self::NameMatches(pattern)
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    fn compare(attribute: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::AttrCompare {
            attribute: attribute.into(),
            op,
            value: value.into(),
        }
    }
}

impl Not for Query {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl QueryExp for Query {
    fn apply(&self, name: &ObjectName, server: &MBeanServer) -> Result<bool, ManagementError> {
        match self {
            Self::AttrCompare {
                attribute,
                op,
                value,
            } => {
                let current = server.get_attribute(name, attribute)?;
                Ok(current.compare(value).is_some_and(|o| op.holds(o)))
            }
            Self::ClassNameEq(class_name) => {
                Ok(server.get_object_instance(name)?.class_name == *class_name)
            }
            Self::NameMatches(pattern) => Ok(server.qualify(pattern)?.apply(name)),
            Self::And(a, b) => Ok(a.apply(name, server)? && b.apply(name, server)?),
            Self::Or(a, b) => Ok(a.apply(name, server)? || b.apply(name, server)?),
            Self::Not(inner) => Ok(!inner.apply(name, server)?),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttrCompare {
                attribute,
                op,
                value,
            } => write!(f, "{attribute} {op} {}", value.to_json()),
            Self::ClassNameEq(class_name) => write!(f, "class = {class_name}"),
            Self::NameMatches(pattern) => write!(f, "name like {pattern}"),
            Self::And(a, b) => write!(f, "({a} and {b})"),
            Self::Or(a, b) => write!(f, "({a} or {b})"),
            Self::Not(inner) => write!(f, "not({inner})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
