//! Permission descriptors passed to an access controller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::ObjectName;

/// Verb being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    GetAttribute,
    SetAttribute,
    Invoke,
    Instantiate,
    RegisterMBean,
    UnregisterMBean,
    GetObjectInstance,
    GetMBeanInfo,
    IsInstanceOf,
    QueryMBeans,
    QueryNames,
    AddNotificationListener,
    RemoveNotificationListener,
    GetDomains,
}

impl Action {
    /// Camel-case action string, e.g. `"getAttribute"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetAttribute => "getAttribute",
            Self::SetAttribute => "setAttribute",
            Self::Invoke => "invoke",
            Self::Instantiate => "instantiate",
            Self::RegisterMBean => "registerMBean",
            Self::UnregisterMBean => "unregisterMBean",
            Self::GetObjectInstance => "getObjectInstance",
            Self::GetMBeanInfo => "getMBeanInfo",
            Self::IsInstanceOf => "isInstanceOf",
            Self::QueryMBeans => "queryMBeans",
            Self::QueryNames => "queryNames",
            Self::AddNotificationListener => "addNotificationListener",
            Self::RemoveNotificationListener => "removeNotificationListener",
            Self::GetDomains => "getDomains",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller wants to do, scoped to a class, a member and a target name.
///
/// `None` fields mean "not applicable": `member` is `None` for calls that do
/// not address a single attribute or operation, `name` is `None` for
/// server-wide calls such as [`Action::GetDomains`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MBeanPermission {
    pub class_name: Option<String>,
    pub member: Option<String>,
    pub name: Option<ObjectName>,
    pub action: Action,
}

impl MBeanPermission {
    #[must_use]
    pub fn new(
        class_name: Option<&str>,
        member: Option<&str>,
        name: Option<&ObjectName>,
        action: Action,
    ) -> Self {
        Self {
            class_name: class_name.map(str::to_string),
            member: member.map(str::to_string),
            name: name.cloned(),
            action,
        }
    }
}

impl fmt::Display for MBeanPermission {
    /// Renders as `class#member[name] action`, with `-` for absent parts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}[{}] {}",
            self.class_name.as_deref().unwrap_or("-"),
            self.member.as_deref().unwrap_or("-"),
            self.name
                .as_ref()
                .map_or("-", crate::name::ObjectName::canonical_name),
            self.action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_absent_parts_as_dash() {
        let name = ObjectName::parse("d:type=A").unwrap();
        let p = MBeanPermission::new(Some("com.Foo"), Some("Size"), Some(&name), Action::GetAttribute);
        assert_eq!(p.to_string(), "com.Foo#Size[d:type=A] getAttribute");

        let q = MBeanPermission::new(None, None, None, Action::GetDomains);
        assert_eq!(q.to_string(), "-#-[-] getDomains");
    }
}
