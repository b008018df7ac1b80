//! `mbeans` core: object names, attribute values, metadata descriptors,
//! notifications and permission descriptors.

pub mod info;
pub mod name;
pub mod notification;
pub mod permission;
pub mod value;

pub use info::{
    Attribute, AttributeInfo, AttributeList, ConstructorInfo, Impact, MBeanInfo, NotificationInfo,
    ObjectInstance, OperationInfo, ParameterInfo,
};
pub use name::{MalformedObjectName, ObjectName};
pub use notification::{
    Notification, NotificationSource, ObjectAddr, REGISTRATION_NOTIFICATION,
    UNREGISTRATION_NOTIFICATION,
};
pub use permission::{Action, MBeanPermission};
pub use value::Value;
