use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Characters that must not appear raw inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Reference to an object in the vSphere inventory (`ManagedObjectReference`).
///
/// The vim JSON API tags every reference with a `_typeName` discriminator on
/// the way in; it is ignored when reading.
///
/// # Example JSON
///
/// ```json
/// {
///     "_typeName": "ManagedObjectReference",
///     "type": "VirtualMachine",
///     "value": "vm-42"
/// }
/// ```
///
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManagedObjectRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectRef {
    /// Creates a new reference from the object type and its identifier.
    ///
    pub fn new(kind: &str, value: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            value: value.to_owned(),
        }
    }

    /// Percent-encode the identifier to make it safe for use in a URL path.
    ///
    pub fn encoded(&self) -> String {
        utf8_percent_encode(&self.value, PATH_SEGMENT).to_string()
    }
}

impl Serialize for ManagedObjectRef {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ManagedObjectReference", 3)?;
        state.serialize_field("_typeName", "ManagedObjectReference")?;
        state.serialize_field("type", &self.kind)?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}

impl Display for ManagedObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

// -----------------------------------------------------------------------------

/// Inventory object types that can be enumerated through a container view.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    VirtualMachine,
    ResourcePool,
}

impl EntityKind {
    /// Returns the managed object type name used by the API.
    ///
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::VirtualMachine => "VirtualMachine",
            EntityKind::ResourcePool => "ResourcePool",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named inventory object returned by enumeration.
///
/// # Fields
///
/// * `moref`: Reference to the object.
/// * `name`: Human-readable inventory name. Not guaranteed to be unique.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub moref: ManagedObjectRef,
    pub name: String,
}

// -----------------------------------------------------------------------------

/// Type-safe reference to an asynchronous vSphere task.
///
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct TaskRef(ManagedObjectRef);

impl TaskRef {
    /// Returns the underlying managed object reference.
    ///
    pub fn as_moref(&self) -> &ManagedObjectRef {
        &self.0
    }

    /// Returns the inner managed object reference.
    ///
    pub fn into_inner(self) -> ManagedObjectRef {
        self.0
    }
}

impl From<ManagedObjectRef> for TaskRef {
    fn from(value: ManagedObjectRef) -> Self {
        Self(value)
    }
}

impl Display for TaskRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// High-level status of a long-running asynchronous task in vSphere.
///
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Completed(Option<Value>),
    Failed(String),
}

/// Raw `TaskInfo.state` values.
///
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

/// Raw `TaskInfo` as returned by the task `info` property.
///
/// # Fields
///
/// * `state`: Current state of the task.
/// * `error`: Fault description, present once the task is in `error` state.
/// * `result`: Result of the operation, present once the task succeeded.
///
#[derive(Debug, Deserialize)]
pub struct TaskInfo {
    pub state: TaskState,
    #[serde(default)]
    pub error: Option<MethodFault>,
    #[serde(default)]
    pub result: Option<Value>,
}

/// Raw `LocalizedMethodFault`.
///
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodFault {
    #[serde(default)]
    pub localized_message: Option<String>,
    #[serde(default)]
    pub fault: Option<Value>,
}

impl MethodFault {
    /// Returns the most descriptive message available for the fault.
    ///
    pub fn message(self) -> String {
        if let Some(message) = self.localized_message.filter(|msg| !msg.is_empty()) {
            return message;
        }
        self.fault
            .as_ref()
            .and_then(|fault| fault.get("_typeName"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| "Unknown error".to_owned())
    }
}

impl From<TaskInfo> for TaskStatus {
    fn from(info: TaskInfo) -> Self {
        match info.state {
            TaskState::Queued | TaskState::Running => TaskStatus::Pending,
            TaskState::Success => TaskStatus::Completed(info.result.filter(|v| !v.is_null())),
            TaskState::Error => TaskStatus::Failed(
                info.error
                    .map(MethodFault::message)
                    .unwrap_or_else(|| "Unknown error".to_owned()),
            ),
        }
    }
}

// -----------------------------------------------------------------------------

/// Subset of `ServiceContent` needed to log in and browse the inventory.
///
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceContent {
    pub root_folder: ManagedObjectRef,
    pub view_manager: ManagedObjectRef,
    pub session_manager: ManagedObjectRef,
}

/// Subset of `VirtualMachineConfigInfo`.
///
#[derive(Debug, Deserialize)]
pub struct VmConfigInfo {
    #[serde(default)]
    pub template: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub user_name: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct CreateContainerViewRequest {
    pub container: ManagedObjectRef,
    #[serde(rename = "type")]
    pub kinds: Vec<String>,
    pub recursive: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct MarkAsVirtualMachineRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<ManagedObjectRef>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpgradeVmRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
