pub mod client;
pub mod types;

// -----------------------------------------------------------------------------

use crate::vsphere::types::*;
use async_trait::async_trait;
use vmtools_common::prelude::Result;

/// Operations the refresh workflow needs from a vSphere management service.
///
/// Methods returning a [`TaskRef`] only start the remote operation; use
/// [`crate::services::wait_until_finish`] to block until it is done.
///
#[async_trait]
pub trait Vsphere {
    async fn inventory(&self, kind: EntityKind) -> Result<Vec<Entity>>;
    async fn is_template(&self, vm: &ManagedObjectRef) -> Result<bool>;
    async fn mark_as_virtual_machine(
        &self,
        vm: &ManagedObjectRef,
        pool: Option<&ManagedObjectRef>,
    ) -> Result<()>;
    async fn power_on(&self, vm: &ManagedObjectRef) -> Result<TaskRef>;
    async fn upgrade_hardware(&self, vm: &ManagedObjectRef, version: Option<&str>)
    -> Result<TaskRef>;
    async fn upgrade_tools(&self, vm: &ManagedObjectRef) -> Result<TaskRef>;
    async fn power_off(&self, vm: &ManagedObjectRef) -> Result<TaskRef>;
    async fn mark_as_template(&self, vm: &ManagedObjectRef) -> Result<()>;
    async fn task_status(&self, task: &TaskRef) -> Result<TaskStatus>;
    async fn disconnect(&self) -> Result<()>;
}
