use crate::config::{FailurePolicy, WorkflowEnv};
use crate::services::{self, WaitPolicy};
use crate::vsphere::Vsphere;
use crate::vsphere::types::{EntityKind, ManagedObjectRef};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use vmtools_common::error::{Error, Result};

/// Result of processing a single template name.
///
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Tools (and hardware) upgraded, converted back into a template.
    Refreshed,
    /// Found during a dry run; nothing was changed.
    Planned,
    /// No template with that name exists.
    NotFound,
    /// A step failed; the VM may be left powered on and not a template.
    Failed(String),
    /// Not attempted because an earlier template aborted the batch.
    Skipped,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Refreshed => f.write_str("refreshed"),
            Outcome::Planned => f.write_str("found (dry run)"),
            Outcome::NotFound => f.write_str("not found"),
            Outcome::Failed(error) => write!(f, "failed: {}", error),
            Outcome::Skipped => f.write_str("skipped"),
        }
    }
}

/// Ordered outcomes of a batch run.
///
#[derive(Debug, Default)]
pub struct RunReport {
    pub templates: Vec<(String, Outcome)>,
}

impl RunReport {
    fn record(&mut self, name: &str, outcome: Outcome) {
        self.templates.push((name.to_owned(), outcome));
    }

    /// Returns the outcome recorded for `name`, if any.
    ///
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.templates
            .iter()
            .find(|(template, _)| template == name)
            .map(|(_, outcome)| outcome)
    }

    /// Number of templates that went through the whole sequence.
    ///
    pub fn refreshed(&self) -> usize {
        self.templates
            .iter()
            .filter(|(_, outcome)| *outcome == Outcome::Refreshed)
            .count()
    }

    /// Names and error messages of the failed templates.
    ///
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.templates
            .iter()
            .filter_map(|(template, outcome)| match outcome {
                Outcome::Failed(error) => Some((template.as_str(), error.as_str())),
                _ => None,
            })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (template, outcome) in &self.templates {
            writeln!(f, "{}: {}", template, outcome)?;
        }
        write!(
            f,
            "{} of {} template(s) refreshed",
            self.refreshed(),
            self.templates.len()
        )
    }
}

// -----------------------------------------------------------------------------

/// Refreshes every template in `templates`, one after the other.
///
/// # Arguments
///
/// * `vsphere_client`: Client for interacting with the vSphere API.
/// * `templates`: Template names, processed in order.
/// * `resource_pool`: Optional pool the templates are placed into while they
///   are virtual machines.
/// * `workflow`: Step selection, failure policy and task polling settings.
///
/// # Returns
///
/// The per-template outcomes. A configured resource pool that can't be found
/// is an `Error::NotFound` and no template is touched.
///
pub async fn run(
    vsphere_client: &Arc<dyn Vsphere + Send + Sync>,
    templates: &[String],
    resource_pool: Option<&str>,
    workflow: &WorkflowEnv,
) -> Result<RunReport> {
    let pool = match resource_pool {
        Some(pool_name) => {
            let Some(pool) = find_resource_pool(vsphere_client, pool_name).await? else {
                tracing::error!(target: "refresh", "Resource pool '{}' not found.", pool_name);
                return Err(Error::NotFound(format!("Resource pool '{}'", pool_name)));
            };
            tracing::info!(target: "refresh", %pool, "Found resource pool: {}", pool_name);
            Some(pool)
        }
        None => None,
    };

    let policy = WaitPolicy::from(workflow);
    let mut report = RunReport::default();
    let mut names = templates.iter();

    while let Some(name) = names.next() {
        let outcome = match find_template(vsphere_client, name).await {
            Ok(None) => {
                tracing::warn!(target: "refresh", "Template '{}' not found.", name);
                Outcome::NotFound
            }
            Ok(Some(vm)) if workflow.dry_run => {
                tracing::info!(target: "refresh", %vm, "Found template: {} (dry run)", name);
                Outcome::Planned
            }
            Ok(Some(vm)) => {
                tracing::info!(target: "refresh", %vm, "Found template: {}", name);
                match refresh_template(vsphere_client, name, &vm, pool.as_ref(), workflow, &policy)
                    .await
                {
                    Ok(()) => Outcome::Refreshed,
                    Err(error) => Outcome::Failed(error.to_string()),
                }
            }
            Err(error) => Outcome::Failed(error.to_string()),
        };

        if let Outcome::Failed(error) = &outcome {
            tracing::error!(target: "refresh", template = %name, %error, "Template refresh failed");
        }
        let failed = matches!(outcome, Outcome::Failed(_));
        report.record(name, outcome);

        if failed && workflow.on_error == FailurePolicy::Abort {
            for rest in names.by_ref() {
                report.record(rest, Outcome::Skipped);
            }
            tracing::error!(target: "refresh", "Batch aborted, remaining templates skipped");
            break;
        }
    }

    Ok(report)
}

/// Returns the first virtual machine named `name` that is a template.
///
/// The template flag is only queried for entities whose name matches.
///
pub async fn find_template(
    vsphere_client: &Arc<dyn Vsphere + Send + Sync>,
    name: &str,
) -> Result<Option<ManagedObjectRef>> {
    let entities = vsphere_client.inventory(EntityKind::VirtualMachine).await?;

    for entity in entities.into_iter().filter(|entity| entity.name == name) {
        if vsphere_client.is_template(&entity.moref).await? {
            return Ok(Some(entity.moref));
        }
        tracing::debug!(target: "refresh", vm = %entity.moref, "Name matches, but not a template");
    }

    Ok(None)
}

/// Returns the first resource pool named `name`.
///
pub async fn find_resource_pool(
    vsphere_client: &Arc<dyn Vsphere + Send + Sync>,
    name: &str,
) -> Result<Option<ManagedObjectRef>> {
    let pool = vsphere_client
        .inventory(EntityKind::ResourcePool)
        .await?
        .into_iter()
        .find(|entity| entity.name == name)
        .map(|entity| entity.moref);
    Ok(pool)
}

/// Runs the conversion sequence for a single template.
///
/// Stops at the first failing step without trying to restore the template.
///
#[tracing::instrument(
    level = "info",
    target = "refresh",
    skip(vsphere_client, vm, pool, workflow, policy),
    fields(vm = %vm)
)]
async fn refresh_template(
    vsphere_client: &Arc<dyn Vsphere + Send + Sync>,
    template: &str,
    vm: &ManagedObjectRef,
    pool: Option<&ManagedObjectRef>,
    workflow: &WorkflowEnv,
    policy: &WaitPolicy,
) -> Result<()> {
    vsphere_client.mark_as_virtual_machine(vm, pool).await?;
    tracing::info!(target: "refresh", "Converted to virtual machine");

    let task = vsphere_client.power_on(vm).await?;
    services::wait_until_finish(vsphere_client, &task, policy).await?;
    tracing::info!(target: "refresh", "Powered on");

    if workflow.upgrade_hardware {
        tracing::info!(target: "refresh", "Upgrading hardware compatibility");
        let version = workflow.hardware_version.as_deref();
        let task = vsphere_client.upgrade_hardware(vm, version).await?;
        let result = services::wait_until_finish(vsphere_client, &task, policy).await?;
        tracing::info!(target: "refresh", ?result, "Hardware upgrade completed");
    }

    // The service reboots the guest on its own if the upgrade needs it.
    let task = vsphere_client.upgrade_tools(vm).await?;
    if workflow.wait_for_tools_upgrade {
        services::wait_until_finish(vsphere_client, &task, policy).await?;
        tracing::info!(target: "refresh", "VMware Tools upgraded");
    } else {
        tracing::info!(target: "refresh", %task, "VMware Tools upgrade started");
    }

    let task = vsphere_client.power_off(vm).await?;
    services::wait_until_finish(vsphere_client, &task, policy).await?;
    tracing::info!(target: "refresh", "Powered off");

    vsphere_client.mark_as_template(vm).await?;
    tracing::info!(target: "refresh", "Refreshed template: {}", template);

    Ok(())
}
