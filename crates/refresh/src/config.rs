use crate::cli::Cli;
use crate::services::WaitPolicy;
use config::ConfigBuilder;
use config::builder::DefaultState;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vmtools_common::prelude::{Error, Result};

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "VMTOOLS";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Represents the application's configuration.
///
#[derive(Debug, Deserialize)]
pub struct Config {
    pub vsphere: VsphereEnv,
    pub templates: Vec<String>,
    #[serde(default)]
    pub resource_pool: Option<String>,
    pub workflow: WorkflowEnv,
}

impl Config {
    /// Loads the configuration from defaults, an optional file, environment
    /// variables and command-line overrides, in increasing precedence.
    ///
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with(cli, Self::environment())
    }

    /// Environment source holding every `VMTOOLS__<SECTION>__<KEY>` variable.
    /// `VMTOOLS__TEMPLATES` is split on commas.
    ///
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("templates")
            .try_parsing(true)
    }

    /// Same as [`Config::load`], reading the environment layer from
    /// `environment`.
    ///
    pub fn load_with(cli: &Cli, environment: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = &cli.config {
            builder = builder.add_source(config::File::from(path.as_path()));
            tracing::info!(target: "config", path = %path.display(), "Configuration file added.");
        }

        let builder = builder.add_source(environment);

        let config = Self::from_builder(builder, cli)?;
        tracing::info!(target: "config", ?config, "Configuration loaded.");

        Ok(config)
    }

    /// Completes `builder` with the built-in defaults and the command-line
    /// overrides, then deserializes and validates the result.
    ///
    pub fn from_builder(builder: ConfigBuilder<DefaultState>, cli: &Cli) -> Result<Self> {
        let config = builder
            .set_default("vsphere.api_release", "8.0.1.0")?
            .set_default("vsphere.insecure", false)?
            .set_default("vsphere.request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?
            .set_default("templates", Vec::<String>::new())?
            .set_default("workflow.upgrade_hardware", true)?
            .set_default("workflow.wait_for_tools_upgrade", false)?
            .set_default("workflow.on_error", FailurePolicy::Abort.as_str())?
            .set_default("workflow.poll_interval_secs", DEFAULT_POLL_INTERVAL_SECS)?
            .set_default("workflow.task_timeout_secs", DEFAULT_TASK_TIMEOUT_SECS)?
            .set_default("workflow.dry_run", false)?
            .set_override_option("vsphere.url", cli.url.clone())?
            .set_override_option("vsphere.username", cli.username.clone())?
            .set_override_option("vsphere.insecure", cli.insecure.then_some(true))?
            .set_override_option(
                "templates",
                (!cli.templates.is_empty()).then(|| cli.templates.clone()),
            )?
            .set_override_option("resource_pool", cli.resource_pool.clone())?
            .set_override_option(
                "workflow.upgrade_hardware",
                cli.skip_hardware_upgrade.then_some(false),
            )?
            .set_override_option("workflow.hardware_version", cli.hardware_version.clone())?
            .set_override_option(
                "workflow.wait_for_tools_upgrade",
                cli.wait_for_tools_upgrade.then_some(true),
            )?
            .set_override_option("workflow.on_error", cli.on_error.map(|p| p.as_str()))?
            .set_override_option("workflow.poll_interval_secs", cli.poll_interval_secs)?
            .set_override_option("workflow.task_timeout_secs", cli.task_timeout_secs)?
            .set_override_option("workflow.dry_run", cli.dry_run.then_some(true))?
            .build()?
            .try_deserialize::<Config>()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the workflow can't do anything useful with.
    ///
    pub fn validate(&self) -> Result<()> {
        if self.templates.is_empty() {
            return Err(Error::InvalidConfig("no template names given".to_owned()));
        }
        if let Some(position) = self.templates.iter().position(|name| name.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "template name #{} is blank",
                position + 1
            )));
        }
        if self.vsphere.url.trim().is_empty() {
            return Err(Error::InvalidConfig("vSphere URL is empty".to_owned()));
        }
        if self.vsphere.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "request timeout must be at least one second".to_owned(),
            ));
        }
        if self.workflow.poll_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "poll interval must be at least one second".to_owned(),
            ));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------

/// All settings required to connect to vCenter.
///
/// # Fields
///
/// * `url`: Address of the vCenter server. `https://` is assumed when no
///   scheme is given.
/// * `api_release`: Release segment of the vim JSON API path.
/// * `insecure`: Skip TLS certificate verification.
/// * `request_timeout_secs`: Upper bound for a single API request.
///
#[derive(Debug, Clone, Deserialize)]
pub struct VsphereEnv {
    pub url: String,
    pub username: String,
    pub password: SecretString,
    pub api_release: String,
    pub insecure: bool,
    pub request_timeout_secs: u64,
}

impl VsphereEnv {
    /// Returns the root of the vim JSON API, e.g.
    /// `https://vcenter.local/sdk/vim25/8.0.1.0`.
    ///
    pub fn base_url(&self) -> String {
        let url = self.url.trim().trim_end_matches('/');
        let url = if url.contains("://") {
            url.to_owned()
        } else {
            format!("https://{url}")
        };
        format!("{}/sdk/vim25/{}", url, self.api_release)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Settings controlling the per-template refresh sequence.
///
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowEnv {
    pub upgrade_hardware: bool,
    #[serde(default)]
    pub hardware_version: Option<String>,
    pub wait_for_tools_upgrade: bool,
    pub on_error: FailurePolicy,
    pub poll_interval_secs: u64,
    /// Zero disables the timeout.
    pub task_timeout_secs: u64,
    pub dry_run: bool,
}

impl Default for WorkflowEnv {
    fn default() -> Self {
        Self {
            upgrade_hardware: true,
            hardware_version: None,
            wait_for_tools_upgrade: false,
            on_error: FailurePolicy::Abort,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            dry_run: false,
        }
    }
}

impl From<&WorkflowEnv> for WaitPolicy {
    fn from(workflow: &WorkflowEnv) -> Self {
        WaitPolicy {
            interval: Duration::from_secs(workflow.poll_interval_secs),
            timeout: (workflow.task_timeout_secs > 0)
                .then(|| Duration::from_secs(workflow.task_timeout_secs)),
        }
    }
}

/// What to do with the remaining templates once one of them failed.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the batch; the remaining templates are skipped.
    Abort,
    /// Record the failure and move on to the next template.
    Continue,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Continue => "continue",
        }
    }
}
