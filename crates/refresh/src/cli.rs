use crate::config::FailurePolicy;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Every option also has a configuration key; the values given here win over
/// the configuration file and `VMTOOLS__*` environment variables. The vCenter
/// password is only read from the configuration file or from
/// `VMTOOLS__VSPHERE__PASSWORD`.
///
#[derive(Debug, clap::Parser)]
#[command(
    name = "vmtools-refresh",
    version,
    about = "Refreshes VMware Tools and virtual hardware of vSphere templates"
)]
pub struct Cli {
    #[arg(value_name = "TEMPLATE", help = "Names of the templates to refresh, in order")]
    pub templates: Vec<String>,
    #[arg(
        short,
        long,
        help = "Configuration file (yaml, toml or json)",
        env = "VMTOOLS_CONFIG"
    )]
    pub config: Option<PathBuf>,
    #[arg(long, help = "vCenter address, e.g. `vcenter.example.com`")]
    pub url: Option<String>,
    #[arg(short, long, help = "vCenter user name")]
    pub username: Option<String>,
    #[arg(short = 'p', long, help = "Resource pool to place the converted VMs into")]
    pub resource_pool: Option<String>,
    #[arg(long, help = "Accept invalid TLS certificates. Use only in lab setups")]
    pub insecure: bool,
    #[arg(long, help = "Don't upgrade the virtual hardware compatibility")]
    pub skip_hardware_upgrade: bool,
    #[arg(long, help = "Target hardware version, e.g. `vmx-21`. Latest if omitted")]
    pub hardware_version: Option<String>,
    #[arg(long, help = "Wait for the VMware Tools upgrade task before powering off")]
    pub wait_for_tools_upgrade: bool,
    #[arg(long, value_enum, help = "What to do once a template fails")]
    pub on_error: Option<FailurePolicy>,
    #[arg(long, help = "Seconds between two task status checks")]
    pub poll_interval_secs: Option<u64>,
    #[arg(long, help = "Seconds to wait for a single task, 0 to wait forever")]
    pub task_timeout_secs: Option<u64>,
    #[arg(short, long, help = "Only look the templates up, change nothing")]
    pub dry_run: bool,
    #[arg(long, value_enum, default_value = "compact", help = "Log line format")]
    pub log_format: LogFormatArg,
}

/// Log line format accepted on the command line.
///
#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum LogFormatArg {
    Compact,
    Json,
}

impl From<LogFormatArg> for vmtools_common::telemetry::LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Compact => Self::Compact,
            LogFormatArg::Json => Self::Json,
        }
    }
}
