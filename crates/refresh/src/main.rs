use clap::Parser;
use std::sync::Arc;
use tracing::Level;
use vmtools_common::prelude::{Error, Result};
use vmtools_common::telemetry;
use vmtools_refresh::cli::Cli;
use vmtools_refresh::config::Config;
use vmtools_refresh::services::refresh;
use vmtools_refresh::session;
use vmtools_refresh::vsphere::Vsphere;
use vmtools_refresh::vsphere::client::VsphereClient;

/// The main entry point for the template refresh utility.
///
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging.
    let subscriber = telemetry::get_subscriber(Level::INFO, cli.log_format.into(), std::io::stdout);
    telemetry::init_subscriber(subscriber)?;
    tracing::info!("Utility Start!");

    if dotenv::dotenv().is_ok() {
        tracing::info!(".env loaded.");
    }

    let config = Config::load(&cli)?;

    let vsphere_client: Arc<dyn Vsphere + Send + Sync> =
        Arc::new(VsphereClient::connect(&config.vsphere).await?);

    let report = session::scoped(vsphere_client, |vsphere_client| async move {
        refresh::run(
            &vsphere_client,
            &config.templates,
            config.resource_pool.as_deref(),
            &config.workflow,
        )
        .await
    })
    .await?;

    println!("{report}");

    match report.failures().count() {
        0 => Ok(()),
        failed => Err(Error::Any(format!("{} template(s) failed", failed))),
    }
}
