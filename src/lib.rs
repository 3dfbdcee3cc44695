//! Docker Probe: periodically observes a container runtime's local management
//! API and reports container lifecycle events and CPU, memory and network
//! health as classified events.
//!
//! The crate is organised leaves first:
//!
//! - [`docker`] talks to the runtime (transport, streamed JSON extraction,
//!   response models).
//! - [`registry`] holds the containers the probe believes are running.
//! - [`metrics`] derives and classifies per-container metrics.
//! - [`report`] shapes events and hands them to an [`report::EventSink`].
//! - [`probe`] ties everything together into a tick and drives it.
pub mod config;
pub mod container;
pub mod docker;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod registry;
pub mod report;

/// Runs the probe until the process is terminated.
///
/// Events are written to stdout as JSON lines.
///
/// # Errors
///
/// Returns an error if the configuration in the environment is invalid. Once
/// running, runtime and sink failures are logged and never end the loop.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Configuration: {:?}", config);

    let client = docker::Client::new(
        config.docker_address,
        config.connect_timeout,
        config.read_timeout,
    );
    log::info!("Watching container runtime at `{}`", client.address());

    let reporter = report::Reporter::new(
        report::JsonLinesSink::new(std::io::stdout()),
        config.decorations,
    );
    let probe = probe::Probe::new(docker::Docker::new(client), reporter, config.settings);
    probe::run(probe, config.interval).await;
    Ok(())
}
