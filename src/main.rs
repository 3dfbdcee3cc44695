/// Entry point of the Docker probe.
///
/// Reads its configuration from `PROBE_*` environment variables and writes one
/// JSON event per line to stdout. Log verbosity is controlled by `RUST_LOG`.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug PROBE_CHECKS=event,memory cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    docker_probe::run().await
}
