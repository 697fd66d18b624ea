use proxy::config::{Config, MAX_CACHE_SIZE};
use proxy::worker::Proxy;
use proxy::{logging, server};
use tracing::error;

fn main() -> anyhow::Result<()> {
    let config = Config::parse_args();
    logging::init(config.verbose);

    let proxy = Proxy::new(MAX_CACHE_SIZE);
    if let Err(err) = server::run(config.port, proxy) {
        error!(error = %err, "proxy exited");
        return Err(err.into());
    }
    Ok(())
}
