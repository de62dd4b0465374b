use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::time::Duration;

use gauntlet_testserver::{TestServerOptions, TestServerStats};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut options = TestServerOptions::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--bind" => bind_addr = value("--bind")?.parse()?,
            "--latency-ms" => {
                options.latency = Duration::from_millis(value("--latency-ms")?.parse()?);
            }
            "--fail-every" => options.fail_every = Some(value("--fail-every")?.parse()?),
            "--failure-status" => options.failure_status = value("--failure-status")?.parse()?,
            "-h" | "--help" => {
                eprintln!(
                    "gauntlet-testserver\n\nUSAGE:\n  gauntlet-testserver [--bind 127.0.0.1:0] [--latency-ms N] [--fail-every N] [--failure-status CODE]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app = gauntlet_testserver::router(options, TestServerStats::default());

    println!("HTTP_URL=http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
