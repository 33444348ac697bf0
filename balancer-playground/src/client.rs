use clap::Parser;
use tracing::{info, warn};

use balancer_client::client::BalancerClient;
use balancer_client::config::ClientConfig;
use balancer_core::config::BalancerConfig;
use balancer_core::ext::init_logger_with_filter;

/// Drives writes, reads and a metadata call through a leader aware channel.
/// The seed address comes from `SHOP_SERVICE_HOST` and `SHOP_SERVICE_PORT`.
#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value_t = 3)]
    writes: usize,
    #[arg(short, long, default_value_t = 6)]
    reads: usize,
    #[arg(long, default_value = "/shops.v1.Shops/AddShop")]
    write_method: String,
    #[arg(long, default_value = "/shops.v1.Shops/GetShop")]
    read_method: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger_with_filter("balancer_client=info,balancer_core=info,client=info");
    let client_config = ClientConfig::from_env()?;
    let balancer_config = BalancerConfig::reference()?;
    let client = BalancerClient::connect(&client_config, &balancer_config).await?;
    for member in client.get_servers().await? {
        info!("cluster member {}", member);
    }
    for (method, count) in [(&args.write_method, args.writes), (&args.read_method, args.reads)] {
        for _ in 0..count {
            match client.call(method, Vec::new()).await {
                Ok(body) => info!("{} served by {}", method, String::from_utf8_lossy(&body)),
                Err(error) => warn!("{} failed: {}", method, error),
            }
        }
    }
    client.close().await;
    Ok(())
}
