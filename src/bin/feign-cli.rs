use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use http::Method;

use resilient_client::config::{load_config, ClientConfig};
use resilient_client::load_balancer::{resolve_hint, ConfiguredClientFactory, LoadBalancerClientFactory};
use resilient_client::observability::{init_logging, metrics};
use resilient_client::{build_client, Client, HttpTransport, OutboundRequest, RequestOptions, StaticLoadBalancer};

#[derive(Parser)]
#[command(name = "feign-cli")]
#[command(about = "Issue load-balanced requests against configured services", long_about = None)]
struct Cli {
    /// Client configuration file (TOML)
    #[arg(short, long, default_value = "client.toml")]
    config: PathBuf,

    /// Serve Prometheus metrics on this address while the command runs
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request to a logical URL, e.g. http://orders/api/orders/7
    Request {
        url: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Header as "name: value"; may be repeated
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        #[arg(short, long)]
        data: Option<String>,
    },
    /// List the configured instances of a service
    Instances { service_id: String },
    /// Print the routing hint derived for a service
    Hint { service_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.observability)?;

    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr);
    }

    match cli.command {
        Commands::Request {
            url,
            method,
            headers,
            data,
        } => {
            let request = build_request(&url, &method, &headers, data)?;
            send(&config, request).await?;
        }
        Commands::Instances { service_id } => {
            let registry = StaticLoadBalancer::new(&config);
            let instances = registry.instances(&service_id);
            if instances.is_empty() {
                eprintln!("No instances configured for {}", service_id);
            }
            for instance in instances {
                let uri = instance.uri().map(|u| u.to_string()).unwrap_or_default();
                println!("{}\t{}", instance.instance_id, uri);
            }
        }
        Commands::Hint { service_id } => {
            let factory = ConfiguredClientFactory::from_client_config(&config);
            println!("{}", resolve_hint(&service_id, &factory.properties(&service_id)));
        }
    }

    Ok(())
}

fn build_request(
    url: &str,
    method: &str,
    headers: &[String],
    data: Option<String>,
) -> Result<OutboundRequest, Box<dyn std::error::Error>> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
    let mut builder = OutboundRequest::builder(method, url);
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("invalid header {:?}, expected \"name: value\"", header))?;
        builder = builder.header(name.trim(), value.trim())?;
    }
    if let Some(data) = data {
        builder = builder.body(data).charset("UTF-8");
    }
    Ok(builder.build()?)
}

async fn send(config: &ClientConfig, request: OutboundRequest) -> Result<(), Box<dyn std::error::Error>> {
    let options = RequestOptions::from(&config.timeouts);
    let client = build_client(
        Arc::new(HttpTransport::new(&options)),
        Arc::new(StaticLoadBalancer::new(config)),
        Arc::new(ConfiguredClientFactory::from_client_config(config)),
        config.loadbalancer.defaults.retry.enabled,
    );

    let response = client.execute(request, &options).await?;
    println!("{} {}", response.status(), response.reason().unwrap_or(""));
    for (name, value) in response.headers() {
        println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    println!();
    println!("{}", response.text());
    Ok(())
}
