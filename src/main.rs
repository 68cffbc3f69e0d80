use std::sync::Arc;

use clap::Parser;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vigil_dns::cli::Cli;
use vigil_dns::config::DnsConfig;
use vigil_dns::config_reload::{ConfigReloader, handle_config_changes};
use vigil_dns::constants::EDNS_UDP_SIZE;
use vigil_dns::graceful_shutdown::GracefulShutdown;
use vigil_dns::http_server::HttpServer;
use vigil_dns::metrics::DnsMetrics;
use vigil_dns::pool::BufferPool;
use vigil_dns::protocol::{
    DohProtocolHandler, DotProtocolHandler, TcpProtocolHandler, UdpProtocolHandler,
};
use vigil_dns::rate_limiter::DnsRateLimiter;
use vigil_dns::resolver::DnsResolver;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = cli
        .log_level
        .clone()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = DnsConfig::load(cli.config.as_deref())?;
    info!("Starting vigild on {}", config.bind_addr);

    let metrics = Arc::new(DnsMetrics::new()?);
    let resolver = Arc::new(DnsResolver::new(config.clone(), Some(metrics.clone())).await?);
    resolver.bind_self_arc();
    let buffer_pool = Arc::new(BufferPool::new(EDNS_UDP_SIZE as usize, 512));
    let rate_limiter = Arc::new(DnsRateLimiter::new(config.rate_limit_config.clone()));

    let graceful_shutdown = Arc::new(GracefulShutdown::new(resolver.clone()));

    let mut reloader = ConfigReloader::new(config.clone(), cli.config.clone());
    let change_rx = reloader.take_change_receiver();
    let reloader = Arc::new(reloader);
    reloader.start_watching().await?;
    if let Some(change_rx) = change_rx {
        tokio::spawn(handle_config_changes(change_rx));
    }
    let config_reloader = Some(reloader);

    let config = Arc::new(config);

    let udp_socket = Arc::new(UdpSocket::bind(config.bind_addr).await?);
    let udp_handler = Arc::new(UdpProtocolHandler::new(
        udp_socket,
        config.clone(),
        buffer_pool.clone(),
        resolver.clone(),
        metrics.clone(),
    ));
    {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = udp_handler.run_server(metrics).await {
                error!("UDP server exited: {}", e);
            }
        });
    }

    let tcp_listener = Arc::new(TcpListener::bind(config.bind_addr).await?);
    let tcp_handler = Arc::new(TcpProtocolHandler::new(
        tcp_listener,
        config.clone(),
        buffer_pool.clone(),
        resolver.clone(),
        metrics.clone(),
    ));
    {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = tcp_handler.run_server(metrics).await {
                error!("TCP server exited: {}", e);
            }
        });
    }

    if config.transport_config.enable_dot {
        if let Some(dot_addr) = config.transport_config.dot_bind_addr {
            match config.transport_config.tls_config.clone() {
                Some(tls_config) => {
                    let listener = Arc::new(TcpListener::bind(dot_addr).await?);
                    let dot_handler = Arc::new(DotProtocolHandler::new(
                        listener,
                        tls_config,
                        config.clone(),
                        buffer_pool.clone(),
                        resolver.clone(),
                        metrics.clone(),
                    )?);
                    let metrics = metrics.clone();
                    tokio::spawn(async move {
                        if let Err(e) = dot_handler.run_server(metrics).await {
                            error!("DoT server exited: {}", e);
                        }
                    });
                }
                None => warn!("DoT enabled but no TLS configuration present; skipping"),
            }
        }
    }

    if config.transport_config.enable_doh {
        if let Some(doh_addr) = config.transport_config.doh_bind_addr {
            let listener = Arc::new(TcpListener::bind(doh_addr).await?);
            let doh_handler = Arc::new(DohProtocolHandler::new(
                listener,
                config.clone(),
                buffer_pool.clone(),
                resolver.clone(),
                metrics.clone(),
            ));
            let metrics = metrics.clone();
            tokio::spawn(async move {
                if let Err(e) = doh_handler.run_server(metrics).await {
                    error!("DoH server exited: {}", e);
                }
            });
        }
    }

    if let Some(http_addr) = config.http_bind_addr {
        let http_server = HttpServer::new(
            resolver.clone(),
            Some(rate_limiter.clone()),
            metrics.clone(),
            config_reloader.clone(),
            http_addr,
        );
        tokio::spawn(async move {
            if let Err(e) = http_server.start().await {
                error!("HTTP server exited: {}", e);
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    if let Err(e) = graceful_shutdown.shutdown().await {
        error!("Error during graceful shutdown: {}", e);
    }

    Ok(())
}
