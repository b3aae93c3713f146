use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use crate::Result;
use crate::manager::{ManagerError, ManagerStatus, TickRecord};

pub struct HealthServer {
    listener: TcpListener,
    context: ServerContext,
}

#[derive(Clone)]
struct ServerContext {
    prometheus_handle: PrometheusHandle,
    status: ManagerStatus,
    start_time: chrono::DateTime<chrono::Utc>,
    version: String,
}

/// A rendered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Response {
    status_code: u16,
    status_text: &'static str,
    content_type: &'static str,
    body: String,
}

impl Response {
    fn json(status_code: u16, status_text: &'static str, value: serde_json::Value) -> Self {
        Self {
            status_code,
            status_text,
            content_type: "application/json",
            body: value.to_string(),
        }
    }

    fn text(status_code: u16, status_text: &'static str, body: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text,
            content_type: "text/plain",
            body: body.into(),
        }
    }
}

impl HealthServer {
    pub async fn new(
        bind_addr: &str,
        prometheus_handle: PrometheusHandle,
        status: ManagerStatus,
        version: String,
    ) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| ManagerError::health_server_start_failed(bind_addr, e))?;
        let bind_addr = listener.local_addr()?;

        info!("Health check server will bind to {}", bind_addr);

        Ok(Self {
            listener,
            context: ServerContext {
                prometheus_handle,
                status,
                start_time: chrono::Utc::now(),
                version,
            },
        })
    }

    pub async fn serve(self) -> Result<()> {
        info!(
            "Starting health check server on {}",
            self.listener.local_addr()?
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let context = self.context.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, context).await {
                            error!("Error handling connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, context: ServerContext) -> Result<()> {
    let mut buffer = [0; 1024];
    let n = stream.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..n]);

    let response = respond(&request, &context);
    send_response(&mut stream, &response).await
}

fn respond(request: &str, context: &ServerContext) -> Response {
    // Parse the HTTP request line
    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();

    if parts.len() < 2 {
        return Response::text(400, "Bad Request", "Bad Request");
    }

    let now = chrono::Utc::now();
    match parts[1] {
        "/health" => Response::json(
            200,
            "OK",
            json!({
                "status": "healthy",
                "timestamp": now.to_rfc3339()
            }),
        ),
        "/ready" => {
            let ready = context.status.is_ready();
            let label = if ready { "ready" } else { "not ready" };
            let body = json!({
                "status": label,
                "timestamp": now.to_rfc3339(),
                "last_applied": context.status.last_applied().map(|t| t.to_rfc3339()),
            });
            if ready {
                Response::json(200, "OK", body)
            } else {
                Response::json(503, "Service Unavailable", body)
            }
        }
        "/metrics" => Response::text(200, "OK", context.prometheus_handle.render()),
        "/version" => Response::json(
            200,
            "OK",
            json!({
                "version": context.version,
                "build_time": option_env!("BUILD_TIME").unwrap_or("unknown"),
                "git_commit": option_env!("GIT_COMMIT").unwrap_or("unknown"),
            }),
        ),
        "/status" => Response::json(
            200,
            "OK",
            json!({
                "status": "running",
                "version": context.version,
                "uptime_seconds": (now - context.start_time).num_seconds(),
                "start_time": context.start_time.to_rfc3339(),
                "timestamp": now.to_rfc3339(),
                "reconciliation": context.status.to_json(),
            }),
        ),
        _ => Response::text(404, "Not Found", "Not Found"),
    }
}

async fn send_response(stream: &mut TcpStream, response: &Response) -> Result<()> {
    let raw = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status_code,
        response.status_text,
        response.content_type,
        response.body.len(),
        response.body
    );
    stream.write_all(raw.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

pub fn setup_metrics() -> Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .map_err(|e| crate::Error::metrics(format!("Failed to setup metrics: {}", e)))?;

    metrics::describe_counter!(
        "natkeeper_ticks_total",
        "Reconciliation passes by outcome"
    );
    metrics::describe_counter!(
        "natkeeper_rules_added_total",
        "Port-forwarding rules appended"
    );
    metrics::describe_counter!(
        "natkeeper_rules_deleted_total",
        "Port-forwarding rules deleted"
    );
    metrics::describe_gauge!(
        "natkeeper_managed_rules",
        "Port-forwarding rules in place after the last applied pass"
    );
    metrics::describe_histogram!(
        "natkeeper_tick_duration_seconds",
        "Time taken by a reconciliation pass"
    );

    Ok(handle)
}

pub fn record_tick(record: &TickRecord, duration: std::time::Duration) {
    metrics::counter!("natkeeper_ticks_total", "outcome" => record.label()).increment(1);
    metrics::histogram!("natkeeper_tick_duration_seconds").record(duration.as_secs_f64());

    if let TickRecord::Applied(report) = record {
        metrics::counter!("natkeeper_rules_added_total").increment(report.added as u64);
        metrics::counter!("natkeeper_rules_deleted_total").increment(report.deleted as u64);
        metrics::gauge!("natkeeper_managed_rules").set(report.managed() as f64);
    }
}
