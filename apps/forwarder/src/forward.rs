//! Local service forwarding
//!
//! Re-issues a forwarded request against the local service and turns whatever
//! happens into a forward_response. A local failure becomes a 502 page; it never
//! surfaces as an error to the connection loop.

use std::time::{Duration, Instant};

use http_relay_common::validation::validate_path;
use http_relay_common::{
    ForwardRequest, ForwardResponse, TunnelError, headers_to_map, strip_hop_by_hop, without_host,
};
use reqwest::{Client, Method, redirect};
use tracing::{debug, error, warn};

/// HTTP client bound to one local service
#[derive(Debug, Clone)]
pub struct LocalForwarder {
    client: Client,
    local_address: String,
    local_port: u16,
}

impl LocalForwarder {
    pub fn new(
        local_address: String,
        local_port: u16,
        timeout: Duration,
    ) -> Result<Self, TunnelError> {
        // Redirects are passed back to the public caller untouched
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| TunnelError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            local_address,
            local_port,
        })
    }

    /// Forward one request to the local service
    pub async fn forward(&self, request: ForwardRequest) -> ForwardResponse {
        let start_time = Instant::now();
        let request_id = request.request_id.clone();

        let path = match validate_path(&request.path) {
            Ok(path) => path,
            Err(e) => {
                warn!("[{}] Rejecting request path: {}", request_id, e);
                return ForwardResponse::html(
                    request_id,
                    400,
                    "<h1>400 Bad Request</h1><p>Invalid request path.</p>".to_string(),
                );
            }
        };

        let Ok(method) = Method::from_bytes(request.method.as_bytes()) else {
            warn!("[{}] Unsupported HTTP method: {}", request_id, request.method);
            return ForwardResponse::html(
                request_id,
                400,
                "<h1>400 Bad Request</h1><p>Unsupported HTTP method.</p>".to_string(),
            );
        };

        debug!("[{}] Forwarding: {} {}", request_id, method, path);

        let has_body = request.has_body();
        let url = format!("{}{}", self.local_address, path);
        let mut req_builder = self.client.request(method, &url);

        for (name, values) in without_host(request.headers).iter() {
            for value in values {
                req_builder = req_builder.header(name, value);
            }
        }

        if has_body {
            req_builder = req_builder.body(request.body);
        }

        let result = match req_builder.send().await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let headers = strip_hop_by_hop(headers_to_map(response.headers()));
                response
                    .bytes()
                    .await
                    .map(|body| (status_code, headers, body))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok((status_code, headers, body)) => {
                let processing_time = start_time.elapsed().as_millis() as u64;
                debug!(
                    "[{}] Response: {} ({}ms)",
                    request_id, status_code, processing_time
                );

                let mut response = ForwardResponse::new(request_id, status_code);
                response.response_headers = headers;
                response.response_body = body.to_vec();
                response.processing_time_ms = processing_time;
                response
            }
            Err(e) => {
                let failure = TunnelError::LocalConnectionFailure {
                    port: self.local_port,
                    reason: e.to_string(),
                };
                error!("[{}] {} ({})", request_id, failure, self.local_address);
                ForwardResponse::bad_gateway(request_id, &failure)
            }
        }
    }
}
