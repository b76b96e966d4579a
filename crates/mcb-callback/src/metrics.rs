use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, Counter, CounterVec, HistogramVec, Registry,
};
use std::sync::Arc;

use crate::error::CallbackError;
use crate::handler::Endpoint;
use crate::types::CallbackResponse;

pub struct CallbackMetrics {
    pub requests: CounterVec,
    pub decisions: CounterVec,
    pub auth_failures: Counter,
    pub decrypt_failures: Counter,
    pub request_latency: HistogramVec,
    pub registry: Arc<Registry>,
}

impl CallbackMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests = register_counter_vec_with_registry!(
            "mcb_callback_requests_total",
            "Callback requests by endpoint and response status",
            &["endpoint", "status"],
            registry
        )?;

        let decisions = register_counter_vec_with_registry!(
            "mcb_callback_decisions_total",
            "Signed decisions by action",
            &["action"],
            registry
        )?;

        let auth_failures = register_counter_with_registry!(
            "mcb_callback_auth_failures_total",
            "Requests rejected for a missing or invalid signature",
            registry
        )?;

        let decrypt_failures = register_counter_with_registry!(
            "mcb_callback_decrypt_failures_total",
            "Relayed signatures that failed to decrypt",
            registry
        )?;

        let request_latency = register_histogram_vec_with_registry!(
            "mcb_callback_request_latency_seconds",
            "Request latency in seconds",
            &["endpoint"],
            registry
        )?;

        Ok(Self {
            requests,
            decisions,
            auth_failures,
            decrypt_failures,
            request_latency,
            registry,
        })
    }

    pub fn observe(
        &self,
        endpoint: Endpoint,
        outcome: &Result<CallbackResponse, CallbackError>,
        elapsed_secs: f64,
    ) {
        let status = match outcome {
            Ok(resp) => resp.status.as_str(),
            Err(e) => e.status(),
        };
        self.requests
            .with_label_values(&[endpoint.as_str(), status])
            .inc();
        self.request_latency
            .with_label_values(&[endpoint.as_str()])
            .observe(elapsed_secs);

        match outcome {
            Ok(resp) => {
                if let Some(data) = &resp.data {
                    self.decisions.with_label_values(&[data.action.as_str()]).inc();
                }
            }
            Err(CallbackError::Unauthorized) | Err(CallbackError::MissingSignature) => {
                self.auth_failures.inc()
            }
            Err(CallbackError::DecryptFailure) => self.decrypt_failures.inc(),
            Err(_) => {}
        }
    }

    pub fn export_prometheus(&self) -> prometheus::Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ResponseData};

    fn approved() -> CallbackResponse {
        CallbackResponse {
            status: "0".to_string(),
            error: None,
            data: Some(ResponseData {
                callback_id: "cb".to_string(),
                sino_id: String::new(),
                request_id: String::new(),
                action: Action::Approve,
                wait_time: None,
            }),
            signature: "00".to_string(),
        }
    }

    #[test]
    fn test_observe_counts_outcomes() {
        let metrics = CallbackMetrics::new().unwrap();
        metrics.observe(Endpoint::Check, &Ok(approved()), 0.01);
        metrics.observe(Endpoint::Check, &Err(CallbackError::Unauthorized), 0.01);
        metrics.observe(
            Endpoint::RawDataSignature,
            &Err(CallbackError::MissingSignature),
            0.01,
        );
        metrics.observe(
            Endpoint::RawDataSignature,
            &Err(CallbackError::DecryptFailure),
            0.01,
        );

        metrics.observe(
            Endpoint::Check,
            &Err(CallbackError::BadRequest("parse check request failed")),
            0.01,
        );

        assert_eq!(metrics.auth_failures.get(), 2.0);
        assert_eq!(metrics.decrypt_failures.get(), 1.0);
        assert_eq!(
            metrics.decisions.with_label_values(&["APPROVE"]).get(),
            1.0
        );
        assert_eq!(
            metrics
                .requests
                .with_label_values(&["rawdata_signature", "501"])
                .get(),
            1.0
        );
    }

    #[test]
    fn test_export() {
        let metrics = CallbackMetrics::new().unwrap();
        metrics.observe(Endpoint::Check, &Ok(approved()), 0.002);
        let text = metrics.export_prometheus().unwrap();
        assert!(text.contains("mcb_callback_requests_total"));
        assert!(text.contains("mcb_callback_decisions_total{action=\"APPROVE\"} 1"));
    }
}
