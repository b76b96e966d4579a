//! The callback protocol, independent of the HTTP transport.
//!
//! Both entry points run the same sequence: authenticate the raw body against
//! the node's key, decode it, (raw-data path only) decrypt the relayed
//! signature, decide, then sign the response `data`.
//!
//! The inbound signature covers the exact bytes received. The body is never
//! re-serialized before verification.

use std::sync::Arc;

use mcb_crypto::{ecies, signature};
use tracing::{debug, error, info, warn};

use crate::canonical::to_canonical_vec;
use crate::error::CallbackError;
use crate::keystore::KeyStore;
use crate::policy::{Decision, DecisionPolicy};
use crate::types::{CallbackRequest, CallbackResponse, ResponseData, STATUS_OK};

/// Name of the header carrying the node's hex DER signature.
pub const SIGNATURE_HEADER: &str = "Signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Check,
    RawDataSignature,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Check => "check",
            Endpoint::RawDataSignature => "rawdata_signature",
        }
    }
}

pub struct CallbackHandler {
    keys: Arc<KeyStore>,
    policy: DecisionPolicy,
}

impl CallbackHandler {
    pub fn new(keys: Arc<KeyStore>, policy: DecisionPolicy) -> Self {
        Self { keys, policy }
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn handle(
        &self,
        endpoint: Endpoint,
        body: &[u8],
        sig_header: Option<&str>,
    ) -> Result<CallbackResponse, CallbackError> {
        match endpoint {
            Endpoint::Check => self.check(body, sig_header),
            Endpoint::RawDataSignature => self.raw_data_signature(body, sig_header),
        }
    }

    /// Policy check before a keygen or signing ceremony proceeds.
    pub fn check(
        &self,
        body: &[u8],
        sig_header: Option<&str>,
    ) -> Result<CallbackResponse, CallbackError> {
        let request = self.authenticate(body, sig_header)?;
        let detail = &request.request_detail;
        info!(
            callback_id = %request.callback_id,
            request_type = %request.request_type,
            sino_id = %request.extra_info.sino_id,
            request_id = %request.extra_info.request_id,
            sign_type = %detail.sign_type,
            t = detail.t,
            n = detail.n,
            cryptography = %detail.cryptography,
            party_ids = ?detail.party_ids,
            message = %detail.message,
            signature = %detail.signature,
            tx_info = %detail.tx_info_str(),
            "new check request"
        );
        let decision = self.policy.decide(&request.request_type);
        self.respond(&request, decision)
    }

    /// Relay of a (possibly encrypted) raw-data signature.
    pub fn raw_data_signature(
        &self,
        body: &[u8],
        sig_header: Option<&str>,
    ) -> Result<CallbackResponse, CallbackError> {
        let request = self.authenticate(body, sig_header)?;
        self.audit_relayed_signature(&request)?;
        let decision = self.policy.decide(&request.request_type);
        self.respond(&request, decision)
    }

    fn authenticate(
        &self,
        body: &[u8],
        sig_header: Option<&str>,
    ) -> Result<CallbackRequest, CallbackError> {
        let sig_header = sig_header.ok_or(CallbackError::MissingSignature)?;
        debug!(signature = sig_header, "callback request signature");

        if !signature::verify_bytes(self.keys.mpc_node(), body, sig_header) {
            warn!("callback request failed signature verification");
            return Err(CallbackError::Unauthorized);
        }

        serde_json::from_slice(body).map_err(|e| {
            warn!(error = %e, "authenticated callback body did not decode");
            CallbackError::BadRequest("parse check request failed")
        })
    }

    fn audit_relayed_signature(&self, request: &CallbackRequest) -> Result<(), CallbackError> {
        let detail = &request.request_detail;
        let Some(key) = self.keys.decrypt() else {
            info!(
                callback_id = %request.callback_id,
                signature = %detail.signature,
                "no decryption key; relayed signature left encrypted"
            );
            return Ok(());
        };
        if detail.signature.is_empty() {
            debug!(callback_id = %request.callback_id, "no relayed signature to decrypt");
            return Ok(());
        }

        let decrypted = ecies::decrypt_hex(key.secret(), &detail.signature).map_err(|e| {
            warn!(callback_id = %request.callback_id, error = %e, "relayed signature did not decrypt");
            CallbackError::DecryptFailure
        })?;
        info!(
            callback_id = %request.callback_id,
            message = %detail.message,
            signature = %decrypted,
            sino_id = %request.extra_info.sino_id,
            request_id = %request.extra_info.request_id,
            key_source = key.source().as_str(),
            "received raw data signature"
        );
        Ok(())
    }

    fn respond(
        &self,
        request: &CallbackRequest,
        decision: Decision,
    ) -> Result<CallbackResponse, CallbackError> {
        let data = ResponseData {
            callback_id: request.callback_id.clone(),
            sino_id: request.extra_info.sino_id.clone(),
            request_id: request.extra_info.request_id.clone(),
            action: decision.action,
            wait_time: decision.wait_time,
        };

        let message = to_canonical_vec(&data).map_err(|e| {
            error!(error = %e, "marshal callback response failed");
            CallbackError::Internal
        })?;
        let signature = signature::sign_bytes(self.keys.server().secret(), &message).map_err(|e| {
            error!(error = %e, "sign callback response failed");
            CallbackError::Internal
        })?;

        info!(
            callback_id = %data.callback_id,
            action = %data.action,
            "callback decided"
        );
        Ok(CallbackResponse {
            status: STATUS_OK.to_string(),
            error: None,
            data: Some(data),
            signature,
        })
    }
}
