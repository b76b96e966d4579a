//! Wire types exchanged with the MPC node.
//!
//! Every field is optional on the wire. Absent values are omitted on output
//! rather than written as `null` or `""`, matching what the node expects.

use std::marker::PhantomData;

use serde::de::{self, value::MapAccessDeserializer, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

pub const STATUS_OK: &str = "0";

/// Inbound callback, trusted only after its signature verifies.
///
/// Decodes only from a JSON object (or `null`); positional arrays are a
/// schema mismatch.
#[derive(Debug, Default, Deserialize)]
#[serde(remote = "Self")]
pub struct CallbackRequest {
    /// Generated by the node for every callback it issues.
    #[serde(default, deserialize_with = "null_default")]
    pub callback_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub request_type: String,
    #[serde(default)]
    pub request_detail: RequestDetail,
    #[serde(default)]
    pub extra_info: ExtraInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(remote = "Self")]
pub struct RequestDetail {
    #[serde(default, deserialize_with = "null_default")]
    pub t: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub n: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub cryptography: String,
    #[serde(default, deserialize_with = "null_default")]
    pub party_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub sign_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub public_key: String,
    #[serde(default, deserialize_with = "null_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_default")]
    pub message: String,
    /// On the raw-data path: the ECIES-encrypted signature, hex encoded.
    #[serde(default, deserialize_with = "null_default")]
    pub signature: String,
    /// Opaque transaction description, kept verbatim.
    #[serde(default)]
    pub tx_info: Option<Box<RawValue>>,
}

impl RequestDetail {
    pub fn tx_info_str(&self) -> &str {
        self.tx_info.as_deref().map(RawValue::get).unwrap_or("")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(remote = "Self")]
pub struct ExtraInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub sino_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub request_id: String,
}

/// `null` decodes to the zero value, as for an absent field.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Field-wise decoding generated by `#[serde(remote = "Self")]`.
trait ObjectFields<'de>: Sized + Default {
    fn from_fields<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error>;
}

struct ObjectVisitor<T>(PhantomData<T>);

impl<'de, T: ObjectFields<'de>> Visitor<'de> for ObjectVisitor<T> {
    type Value = T;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<T, E> {
        Ok(T::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<T, A::Error> {
        T::from_fields(MapAccessDeserializer::new(map))
    }
}

macro_rules! object_only {
    ($($ty:ident),*) => {$(
        impl<'de> ObjectFields<'de> for $ty {
            fn from_fields<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                $ty::deserialize(deserializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(ObjectVisitor::<$ty>(PhantomData))
            }
        }
    )*};
}

object_only!(CallbackRequest, RequestDetail, ExtraInfo);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Approve,
    Reject,
    Wait,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "APPROVE",
            Action::Reject => "REJECT",
            Action::Wait => "WAIT",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed part of a response. Field order is part of the signed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub callback_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sino_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    /// Hex DER signature over the hex-encoded canonical `data` bytes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
}

impl CallbackResponse {
    pub fn error(status: &str, message: &str) -> Self {
        Self {
            status: status.to_string(),
            error: Some(message.to_string()),
            data: None,
            signature: String::new(),
        }
    }
}
