//! Encode inputs and decode destinations.
//!
//! Raw text and bytes bypass content-type serialization on both sides;
//! structured values go through serde for JSON, XML and form bodies.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::{Form, HttpError, Result};

/// A value that can be serialized under any structured content type.
pub trait StructuredPayload {
    fn to_json(&self) -> Result<Vec<u8>>;
    fn to_xml(&self) -> Result<String>;
    fn to_form(&self) -> Result<String>;
}

impl<T: Serialize> StructuredPayload for T {
    fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| HttpError::Encode(err.to_string()))
    }

    fn to_xml(&self) -> Result<String> {
        quick_xml::se::to_string(self).map_err(|err| HttpError::Encode(err.to_string()))
    }

    fn to_form(&self) -> Result<String> {
        serde_urlencoded::to_string(self).map_err(|err| HttpError::Encode(err.to_string()))
    }
}

/// A destination that structured response bodies deserialize into.
pub trait StructuredSink {
    fn from_json(&mut self, data: &[u8]) -> Result<()>;
    fn from_xml(&mut self, data: &str) -> Result<()>;
    fn from_form(&mut self, data: &[u8]) -> Result<()>;
}

impl<T: DeserializeOwned> StructuredSink for T {
    fn from_json(&mut self, data: &[u8]) -> Result<()> {
        *self = serde_json::from_slice(data).map_err(|err| HttpError::Decode(err.to_string()))?;
        Ok(())
    }

    fn from_xml(&mut self, data: &str) -> Result<()> {
        *self = quick_xml::de::from_str(data).map_err(|err| HttpError::Decode(err.to_string()))?;
        Ok(())
    }

    fn from_form(&mut self, data: &[u8]) -> Result<()> {
        *self =
            serde_urlencoded::from_bytes(data).map_err(|err| HttpError::Decode(err.to_string()))?;
        Ok(())
    }
}

/// Request body before encoding.
#[derive(Default)]
pub enum Payload<'a> {
    /// No body.
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Form(Form),
    /// Any serde value, serialized by the configured content type.
    Value(&'a (dyn StructuredPayload + Sync)),
}

impl<'a> Payload<'a> {
    pub fn value<T: Serialize + Sync>(value: &'a T) -> Self {
        Self::Value(value)
    }
}

impl From<String> for Payload<'_> {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Payload<'_> {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for Payload<'_> {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<Bytes> for Payload<'_> {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Form> for Payload<'_> {
    fn from(value: Form) -> Self {
        Self::Form(value)
    }
}

/// Where a successful response body goes.
#[derive(Default)]
pub enum Sink<'a> {
    /// Leave the body on the response, unparsed.
    #[default]
    Discard,
    /// Raw body as UTF-8 text.
    Text(&'a mut String),
    /// Raw body bytes.
    Bytes(&'a mut Vec<u8>),
    /// Every value of repeated keys. Also fills from JSON objects of strings
    /// or string arrays, and from flat XML elements.
    Form(&'a mut Form),
    /// String map, one value per key. For form bodies the first value of a
    /// repeated key wins; JSON and XML objects decode directly.
    FormFirst(&'a mut BTreeMap<String, String>),
    /// Dynamic map. Form and XML bodies give string values (first value wins
    /// for forms); JSON objects keep their value types.
    FormDynamic(&'a mut serde_json::Map<String, serde_json::Value>),
    /// Any serde value, deserialized by the resolved content type.
    Value(&'a mut (dyn StructuredSink + Send)),
}

impl<'a> Sink<'a> {
    pub fn value<T: DeserializeOwned + Send>(target: &'a mut T) -> Self {
        Self::Value(target)
    }

    pub fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }
}

impl<'a> From<&'a mut String> for Sink<'a> {
    fn from(target: &'a mut String) -> Self {
        Self::Text(target)
    }
}

impl<'a> From<&'a mut Vec<u8>> for Sink<'a> {
    fn from(target: &'a mut Vec<u8>) -> Self {
        Self::Bytes(target)
    }
}

impl<'a> From<&'a mut Form> for Sink<'a> {
    fn from(target: &'a mut Form) -> Self {
        Self::Form(target)
    }
}

impl<'a> From<&'a mut BTreeMap<String, String>> for Sink<'a> {
    fn from(target: &'a mut BTreeMap<String, String>) -> Self {
        Self::FormFirst(target)
    }
}
