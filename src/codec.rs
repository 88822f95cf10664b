use std::collections::BTreeMap;

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};

use crate::{ContentType, Form, FormValue, HttpError, Payload, Result, Sink, StructuredSink};

/// Serializes a request payload under `content_type`.
///
/// Returns `Ok(None)` for an empty payload. Text and bytes pass through
/// untouched whatever the content type.
pub fn encode(content_type: &ContentType, payload: &Payload<'_>) -> Result<Option<Bytes>> {
    let encoded = match payload {
        Payload::Empty => return Ok(None),
        Payload::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
        Payload::Bytes(bytes) => bytes.clone(),
        Payload::Form(form) => match content_type {
            ContentType::Form => Bytes::from(form.encode()),
            ContentType::Json => Bytes::from(form_to_json(form)?),
            ContentType::Html | ContentType::Text | ContentType::Xml => {
                return Err(HttpError::InvalidType)
            }
            ContentType::Other(other) => return Err(HttpError::NotSupported(other.clone())),
        },
        Payload::Value(value) => match content_type {
            ContentType::Json => Bytes::from(value.to_json()?),
            ContentType::Xml => Bytes::from(value.to_xml()?),
            ContentType::Form => Bytes::from(value.to_form()?),
            ContentType::Html | ContentType::Text => return Err(HttpError::InvalidType),
            ContentType::Other(other) => return Err(HttpError::NotSupported(other.clone())),
        },
    };
    Ok(Some(encoded))
}

/// Every key maps to an array, whatever its value count.
fn form_to_json(form: &Form) -> Result<Vec<u8>> {
    let map: serde_json::Map<String, serde_json::Value> = form
        .iter()
        .map(|(key, value)| (key.to_owned(), serde_json::Value::from(value.values().to_vec())))
        .collect();
    serde_json::to_vec(&map).map_err(|err| HttpError::Encode(err.to_string()))
}

/// Decodes a response body into `sink`.
///
/// A [`Sink::Discard`] is a no-op even for an empty body; every other sink
/// rejects empty input with [`HttpError::NoData`]. Text and byte sinks take
/// the raw body; every other sink follows `content_type`. Form-shaped sinks
/// also accept JSON and XML objects.
pub fn decode(content_type: &ContentType, data: &[u8], sink: &mut Sink<'_>) -> Result<()> {
    if sink.is_discard() {
        return Ok(());
    }
    if data.is_empty() {
        return Err(HttpError::NoData);
    }

    match sink {
        Sink::Discard => Ok(()),
        Sink::Text(target) => {
            **target = utf8(data)?.to_owned();
            Ok(())
        }
        Sink::Bytes(target) => {
            **target = data.to_vec();
            Ok(())
        }
        Sink::Form(target) => {
            **target = match content_type {
                ContentType::Form => Form::parse(data),
                ContentType::Json => {
                    let mut fields = BTreeMap::<String, FormValue>::new();
                    fields.from_json(data)?;
                    Form::from(fields)
                }
                ContentType::Xml => {
                    let mut fields = BTreeMap::<String, String>::new();
                    fields.from_xml(utf8(data)?)?;
                    Form::from(fields)
                }
                other => return Err(HttpError::NotSupported(other.to_string())),
            };
            Ok(())
        }
        Sink::FormFirst(target) => match content_type {
            ContentType::Form => {
                **target = Form::parse(data).to_first_values();
                Ok(())
            }
            _ => structured(content_type, data, &mut **target),
        },
        Sink::FormDynamic(target) => {
            let fields = match content_type {
                ContentType::Form => Form::parse(data).to_first_values(),
                ContentType::Xml => {
                    let mut fields = BTreeMap::<String, String>::new();
                    fields.from_xml(utf8(data)?)?;
                    fields
                }
                _ => return structured(content_type, data, &mut **target),
            };
            **target = fields
                .into_iter()
                .map(|(key, value)| (key, serde_json::Value::String(value)))
                .collect();
            Ok(())
        }
        Sink::Value(target) => structured(content_type, data, &mut **target),
    }
}

fn structured(
    content_type: &ContentType,
    data: &[u8],
    target: &mut dyn StructuredSink,
) -> Result<()> {
    match content_type {
        ContentType::Json => target.from_json(data),
        ContentType::Xml => target.from_xml(utf8(data)?),
        ContentType::Form => target.from_form(data),
        other => Err(HttpError::NotSupported(other.to_string())),
    }
}

fn utf8(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data).map_err(|err| HttpError::Decode(format!("body is not utf-8: {err}")))
}

/// Picks the decode content type: the response header when present
/// (parameters stripped), else the type configured for the call.
pub fn resolve_content_type(headers: &HeaderMap, configured: &ContentType) -> ContentType {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(ContentType::from_header)
        .unwrap_or_else(|| configured.clone())
}
