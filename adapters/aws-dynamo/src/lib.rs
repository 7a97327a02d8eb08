//! DynamoDB adapter implementing the `KeyValueStore` port.
//!
//! Production implementation backed by `aws-sdk-dynamodb`.
//! - Binds to a single table whose partition key is the string attribute `id`.
//! - Items are schemaless attribute maps: numeric fields are written in
//!   DynamoDB's decimal `N` encoding and decoded to `f64` on read, which is
//!   lossy for values outside `f64` precision.
//! - Provides `from_env()` wiring using the env var `DYNAMO_TABLE_NAME`;
//!   region and credentials come from the standard AWS environment.
//!
//! Notes:
//! - The domain `KeyValueStore` trait is synchronous. We bridge to the async AWS
//!   SDK using an internal `tokio::runtime::Runtime` and `block_on`.

use aws_sdk_dynamodb::{types::AttributeValue, Client};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use domain::{Item, KeyValueStore, ScanOptions, ScanPage, StoreError, ID_FIELD};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Store backed by AWS DynamoDB.
///
/// Supports both standalone mode (creates its own Tokio runtime) and
/// in-runtime mode (reuses the existing runtime via `Handle::current()`).
#[derive(Clone)]
pub struct DynamoStore {
    table_name: String,
    client: Client,
    // Optional runtime - None when already inside a Tokio runtime
    rt: Option<std::sync::Arc<tokio::runtime::Runtime>>,
}

impl DynamoStore {
    /// Create a new store from an explicit table name and an AWS SDK client.
    ///
    /// If called from within a Tokio runtime, reuses the existing runtime.
    /// Otherwise creates a new runtime.
    pub fn with_client(client: Client, table_name: impl Into<String>) -> Result<Self, StoreError> {
        let rt = Self::maybe_create_runtime()?;
        Ok(Self {
            table_name: table_name.into(),
            client,
            rt,
        })
    }

    /// Construct with a table name but create a default AWS SDK client using
    /// the standard environment (region, credential pair, IMDS).
    pub fn new(table_name: impl Into<String>) -> Result<Self, StoreError> {
        let rt = Self::maybe_create_runtime()?;
        let conf = Self::block_on_with_rt(&rt, aws_config::load_from_env());
        let client = Client::new(&conf);
        Ok(Self {
            table_name: table_name.into(),
            client,
            rt,
        })
    }

    /// Construct from environment variables:
    /// - `DYNAMO_TABLE_NAME`
    pub fn from_env() -> Result<Self, StoreError> {
        let table_name = std::env::var("DYNAMO_TABLE_NAME")
            .map_err(|_| StoreError::Backend("missing DYNAMO_TABLE_NAME".into()))?;
        Self::new(table_name)
    }

    /// The bound table name, fixed at construction.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Check if we're inside a Tokio runtime. If yes, return None (reuse existing).
    /// If no, create a new runtime.
    fn maybe_create_runtime() -> Result<Option<std::sync::Arc<tokio::runtime::Runtime>>, StoreError>
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            // Already inside a runtime - don't create another
            Ok(None)
        } else {
            // Standalone mode - create our own runtime
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .map_err(|e| StoreError::Backend(format!("tokio runtime init: {e}")))?;
            Ok(Some(std::sync::Arc::new(rt)))
        }
    }

    /// Run an async future, using either our owned runtime or the current runtime.
    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        Self::block_on_with_rt(&self.rt, fut)
    }

    fn block_on_with_rt<F: std::future::Future>(
        rt: &Option<std::sync::Arc<tokio::runtime::Runtime>>,
        fut: F,
    ) -> F::Output {
        match rt {
            Some(rt) => rt.block_on(fut),
            None => {
                // We're inside an existing runtime - use block_in_place + Handle::current()
                tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
            }
        }
    }
}

impl KeyValueStore for DynamoStore {
    fn get(&self, key: &str) -> Result<Option<Item>, StoreError> {
        let table = self.table_name.clone();
        let key_id = key.to_string();
        let fut = async {
            self.client
                .get_item()
                .table_name(table)
                .key(ID_FIELD, AttributeValue::S(key_id))
                .send()
                .await
        };
        let out = self.block_on(fut).map_err(map_sdk_err)?;
        match out.item() {
            Some(attrs) => Ok(Some(attrs_to_item(attrs)?)),
            None => Ok(None),
        }
    }

    fn put(&self, item: Item) -> Result<(), StoreError> {
        if item.id().is_none() {
            return Err(StoreError::MissingId);
        }
        // Unconditional put: overwriting an existing key is the contract.
        let table = self.table_name.clone();
        let attrs = item_to_attrs(&item)?;
        let fut = async {
            self.client
                .put_item()
                .table_name(table)
                .set_item(Some(attrs))
                .send()
                .await
        };
        self.block_on(fut).map_err(map_sdk_err)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        // No condition expression: deleting an absent key succeeds.
        let table = self.table_name.clone();
        let key_id = key.to_string();
        let fut = async {
            self.client
                .delete_item()
                .table_name(table)
                .key(ID_FIELD, AttributeValue::S(key_id))
                .send()
                .await
        };
        self.block_on(fut).map_err(map_sdk_err)?;
        Ok(())
    }

    fn scan(&self, options: ScanOptions) -> Result<ScanPage, StoreError> {
        let table = self.table_name.clone();
        // Expression values are converted up front so a bad value fails
        // before the request is sent.
        let expr_values = options
            .expression_attribute_values
            .iter()
            .map(|(k, v)| Ok((k.clone(), value_to_attr(v)?)))
            .collect::<Result<HashMap<String, AttributeValue>, StoreError>>()?;

        let fut = async {
            let mut req = self.client.scan().table_name(table);
            if let Some(limit) = options.limit {
                req = req.limit(limit);
            }
            if let Some(start) = options.exclusive_start_key {
                req = req.exclusive_start_key(ID_FIELD, AttributeValue::S(start));
            }
            if let Some(expr) = options.filter_expression {
                req = req.filter_expression(expr);
            }
            for (k, v) in options.expression_attribute_names {
                req = req.expression_attribute_names(k, v);
            }
            for (k, v) in expr_values {
                req = req.expression_attribute_values(k, v);
            }
            if options.consistent_read {
                req = req.consistent_read(true);
            }
            req.send().await
        };
        let out = self.block_on(fut).map_err(map_sdk_err)?;

        let items = out
            .items()
            .iter()
            .map(attrs_to_item)
            .collect::<Result<Vec<_>, _>>()?;
        let last_evaluated_key = out
            .last_evaluated_key()
            .and_then(|k| k.get(ID_FIELD))
            .and_then(|v| v.as_s().ok())
            .cloned();

        Ok(ScanPage {
            items,
            count: out.count().max(0) as usize,
            scanned_count: out.scanned_count().max(0) as usize,
            last_evaluated_key,
        })
    }
}

fn map_sdk_err<E: ProvideErrorMetadata + std::fmt::Display>(e: E) -> StoreError {
    if let Some(code) = e.code() {
        if code == "ResourceNotFoundException" {
            return StoreError::Backend("missing table".into());
        }
    }
    StoreError::Backend(format!("dynamo error: {e}"))
}

fn item_to_attrs(item: &Item) -> Result<HashMap<String, AttributeValue>, StoreError> {
    item.fields()
        .iter()
        .map(|(k, v)| Ok((k.clone(), value_to_attr(v)?)))
        .collect()
}

fn attrs_to_item(attrs: &HashMap<String, AttributeValue>) -> Result<Item, StoreError> {
    let mut fields = Map::new();
    for (k, v) in attrs {
        fields.insert(k.clone(), attr_to_value(v)?);
    }
    Ok(Item::from_fields(fields))
}

fn value_to_attr(value: &Value) -> Result<AttributeValue, StoreError> {
    Ok(match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        // DynamoDB numbers are decimal strings; serde_json prints the
        // shortest decimal that round-trips the stored value.
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(
            items
                .iter()
                .map(value_to_attr)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), value_to_attr(v)?)))
                .collect::<Result<HashMap<_, _>, StoreError>>()?,
        ),
    })
}

fn attr_to_value(attr: &AttributeValue) -> Result<Value, StoreError> {
    match attr {
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::L(items) => items
            .iter()
            .map(attr_to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(attrs) => {
            let mut fields = Map::new();
            for (k, v) in attrs {
                fields.insert(k.clone(), attr_to_value(v)?);
            }
            Ok(Value::Object(fields))
        }
        // Sets written by other clients decode to plain lists.
        AttributeValue::Ss(values) => Ok(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(|n| parse_number(n))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(StoreError::InvalidItem(format!(
            "unsupported attribute type: {other:?}"
        ))),
    }
}

/// Decode a DynamoDB `N` attribute. Reads come back as `f64`, so values
/// beyond `f64` precision do not round-trip exactly.
fn parse_number(text: &str) -> Result<Value, StoreError> {
    let parsed: f64 = text
        .parse()
        .map_err(|_| StoreError::InvalidItem(format!("bad numeric attribute: {text}")))?;
    Number::from_f64(parsed)
        .map(Value::Number)
        .ok_or_else(|| StoreError::InvalidItem(format!("non-finite numeric attribute: {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_item() -> Item {
        Item::try_from(json!({
            "id": "u1",
            "balance": 10.5,
            "visits": 3,
            "active": true,
            "nickname": null,
            "tags": ["a", "b"],
            "address": {"city": "Oslo", "zip": "0150"},
        }))
        .expect("object literal")
    }

    #[test]
    fn roundtrip_attrs_mapping() {
        let item = sample_item();
        let attrs = item_to_attrs(&item).expect("encode");
        let back = attrs_to_item(&attrs).expect("decode");
        assert_eq!(back, item.normalized());
    }

    #[test]
    fn numbers_use_decimal_encoding() {
        assert!(matches!(
            value_to_attr(&json!(10.5)).expect("encode"),
            AttributeValue::N(n) if n == "10.5"
        ));
        assert!(matches!(
            value_to_attr(&json!(42)).expect("encode"),
            AttributeValue::N(n) if n == "42"
        ));
    }

    #[test]
    fn numeric_reads_come_back_as_floats() {
        let v = attr_to_value(&AttributeValue::N("42".into())).expect("decode");
        assert_eq!(v, json!(42.0));
        let v = attr_to_value(&AttributeValue::N("10.5".into())).expect("decode");
        assert_eq!(v, json!(10.5));
    }

    #[test]
    fn numeric_precision_boundary_is_lossy() {
        // 2^53 + 1 is not representable as f64; the read rounds it.
        let v = attr_to_value(&AttributeValue::N("9007199254740993".into())).expect("decode");
        assert_eq!(v, json!(9007199254740992.0));
    }

    #[test]
    fn bad_numeric_attribute_is_rejected() {
        let err = attr_to_value(&AttributeValue::N("not-a-number".into())).unwrap_err();
        assert!(matches!(err, StoreError::InvalidItem(_)));
    }

    #[test]
    fn sets_decode_to_lists() {
        let v = attr_to_value(&AttributeValue::Ss(vec!["x".into(), "y".into()])).expect("decode");
        assert_eq!(v, json!(["x", "y"]));
        let v = attr_to_value(&AttributeValue::Ns(vec!["1".into(), "2.5".into()]))
            .expect("decode");
        assert_eq!(v, json!([1.0, 2.5]));
    }

    #[test]
    fn binary_attributes_are_rejected() {
        let blob = aws_smithy_types::Blob::new(vec![1u8, 2, 3]);
        let err = attr_to_value(&AttributeValue::B(blob)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidItem(_)));
    }
}
