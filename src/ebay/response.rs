//! Read access to Trading API response trees.
//!
//! Every leaf arrives wrapped as `{"value": <scalar>}` and every repeatable
//! group collapses to a bare object when it holds a single entry. [`Node`]
//! hides both quirks so callers can ask for text, decimals or a list of
//! entries without checking the shape themselves.

use crate::error::{SyncError, SyncResult};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct Response(Value);

impl Response {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn root(&self) -> Node<'_> {
        Node::new(&self.0)
    }

    pub fn ack(&self) -> Option<&str> {
        self.root().text_at(&["Ack"])
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.ack(), Some("Failure" | "PartialFailure"))
    }

    /// Every error message in the `Errors` block, long form preferred.
    pub fn error_messages(&self) -> Vec<String> {
        self.root()
            .items_at(&["Errors"])
            .into_iter()
            .filter_map(|error| {
                error
                    .text_at(&["LongMessage"])
                    .or_else(|| error.text_at(&["ShortMessage"]))
                    .map(str::to_string)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    value: &'a Value,
}

impl<'a> Node<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Child by key. A list is read through its first entry.
    pub fn child(&self, key: &str) -> Option<Node<'a>> {
        match self.value {
            Value::Object(map) => map.get(key).filter(|v| !v.is_null()).map(Node::new),
            Value::Array(items) => items.first().map(Node::new)?.child(key),
            _ => None,
        }
    }

    pub fn path(&self, keys: &[&str]) -> Option<Node<'a>> {
        keys.iter()
            .try_fold(*self, |node, key| node.child(key))
    }

    pub fn require(&self, keys: &[&str]) -> SyncResult<Node<'a>> {
        self.path(keys).ok_or_else(|| missing(keys))
    }

    pub fn text(&self) -> Option<&'a str> {
        match self.value {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("value").and_then(Value::as_str),
            Value::Array(items) => items.first().map(Node::new)?.text(),
            _ => None,
        }
    }

    pub fn text_at(&self, keys: &[&str]) -> Option<&'a str> {
        self.path(keys).and_then(|node| node.text())
    }

    pub fn required_text(&self, keys: &[&str]) -> SyncResult<&'a str> {
        self.text_at(keys).ok_or_else(|| missing(keys))
    }

    pub fn decimal_at(&self, keys: &[&str]) -> SyncResult<Option<Decimal>> {
        match self.text_at(keys).map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_decimal(raw, keys).map(Some),
            None => Ok(None),
        }
    }

    pub fn required_decimal(&self, keys: &[&str]) -> SyncResult<Decimal> {
        self.decimal_at(keys)?.ok_or_else(|| missing(keys))
    }

    /// Entries of a repeatable group: a bare object counts as one entry.
    pub fn items(&self) -> Vec<Node<'a>> {
        match self.value {
            Value::Array(items) => items.iter().map(Node::new).collect(),
            Value::Null => Vec::new(),
            other => vec![Node::new(other)],
        }
    }

    pub fn items_at(&self, keys: &[&str]) -> Vec<Node<'a>> {
        self.path(keys).map(|node| node.items()).unwrap_or_default()
    }
}

fn parse_decimal(raw: &str, keys: &[&str]) -> SyncResult<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| {
            SyncError::invalid_payload(
                "invalid_decimal",
                format!("{} is not a number: {raw}", keys.join(".")),
            )
        })
}

fn missing(keys: &[&str]) -> SyncError {
    SyncError::invalid_payload("missing_field", format!("missing {}", keys.join(".")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncErrorKind;
    use serde_json::json;

    #[test]
    fn reads_wrapped_leaves_and_attributes() {
        let response = Response::new(json!({
            "Ack": {"value": "Success"},
            "Total": {"value": "28.00", "currencyID": {"value": "USD"}},
        }));
        let root = response.root();
        assert_eq!(response.ack(), Some("Success"));
        assert_eq!(root.text_at(&["Total", "currencyID"]), Some("USD"));
        assert_eq!(
            root.required_decimal(&["Total"]).unwrap(),
            "28".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn items_normalizes_single_and_list_groups() {
        let single = json!({"Errors": {"LongMessage": {"value": "one"}}});
        let many = json!({"Errors": [
            {"LongMessage": {"value": "one"}},
            {"ShortMessage": {"value": "two"}},
        ]});
        assert_eq!(Node::new(&single).items_at(&["Errors"]).len(), 1);
        assert_eq!(
            Response::new(many).error_messages(),
            vec!["one".to_string(), "two".to_string()]
        );
        assert!(Node::new(&single).items_at(&["Missing"]).is_empty());
    }

    #[test]
    fn missing_and_malformed_fields_are_invalid_payload() {
        let value = json!({"Item": {"StartPrice": {"value": "ten"}}});
        let root = Node::new(&value);
        let err = root.required_text(&["Item", "Title"]).expect_err("missing");
        assert_eq!(err.kind(), SyncErrorKind::InvalidPayload);
        assert!(err.detail().contains("Item.Title"));
        let err = root
            .required_decimal(&["Item", "StartPrice"])
            .expect_err("not a number");
        assert_eq!(err.code(), "invalid_decimal");
    }

    #[test]
    fn float_strings_parse_as_decimals() {
        let value = json!({"Cost": {"value": "3.0"}, "Sci": {"value": "1e1"}, "Blank": {"value": ""}});
        let root = Node::new(&value);
        assert_eq!(root.required_decimal(&["Cost"]).unwrap(), "3".parse::<Decimal>().unwrap());
        assert_eq!(root.required_decimal(&["Sci"]).unwrap(), "10".parse::<Decimal>().unwrap());
        assert_eq!(root.decimal_at(&["Blank"]).unwrap(), None);
    }
}
