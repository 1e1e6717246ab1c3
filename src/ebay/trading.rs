use crate::ebay::config::{COMPATIBILITY_LEVEL, XML_NAMESPACE, endpoint};
use crate::ebay::response::Response;
use crate::http::build_client;
use crate::models::Account;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use reqwest::Client;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TradingError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("cannot encode request: {0}")]
    Encode(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("{call} rejected: {}", .messages.join(", "))]
    Rejected { call: String, messages: Vec<String> },
}

/// One call against the eBay Trading API.
///
/// `params` is the request body as a JSON tree: objects become nested
/// elements, arrays become repeated elements of the same name.
#[allow(async_fn_in_trait)]
pub trait TradingApi {
    async fn execute(&self, call: &str, params: Value) -> Result<Response, TradingError>;
}

#[derive(Debug, Clone)]
pub struct TradingClient {
    http: Client,
    endpoint: String,
    app_id: String,
    dev_id: String,
    cert_id: String,
    token: String,
    site_id: u32,
}

impl TradingClient {
    pub fn for_account(account: &Account) -> Self {
        Self {
            http: build_client(),
            endpoint: endpoint(account.sandbox).to_string(),
            app_id: account.app_id.clone(),
            dev_id: account.dev_id.clone(),
            cert_id: account.cert_id.clone(),
            token: account.token.clone(),
            site_id: account.site_id,
        }
    }
}

impl TradingApi for TradingClient {
    async fn execute(&self, call: &str, params: Value) -> Result<Response, TradingError> {
        crate::metrics::remote_call(call);
        let body = encode_request(call, &self.token, &params)?;
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml")
            .header("X-EBAY-API-CALL-NAME", call)
            .header("X-EBAY-API-SITEID", self.site_id.to_string())
            .header("X-EBAY-API-COMPATIBILITY-LEVEL", COMPATIBILITY_LEVEL.as_str())
            .header("X-EBAY-API-APP-NAME", &self.app_id)
            .header("X-EBAY-API-DEV-NAME", &self.dev_id)
            .header("X-EBAY-API-CERT-NAME", &self.cert_id)
            .body(body)
            .send()
            .await
            .map_err(|err| TradingError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(TradingError::Status(response.status().as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|err| TradingError::Decode(err.to_string()))?;
        let decoded = Response::new(decode_response(&text)?);
        debug!(target = "ebay_sync.trading", call, ack = ?decoded.ack(), "trading_call_done");

        if decoded.is_failure() {
            let messages = decoded.error_messages();
            warn!(target = "ebay_sync.trading", call, errors = ?messages, "trading_call_failed");
            return Err(TradingError::Rejected {
                call: call.to_string(),
                messages,
            });
        }
        Ok(decoded)
    }
}

/// Renders a Trading request document. The auth token always travels in
/// `RequesterCredentials`; `params` follow in map order.
pub fn encode_request(call: &str, token: &str, params: &Value) -> Result<String, TradingError> {
    let mut writer = Writer::new(Vec::new());
    let root = format!("{call}Request");
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    let start = BytesStart::new(root.as_str()).with_attributes([("xmlns", XML_NAMESPACE)]);
    emit(&mut writer, Event::Start(start))?;
    emit(&mut writer, Event::Start(BytesStart::new("RequesterCredentials")))?;
    write_text(&mut writer, "eBayAuthToken", token)?;
    emit(&mut writer, Event::End(BytesEnd::new("RequesterCredentials")))?;
    if let Value::Object(map) = params {
        for (name, value) in map {
            write_element(&mut writer, name, value)?;
        }
    }
    emit(&mut writer, Event::End(BytesEnd::new(root.as_str())))?;
    String::from_utf8(writer.into_inner()).map_err(|err| TradingError::Encode(err.to_string()))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), TradingError> {
    writer
        .write_event(event)
        .map_err(|err| TradingError::Encode(err.to_string()))
}

fn write_text(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), TradingError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: &Value,
) -> Result<(), TradingError> {
    match value {
        Value::Null => Ok(()),
        Value::Array(items) => items
            .iter()
            .try_for_each(|item| write_element(writer, name, item)),
        Value::Object(map) => {
            emit(writer, Event::Start(BytesStart::new(name)))?;
            for (child, value) in map {
                write_element(writer, child, value)?;
            }
            emit(writer, Event::End(BytesEnd::new(name)))
        }
        Value::String(s) => write_text(writer, name, s),
        Value::Bool(b) => write_text(writer, name, &b.to_string()),
        Value::Number(n) => write_text(writer, name, &n.to_string()),
    }
}

struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, TradingError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| TradingError::Decode(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            if key == "xmlns" {
                continue;
            }
            let value = attr
                .unescape_value()
                .map_err(|err| TradingError::Decode(err.to_string()))?;
            fields.insert(key, wrap(value.into_owned()));
        }
        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let Frame {
            name,
            mut fields,
            text,
        } = self;
        if fields.is_empty() || !text.is_empty() {
            fields.insert("value".into(), Value::String(text));
        }
        (name, Value::Object(fields))
    }
}

fn wrap(text: String) -> Value {
    let mut map = Map::new();
    map.insert("value".into(), Value::String(text));
    Value::Object(map)
}

fn attach(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.insert(name, value);
        }
    }
}

fn set_root(root: &mut Option<Value>, value: Value) -> Result<(), TradingError> {
    if root.is_some() {
        return Err(TradingError::Decode("content after the root element".into()));
    }
    *root = Some(value);
    Ok(())
}

/// Decodes a Trading API XML document into the `{value: ..}` tree shape.
/// The root element is unwrapped, so `Ack` and friends sit at the top.
pub fn decode_response(xml: &str) -> Result<Value, TradingError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Frame::open(&e)?),
            Ok(Event::Empty(e)) => {
                let (name, value) = Frame::open(&e)?.close();
                match stack.last_mut() {
                    Some(parent) => attach(&mut parent.fields, name, value),
                    None => set_root(&mut root, value)?,
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| TradingError::Decode(err.to_string()))?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame
                        .text
                        .push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| TradingError::Decode("unbalanced end tag".into()))?;
                let (name, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => attach(&mut parent.fields, name, value),
                    None => set_root(&mut root, value)?,
                }
            }
            Ok(Event::Eof) if stack.is_empty() => break,
            Ok(Event::Eof) => {
                return Err(TradingError::Decode(format!(
                    "unclosed element {}",
                    stack.last().map(|f| f.name.as_str()).unwrap_or_default()
                )));
            }
            Err(err) => return Err(TradingError::Decode(err.to_string())),
            _ => {}
        }
    }

    match root {
        Some(Value::Object(mut map)) => {
            map.remove("value");
            Ok(Value::Object(map))
        }
        _ => Err(TradingError::Decode("empty document".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_nested_and_repeated_params() {
        let xml = encode_request(
            "ReviseInventoryStatus",
            "tok&en",
            &json!({
                "InventoryStatus": [
                    {"ItemID": "1", "Quantity": "3"},
                    {"ItemID": "2", "Quantity": "0"},
                ],
            }),
        )
        .unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?><ReviseInventoryStatusRequest xmlns="urn:ebay:apis:eBLBaseComponents">"#));
        assert!(xml.contains("<eBayAuthToken>tok&amp;en</eBayAuthToken>"));
        assert!(xml.contains(
            "<InventoryStatus><ItemID>1</ItemID><Quantity>3</Quantity></InventoryStatus><InventoryStatus><ItemID>2</ItemID><Quantity>0</Quantity></InventoryStatus>"
        ));
        assert!(xml.ends_with("</ReviseInventoryStatusRequest>"));
    }

    #[test]
    fn decodes_into_wrapped_tree() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<GetOrdersResponse xmlns="urn:ebay:apis:eBLBaseComponents">
  <Ack>Success</Ack>
  <OrderArray>
    <Order>
      <OrderID>865826-1</OrderID>
      <Total currencyID="USD">28.0</Total>
      <TransactionArray>
        <Transaction><TransactionPrice currencyID="USD">10.0</TransactionPrice></Transaction>
        <Transaction><TransactionPrice currencyID="USD">5.0</TransactionPrice></Transaction>
      </TransactionArray>
      <Description><![CDATA[<b>bold</b>]]></Description>
      <Empty/>
    </Order>
  </OrderArray>
</GetOrdersResponse>"#;
        let value = decode_response(xml).unwrap();
        assert_eq!(value["Ack"], json!({"value": "Success"}));
        let order = &value["OrderArray"]["Order"];
        assert_eq!(order["OrderID"], json!({"value": "865826-1"}));
        assert_eq!(
            order["Total"],
            json!({"value": "28.0", "currencyID": {"value": "USD"}})
        );
        assert_eq!(
            order["TransactionArray"]["Transaction"]
                .as_array()
                .map(Vec::len),
            Some(2)
        );
        assert_eq!(order["Description"], json!({"value": "<b>bold</b>"}));
        assert_eq!(order["Empty"], json!({"value": ""}));
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_response("").is_err());
        assert!(decode_response("<a><b></a>").is_err());
    }

    #[test]
    fn rejects_unclosed_or_trailing_elements() {
        assert!(decode_response("<a></a><b>").is_err());
        assert!(decode_response("<a></a><b></b>").is_err());
        assert!(decode_response("<a><b></b>").is_err());
        assert!(decode_response("<a><b/></a>").is_ok());
    }
}
