//! Request and response framing for the tRPC endpoints.
//!
//! Every tRPC call is a `GET /api/trpc/<procedure>?input=<json>` whose answer is wrapped in
//! `{ result: { data: { json: ... } } }`.
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::form_urlencoded::byte_serialize;

#[derive(Debug, Deserialize)]
pub(crate) struct TrpcEnvelope<T> {
    pub result: TrpcResult<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrpcResult<T> {
    pub data: TrpcData<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrpcData<T> {
    pub json: T,
}

impl<T> TrpcEnvelope<T> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.result.data.json
    }
}

/// Full URL for a tRPC query.
pub(crate) fn query_url(base_url: &str, procedure: &str, input: &Value) -> String {
    let encoded: String = byte_serialize(input.to_string().as_bytes()).collect();
    format!("{base_url}/api/trpc/{procedure}?input={encoded}")
}

/// Full URL for a tRPC mutation (the input goes in the body).
#[inline]
pub(crate) fn mutation_url(base_url: &str, procedure: &str) -> String {
    format!("{base_url}/api/trpc/{procedure}")
}

/// Wraps `fields` as an authed tRPC input.
pub(crate) fn input(fields: Value) -> Value {
    let mut fields = into_map(fields);
    fields.insert("authed".to_string(), Value::Bool(true));
    json!({ "json": fields })
}

/// Wraps `fields` as the input of a cursor-paged query.
///
/// The first page sends `cursor: null`; tRPC then needs every `null` field flagged as `undefined`
/// in `meta.values`, otherwise it rejects the input.
pub(crate) fn cursor_input(fields: Value, cursor: Option<&str>) -> Value {
    let mut fields = into_map(fields);
    fields.insert(
        "cursor".to_string(),
        cursor.map_or(Value::Null, |c| Value::String(c.to_string())),
    );
    fields.insert("authed".to_string(), Value::Bool(true));

    let undefined: Map<String, Value> = fields
        .iter()
        .filter(|(_, value)| value.is_null())
        .map(|(key, _)| (key.clone(), json!(["undefined"])))
        .collect();

    if undefined.is_empty() {
        json!({ "json": fields })
    } else {
        json!({ "json": fields, "meta": { "values": undefined } })
    }
}

fn into_map(fields: Value) -> Map<String, Value> {
    match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_page_flags_null_fields() {
        let input = cursor_input(json!({ "postId": 12, "browsingLevel": null }), None);

        assert_eq!(input["json"]["postId"], 12);
        assert_eq!(input["json"]["cursor"], Value::Null);
        assert_eq!(input["json"]["authed"], true);
        assert_eq!(input["meta"]["values"]["cursor"], json!(["undefined"]));
        assert_eq!(input["meta"]["values"]["browsingLevel"], json!(["undefined"]));
    }

    #[test]
    fn continuation_pages_carry_the_cursor() {
        let input = cursor_input(json!({ "username": "someone" }), Some("abc|123"));

        assert_eq!(input["json"]["cursor"], "abc|123");
        assert!(input.get("meta").is_none());
    }

    #[test]
    fn query_urls_encode_the_input() {
        let url = query_url(
            "https://civitai.com",
            "image.get",
            &input(json!({ "id": 5 })),
        );

        assert!(url.starts_with("https://civitai.com/api/trpc/image.get?input="));
        assert!(!url.contains('{'));
        assert!(url.contains("%22id%22%3A5"));
    }

    #[test]
    fn envelopes_unwrap_to_the_payload() {
        let body = r#"{"result":{"data":{"json":{"value":1.5}}}}"#;
        let envelope: TrpcEnvelope<Value> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.into_inner()["value"], 1.5);
    }
}
