use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Actor name of the server's root actor.
pub const ROOT_ACTOR: &str = "root";

/// The unsolicited hello a debugger server sends when a client connects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Greeting {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<Value>,
}

impl Greeting {
    /// Greeting sent by the root actor of a server of `application_type`.
    pub fn root(application_type: impl Into<String>) -> Self {
        Self {
            from: ROOT_ACTOR.to_string(),
            application_type: Some(application_type.into()),
            traits: Some(Value::Object(Map::new())),
        }
    }
}

/// A request addressed to an actor: `{"to": ..., "type": ..., ...params}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorRequest {
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ActorRequest {
    pub fn new(to: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Add one request parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn actor_request_flattens_params() {
        let request = ActorRequest::new("tab1", "attach").param("options", json!({"a": 1}));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"to": "tab1", "type": "attach", "options": {"a": 1}})
        );
    }

    #[test]
    fn greeting_accepts_minimal_hello() {
        let greeting: Greeting = serde_json::from_str(r#"{"from":"root"}"#).unwrap();
        assert_eq!(greeting.from, ROOT_ACTOR);
        assert!(greeting.application_type.is_none());
    }

    #[test]
    fn root_greeting_shape() {
        assert_eq!(
            serde_json::to_value(Greeting::root("browser")).unwrap(),
            json!({"from": "root", "applicationType": "browser", "traits": {}})
        );
    }
}
