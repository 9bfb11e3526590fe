//! Oracle Response Parsing and Validation
//!
//! Turns the oracle's free text into a validated [`OracleResponse`]. Parsing runs
//! in two stages so each can be tested on its own:
//!
//! 1. [`extract_payload`] strips code fences (nested ones too) and surrounding prose.
//! 2. [`parse_oracle_response`] checks the JSON structure and builds typed values.
//!
//! Only structural problems are rejected: a missing `action`, a missing or unknown
//! `actionType`, or a scroll without a usable `direction` and `distance`. Unknown
//! fields are ignored and cosmetic fields fall back to defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why an oracle response was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseErrorKind {
    /// Payload is not well-formed JSON
    JsonSyntax,

    /// Required field is absent
    MissingField,

    /// Field present with an unusable value
    InvalidValue,

    /// JSON is well-formed but has the wrong shape
    InvalidStructure,
}

/// A rejected oracle response, with the offending field
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ResponseError {
    pub kind: ResponseErrorKind,

    pub message: String,

    /// Field path, e.g. "action.direction" (empty for whole-payload errors)
    pub field_path: String,
}

impl ResponseError {
    fn new(kind: ResponseErrorKind, field_path: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_path: field_path.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub const ALL: [ScrollDirection; 4] = [
        ScrollDirection::Up,
        ScrollDirection::Down,
        ScrollDirection::Left,
        ScrollDirection::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            "left" => Some(ScrollDirection::Left),
            "right" => Some(ScrollDirection::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDistance {
    Little,
    Medium,
    Far,
}

impl ScrollDistance {
    pub const ALL: [ScrollDistance; 3] = [
        ScrollDistance::Little,
        ScrollDistance::Medium,
        ScrollDistance::Far,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDistance::Little => "little",
            ScrollDistance::Medium => "medium",
            ScrollDistance::Far => "far",
        }
    }

    /// Share of the viewport dimension covered by one scroll
    pub fn viewport_fraction(&self) -> f64 {
        match self {
            ScrollDistance::Little => 0.25,
            ScrollDistance::Medium => 0.5,
            ScrollDistance::Far => 1.0,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "little" => Some(ScrollDistance::Little),
            "medium" => Some(ScrollDistance::Medium),
            "far" => Some(ScrollDistance::Far),
            _ => None,
        }
    }
}

/// What to do. A scroll always carries its direction and distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "actionType", rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Scroll {
        direction: ScrollDirection,
        distance: ScrollDistance,
    },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Scroll { .. } => "scroll",
        }
    }
}

/// A validated single browser interaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    #[serde(flatten)]
    pub kind: ActionKind,

    /// Registry index of the target element. Kept signed so an out-of-range
    /// reference from the oracle survives until resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_ref: Option<i64>,

    /// Horizontal position in percent of the viewport width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,

    /// Vertical position in percent of the viewport height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl ActionDescriptor {
    pub fn click_element(index: i64) -> Self {
        Self {
            kind: ActionKind::Click,
            element_ref: Some(index),
            x: None,
            y: None,
        }
    }

    pub fn click_at_percent(x: f64, y: f64) -> Self {
        Self {
            kind: ActionKind::Click,
            element_ref: None,
            x: Some(x),
            y: Some(y),
        }
    }

    pub fn scroll(direction: ScrollDirection, distance: ScrollDistance) -> Self {
        Self {
            kind: ActionKind::Scroll {
                direction,
                distance,
            },
            element_ref: None,
            x: None,
            y: None,
        }
    }
}

/// The oracle's verdict for one step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleResponse {
    pub description: String,
    pub action: ActionDescriptor,
    pub expectation: String,
    pub previous_expectation_satisfied: bool,
    pub achieved: bool,
    pub goal: String,
    pub frustration_level: Option<u8>,
    pub frustration_reason: String,
}

/// Strip code fences and surrounding prose, returning the JSON candidate
pub fn extract_payload(raw: &str) -> &str {
    let mut text = raw.trim();

    // Peel fenced blocks wherever they sit; prose outside the outermost fence is dropped
    while let Some(body) = fenced_body(text) {
        if body == text {
            break;
        }
        text = body;
    }

    first_json_object(text).unwrap_or(text)
}

/// Body of the first fenced block, without its info string
fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    let tag_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let body = &rest[tag_len..];
    let body = match body.rfind("```") {
        Some(close) => &body[..close],
        None => body,
    };
    Some(body.trim())
}

/// First `{` that starts a complete JSON object, sliced to the object's end
fn first_json_object(text: &str) -> Option<&str> {
    text.match_indices('{').find_map(|(start, _)| {
        let candidate = &text[start..];
        let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(_))) => Some(&candidate[..stream.byte_offset()]),
            _ => None,
        }
    })
}

/// Parse and validate raw oracle text
pub fn parse_oracle_response(raw: &str) -> Result<OracleResponse, ResponseError> {
    let payload = extract_payload(raw);

    let value: Value = serde_json::from_str(payload).map_err(|e| {
        ResponseError::new(
            ResponseErrorKind::JsonSyntax,
            "",
            format!(
                "Oracle response is not valid JSON (line {}, column {}): {}",
                e.line(),
                e.column(),
                e
            ),
        )
    })?;

    let object = value.as_object().ok_or_else(|| {
        ResponseError::new(
            ResponseErrorKind::InvalidStructure,
            "",
            "Oracle response must be a JSON object",
        )
    })?;

    let action = match object.get("action") {
        None | Some(Value::Null) => {
            return Err(ResponseError::new(
                ResponseErrorKind::MissingField,
                "action",
                "Oracle response has no 'action'",
            ))
        }
        Some(Value::Object(action)) => parse_action(action)?,
        Some(_) => {
            return Err(ResponseError::new(
                ResponseErrorKind::InvalidStructure,
                "action",
                "'action' must be an object",
            ))
        }
    };

    let frustration_level = lenient_number(object.get("frustrationLevel")).map(|level| {
        let clamped = level.round().clamp(1.0, 10.0);
        if clamped != level {
            log::warn!("frustrationLevel {} outside 1-10, using {}", level, clamped);
        }
        clamped as u8
    });

    Ok(OracleResponse {
        description: lenient_string(object, &["description"]),
        action,
        expectation: lenient_string(object, &["expectation"]),
        previous_expectation_satisfied: lenient_bool(
            object,
            &["previousExpectationSatisfied", "expectationSatisfied"],
        ),
        achieved: lenient_bool(object, &["achieved"]),
        goal: lenient_string(object, &["goal"]),
        frustration_level,
        frustration_reason: lenient_string(object, &["frustrationReason", "frustrationLevelReason"]),
    })
}

fn parse_action(action: &Map<String, Value>) -> Result<ActionDescriptor, ResponseError> {
    let action_type = match action.get("actionType") {
        None | Some(Value::Null) => {
            return Err(ResponseError::new(
                ResponseErrorKind::MissingField,
                "action.actionType",
                "Action has no 'actionType'",
            ))
        }
        Some(Value::String(action_type)) => action_type.trim().to_ascii_lowercase(),
        Some(other) => {
            return Err(ResponseError::new(
                ResponseErrorKind::InvalidValue,
                "action.actionType",
                format!("'actionType' must be a string, got {}", other),
            ))
        }
    };

    let kind = match action_type.as_str() {
        "click" => ActionKind::Click,
        "scroll" => ActionKind::Scroll {
            direction: required_enum(action, "direction", ScrollDirection::parse)?,
            distance: required_enum(action, "distance", ScrollDistance::parse)?,
        },
        other => {
            return Err(ResponseError::new(
                ResponseErrorKind::InvalidValue,
                "action.actionType",
                format!("Unknown actionType '{}' (expected click or scroll)", other),
            ))
        }
    };

    let element_ref = ["elementRef", "elementNumber", "elementIndex"]
        .iter()
        .find_map(|key| action.get(*key))
        .and_then(|value| {
            let index = lenient_number(Some(value)).filter(|n| n.fract() == 0.0);
            if index.is_none() && !value.is_null() {
                log::warn!("Ignoring non-integer element reference {}", value);
            }
            index.map(|n| n as i64)
        });

    Ok(ActionDescriptor {
        kind,
        element_ref,
        x: lenient_number(action.get("x")),
        y: lenient_number(action.get("y")),
    })
}

fn required_enum<T>(
    action: &Map<String, Value>,
    field: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, ResponseError> {
    let field_path = format!("action.{}", field);
    match action.get(field) {
        None | Some(Value::Null) => Err(ResponseError::new(
            ResponseErrorKind::MissingField,
            &field_path,
            format!("Scroll action has no '{}'", field),
        )),
        Some(Value::String(text)) => parse(text).ok_or_else(|| {
            ResponseError::new(
                ResponseErrorKind::InvalidValue,
                &field_path,
                format!("Invalid scroll {} '{}'", field, text),
            )
        }),
        Some(other) => Err(ResponseError::new(
            ResponseErrorKind::InvalidValue,
            &field_path,
            format!("Scroll {} must be a string, got {}", field, other),
        )),
    }
}

/// Numbers, numeric strings and percentages ("50%") are all accepted
fn lenient_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_string(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| object.get(*key))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

fn lenient_bool(object: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .find_map(|key| object.get(*key))
        .map(|value| match value {
            Value::Bool(b) => *b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLICK_RESPONSE: &str = r#"{
        "description": "Click the search button",
        "action": {"actionType": "click", "elementNumber": 3},
        "expectation": "A search box appears",
        "expectationSatisfied": true,
        "achieved": false,
        "goal": "Search for weather",
        "frustrationLevel": 2,
        "frustrationLevelReason": "Clear layout"
    }"#;

    #[test]
    fn test_extract_payload_fences() {
        assert_eq!(extract_payload("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_payload("```\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
        assert_eq!(extract_payload("  {\"a\": 1}  \n"), "{\"a\": 1}");
        assert_eq!(extract_payload("```json{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_payload_nested_fences_and_prose() {
        assert_eq!(
            extract_payload("```json\n```json\n{\"a\": 1}\n```\n```"),
            "{\"a\": 1}"
        );
        assert_eq!(
            extract_payload("Here is my next action:\n```json\n{\"a\": {\"b\": 2}}\n```\nGood luck!"),
            "{\"a\": {\"b\": 2}}"
        );
        assert_eq!(extract_payload("no json here"), "no json here");
    }

    #[test]
    fn test_braces_in_prose_around_fenced_block() {
        let before = format!("I will click the {{Accept}} button.\n```json\n{}\n```", CLICK_RESPONSE);
        let response = parse_oracle_response(&before).unwrap();
        assert_eq!(response.action, ActionDescriptor::click_element(3));

        let after = format!(
            "```json\n{}\n```\nNote: the {{cookie}} bar covers the page.",
            CLICK_RESPONSE
        );
        let response = parse_oracle_response(&after).unwrap();
        assert_eq!(response.description, "Click the search button");
    }

    #[test]
    fn test_braces_in_unfenced_prose() {
        let text = format!("Press {{Enter}} later. {} Thanks {{bye}}", CLICK_RESPONSE);
        assert_eq!(extract_payload(&text), CLICK_RESPONSE);
        assert!(parse_oracle_response(&text).is_ok());
    }

    #[test]
    fn test_parse_click_with_legacy_field_names() {
        let response = parse_oracle_response(CLICK_RESPONSE).unwrap();

        assert_eq!(response.action, ActionDescriptor::click_element(3));
        assert!(response.previous_expectation_satisfied);
        assert!(!response.achieved);
        assert_eq!(response.frustration_level, Some(2));
        assert_eq!(response.frustration_reason, "Clear layout");
        assert_eq!(response.goal, "Search for weather");
    }

    #[test]
    fn test_parse_scroll() {
        let raw = r#"{"action": {"actionType": "Scroll", "direction": "DOWN", "distance": "far", "x": "50%", "y": 40}}"#;
        let response = parse_oracle_response(raw).unwrap();

        assert_eq!(
            response.action.kind,
            ActionKind::Scroll {
                direction: ScrollDirection::Down,
                distance: ScrollDistance::Far
            }
        );
        assert_eq!(response.action.x, Some(50.0));
        assert_eq!(response.action.y, Some(40.0));
        assert_eq!(response.description, "");
        assert_eq!(response.frustration_level, None);
    }

    #[test]
    fn test_missing_action_is_rejected() {
        let err = parse_oracle_response(r#"{"description": "hmm", "achieved": false}"#).unwrap_err();
        assert_eq!(err.kind, ResponseErrorKind::MissingField);
        assert_eq!(err.field_path, "action");

        let err = parse_oracle_response(r#"{"action": null}"#).unwrap_err();
        assert_eq!(err.kind, ResponseErrorKind::MissingField);
    }

    #[test]
    fn test_unknown_action_type_is_rejected() {
        let err = parse_oracle_response(r#"{"action": {"actionType": "type"}}"#).unwrap_err();
        assert_eq!(err.kind, ResponseErrorKind::InvalidValue);
        assert_eq!(err.field_path, "action.actionType");

        let err = parse_oracle_response(r#"{"action": {"elementNumber": 1}}"#).unwrap_err();
        assert_eq!(err.kind, ResponseErrorKind::MissingField);
        assert_eq!(err.field_path, "action.actionType");
    }

    #[test]
    fn test_not_json_is_rejected() {
        let err = parse_oracle_response("I think you should click the button").unwrap_err();
        assert_eq!(err.kind, ResponseErrorKind::JsonSyntax);

        let err = parse_oracle_response("[1, 2, 3]").unwrap_err();
        assert_eq!(err.kind, ResponseErrorKind::InvalidStructure);

        let err = parse_oracle_response(r#"{"action": "click"}"#).unwrap_err();
        assert_eq!(err.kind, ResponseErrorKind::InvalidStructure);
    }

    #[test]
    fn test_scroll_requires_direction_and_distance() {
        for direction in ScrollDirection::ALL {
            for distance in ScrollDistance::ALL {
                let both = format!(
                    r#"{{"action": {{"actionType": "scroll", "direction": "{}", "distance": "{}"}}}}"#,
                    direction.as_str(),
                    distance.as_str()
                );
                let response = parse_oracle_response(&both).unwrap();
                assert_eq!(
                    response.action.kind,
                    ActionKind::Scroll {
                        direction,
                        distance
                    }
                );

                let direction_only = format!(
                    r#"{{"action": {{"actionType": "scroll", "direction": "{}"}}}}"#,
                    direction.as_str()
                );
                let err = parse_oracle_response(&direction_only).unwrap_err();
                assert_eq!(err.field_path, "action.distance");

                let distance_only = format!(
                    r#"{{"action": {{"actionType": "scroll", "distance": "{}"}}}}"#,
                    distance.as_str()
                );
                let err = parse_oracle_response(&distance_only).unwrap_err();
                assert_eq!(err.field_path, "action.direction");
            }
        }

        let neither = r#"{"action": {"actionType": "scroll"}}"#;
        assert!(parse_oracle_response(neither).is_err());

        let bogus = r#"{"action": {"actionType": "scroll", "direction": "diagonal", "distance": "far"}}"#;
        let err = parse_oracle_response(bogus).unwrap_err();
        assert_eq!(err.kind, ResponseErrorKind::InvalidValue);
    }

    #[test]
    fn test_unknown_fields_and_odd_element_refs() {
        let raw = r#"{"action": {"actionType": "click", "elementNumber": 2.5, "x": 10, "y": 20, "confidence": 0.3}, "step": 4, "url": "https://x"}"#;
        let response = parse_oracle_response(raw).unwrap();
        assert_eq!(response.action.element_ref, None);
        assert_eq!(response.action.x, Some(10.0));

        let raw = r#"{"action": {"actionType": "click", "elementRef": "-1"}}"#;
        let response = parse_oracle_response(raw).unwrap();
        assert_eq!(response.action.element_ref, Some(-1));
    }

    #[test]
    fn test_frustration_level_clamped() {
        let raw = r#"{"action": {"actionType": "click", "elementRef": 0}, "frustrationLevel": 42}"#;
        assert_eq!(parse_oracle_response(raw).unwrap().frustration_level, Some(10));
    }

    #[test]
    fn test_descriptor_serializes_flat() {
        let value = serde_json::to_value(ActionDescriptor::scroll(
            ScrollDirection::Left,
            ScrollDistance::Little,
        ))
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"actionType": "scroll", "direction": "left", "distance": "little"})
        );

        let value = serde_json::to_value(ActionDescriptor::click_element(0)).unwrap();
        assert_eq!(value, serde_json::json!({"actionType": "click", "elementRef": 0}));
    }
}
