// Operator commands sent to the engine backend
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const START_ENGINE: &str = "start_engine";
pub const STOP_ENGINE: &str = "stop_engine";
pub const SET_MODE: &str = "set_mode";
pub const SET_SETPOINT: &str = "set_setpoint";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command name must not be empty")]
    EmptyName,

    #[error("{command} requires a {field} field")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },
}

/// Outbound command envelope: `{ "command": name, ...payload }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    #[serde(rename = "command")]
    pub name: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Map::new(),
        }
    }

    /// Extra payload fields; a `command` key in the payload is ignored so it
    /// cannot shadow the command name.
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self.payload.remove("command");
        self
    }

    pub fn start_engine() -> Self {
        Self::new(START_ENGINE)
    }

    pub fn stop_engine() -> Self {
        Self::new(STOP_ENGINE)
    }

    pub fn set_mode(mode: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("mode".to_string(), Value::String(mode.into()));
        Self::new(SET_MODE).with_payload(payload)
    }

    pub fn set_setpoint(parameter: impl Into<String>, value: f64) -> Self {
        let mut payload = Map::new();
        payload.insert("parameter".to_string(), Value::String(parameter.into()));
        payload.insert("value".to_string(), Value::from(value));
        Self::new(SET_SETPOINT).with_payload(payload)
    }

    /// Build a command from an operator request. Known commands get their
    /// payload checked; anything else is forwarded as given.
    pub fn parse(name: &str, payload: Map<String, Value>) -> Result<Self, CommandError> {
        match name {
            START_ENGINE => Ok(Self::start_engine().with_payload(payload)),
            STOP_ENGINE => Ok(Self::stop_engine().with_payload(payload)),
            SET_MODE => {
                let mode = payload
                    .get("mode")
                    .and_then(Value::as_str)
                    .ok_or(CommandError::MissingField {
                        command: SET_MODE,
                        field: "mode",
                    })?;
                Ok(Self::set_mode(mode))
            }
            SET_SETPOINT => {
                let parameter = payload
                    .get("parameter")
                    .and_then(Value::as_str)
                    .ok_or(CommandError::MissingField {
                        command: SET_SETPOINT,
                        field: "parameter",
                    })?;
                let value = payload
                    .get("value")
                    .and_then(Value::as_f64)
                    .ok_or(CommandError::MissingField {
                        command: SET_SETPOINT,
                        field: "value",
                    })?;
                Ok(Self::set_setpoint(parameter, value))
            }
            _ if name.trim().is_empty() => Err(CommandError::EmptyName),
            _ => Ok(Self::new(name).with_payload(payload)),
        }
    }

    /// The payload alone, used as the body of a polling-mode command request
    pub fn body(&self) -> Value {
        Value::Object(self.payload.clone())
    }
}
