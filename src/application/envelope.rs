// Inbound message envelope decoding
use crate::application::error::SessionError;
use crate::domain::telemetry::{
    AuxiliaryReading, AuxiliaryUpdate, Inbound, PlcUpdate, PrimarySample,
};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default, alias = "engine")]
    primary: Option<PrimarySample>,
    #[serde(default)]
    auxiliary: Option<AuxiliaryPayload>,
    // Legacy mqtt frames put sensors at the top level
    #[serde(default)]
    sensors: Option<BTreeMap<String, AuxiliaryReading>>,
    // Legacy modbus frames carry the PLC block next to the engine data
    #[serde(default)]
    plc: Option<PlcUpdate>,
    #[serde(default)]
    command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuxiliaryPayload {
    mode: Option<String>,
    alarms: Option<Vec<String>>,
    setpoints: Option<BTreeMap<String, f64>>,
    sensors: BTreeMap<String, AuxiliaryReading>,
}

/// Classify one inbound frame.
///
/// `Ok(None)` means the frame is well-formed but not telemetry (unknown
/// type, command acknowledgement) and should be ignored.
pub fn decode_frame(text: &str) -> Result<Option<Inbound>, SessionError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| SessionError::MalformedMessage(e.to_string()))?;

    let Some(kind) = envelope.kind.as_deref() else {
        if let Some(command) = &envelope.command {
            tracing::debug!("Command acknowledged by backend: {}", command);
        }
        return Ok(None);
    };

    match kind {
        "primary" | "modbus" => {
            let sample = envelope
                .primary
                .ok_or_else(|| {
                    SessionError::MalformedMessage("primary frame without payload".to_string())
                })?;
            let plc = envelope.plc.filter(|p| !p.is_empty());
            Ok(Some(Inbound::Primary {
                sample: sample.sanitized(),
                plc,
            }))
        }
        "auxiliary" | "mqtt" => {
            let update = match (envelope.auxiliary, envelope.sensors) {
                (Some(payload), legacy) => {
                    let mut sensors = payload.sensors;
                    sensors.extend(legacy.unwrap_or_default());
                    AuxiliaryUpdate {
                        sensors,
                        plc: PlcUpdate {
                            mode: payload.mode,
                            alarms: payload.alarms,
                            setpoints: payload.setpoints,
                        },
                    }
                }
                (None, Some(sensors)) => AuxiliaryUpdate {
                    sensors,
                    plc: envelope.plc.unwrap_or_default(),
                },
                (None, None) => {
                    return Err(SessionError::MalformedMessage(
                        "auxiliary frame without payload".to_string(),
                    ));
                }
            };
            Ok(Some(Inbound::Auxiliary(update)))
        }
        other => {
            tracing::debug!("Ignoring frame of unknown type {:?}", other);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::EngineStatus;

    #[test]
    fn test_decode_primary_frame() {
        let frame = concat!(
            r#"{"type":"primary","primary":"#,
            r#"{"rpm":900,"temperature":85,"fuelFlow":1.5,"load":60,"status":1}}"#
        );
        match decode_frame(frame).unwrap() {
            Some(Inbound::Primary { sample, plc }) => {
                assert_eq!(sample.rpm, 900.0);
                assert_eq!(sample.fuel_flow, 1.5);
                assert_eq!(sample.status, EngineStatus::Running);
                assert!(plc.is_none());
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_modbus_frame_with_plc() {
        let frame = r#"{"type":"modbus","engine":{"rpm":1200,"fuel_flow":2.0,"status":2},
            "plc":{"mode":"AUTO","alarms":["HIGH TEMP"],"setpoints":{"rpm":1200}}}"#;
        match decode_frame(frame).unwrap() {
            Some(Inbound::Primary { sample, plc }) => {
                assert_eq!(sample.fuel_flow, 2.0);
                let plc = plc.unwrap();
                assert_eq!(plc.mode.as_deref(), Some("AUTO"));
                assert_eq!(plc.alarms, Some(vec!["HIGH TEMP".to_string()]));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_auxiliary_frame() {
        let frame = r#"{"type":"auxiliary","auxiliary":{"mode":"MANUAL","alarms":[],
            "sensors":{"exhaust_temp":{"value":320,"unit":"°C"}}}}"#;
        match decode_frame(frame).unwrap() {
            Some(Inbound::Auxiliary(update)) => {
                assert_eq!(update.sensors["exhaust_temp"].value, 320.0);
                assert_eq!(update.plc.alarms, Some(Vec::new()));
                assert_eq!(update.plc.mode.as_deref(), Some("MANUAL"));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_mqtt_frame() {
        let frame =
            r#"{"type":"mqtt","sensors":{"turbocharger_speed":{"value":15000,"unit":"rpm"}}}"#;
        match decode_frame(frame).unwrap() {
            Some(Inbound::Auxiliary(update)) => {
                assert_eq!(update.sensors["turbocharger_speed"].unit, "rpm");
                assert!(update.plc.is_empty());
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_and_acks_are_ignored() {
        assert_eq!(decode_frame(r#"{"type":"heartbeat"}"#).unwrap(), None);
        assert_eq!(
            decode_frame(r#"{"status":"ok","command":"start_engine"}"#).unwrap(),
            None
        );
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(matches!(
            decode_frame("{not json"),
            Err(SessionError::MalformedMessage(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"primary"}"#),
            Err(SessionError::MalformedMessage(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"primary","primary":{"rpm":"fast"}}"#),
            Err(SessionError::MalformedMessage(_))
        ));
    }
}
