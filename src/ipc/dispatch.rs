use anyhow::{Result, anyhow};
use log::info;
use serde_json::{Value, json};
use std::sync::mpsc::Sender;

use super::server::{DaemonState, IpcMsg, SESSION_IDLE_TIMEOUT};
use crate::error::RehabError;
use crate::gestures::Exercise;
use crate::landmarks::Frame;

const DEFAULT_SESSION: &str = "default";

/// Answer one request. Failures become `{"ok": false, "error": ...}`.
pub fn handle_request(req: &Value, st: &DaemonState, tx: &Sender<IpcMsg>) -> Value {
    let op = req.get("op").and_then(Value::as_str).unwrap_or("");

    let result = match op {
        "analyze" => analyze(req, st),
        "reset" => reset(req, st),
        "summary" => summary(req, st),
        "end" => {
            let name = session_name(req);
            st.end_session(name)
                .map(|ended| json!({"session": name, "ended": ended}))
        }
        "status" => status(st),
        "reload" => st.reload().map(|name| json!({"active_profile": name})),
        "use" => match req.get("profile").and_then(Value::as_str) {
            Some(name) => st.use_profile(name).map(|name| json!({"active_profile": name})),
            None => Err(anyhow!("usage: {{\"op\":\"use\",\"profile\":<name>}}")),
        },
        "list" => st.with_config(|c| {
            json!({"profiles": c.list_profiles(), "active": c.active_name})
        }),
        "shutdown" => {
            let _ = tx.send(IpcMsg::Shutdown);
            Ok(json!("shutting down"))
        }
        _ => Err(anyhow!("unknown op: {op}")),
    };

    match result {
        Ok(data) => json!({"ok": true, "data": data}),
        Err(e) => json!({"ok": false, "error": e.to_string()}),
    }
}

fn session_name(req: &Value) -> &str {
    req.get("session")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_SESSION)
}

fn exercise(req: &Value) -> Result<Exercise> {
    let name = req
        .get("exercise_type")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing exercise_type"))?;
    Ok(name.parse::<Exercise>()?)
}

fn analyze(req: &Value, st: &DaemonState) -> Result<Value> {
    let exercise = exercise(req)?;
    let landmarks = match req.get("landmarks") {
        None | Some(Value::Null) => return Err(RehabError::MissingLandmarks.into()),
        Some(Value::Array(a)) if a.is_empty() => return Err(RehabError::MissingLandmarks.into()),
        Some(v) => v,
    };
    let frame = Frame::from_json(landmarks);

    let session = st.session(session_name(req))?;
    let analysis = session
        .lock()
        .map_err(|_| anyhow!("session lock poisoned"))?
        .analyze(exercise, &frame);
    Ok(serde_json::to_value(analysis)?)
}

fn reset(req: &Value, st: &DaemonState) -> Result<Value> {
    let exercise = exercise(req)?;
    let name = session_name(req);
    st.session(name)?
        .lock()
        .map_err(|_| anyhow!("session lock poisoned"))?
        .reset(exercise);
    info!("session '{name}': {exercise} reset");
    Ok(json!({"message": "State reset successfully", "exercise_type": exercise.as_str()}))
}

fn summary(req: &Value, st: &DaemonState) -> Result<Value> {
    let name = session_name(req);
    let rows = st
        .session(name)?
        .lock()
        .map_err(|_| anyhow!("session lock poisoned"))?
        .summary();
    Ok(json!({"session": name, "exercises": rows}))
}

fn status(st: &DaemonState) -> Result<Value> {
    let sessions = st.session_names()?;
    st.with_config(|c| {
        json!({
            "active_profile": c.active_name,
            "profile_name": c.profile.meta.name,
            "config_dir": c.config_dir,
            "min_state_ms": c.profile.timing.min_state_ms,
            "socket": super::runtime::socket_path().ok(),
            "sessions": sessions,
            "session_idle_timeout_s": SESSION_IDLE_TIMEOUT.as_secs(),
        })
    })
}
