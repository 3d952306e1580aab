//! Wire-level frame shapes (§6 of the spec). Every frame is one JSON object
//! terminated by `\n`; these types are the typed view a component gets
//! after `faas-channel` has handed it a raw [`serde_json::Value`].
//!
//! `fn` is a Rust keyword, so the function-id field is declared as `fn_`
//! and renamed on the wire via `#[serde(rename = "fn")]`.

use serde::{Deserialize, Serialize};

use crate::model::FunctionId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployFrame {
    pub name: String,
    pub lang: String,
    pub code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeployReply {
    pub fn ok(id: impl Into<String>, name: impl Into<String>, lang: impl Into<String>) -> Self {
        DeployReply {
            ok: true,
            id: Some(id.into()),
            name: Some(name.into()),
            lang: Some(lang.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        DeployReply {
            ok: false,
            id: None,
            name: None,
            lang: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvokeFrame {
    #[serde(rename = "fn")]
    pub fn_: FunctionId,
    pub payload: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobFrame {
    #[serde(rename = "fn")]
    pub fn_: FunctionId,
    pub payload: String,
}

impl JobFrame {
    pub fn from_invoke(invoke: InvokeFrame) -> JobFrame {
        JobFrame {
            fn_: invoke.fn_,
            payload: invoke.payload,
        }
    }

    /// Serializes with `"type":"job"`, the canonical on-wire shape; a
    /// worker's deserializer also accepts `"type":"invoke"` per §4.2.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "job",
            "fn": self.fn_,
            "payload": self.payload,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplyFrame {
    pub fn ok(output: impl Into<String>) -> Self {
        ReplyFrame {
            ok: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        ReplyFrame {
            ok: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterWorkerFrame {
    pub worker_id: usize,
    pub pid: u32,
    #[serde(default)]
    pub generation: u64,
}

/// Kept for wire compatibility with the admin socket (§2); the in-process
/// control path between Dispatcher and Supervisor never serializes this.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForwardToWorkerFrame {
    pub worker_id: usize,
    pub job: JobFrame,
}

/// What the Front Socket sees after reading one frame and looking at its
/// `"type"` field. Anything that doesn't parse into one of these is a
/// `MalformedFrame`, handled locally per §7.
#[derive(Clone, Debug)]
pub enum FrontFrame {
    Deploy(DeployFrame),
    Invoke(InvokeFrame),
    Admin(serde_json::Value),
}

impl FrontFrame {
    pub fn classify(value: &serde_json::Value) -> Option<FrontFrame> {
        let ty = value.get("type")?.as_str()?;
        match ty {
            "deploy" => serde_json::from_value(value.clone()).ok().map(FrontFrame::Deploy),
            "invoke" => serde_json::from_value(value.clone()).ok().map(FrontFrame::Invoke),
            _ => Some(FrontFrame::Admin(value.clone())),
        }
    }
}
