//! The function descriptor: owned by the storage collaborator, read-only
//! everywhere else in the dispatch core.

use serde::{Deserialize, Serialize};

/// Closed set of language tags a deployed function can carry. Anything else
/// is a store-level validation error, not a dispatch-core concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    NativeSandboxed,
    ScriptInterpreted,
    StaticAsset,
}

impl Language {
    pub fn parse(tag: &str) -> Option<Language> {
        match tag {
            "native-sandboxed" => Some(Language::NativeSandboxed),
            "script-interpreted" => Some(Language::ScriptInterpreted),
            "static-asset" => Some(Language::StaticAsset),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Language::NativeSandboxed => "native-sandboxed",
            Language::ScriptInterpreted => "script-interpreted",
            Language::StaticAsset => "static-asset",
        }
    }

    /// For `script-interpreted` functions, the interpreter used by the
    /// reference sandbox, keyed by the deploy-time `lang` string (which is
    /// finer-grained than `Language` itself, e.g. "python" vs "js" are both
    /// `ScriptInterpreted`).
    pub fn interpreter_for(lang_tag: &str) -> Option<&'static str> {
        match lang_tag {
            "python" | "py" => Some("python3"),
            "js" | "javascript" | "node" => Some("node"),
            "sh" | "shell" | "bash" => Some("sh"),
            _ => None,
        }
    }
}

/// Opaque, globally unique, stable identifier minted by the storage
/// collaborator. The dispatch core never interprets it.
pub type FunctionId = String;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub id: FunctionId,
    pub name: String,
    pub language: Language,
    /// The exported function to invoke. For the reference sandbox this is
    /// unused (the whole artifact is the entrypoint), but it is threaded
    /// through so a hardened sandbox can use it without a model change.
    pub entrypoint: String,
    /// Opaque handle the sandbox collaborator understands; for the
    /// filesystem store this is an absolute path to the stored artifact.
    pub artifact_path: String,
}
