use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GtdbtkError;

/// A workspace object reference, optionally a `;`-joined reference path.
///
/// Each segment is `workspace/object` or `workspace/object/version`, where the
/// parts may be numeric ids or names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef(String);

impl ObjectRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference path that reaches `member` through this object.
    pub fn join(&self, member: &str) -> String {
        format!("{};{}", self.0, member)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectRef {
    type Err = GtdbtkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized.split(';').all(|segment| {
                let parts = segment.split('/').collect::<Vec<_>>();
                (2..=3).contains(&parts.len())
                    && parts
                        .iter()
                        .all(|part| !part.is_empty() && !part.chars().any(char::is_whitespace))
            });
        if !is_valid {
            return Err(GtdbtkError::InvalidParameter(format!(
                "malformed object reference: {value:?}"
            )));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// The object kinds the materializer knows how to turn into FASTA files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Assembly,
    AssemblySet,
    Genome,
    GenomeSet,
}

impl InputKind {
    /// Maps a versioned workspace type such as `KBaseGenomes.Genome-17.0`.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let unversioned = type_name.split('-').next().unwrap_or(type_name);
        match unversioned {
            "KBaseGenomeAnnotations.Assembly" | "KBaseGenomes.ContigSet" => {
                Some(InputKind::Assembly)
            }
            "KBaseSets.AssemblySet" => Some(InputKind::AssemblySet),
            "KBaseGenomes.Genome" => Some(InputKind::Genome),
            "KBaseSearch.GenomeSet" | "KBaseSets.GenomeSet" => Some(InputKind::GenomeSet),
            _ => None,
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Assembly => write!(f, "assembly"),
            InputKind::AssemblySet => write!(f, "assembly set"),
            InputKind::Genome => write!(f, "genome"),
            InputKind::GenomeSet => write!(f, "genome set"),
        }
    }
}

/// The subset of a workspace object info tuple the pipeline uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub object_id: u64,
    pub name: String,
    pub type_name: String,
    pub version: u64,
    pub workspace_id: u64,
}

impl ObjectInfo {
    /// The permanent `wsid/objid/ver` address of this object version.
    pub fn upa(&self) -> String {
        format!("{}/{}/{}", self.workspace_id, self.object_id, self.version)
    }

    /// Parses the 11-element info tuple returned by the workspace service.
    pub fn from_tuple(value: &Value) -> Result<Self, GtdbtkError> {
        let fields = value
            .as_array()
            .filter(|fields| fields.len() >= 7)
            .ok_or_else(|| malformed_info(value))?;
        let int = |idx: usize| fields[idx].as_u64().ok_or_else(|| malformed_info(value));
        let text = |idx: usize| {
            fields[idx]
                .as_str()
                .map(|value| value.to_string())
                .ok_or_else(|| malformed_info(value))
        };
        Ok(Self {
            object_id: int(0)?,
            name: text(1)?,
            type_name: text(2)?,
            version: int(4)?,
            workspace_id: int(6)?,
        })
    }
}

/// Handles to the persisted report, returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResult {
    pub report_name: String,
    pub report_ref: String,
}

fn malformed_info(value: &Value) -> GtdbtkError {
    GtdbtkError::RemoteCall {
        method: "Workspace.get_object_info3".to_string(),
        message: format!("malformed object info: {value}"),
    }
}
