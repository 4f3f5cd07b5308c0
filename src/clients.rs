use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::domain::{ObjectInfo, ReportResult};
use crate::error::GtdbtkError;
use crate::report::ReportSpec;
use crate::rpc::JsonRpcClient;

/// Everything the pipeline needs from the workspace and callback services.
pub trait RemoteStore: Send + Sync {
    fn object_info(&self, reference: &str) -> Result<ObjectInfo, GtdbtkError>;
    fn object_data(&self, reference: &str) -> Result<Value, GtdbtkError>;
    /// Writes the assembly behind `reference` as FASTA at `destination`.
    fn assembly_to_fasta(&self, reference: &str, destination: &Path)
    -> Result<PathBuf, GtdbtkError>;
    fn create_report(&self, spec: &ReportSpec) -> Result<ReportResult, GtdbtkError>;
}

/// Builds a [`RemoteStore`] for one invocation's credentials.
pub trait ClientConnector {
    type Store: RemoteStore;

    fn connect(
        &self,
        callback_url: &str,
        workspace_url: &str,
        token: &str,
    ) -> Result<Self::Store, GtdbtkError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl ClientConnector for HttpConnector {
    type Store = KbClients;

    fn connect(
        &self,
        callback_url: &str,
        workspace_url: &str,
        token: &str,
    ) -> Result<KbClients, GtdbtkError> {
        KbClients::new(callback_url, workspace_url, token)
    }
}

#[derive(Clone)]
pub struct KbClients {
    workspace: JsonRpcClient,
    assembly: JsonRpcClient,
    report: JsonRpcClient,
}

impl KbClients {
    /// No request is made here; a bad token shows up on first use.
    pub fn new(callback_url: &str, workspace_url: &str, token: &str) -> Result<Self, GtdbtkError> {
        Ok(Self {
            workspace: JsonRpcClient::new(workspace_url, "Workspace", token)?,
            assembly: JsonRpcClient::new(callback_url, "AssemblyUtil", token)?,
            report: JsonRpcClient::new(callback_url, "KBaseReport", token)?,
        })
    }
}

impl RemoteStore for KbClients {
    fn object_info(&self, reference: &str) -> Result<ObjectInfo, GtdbtkError> {
        let result = self.workspace.call_idempotent(
            "get_object_info3",
            json!({"objects": [{"ref": reference}], "includeMetadata": 0}),
        )?;
        parse_object_info(&result, reference)
    }

    fn object_data(&self, reference: &str) -> Result<Value, GtdbtkError> {
        let result = self
            .workspace
            .call_idempotent("get_objects2", json!({"objects": [{"ref": reference}]}))?;
        parse_object_data(&result, reference)
    }

    fn assembly_to_fasta(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, GtdbtkError> {
        let filename = destination
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| GtdbtkError::Filesystem("invalid FASTA destination".to_string()))?;
        // Each call starts a callback job; never retried.
        let result = self.assembly.call(
            "get_assembly_as_fasta",
            json!({"ref": reference, "filename": filename}),
        )?;
        let written = parse_fasta_path(&result, reference)?;
        // AssemblyUtil writes into the shared scratch volume, not into our directory.
        if written != destination {
            fs::copy(&written, destination).map_err(|err| {
                GtdbtkError::Filesystem(format!("copy {}: {err}", written.display()))
            })?;
        }
        Ok(destination.to_path_buf())
    }

    fn create_report(&self, spec: &ReportSpec) -> Result<ReportResult, GtdbtkError> {
        let result = self
            .report
            .call("create_extended_report", report_params(spec))?;
        parse_report_result(&result, self.report.service())
    }
}

/// Request body for `KBaseReport.create_extended_report`.
pub fn report_params(spec: &ReportSpec) -> Value {
    let file_links = spec
        .file_links
        .iter()
        .map(|link| {
            json!({
                "path": link.path.to_string_lossy(),
                "name": link.name,
                "description": link.description,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "workspace_id": spec.workspace_id,
        "report_object_name": spec.object_name,
        "message": spec.message,
        "objects_created": [],
        "direct_html_link_index": 0,
        "html_links": [{
            "path": spec.html_dir.to_string_lossy(),
            "name": spec.html_index,
            "description": "GTDB-Tk classification summary",
        }],
        "file_links": file_links,
        "html_window_height": 500,
    })
}

/// `get_object_info3` result: `{"infos": [tuple], "paths": [...]}`.
pub fn parse_object_info(result: &Value, reference: &str) -> Result<ObjectInfo, GtdbtkError> {
    let info = result
        .get("infos")
        .and_then(|infos| infos.as_array())
        .and_then(|infos| infos.first())
        .ok_or_else(|| GtdbtkError::RemoteCall {
            method: "Workspace.get_object_info3".to_string(),
            message: format!("no object info returned for {reference}"),
        })?;
    ObjectInfo::from_tuple(info)
}

/// `get_objects2` result: `{"data": [{"data": {...}, "info": [...]}]}`.
pub fn parse_object_data(result: &Value, reference: &str) -> Result<Value, GtdbtkError> {
    result
        .get("data")
        .and_then(|data| data.as_array())
        .and_then(|data| data.first())
        .and_then(|object| object.get("data"))
        .cloned()
        .ok_or_else(|| GtdbtkError::RemoteCall {
            method: "Workspace.get_objects2".to_string(),
            message: format!("no object data returned for {reference}"),
        })
}

pub fn parse_fasta_path(result: &Value, reference: &str) -> Result<PathBuf, GtdbtkError> {
    result
        .get("path")
        .and_then(|path| path.as_str())
        .map(PathBuf::from)
        .ok_or_else(|| GtdbtkError::RemoteCall {
            method: "AssemblyUtil.get_assembly_as_fasta".to_string(),
            message: format!("no FASTA path returned for {reference}"),
        })
}

/// `create_extended_report` result: `{"name": ..., "ref": ...}`.
pub fn parse_report_result(result: &Value, service: &str) -> Result<ReportResult, GtdbtkError> {
    let text = |key: &str| {
        result
            .get(key)
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
    };
    match (text("name"), text("ref")) {
        (Some(report_name), Some(report_ref)) => Ok(ReportResult {
            report_name,
            report_ref,
        }),
        _ => Err(GtdbtkError::RemoteWrite(format!(
            "{service}.create_extended_report returned no name/ref"
        ))),
    }
}
