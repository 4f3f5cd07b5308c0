use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GtdbtkError>;

#[derive(Debug, Error, Diagnostic)]
pub enum GtdbtkError {
    #[error("invalid parameter: {0}")]
    #[diagnostic(code(kb_gtdbtk::invalid_parameter))]
    InvalidParameter(String),

    #[error("authentication rejected by {service}: {message}")]
    #[diagnostic(
        code(kb_gtdbtk::authentication),
        help("check that the token passed with --token or KB_AUTH_TOKEN is valid")
    )]
    Authentication { service: String, message: String },

    #[error("object not found: {reference}: {message}")]
    #[diagnostic(code(kb_gtdbtk::reference_not_found))]
    ReferenceNotFound { reference: String, message: String },

    #[error("unsupported object type {type_name} for {reference}")]
    #[diagnostic(
        code(kb_gtdbtk::unsupported_type),
        help("supported inputs are Assembly, AssemblySet, Genome and GenomeSet objects")
    )]
    UnsupportedType { reference: String, type_name: String },

    #[error("classifier failed: {0}")]
    #[diagnostic(code(kb_gtdbtk::classifier_execution))]
    ClassifierExecution(String),

    #[error("could not build report: {0}")]
    #[diagnostic(code(kb_gtdbtk::report_construction))]
    ReportConstruction(String),

    #[error("failed to save to the workspace: {0}")]
    #[diagnostic(code(kb_gtdbtk::remote_write))]
    RemoteWrite(String),

    #[error("internal contract violated: {0}")]
    #[diagnostic(code(kb_gtdbtk::internal_contract))]
    InternalContract(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing environment variable {0}")]
    MissingEnv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("{service} request failed: {message}")]
    RemoteHttp { service: String, message: String },

    #[error("{service} returned status {status}: {message}")]
    RemoteStatus {
        service: String,
        status: u16,
        message: String,
    },

    #[error("{method} failed: {message}")]
    RemoteCall { method: String, message: String },
}

impl GtdbtkError {
    /// Stable label for logs and exit-code mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            GtdbtkError::InvalidParameter(_) => "invalid_parameter",
            GtdbtkError::Authentication { .. } => "authentication",
            GtdbtkError::ReferenceNotFound { .. } => "reference_not_found",
            GtdbtkError::UnsupportedType { .. } => "unsupported_type",
            GtdbtkError::ClassifierExecution(_) => "classifier_execution",
            GtdbtkError::ReportConstruction(_) => "report_construction",
            GtdbtkError::RemoteWrite(_) => "remote_write",
            GtdbtkError::InternalContract(_) => "internal_contract",
            GtdbtkError::ConfigRead(_) => "config_read",
            GtdbtkError::ConfigParse(_) => "config_parse",
            GtdbtkError::MissingEnv(_) => "missing_env",
            GtdbtkError::Filesystem(_) => "filesystem",
            GtdbtkError::RemoteHttp { .. } => "remote_http",
            GtdbtkError::RemoteStatus { .. } => "remote_status",
            GtdbtkError::RemoteCall { .. } => "remote_call",
        }
    }

    /// Failures raised while resolving `reference` that mean the store could
    /// not find it. Authentication and transport failures pass through.
    pub fn into_not_found(self, reference: &str) -> Self {
        match self {
            GtdbtkError::RemoteCall { message, .. } => GtdbtkError::ReferenceNotFound {
                reference: reference.to_string(),
                message,
            },
            GtdbtkError::RemoteStatus {
                status: 404,
                message,
                ..
            } => GtdbtkError::ReferenceNotFound {
                reference: reference.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Any failure on the persistence path other than a rejected token.
    pub fn into_remote_write(self) -> Self {
        match self {
            err @ GtdbtkError::Authentication { .. } => err,
            err @ GtdbtkError::RemoteWrite(_) => err,
            other => GtdbtkError::RemoteWrite(other.to_string()),
        }
    }
}
