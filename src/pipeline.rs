use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, info_span};

use crate::classify::{ClassifyJob, ProcessExecutor, SystemExecutor, classify};
use crate::clients::{ClientConnector, HttpConnector};
use crate::config::ResolvedConfig;
use crate::domain::ReportResult;
use crate::error::GtdbtkError;
use crate::materialize::materialize;
use crate::params::ParamResolver;
use crate::report::build_report;
use crate::staging::{StagingGuard, StagingLayout};

pub const GIT_URL: &str = "https://github.com/mrcreosote/kb_gtdbtk.git";
pub const GIT_COMMIT_HASH: &str = "22487eab15c54d06487166eeeaef6f7c19dd5a98";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub state: String,
    pub message: String,
    pub version: String,
    pub git_url: String,
    pub git_commit_hash: String,
}

/// Constant health record; never touches config or the network.
pub fn status() -> Status {
    Status {
        state: "OK".to_string(),
        message: String::new(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_url: GIT_URL.to_string(),
        git_commit_hash: GIT_COMMIT_HASH.to_string(),
    }
}

/// Credentials for one invocation.
#[derive(Clone)]
pub struct CallContext {
    pub token: String,
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ParamsResolved,
    Staged,
    SequencesFetched,
    Classified,
    Reported,
    Done,
    Failed,
}

impl Stage {
    fn next(self) -> Option<Stage> {
        match self {
            Stage::Start => Some(Stage::ParamsResolved),
            Stage::ParamsResolved => Some(Stage::Staged),
            Stage::Staged => Some(Stage::SequencesFetched),
            Stage::SequencesFetched => Some(Stage::Classified),
            Stage::Classified => Some(Stage::Reported),
            Stage::Reported => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::ParamsResolved => "params_resolved",
            Stage::Staged => "staged",
            Stage::SequencesFetched => "sequences_fetched",
            Stage::Classified => "classified",
            Stage::Reported => "reported",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Enforces the one-way stage order of a single invocation.
#[derive(Debug)]
pub struct StageTracker {
    stage: Stage,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            stage: Stage::Start,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, to: Stage) -> Result<(), GtdbtkError> {
        if self.stage.next() != Some(to) {
            return Err(GtdbtkError::InternalContract(format!(
                "illegal stage transition {} -> {to}",
                self.stage
            )));
        }
        info!(stage = %to, "stage complete");
        self.stage = to;
        Ok(())
    }

    pub fn fail(&mut self) -> Stage {
        let last = self.stage;
        self.stage = Stage::Failed;
        last
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Gtdbtk<C: ClientConnector, E: ProcessExecutor> {
    config: ResolvedConfig,
    connector: C,
    executor: E,
}

impl Gtdbtk<HttpConnector, SystemExecutor> {
    pub fn from_config(config: ResolvedConfig) -> Self {
        Self::new(config, HttpConnector, SystemExecutor)
    }
}

impl<C: ClientConnector, E: ProcessExecutor> Gtdbtk<C, E> {
    pub fn new(config: ResolvedConfig, connector: C, executor: E) -> Self {
        Self {
            config,
            connector,
            executor,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn status(&self) -> Status {
        status()
    }

    /// Fetches the referenced sequences, classifies them with GTDB-Tk and
    /// saves a report into the requested workspace.
    pub fn run_kb_gtdbtk(
        &self,
        ctx: &CallContext,
        params: Value,
    ) -> Result<ReportResult, GtdbtkError> {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("run_kb_gtdbtk", %request_id);
        let _guard = span.enter();

        let mut tracker = StageTracker::new();
        let result = self.run_stages(ctx, params, &mut tracker);
        match &result {
            Ok(report) => info!(report_ref = %report.report_ref, "run complete"),
            Err(err) => {
                let stage = tracker.fail();
                error!(after = %stage, kind = err.kind(), error = %err, "run failed");
            }
        }
        result
    }

    fn run_stages(
        &self,
        ctx: &CallContext,
        params: Value,
        tracker: &mut StageTracker,
    ) -> Result<ReportResult, GtdbtkError> {
        let params = ParamResolver::resolve(params)?;
        info!(
            reference = %params.reference,
            workspace_id = params.workspace_id,
            min_perc_aa = params.min_perc_aa,
            "resolved parameters"
        );
        tracker.advance(Stage::ParamsResolved)?;

        let layout = StagingLayout::new(self.config.scratch.clone());
        layout.create()?;
        let staging = StagingGuard::new(layout, self.config.keep_staging);
        tracker.advance(Stage::Staged)?;

        let store = self.connector.connect(
            &self.config.callback_url,
            &self.config.workspace_url,
            &ctx.token,
        )?;
        let fastas = staging.layout().fastas();
        let files = materialize(&params.reference, &store, fastas.as_std_path())?;
        for (path, name) in &files {
            info!(path = %path.display(), name = %name, "staged sequence");
        }
        tracker.advance(Stage::SequencesFetched)?;

        let output = staging.layout().output();
        let temp_output = staging.layout().temp_output();
        let tmp = staging.layout().tmp();
        let job = ClassifyJob {
            program: &self.config.gtdbtk_bin,
            files: &files,
            output_dir: output.as_std_path(),
            temp_dir: temp_output.as_std_path(),
            env_temp_dir: tmp.as_std_path(),
            min_perc_aa: params.min_perc_aa,
            cpus: self.config.cpus,
        };
        classify(&job, &self.executor)?;
        tracker.advance(Stage::Classified)?;

        let report = build_report(&store, output.as_std_path(), params.workspace_id)?;
        tracker.advance(Stage::Reported)?;

        check_result(&report)?;
        tracker.advance(Stage::Done)?;
        Ok(report)
    }
}

/// Last line of defence against returning a malformed result.
pub fn check_result(report: &ReportResult) -> Result<(), GtdbtkError> {
    if report.report_name.trim().is_empty() {
        return Err(GtdbtkError::InternalContract(
            "report_name is empty".to_string(),
        ));
    }
    let parts = report.report_ref.split('/').collect::<Vec<_>>();
    let is_upa = parts.len() == 3 && parts.iter().all(|part| part.parse::<u64>().is_ok());
    if !is_upa {
        return Err(GtdbtkError::InternalContract(format!(
            "report_ref {:?} is not a wsid/objid/ver reference",
            report.report_ref
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn stages_advance_in_order() {
        let mut tracker = StageTracker::new();
        tracker.advance(Stage::ParamsResolved).unwrap();
        assert_matches!(
            tracker.advance(Stage::Classified),
            Err(GtdbtkError::InternalContract(_))
        );
        tracker.advance(Stage::Staged).unwrap();
        assert_eq!(tracker.fail(), Stage::Staged);
        assert_matches!(
            tracker.advance(Stage::SequencesFetched),
            Err(GtdbtkError::InternalContract(_))
        );
    }

    #[test]
    fn result_shape_is_checked() {
        let good = ReportResult {
            report_name: "gtdbtk_report".to_string(),
            report_ref: "456/789/1".to_string(),
        };
        assert!(check_result(&good).is_ok());

        let bad_ref = ReportResult {
            report_name: "gtdbtk_report".to_string(),
            report_ref: "456/789".to_string(),
        };
        assert_matches!(check_result(&bad_ref), Err(GtdbtkError::InternalContract(_)));

        let no_name = ReportResult {
            report_name: " ".to_string(),
            report_ref: "1/2/3".to_string(),
        };
        assert_matches!(check_result(&no_name), Err(GtdbtkError::InternalContract(_)));
    }
}
