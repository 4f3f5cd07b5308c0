#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use serde_json::{Value, json};

use kb_gtdbtk::classify::{CommandLine, EnvOverrides, ProcessExecutor, ProcessStatus};
use kb_gtdbtk::clients::{ClientConnector, RemoteStore};
use kb_gtdbtk::config::{CPU_BUDGET, ResolvedConfig};
use kb_gtdbtk::domain::{ObjectInfo, ReportResult};
use kb_gtdbtk::error::GtdbtkError;
use kb_gtdbtk::report::ReportSpec;

pub const GENOME_TYPE: &str = "KBaseGenomes.Genome-17.0";
pub const ASSEMBLY_TYPE: &str = "KBaseGenomeAnnotations.Assembly-6.0";
pub const GENOME_SET_TYPE: &str = "KBaseSets.GenomeSet-2.1";
pub const ASSEMBLY_SET_TYPE: &str = "KBaseSets.AssemblySet-2.0";
pub const READS_TYPE: &str = "KBaseFile.PairedEndLibrary-2.1";

#[derive(Default)]
pub struct FakeStore {
    objects: HashMap<String, (ObjectInfo, Value)>,
    pub fasta_requests: Mutex<Vec<String>>,
    pub reports: Mutex<Vec<ReportSpec>>,
    pub report_ref: String,
    pub fail_reports: bool,
    /// Reject the caller's token on the first workspace read.
    pub reject_token: bool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            report_ref: "456/789/1".to_string(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, reference: &str, info: ObjectInfo, data: Value) {
        self.objects.insert(reference.to_string(), (info, data));
    }

    pub fn add_assembly(&mut self, ws: u64, obj: u64, name: &str) -> String {
        let upa = format!("{ws}/{obj}/1");
        self.add(&upa, info(ws, obj, name, ASSEMBLY_TYPE), json!({}));
        upa
    }

    pub fn add_genome(&mut self, ws: u64, obj: u64, name: &str) -> String {
        let assembly = self.add_assembly(ws, obj + 100, &format!("{name}_assembly"));
        let upa = format!("{ws}/{obj}/1");
        self.add(
            &upa,
            info(ws, obj, name, GENOME_TYPE),
            json!({"id": name, "assembly_ref": assembly}),
        );
        upa
    }

    /// `ws/123/genome_set` holding three genomes.
    pub fn with_genome_set() -> Self {
        let mut store = Self::new();
        let members = (1..=3)
            .map(|obj| {
                let upa = store.add_genome(123, obj, &format!("genome_{obj}"));
                json!({"ref": upa, "label": format!("genome_{obj}")})
            })
            .collect::<Vec<_>>();
        store.add(
            "ws/123/genome_set",
            info(123, 50, "genome_set", GENOME_SET_TYPE),
            json!({"description": "three genomes", "items": members}),
        );
        store
    }

    pub fn report_specs(&self) -> Vec<ReportSpec> {
        self.reports.lock().unwrap().clone()
    }

    fn lookup(&self, reference: &str) -> Result<&(ObjectInfo, Value), GtdbtkError> {
        let last = reference.rsplit(';').next().unwrap_or(reference);
        self.objects
            .get(last)
            .ok_or_else(|| GtdbtkError::RemoteCall {
                method: "Workspace.get_object_info3".to_string(),
                message: format!("No object with reference {last} exists"),
            })
    }
}

pub fn info(ws: u64, obj: u64, name: &str, type_name: &str) -> ObjectInfo {
    ObjectInfo {
        object_id: obj,
        name: name.to_string(),
        type_name: type_name.to_string(),
        version: 1,
        workspace_id: ws,
    }
}

#[derive(Clone)]
pub struct SharedStore(pub Arc<FakeStore>);

impl RemoteStore for SharedStore {
    fn object_info(&self, reference: &str) -> Result<ObjectInfo, GtdbtkError> {
        if self.0.reject_token {
            return Err(GtdbtkError::Authentication {
                service: "Workspace".to_string(),
                message: "Token validation failed: Invalid token".to_string(),
            });
        }
        self.0.lookup(reference).map(|(info, _)| info.clone())
    }

    fn object_data(&self, reference: &str) -> Result<Value, GtdbtkError> {
        self.0.lookup(reference).map(|(_, data)| data.clone())
    }

    fn assembly_to_fasta(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, GtdbtkError> {
        let (info, _) = self.0.lookup(reference)?;
        self.0
            .fasta_requests
            .lock()
            .unwrap()
            .push(reference.to_string());
        fs::write(destination, format!(">{}_contig_1\nACGTACGTTTGA\n", info.name))
            .map_err(|err| GtdbtkError::Filesystem(err.to_string()))?;
        Ok(destination.to_path_buf())
    }

    fn create_report(&self, spec: &ReportSpec) -> Result<ReportResult, GtdbtkError> {
        if self.0.fail_reports {
            return Err(GtdbtkError::RemoteHttp {
                service: "KBaseReport".to_string(),
                message: "connection reset".to_string(),
            });
        }
        self.0.reports.lock().unwrap().push(spec.clone());
        Ok(ReportResult {
            report_name: "gtdbtk_report".to_string(),
            report_ref: self.0.report_ref.clone(),
        })
    }
}

/// Hands out the shared store without contacting anything, like the HTTP connector.
pub struct FakeConnector {
    pub store: SharedStore,
}

impl FakeConnector {
    pub fn new(store: FakeStore) -> Self {
        Self {
            store: SharedStore(Arc::new(store)),
        }
    }
}

impl ClientConnector for FakeConnector {
    type Store = SharedStore;

    fn connect(
        &self,
        _callback_url: &str,
        _workspace_url: &str,
        _token: &str,
    ) -> Result<SharedStore, GtdbtkError> {
        Ok(self.store.clone())
    }
}

#[derive(Clone, Copy)]
pub enum Outcome {
    /// Exit 0 and write a bac120 summary row per input genome.
    Classify,
    /// Exit 0 without writing anything.
    Silent,
    Exit(i32),
}

pub struct FakeExecutor {
    pub outcome: Outcome,
    pub calls: Mutex<Vec<(CommandLine, EnvOverrides)>>,
}

impl FakeExecutor {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(CommandLine, EnvOverrides)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessExecutor for FakeExecutor {
    fn execute(
        &self,
        command: &CommandLine,
        env: &EnvOverrides,
    ) -> Result<ProcessStatus, GtdbtkError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.clone(), env.clone()));
        match self.outcome {
            Outcome::Classify => {
                let genome_dir = command.arg_value("--genome_dir").unwrap();
                let out_dir = command.arg_value("--out_dir").unwrap();
                write_summary(Path::new(genome_dir), Path::new(out_dir));
                Ok(ProcessStatus { code: Some(0) })
            }
            Outcome::Silent => Ok(ProcessStatus { code: Some(0) }),
            Outcome::Exit(code) => Ok(ProcessStatus { code: Some(code) }),
        }
    }
}

pub const SUMMARY_HEADER: &str = "user_genome\tclassification\tfastani_reference\tclassification_method\tnote\tother_related_references\taa_percent\ttranslation_table\tred_value\twarnings";

pub fn write_summary(genome_dir: &Path, out_dir: &Path) {
    let mut genomes = fs::read_dir(genome_dir)
        .unwrap()
        .flatten()
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
        .collect::<Vec<_>>();
    genomes.sort();

    let mut content = format!("{SUMMARY_HEADER}\n");
    for genome in genomes {
        content.push_str(&format!(
            "{genome}\td__Bacteria;p__Proteobacteria;c__Gammaproteobacteria;o__Enterobacterales;f__Enterobacteriaceae;g__Escherichia;s__Escherichia coli\tGCF_000005845.2\ttaxonomic classification defined by topology and ANI\tN/A\tN/A\t92.5\t11\tN/A\tN/A\n"
        ));
    }
    fs::create_dir_all(out_dir).unwrap();
    fs::write(out_dir.join("gtdbtk.bac120.summary.tsv"), content).unwrap();
}

pub fn config(scratch: &Path) -> ResolvedConfig {
    ResolvedConfig {
        scratch: Utf8PathBuf::from_path_buf(scratch.to_path_buf()).unwrap(),
        workspace_url: "https://kbase.us/services/ws".to_string(),
        callback_url: "http://localhost:9999".to_string(),
        gtdbtk_bin: "gtdbtk".to_string(),
        keep_staging: true,
        cpus: CPU_BUDGET,
    }
}
