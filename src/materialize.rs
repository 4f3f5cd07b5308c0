use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::clients::RemoteStore;
use crate::domain::{InputKind, ObjectInfo, ObjectRef};
use crate::error::GtdbtkError;

/// Local FASTA path to the logical name of the sequence unit it holds.
pub type SequenceFileMap = BTreeMap<PathBuf, String>;

pub const FASTA_EXTENSION: &str = "fa";

/// Writes one FASTA file per sequence unit behind `reference` into `destination_dir`.
pub fn materialize(
    reference: &ObjectRef,
    store: &dyn RemoteStore,
    destination_dir: &Path,
) -> Result<SequenceFileMap, GtdbtkError> {
    let (info, kind) = resolve(store, reference.as_str())?;
    info!(%reference, %kind, name = %info.name, "resolved input object");

    let mut files = SequenceFileMap::new();
    match kind {
        InputKind::Assembly => {
            fetch_assembly(store, reference.as_str(), &info, destination_dir, &mut files)?;
        }
        InputKind::Genome => {
            fetch_genome(store, reference.as_str(), &info, destination_dir, &mut files)?;
        }
        InputKind::AssemblySet => {
            for member in set_members(store, reference)? {
                let path = reference.join(&member);
                let (info, kind) = resolve(store, &path)?;
                expect_kind(&path, &info, kind, InputKind::Assembly)?;
                fetch_assembly(store, &path, &info, destination_dir, &mut files)?;
            }
        }
        InputKind::GenomeSet => {
            for member in set_members(store, reference)? {
                let path = reference.join(&member);
                let (info, kind) = resolve(store, &path)?;
                expect_kind(&path, &info, kind, InputKind::Genome)?;
                fetch_genome(store, &path, &info, destination_dir, &mut files)?;
            }
        }
    }

    info!(count = files.len(), "materialized sequence files");
    Ok(files)
}

/// File name for one unit, unique per object version.
pub fn fasta_file_name(info: &ObjectInfo) -> String {
    format!("{}.{FASTA_EXTENSION}", info.upa().replace('/', "_"))
}

fn resolve(store: &dyn RemoteStore, reference: &str) -> Result<(ObjectInfo, InputKind), GtdbtkError> {
    let info = store
        .object_info(reference)
        .map_err(|err| err.into_not_found(reference))?;
    let kind = InputKind::from_type_name(&info.type_name).ok_or_else(|| {
        GtdbtkError::UnsupportedType {
            reference: reference.to_string(),
            type_name: info.type_name.clone(),
        }
    })?;
    Ok((info, kind))
}

fn expect_kind(
    reference: &str,
    info: &ObjectInfo,
    actual: InputKind,
    expected: InputKind,
) -> Result<(), GtdbtkError> {
    if actual != expected {
        return Err(GtdbtkError::UnsupportedType {
            reference: reference.to_string(),
            type_name: info.type_name.clone(),
        });
    }
    Ok(())
}

fn fetch_assembly(
    store: &dyn RemoteStore,
    reference: &str,
    info: &ObjectInfo,
    destination_dir: &Path,
    files: &mut SequenceFileMap,
) -> Result<(), GtdbtkError> {
    let destination = destination_dir.join(fasta_file_name(info));
    if files.contains_key(&destination) {
        debug!(reference, "unit already materialized");
        return Ok(());
    }
    let path = store
        .assembly_to_fasta(reference, &destination)
        .map_err(|err| err.into_not_found(reference))?;
    debug!(reference, path = %path.display(), "wrote FASTA");
    files.insert(path, info.name.clone());
    Ok(())
}

fn fetch_genome(
    store: &dyn RemoteStore,
    reference: &str,
    info: &ObjectInfo,
    destination_dir: &Path,
    files: &mut SequenceFileMap,
) -> Result<(), GtdbtkError> {
    let destination = destination_dir.join(fasta_file_name(info));
    if files.contains_key(&destination) {
        debug!(reference, "unit already materialized");
        return Ok(());
    }
    let data = store
        .object_data(reference)
        .map_err(|err| err.into_not_found(reference))?;
    let assembly_ref = ["assembly_ref", "contigset_ref"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .ok_or_else(|| GtdbtkError::UnsupportedType {
            reference: reference.to_string(),
            type_name: format!("{} without an assembly", info.type_name),
        })?;
    // Reach the assembly through the genome so access is granted via the genome.
    let path_ref = format!("{reference};{assembly_ref}");
    let path = store
        .assembly_to_fasta(&path_ref, &destination)
        .map_err(|err| err.into_not_found(&path_ref))?;
    debug!(reference, path = %path.display(), "wrote FASTA");
    files.insert(path, info.name.clone());
    Ok(())
}

/// Member references of a set object. Handles both the `items` list layout
/// (KBaseSets) and the `elements` map layout (KBaseSearch.GenomeSet).
fn set_members(store: &dyn RemoteStore, reference: &ObjectRef) -> Result<Vec<String>, GtdbtkError> {
    let data = store
        .object_data(reference.as_str())
        .map_err(|err| err.into_not_found(reference.as_str()))?;
    let members = member_refs(&data).ok_or_else(|| GtdbtkError::UnsupportedType {
        reference: reference.to_string(),
        type_name: "set without member references".to_string(),
    })?;
    if members.is_empty() {
        return Err(GtdbtkError::InvalidParameter(format!(
            "set {reference} has no members"
        )));
    }
    Ok(members)
}

/// Member refs of a set object, from an `items` list or an `elements` map.
pub fn member_refs(data: &Value) -> Option<Vec<String>> {
    let entries: Vec<&Value> = if let Some(items) = data.get("items").and_then(Value::as_array) {
        items.iter().collect()
    } else if let Some(elements) = data.get("elements").and_then(Value::as_object) {
        elements.values().collect()
    } else {
        return None;
    };
    entries
        .into_iter()
        .map(|entry| entry.get("ref").and_then(Value::as_str).map(str::to_string))
        .collect()
}
