use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ObjectRef;
use crate::error::GtdbtkError;

pub const DEFAULT_MIN_PERC_AA: f64 = 10.0;

/// Caller input for one classification run, as it arrives over the wire.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawParams {
    #[serde(default)]
    pub input_object_ref: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<i64>,
    #[serde(default)]
    pub min_perc_aa: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub reference: ObjectRef,
    pub workspace_id: u64,
    pub min_perc_aa: f64,
}

pub struct ParamResolver;

impl ParamResolver {
    pub fn resolve(raw: Value) -> Result<ResolvedParams, GtdbtkError> {
        let params: RawParams = serde_json::from_value(raw)
            .map_err(|err| GtdbtkError::InvalidParameter(err.to_string()))?;
        Self::resolve_params(params)
    }

    pub fn resolve_params(params: RawParams) -> Result<ResolvedParams, GtdbtkError> {
        let reference = params
            .input_object_ref
            .as_deref()
            .ok_or_else(|| {
                GtdbtkError::InvalidParameter("input_object_ref is required".to_string())
            })?
            .parse::<ObjectRef>()?;

        let workspace_id = match params.workspace_id {
            Some(id) if id > 0 => id as u64,
            Some(id) => {
                return Err(GtdbtkError::InvalidParameter(format!(
                    "workspace_id must be a positive integer, got {id}"
                )));
            }
            None => {
                return Err(GtdbtkError::InvalidParameter(
                    "workspace_id is required".to_string(),
                ));
            }
        };

        let min_perc_aa = params.min_perc_aa.unwrap_or(DEFAULT_MIN_PERC_AA);
        if !min_perc_aa.is_finite() || !(0.0..=100.0).contains(&min_perc_aa) {
            return Err(GtdbtkError::InvalidParameter(format!(
                "min_perc_aa must be a percentage between 0 and 100, got {min_perc_aa}"
            )));
        }

        Ok(ResolvedParams {
            reference,
            workspace_id,
            min_perc_aa,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn null_threshold_uses_default() {
        let resolved = ParamResolver::resolve(json!({
            "input_object_ref": "1/2/3",
            "workspace_id": 9,
            "min_perc_aa": null
        }))
        .unwrap();
        assert_eq!(resolved.min_perc_aa, DEFAULT_MIN_PERC_AA);
    }
}
