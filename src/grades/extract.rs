use serde_json::Value;
use tracing::warn;

use crate::error::{PortalError, Result};
use crate::grades::{Evaluation, GradeStats};
use crate::portal::document::{array_or_empty, object_or_empty, optional_string, string_field};

pub const MODULE_SECTIONS: [&str; 2] = ["ressources", "saes"];

#[derive(Debug, Default)]
pub struct Extraction {
    pub evaluations: Vec<Evaluation>,
    pub rejected: Vec<PortalError>,
}

/// Pulls every evaluation out of a `relevéEtudiant` payload. A malformed
/// record or module is set aside in `rejected` and the walk continues.
pub fn extract_evaluations(report: &Value) -> Result<Extraction> {
    let mut extraction = Extraction::default();
    if object_or_empty(report, "relevé")?.is_none() {
        return Ok(extraction);
    }
    let releve = &report["relevé"];

    for section in MODULE_SECTIONS {
        let modules = match object_or_empty(releve, section) {
            Ok(Some(modules)) => modules,
            Ok(None) => continue,
            Err(err) => {
                warn!("skipping section {section}: {err}");
                extraction.rejected.push(err);
                continue;
            }
        };
        for (code, module) in modules {
            if let Err(err) = extract_module(code, module, &mut extraction) {
                warn!("skipping module {code}: {err}");
                extraction.rejected.push(err);
            }
        }
    }
    Ok(extraction)
}

fn extract_module(code: &str, module: &Value, extraction: &mut Extraction) -> Result<()> {
    let title = string_field(module, "titre")?;
    for item in array_or_empty(module, "evaluations")? {
        match evaluation_from_record(code, &title, item) {
            Ok(evaluation) => extraction.evaluations.push(evaluation),
            Err(err) => {
                warn!("skipping evaluation in {code}: {err}");
                extraction.rejected.push(err);
            }
        }
    }
    Ok(())
}

fn evaluation_from_record(code: &str, title: &str, item: &Value) -> Result<Evaluation> {
    let id = string_field(item, "id")?;
    let description = string_field(item, "description")?;
    let note = |key: &str| item.get("note").and_then(|note| optional_string(note, key));
    Ok(Evaluation {
        id,
        description,
        module_code: code.to_string(),
        module_title: title.to_string(),
        grade: note("value"),
        stats: GradeStats {
            mean: note("moy"),
            min: note("min"),
            max: note("max"),
        },
    })
}
