use anyhow::Result;

use crate::grades::ChangeEvent;
use crate::snapshot::StateSnapshot;

pub fn events_to_csv(events: &[ChangeEvent]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "kind",
        "evaluation_id",
        "module",
        "evaluation",
        "old_grade",
        "new_grade",
        "escalate",
    ])?;
    for event in events {
        writer.write_record([
            kind_label(event),
            event.evaluation.id.clone(),
            event.evaluation.module_label(),
            event.evaluation.description.clone(),
            event.old_grade.clone().unwrap_or_default(),
            event.new_grade.clone(),
            event.escalate.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn snapshot_to_csv(snapshot: &StateSnapshot) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["evaluation_id", "grade"])?;
    for (id, grade) in snapshot.iter() {
        writer.write_record([id, grade])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

fn kind_label(event: &ChangeEvent) -> String {
    format!("{:?}", event.kind).to_lowercase()
}
