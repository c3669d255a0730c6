use crate::domain::RunResult;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub file_name: String,
    pub mime_type: String,
    pub content: String,
}

/// Pretty-printed JSON of the full result.
pub fn export_json(name: &str, result: &RunResult) -> Result<ExportPayload, String> {
    let json = serde_json::to_string_pretty(result)
        .map_err(|err| format!("Failed to serialize run result: {err}"))?;
    Ok(ExportPayload {
        file_name: format!("burst-{name}.json"),
        mime_type: "application/json".to_string(),
        content: json,
    })
}

/// CSV of the per-second trend series.
pub fn export_csv(name: &str, result: &RunResult) -> ExportPayload {
    let mut csv = String::from("offset_ms,completed,latency_avg_ms\n");
    for point in &result.timeseries {
        csv.push_str(&format!(
            "{},{},{:.3}\n",
            point.offset_ms, point.completed, point.latency_avg_ms
        ));
    }
    ExportPayload {
        file_name: format!("burst-{name}.csv"),
        mime_type: "text/csv".to_string(),
        content: csv,
    }
}
