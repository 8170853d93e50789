use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::export::{render_csv, render_json};
use crate::models::ExportBundle;

/// Writes the bundle as pretty JSON and its estimates as CSV.
///
/// Each file is rendered in memory first and written in one call.
pub fn write_local(bundle: &ExportBundle, json_path: &Path, csv_path: &Path) -> Result<()> {
    let json = render_json(bundle)?;
    let csv = render_csv(&bundle.carbon_estimates)?;

    for path in [json_path, csv_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(json_path, json)?;
    tracing::info!("Data exported to {}", json_path.display());
    std::fs::write(csv_path, csv)?;
    tracing::info!("Carbon estimates exported to {}", csv_path.display());
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// JSON and CSV files in `dir`, sorted by name. A missing directory yields
/// an empty list.
pub fn list_exports(dir: &Path) -> Result<Vec<ExportFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_export = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "json" || e == "csv")
            .unwrap_or(false);
        if !is_export {
            continue;
        }

        let meta = entry.metadata()?;
        files.push(ExportFile {
            path,
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::build_bundle;
    use crate::models::{EmissionEstimate, ExportMetadata, TimeWindow};
    use chrono::NaiveDate;

    fn bundle(estimates: Vec<EmissionEstimate>) -> ExportBundle {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        build_bundle(
            ExportMetadata::new("sub-1", "test", TimeWindow::new(day, day).unwrap()),
            None,
            None,
            None,
            estimates,
        )
    }

    #[test]
    fn test_write_local_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("output");
        let json_path = out.join("carbon_data.json");
        let csv_path = out.join("carbon_data.csv");

        let estimate = EmissionEstimate {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            service_name: "X".into(),
            location: "mars".into(),
            cost_usd: 10.0,
            estimated_carbon_kg: 1.2,
            service_factor_used: 0.3,
            region_factor_used: 0.4,
        };
        write_local(&bundle(vec![estimate]), &json_path, &csv_path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["summary"]["dataPointCount"], 1);

        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert_eq!(csv.lines().nth(1).unwrap(), "2024-01-01,X,mars,10.0,1.2,0.3,0.4");
    }

    #[test]
    fn test_empty_bundle_still_writes_csv_header() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("carbon_data.json");
        let csv_path = dir.path().join("carbon_data.csv");

        write_local(&bundle(Vec::new()), &json_path, &csv_path).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("date,serviceName,"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_list_exports_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.csv"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore").unwrap();

        let files = list_exports(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.json"]);
        assert_eq!(files[1].size, 2);
    }

    #[test]
    fn test_list_exports_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_exports(&dir.path().join("absent")).unwrap().is_empty());
    }
}
