//! Loading reference tables from CSV files.

use crate::domain::{Address, ProjectId, ProjectRecord, ProjectTable, TrackedCounterparty};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),
}

fn open(path: &Path) -> Result<std::fs::File, ReferenceError> {
    std::fs::File::open(path).map_err(|source| ReferenceError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `FALSE`, `false` and `0` mark a project inactive; anything else is active.
fn is_active_flag(value: Option<&str>) -> bool {
    !matches!(value, Some("FALSE") | Some("false") | Some("0"))
}

#[derive(Debug, Deserialize)]
struct ProjectRow {
    project_id: Option<String>,
    clickup_task_id: Option<String>,
    account: Option<String>,
    issuer: Option<String>,
    token_symbol: Option<String>,
    is_active: Option<String>,
}

/// Parse the project table, keeping active rows with a project id.
pub fn parse_projects<R: Read>(input: R) -> Result<ProjectTable, ReferenceError> {
    let mut table = ProjectTable::new();
    for row in reader(input).deserialize::<ProjectRow>() {
        let row = row?;
        let Some(project_id) = non_empty(row.project_id) else {
            continue;
        };
        if !is_active_flag(row.is_active.as_deref()) {
            continue;
        }
        table.insert(ProjectRecord {
            project_id: ProjectId::new(project_id),
            clickup_task_id: non_empty(row.clickup_task_id),
            account: non_empty(row.account).map(Address::new),
            issuer: non_empty(row.issuer).map(Address::new),
            token_symbol: non_empty(row.token_symbol),
        });
    }
    Ok(table)
}

pub fn load_projects(path: &Path) -> Result<ProjectTable, ReferenceError> {
    let table = parse_projects(open(path)?)?;
    debug!(path = %path.display(), projects = table.len(), "Loaded project table");
    Ok(table)
}

#[derive(Debug, Deserialize)]
struct ResidentRow {
    label: Option<String>,
    accounts: Option<String>,
    issuers: Option<String>,
}

/// Parse tracked counterparties. Rows without a label are skipped.
pub fn parse_residents<R: Read>(input: R) -> Result<Vec<TrackedCounterparty>, ReferenceError> {
    let mut residents = Vec::new();
    for row in reader(input).deserialize::<ResidentRow>() {
        let row = row?;
        let Some(label) = non_empty(row.label) else {
            continue;
        };
        residents.push(TrackedCounterparty {
            label,
            accounts: TrackedCounterparty::parse_addresses(row.accounts.as_deref().unwrap_or("")),
            issuers: TrackedCounterparty::parse_addresses(row.issuers.as_deref().unwrap_or("")),
        });
    }
    Ok(residents)
}

pub fn load_residents(path: &Path) -> Result<Vec<TrackedCounterparty>, ReferenceError> {
    let residents = parse_residents(open(path)?)?;
    debug!(path = %path.display(), residents = residents.len(), "Loaded residents");
    Ok(residents)
}

#[derive(Debug, Deserialize)]
struct AccountRow {
    account: Option<String>,
    label: Option<String>,
}

pub fn parse_account_labels<R: Read>(
    input: R,
) -> Result<HashMap<Address, String>, ReferenceError> {
    let mut labels = HashMap::new();
    for row in reader(input).deserialize::<AccountRow>() {
        let row = row?;
        if let (Some(account), Some(label)) = (non_empty(row.account), non_empty(row.label)) {
            labels.insert(Address::new(account), label);
        }
    }
    Ok(labels)
}

pub fn load_account_labels(path: &Path) -> Result<HashMap<Address, String>, ReferenceError> {
    parse_account_labels(open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_projects_skips_inactive_and_blank_ids() {
        let csv = "\
project_id,clickup_task_id,account,issuer,token_symbol,is_active
123,abc,GACC1,GISS1,BAKE,TRUE
456,,GACC2,,,
789,,GACC3,,,FALSE
790,,GACC4,,,0
,,GACC5,,,TRUE
";
        let table = parse_projects(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let ids: Vec<&str> = table.iter().map(|r| r.project_id.as_str()).collect();
        assert_eq!(ids, vec!["123", "456"]);

        let first = table.iter().next().unwrap();
        assert_eq!(first.clickup_task_id.as_deref(), Some("abc"));
        assert_eq!(first.issuer, Some(Address::new("GISS1")));
        let second = table.iter().nth(1).unwrap();
        assert_eq!(second.issuer, None);
    }

    #[test]
    fn test_parse_residents() {
        let csv = "\
label,accounts,issuers
Bakery,\"GA1, GA2;XNOPE\",GI1
,GORPHAN,
";
        let residents = parse_residents(csv.as_bytes()).unwrap();
        assert_eq!(residents.len(), 1);
        assert_eq!(
            residents[0].accounts,
            vec![Address::new("GA1"), Address::new("GA2")]
        );
        assert_eq!(residents[0].issuers, vec![Address::new("GI1")]);
    }

    #[test]
    fn test_parse_account_labels() {
        let csv = "account,label\nGA1,Treasury\nGA2,\n";
        let labels = parse_account_labels(csv.as_bytes()).unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[&Address::new("GA1")], "Treasury");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_projects(Path::new("/nonexistent/projects.csv")).unwrap_err();
        assert!(matches!(err, ReferenceError::Io { .. }));
    }
}
