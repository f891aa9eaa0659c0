//! Project mapping over reference data parsed from CSV.

use fundsync::datasource::reference::{parse_projects, parse_residents};
use fundsync::domain::{
    Address, AnomalyReason, CounterpartyType, Direction, MappingMethod, MappingResult, Transfer,
};
use fundsync::engine::{ProjectMapper, ReferenceIndexes};

const PROJECTS: &str = "\
project_id,clickup_task_id,account,issuer,token_symbol,is_active
101,t1,GBAKERY,,BREAD,TRUE
102,t2,GSHARED,,,TRUE
103,t3,GSHARED,,,1
201,,,GISSUE1,TOK1,TRUE
202,,,GISSUE2,TOK2,TRUE
203,,,GISSUE2,TOK2B,TRUE
500,,,,,TRUE
600,,GUNTRACKED,,,TRUE
700,,,,,false
";

const RESIDENTS: &str = "\
label,accounts,issuers
Bakery,GBAKERY,
Shared,GSHARED,GISSUE1;GISSUE2
,GNOLABEL,
";

fn indexes() -> ReferenceIndexes {
    let projects = parse_projects(PROJECTS.as_bytes()).unwrap();
    let residents = parse_residents(RESIDENTS.as_bytes()).unwrap();
    ReferenceIndexes::build(&projects, &residents)
}

fn transfer(from: &str, issuer: &str, memo: &str) -> Transfer {
    Transfer {
        from: Address::new(from),
        to: Address::new("GFUND"),
        asset_issuer: Address::new(issuer),
        asset_code: "TOK".to_string(),
        memo: Some(memo.to_string()),
        direction: Direction::In,
        counterparty_type: CounterpartyType::Resident,
        class_override: None,
    }
}

#[test]
fn test_indexes_only_cover_tracked_addresses() {
    let indexes = indexes();
    assert!(indexes.projects_for_account(&Address::new("GUNTRACKED")).is_empty());
    assert_eq!(indexes.projects_for_account(&Address::new("GSHARED")).len(), 2);
    assert!(indexes.is_active_project("500"));
    assert!(!indexes.is_active_project("700"));
}

#[test]
fn test_mapping_cascade() {
    let indexes = indexes();
    let mapper = ProjectMapper::default();

    let by_account = mapper.map(&transfer("GBAKERY", "GISSUE2", "P500"), &indexes);
    assert_eq!(by_account.project_id(), "101");
    assert_eq!(by_account.mapping_method(), MappingMethod::ResidentsAccount);

    let by_issuer = mapper.map(&transfer("GOTHER", "GISSUE1", "P500"), &indexes);
    assert_eq!(by_issuer.project_id(), "201");
    assert_eq!(by_issuer.mapping_method(), MappingMethod::ResidentsIssuer);

    let by_memo = mapper.map(&transfer("GOTHER", "GNOISSUER", "invoice P500"), &indexes);
    assert_eq!(by_memo.project_id(), "500");
    assert_eq!(by_memo.mapping_method(), MappingMethod::MemoProjectId);

    // Untracked accounts never map, even when listed in the project table.
    let untracked = mapper.map(&transfer("GUNTRACKED", "GNOISSUER", ""), &indexes);
    assert!(matches!(untracked, MappingResult::Unmapped(_)));
}

#[test]
fn test_ambiguity_is_reported_with_candidates() {
    let indexes = indexes();
    let mapper = ProjectMapper::default();

    let accounts = mapper.map(&transfer("GSHARED", "GISSUE1", "P500"), &indexes);
    assert_eq!(accounts.project_id(), "AMBIGUOUS");
    assert_eq!(accounts.anomaly_reason(), Some(AnomalyReason::Ambiguous));
    assert_eq!(accounts.candidates().len(), 2);

    let issuers = mapper.map(&transfer("GOTHER", "GISSUE2", "P500"), &indexes);
    assert_eq!(issuers.anomaly_reason(), Some(AnomalyReason::Ambiguous));

    let inactive = mapper.map(&transfer("GOTHER", "GNOISSUER", "P700"), &indexes);
    assert_eq!(inactive.anomaly_reason(), Some(AnomalyReason::Unmapped));
}
