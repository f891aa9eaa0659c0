//! Pure, synchronous engines: reference indexing, project mapping,
//! classification, anomaly dedup and scope rules.

pub mod anomaly_recorder;
pub mod classifier;
pub mod project_mapper;
pub mod reference_index;
pub mod scope;

pub use anomaly_recorder::AnomalyKeySet;
pub use classifier::{ClassificationRules, TransferClassifier};
pub use project_mapper::{MappingRules, ProjectMapper, DEFAULT_PROJECT_ID_PATTERN};
pub use reference_index::ReferenceIndexes;
pub use scope::{counterparty_type, CounterpartyScope, RoleFilter, Roles};
