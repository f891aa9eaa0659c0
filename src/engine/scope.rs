//! Counterparty scope and role rules deciding which payments belong to a fund.

use crate::domain::{Address, CounterpartyType, Direction, Directory};

/// Which counterparty pairs are in scope for the sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterpartyScope {
    #[default]
    FundResidentOnly,
    FundFund,
    ResidentResident,
    AllRelevant,
}

impl CounterpartyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartyScope::FundResidentOnly => "FUND_RESIDENT_ONLY",
            CounterpartyScope::FundFund => "FUND_FUND",
            CounterpartyScope::ResidentResident => "RESIDENT_RESIDENT",
            CounterpartyScope::AllRelevant => "ALL_RELEVANT",
        }
    }

    /// Unrecognised values fall back to the default scope.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "FUND_FUND" => CounterpartyScope::FundFund,
            "RESIDENT_RESIDENT" => CounterpartyScope::ResidentResident,
            "ALL_RELEVANT" => CounterpartyScope::AllRelevant,
            _ => CounterpartyScope::FundResidentOnly,
        }
    }
}

impl std::fmt::Display for CounterpartyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fund/resident membership of both sides of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    pub from_is_fund: bool,
    pub to_is_fund: bool,
    pub from_is_resident: bool,
    pub to_is_resident: bool,
}

impl Roles {
    pub fn resolve(directory: &Directory, from: &Address, to: &Address) -> Self {
        Self {
            from_is_fund: directory.is_fund(from),
            to_is_fund: directory.is_fund(to),
            from_is_resident: directory.is_resident(from),
            to_is_resident: directory.is_resident(to),
        }
    }

    fn touches_fund(&self) -> bool {
        self.from_is_fund || self.to_is_fund
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleFilter {
    pub scope: CounterpartyScope,
    pub relax_role_filter: bool,
}

impl RoleFilter {
    pub fn new(scope: CounterpartyScope, relax_role_filter: bool) -> Self {
        Self {
            scope,
            relax_role_filter,
        }
    }

    pub fn scope_allows(&self, roles: &Roles) -> bool {
        match self.scope {
            CounterpartyScope::FundResidentOnly => {
                (roles.from_is_resident && roles.to_is_fund)
                    || (roles.from_is_fund && roles.to_is_resident)
                    || (self.relax_role_filter && roles.touches_fund())
            }
            CounterpartyScope::FundFund => roles.from_is_fund && roles.to_is_fund,
            CounterpartyScope::ResidentResident => {
                roles.from_is_resident && roles.to_is_resident
            }
            CounterpartyScope::AllRelevant => {
                roles.touches_fund() || roles.from_is_resident || roles.to_is_resident
            }
        }
    }

    /// Section of the payment relative to the fund being synced, if any.
    pub fn section(
        &self,
        fund_address: &Address,
        from: &Address,
        to: &Address,
        roles: &Roles,
    ) -> Option<Direction> {
        if to == fund_address {
            Some(Direction::In)
        } else if from == fund_address {
            Some(Direction::Out)
        } else if self.relax_role_filter && roles.touches_fund() {
            Some(if roles.to_is_fund {
                Direction::In
            } else {
                Direction::Out
            })
        } else {
            None
        }
    }
}

/// Counterparty of a fund transfer: the sender for IN, the receiver for OUT.
pub fn counterparty_type(
    directory: &Directory,
    direction: Direction,
    from: &Address,
    to: &Address,
) -> CounterpartyType {
    let counterparty = match direction {
        Direction::In => from,
        _ => to,
    };
    if counterparty.is_empty() {
        CounterpartyType::Unknown
    } else if directory.is_resident(counterparty) {
        CounterpartyType::Resident
    } else if directory.is_fund(counterparty) {
        CounterpartyType::Fund
    } else {
        CounterpartyType::External
    }
}
