pub mod account_repo;
pub mod budget_repo;
pub mod dimension_repo;
pub mod journal_repo;
pub mod ledger_query_repo;
pub mod period_repo;
pub mod sequence_repo;
pub mod tenant_repo;
