pub mod budget_service;
pub mod journal_service;
pub mod ledger_service;
pub mod reversal_service;
pub mod risk_service;
