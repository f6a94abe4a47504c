//! Repository for chart-of-accounts lookups

use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::dimensions::AccountPolicy;
use crate::domain::{AccountType, DepartmentRequirement, NormalBalance};

/// Chart-of-accounts entry with its dimension policy.
#[derive(Debug, Clone)]
pub struct GlAccount {
    pub id: Uuid,
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
    pub is_active: bool,
    pub department_requirement: DepartmentRequirement,
    pub requires_project: bool,
    pub requires_fund: bool,
}

impl GlAccount {
    pub fn policy(&self) -> AccountPolicy {
        AccountPolicy {
            department_requirement: self.department_requirement,
            requires_project: self.requires_project,
            requires_fund: self.requires_fund,
        }
    }
}

const SELECT_COLUMNS: &str = "id, tenant_id, code, name, account_type, normal_balance, is_active, \
     department_requirement, requires_project, requires_fund";

fn map_account(row: &sqlx::postgres::PgRow) -> Result<GlAccount, sqlx::Error> {
    let account_type: String = row.try_get("account_type")?;
    let normal_balance: String = row.try_get("normal_balance")?;
    let department_requirement: String = row.try_get("department_requirement")?;

    Ok(GlAccount {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        account_type: AccountType::parse(&account_type)
            .ok_or_else(|| decode_err("account_type", &account_type))?,
        normal_balance: NormalBalance::parse(&normal_balance)
            .ok_or_else(|| decode_err("normal_balance", &normal_balance))?,
        is_active: row.try_get("is_active")?,
        department_requirement: DepartmentRequirement::parse(&department_requirement)
            .ok_or_else(|| decode_err("department_requirement", &department_requirement))?,
        requires_project: row.try_get("requires_project")?,
        requires_fund: row.try_get("requires_fund")?,
    })
}

fn decode_err(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("unknown {column} value: {value}").into())
}

pub async fn find_by_id(
    pool: &PgPool,
    tenant_id: &str,
    account_id: Uuid,
) -> Result<Option<GlAccount>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM accounts WHERE tenant_id = $1 AND id = $2"
    ))
    .bind(tenant_id)
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_account).transpose()
}

pub async fn find_by_id_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    account_id: Uuid,
) -> Result<Option<GlAccount>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SELECT_COLUMNS} FROM accounts WHERE tenant_id = $1 AND id = $2"
    ))
    .bind(tenant_id)
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.as_ref().map(map_account).transpose()
}
