//! Per-tenant journal number sequences
//!
//! Numbers are assigned only inside the posting transaction. The upsert takes
//! a row lock on the tenant's sequence row, so concurrent posts for the same
//! tenant serialize here and can never be issued the same number. A rolled
//! back posting transaction rolls the increment back with it, keeping the
//! sequence gap-free.

use sqlx::{Postgres, Transaction};

pub async fn next_journal_no(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO journal_number_sequences (tenant_id, last_no)
         VALUES ($1, 1)
         ON CONFLICT (tenant_id)
         DO UPDATE SET last_no = journal_number_sequences.last_no + 1
         RETURNING last_no",
    )
    .bind(tenant_id)
    .fetch_one(&mut **tx)
    .await
}
