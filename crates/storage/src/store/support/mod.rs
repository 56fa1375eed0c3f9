#![forbid(unsafe_code)]

mod rows;

pub(super) use rows::*;

use super::StoreError;
use rusqlite::{ErrorCode, Transaction, params};
use tp_core::ids::CategoryId;

/// Maps a UNIQUE violation on `categories` to a name conflict.
pub(super) fn map_insert_conflict(err: rusqlite::Error, name: &str) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::NameTaken {
            name: name.to_string(),
        };
    }
    StoreError::Sql(err)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message
                    .as_deref()
                    .is_some_and(|value| value.contains("UNIQUE constraint failed"))
        }
        _ => false,
    }
}

pub(super) fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

pub(super) fn count_to_sqlite(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("article count overflow"))
}

/// Appends one entry to the operation log inside the caller's transaction.
pub(super) fn append_op_tx(
    tx: &Transaction<'_>,
    op: &str,
    category_id: Option<CategoryId>,
    payload: &serde_json::Value,
    now_ms: i64,
) -> Result<(), StoreError> {
    let payload_json = serde_json::to_string(payload)?;
    tx.execute(
        "INSERT INTO category_ops(op, category_id, payload_json, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
        params![op, category_id.map(CategoryId::get), payload_json, now_ms],
    )?;
    Ok(())
}

pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
