//! Db handler: `/db/query` runs the `sql` from a JSON body and returns the rows.

use crate::db::Database;
use crate::dispatch::MethodTable;
use crate::error::AppError;
use crate::handler::{Call, Handler};
use std::sync::Arc;

pub struct DbHandler {
    db: Database,
}

impl DbHandler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn query(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        let sql = call
            .json_arg("sql")?
            .as_str()
            .ok_or_else(|| AppError::BadRequest("sql must be a string".into()))?;
        let rows = self.db.fetch_rows(sql).await?;
        call.write_json(rows)
    }
}

impl Handler for DbHandler {
    fn methods() -> MethodTable<Self> {
        MethodTable::<Self>::new().method("query", |h, call| Box::pin(h.query(call)))
    }
}
