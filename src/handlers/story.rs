//! Story handler: `/story/get` writes two rows to the demo table and answers in text.

use crate::db::{Database, DEMO_TABLE};
use crate::dispatch::MethodTable;
use crate::error::AppError;
use crate::handler::{Call, Handler};
use std::sync::Arc;

pub struct StoryHandler {
    db: Database,
}

impl StoryHandler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn get(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        let inserted = {
            let mut conn = self.db.acquire().await?;
            let columns: Vec<(String,)> = sqlx::query_as(
                "SELECT column_name::text FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position",
            )
            .bind(DEMO_TABLE)
            .fetch_all(&mut *conn)
            .await?;
            tracing::debug!(table = DEMO_TABLE, columns = ?columns, "describe");

            let sql = format!("INSERT INTO {} (val) VALUES ($1)", DEMO_TABLE);
            let mut inserted = 0;
            for val in ["abc", "xyz"] {
                inserted += sqlx::query(&sql)
                    .bind(val)
                    .execute(&mut *conn)
                    .await?
                    .rows_affected();
            }
            inserted
        };

        call.write_text(format!(
            "this is method {}, {}, {}",
            call.route().method,
            inserted,
            chrono::Utc::now().timestamp()
        ))
    }
}

impl Handler for StoryHandler {
    fn methods() -> MethodTable<Self> {
        MethodTable::<Self>::new().method("get", |h, call| Box::pin(h.get(call)))
    }
}
