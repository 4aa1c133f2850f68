//! Usage rollup materialized view.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(USAGE_VIEW_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP MATERIALIZED VIEW IF EXISTS usage_view;")
            .await?;
        Ok(())
    }
}

const USAGE_VIEW_SQL: &str = r"
CREATE MATERIALIZED VIEW usage_view AS
SELECT
    subscription_id,
    MIN(date) AS first_usage,
    MAX(date) AS latest_usage,
    SUM(cost) AS cost,
    SUM(amortised_cost) AS amortised_cost,
    SUM(total_cost) AS total_cost
FROM usage
GROUP BY subscription_id;

-- Required for REFRESH MATERIALIZED VIEW CONCURRENTLY
CREATE UNIQUE INDEX idx_usage_view_subscription ON usage_view(subscription_id);
";
