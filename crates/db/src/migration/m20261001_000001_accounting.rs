//! Accounting schema migration.
//!
//! Creates the subscription ledger: approvals, allocations, usage, finance,
//! cost recovery, status and persistence history, external snapshots and the
//! notification audit tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: SUBSCRIPTIONS
        // ============================================================
        db.execute_unprepared(SUBSCRIPTION_SQL).await?;
        db.execute_unprepared(SUBSCRIPTION_DETAILS_SQL).await?;

        // ============================================================
        // PART 3: BUDGET LEDGER
        // ============================================================
        db.execute_unprepared(APPROVALS_SQL).await?;
        db.execute_unprepared(ALLOCATIONS_SQL).await?;
        db.execute_unprepared(STATUS_SQL).await?;
        db.execute_unprepared(PERSISTENCE_SQL).await?;

        // ============================================================
        // PART 4: USAGE & COST RECOVERY
        // ============================================================
        db.execute_unprepared(USAGE_SQL).await?;
        db.execute_unprepared(FINANCE_SQL).await?;
        db.execute_unprepared(COST_RECOVERY_SQL).await?;

        // ============================================================
        // PART 5: NOTIFICATION AUDIT
        // ============================================================
        db.execute_unprepared(EMAILS_SQL).await?;

        // ============================================================
        // PART 6: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE billing_status AS ENUM ('EXPIRED', 'OVER_BUDGET', 'OVER_BUDGET_AND_EXPIRED');
";

const SUBSCRIPTION_SQL: &str = r"
CREATE TABLE subscription (
    subscription_id UUID PRIMARY KEY,
    admin UUID NOT NULL,
    abolished BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const SUBSCRIPTION_DETAILS_SQL: &str = r"
-- Append-only snapshots of the state reported by the cloud provider
CREATE TABLE subscription_details (
    id BIGSERIAL PRIMARY KEY,
    subscription_id UUID NOT NULL REFERENCES subscription(subscription_id),
    display_name TEXT,
    state TEXT NOT NULL,
    role_assignments JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_subscription_details_latest ON subscription_details(subscription_id, id DESC);
";

const APPROVALS_SQL: &str = r"
CREATE TABLE approvals (
    id BIGSERIAL PRIMARY KEY,
    subscription_id UUID NOT NULL REFERENCES subscription(subscription_id),
    admin UUID NOT NULL,
    ticket TEXT NOT NULL,
    amount NUMERIC(18, 6) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    date_from DATE NOT NULL,
    date_to DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_approval_range CHECK (date_from <= date_to)
);

CREATE INDEX idx_approvals_subscription ON approvals(subscription_id);
";

const ALLOCATIONS_SQL: &str = r"
CREATE TABLE allocations (
    id BIGSERIAL PRIMARY KEY,
    subscription_id UUID NOT NULL REFERENCES subscription(subscription_id),
    admin UUID NOT NULL,
    ticket TEXT NOT NULL,
    amount NUMERIC(18, 6) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_allocations_subscription ON allocations(subscription_id);
";

const STATUS_SQL: &str = r"
-- Desired enable/disable decisions, latest row wins
CREATE TABLE status (
    id BIGSERIAL PRIMARY KEY,
    subscription_id UUID NOT NULL REFERENCES subscription(subscription_id),
    admin UUID NOT NULL,
    active BOOLEAN NOT NULL,
    reason billing_status,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_status_latest ON status(subscription_id, id DESC);
";

const PERSISTENCE_SQL: &str = r"
CREATE TABLE persistence (
    id BIGSERIAL PRIMARY KEY,
    subscription_id UUID NOT NULL REFERENCES subscription(subscription_id),
    admin UUID NOT NULL,
    always_on BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_persistence_latest ON persistence(subscription_id, id DESC);
";

const USAGE_SQL: &str = r"
CREATE TABLE usage (
    id TEXT PRIMARY KEY,
    subscription_id UUID NOT NULL REFERENCES subscription(subscription_id),
    date DATE NOT NULL,
    cost NUMERIC(18, 6) NOT NULL DEFAULT 0,
    amortised_cost NUMERIC(18, 6) NOT NULL DEFAULT 0,
    total_cost NUMERIC(18, 6) NOT NULL DEFAULT 0,
    invoice_section TEXT NOT NULL DEFAULT '',
    monthly_upload DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_usage_subscription_date ON usage(subscription_id, date);
CREATE INDEX idx_usage_date ON usage(date);
";

const FINANCE_SQL: &str = r"
CREATE TABLE finance (
    id BIGSERIAL PRIMARY KEY,
    subscription_id UUID NOT NULL REFERENCES subscription(subscription_id),
    ticket TEXT NOT NULL,
    amount NUMERIC(18, 6) NOT NULL,
    priority INTEGER NOT NULL,
    finance_code TEXT NOT NULL,
    date_from DATE NOT NULL,
    date_to DATE NOT NULL,
    admin UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_finance_amount CHECK (amount >= 0),
    CONSTRAINT chk_finance_range CHECK (date_from <= date_to)
);

CREATE INDEX idx_finance_subscription ON finance(subscription_id, priority, id);
";

const COST_RECOVERY_SQL: &str = r"
-- No ON DELETE: finance rows with recoveries cannot be deleted
CREATE TABLE cost_recovery (
    id BIGSERIAL PRIMARY KEY,
    finance_id BIGINT NOT NULL REFERENCES finance(id),
    subscription_id UUID NOT NULL REFERENCES subscription(subscription_id),
    month DATE NOT NULL,
    finance_code TEXT NOT NULL,
    amount NUMERIC(18, 6) NOT NULL,
    date_recovered TIMESTAMPTZ,
    admin UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_cost_recovery_month CHECK (EXTRACT(DAY FROM month) = 1)
);

CREATE INDEX idx_cost_recovery_finance ON cost_recovery(finance_id);
CREATE INDEX idx_cost_recovery_subscription ON cost_recovery(subscription_id, month DESC);

-- Watermark: one row per committed month
CREATE TABLE cost_recovery_log (
    id BIGSERIAL PRIMARY KEY,
    month DATE NOT NULL UNIQUE,
    admin UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const EMAILS_SQL: &str = r"
CREATE TABLE emails (
    id BIGSERIAL PRIMARY KEY,
    subscription_id UUID,
    email_type TEXT NOT NULL,
    recipients TEXT NOT NULL,
    extra_info JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE failed_emails (
    id BIGSERIAL PRIMARY KEY,
    subscription_id UUID,
    email_type TEXT NOT NULL,
    subject TEXT NOT NULL,
    recipients TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const TRIGGERS_SQL: &str = r"
CREATE OR REPLACE FUNCTION touch_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_subscription_updated_at
    BEFORE UPDATE ON subscription
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();

CREATE TRIGGER trg_finance_updated_at
    BEFORE UPDATE ON finance
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS failed_emails CASCADE;
DROP TABLE IF EXISTS emails CASCADE;
DROP TABLE IF EXISTS cost_recovery_log CASCADE;
DROP TABLE IF EXISTS cost_recovery CASCADE;
DROP TABLE IF EXISTS finance CASCADE;
DROP TABLE IF EXISTS usage CASCADE;
DROP TABLE IF EXISTS persistence CASCADE;
DROP TABLE IF EXISTS status CASCADE;
DROP TABLE IF EXISTS allocations CASCADE;
DROP TABLE IF EXISTS approvals CASCADE;
DROP TABLE IF EXISTS subscription_details CASCADE;
DROP TABLE IF EXISTS subscription CASCADE;
DROP FUNCTION IF EXISTS touch_updated_at();
DROP TYPE IF EXISTS billing_status;
";
