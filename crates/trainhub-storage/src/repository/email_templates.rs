//! Email template repository

use crate::db::{db_error, DatabasePool};
use crate::models::{CreateEmailTemplate, EmailTemplate};
use async_trait::async_trait;
use trainhub_common::types::TemplateId;
use trainhub_common::{Error, Result};
use uuid::Uuid;

/// Email template repository trait
#[async_trait]
pub trait EmailTemplateRepository: Send + Sync {
    async fn create(&self, input: CreateEmailTemplate) -> Result<EmailTemplate>;
    async fn get(&self, id: TemplateId) -> Result<Option<EmailTemplate>>;
    async fn set_active(&self, id: TemplateId, is_active: bool) -> Result<()>;
}

/// Database email template repository
pub struct DbEmailTemplateRepository {
    pool: DatabasePool,
}

impl DbEmailTemplateRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailTemplateRepository for DbEmailTemplateRepository {
    async fn create(&self, input: CreateEmailTemplate) -> Result<EmailTemplate> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, EmailTemplate>(
            r#"
            INSERT INTO email_templates (id, name, template_type, subject, body, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, true, $6, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.template_type)
        .bind(&input.subject)
        .bind(&input.body)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Validation(format!("Template name already exists: {}", input.name))
            }
            other => db_error(other),
        })
    }

    async fn get(&self, id: TemplateId) -> Result<Option<EmailTemplate>> {
        sqlx::query_as::<_, EmailTemplate>("SELECT * FROM email_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(db_error)
    }

    async fn set_active(&self, id: TemplateId, is_active: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE email_templates SET is_active = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(is_active)
        .bind(chrono::Utc::now())
        .execute(self.pool.pool())
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Email template {}", id)));
        }
        Ok(())
    }
}
