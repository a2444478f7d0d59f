use crate::model::access::HasOwner;
use crate::model::entity::Enrollment;
use crate::model::repo::ResourceTyped;
use crate::model::{DatabaseError, ModelManager, Page, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Certificate {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    certificate_code: String,
    issued_at: DateTime<Utc>,
}

/// Certificate with course and holder names, for listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct CertificateRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub course_id: Uuid,
    pub course_code: String,
    pub course_title: String,
    pub certificate_code: String,
    pub issued_at: DateTime<Utc>,
}

impl ResourceTyped for Certificate {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Certificate
    }
}

const CODE_DIGITS: usize = 12;
const ISSUE_RETRIES: usize = 3;

/// `CERT-<issue date>-<12 hex digits of the id>`.
pub fn certificate_code(issued_at: DateTime<Utc>, id: Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("CERT-{}-{}", issued_at.format("%Y%m%d"), &simple[..CODE_DIGITS])
}

const ROW_SELECT: &str = r#"
    SELECT c.id, c.user_id, u.full_name, c.course_id, co.code AS course_code,
           co.title AS course_title, c.certificate_code, c.issued_at
    FROM certificates c
    JOIN users u ON u.id = c.user_id
    JOIN courses co ON co.id = c.course_id
"#;

impl Certificate {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn certificate_code(&self) -> &str {
        &self.certificate_code
    }

    pub async fn find_for(
        mm: &ModelManager,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM certificates WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }

    /// Issues the certificate for `enrollment` and marks the enrollment
    /// completed in one transaction. Returns the stored certificate, the
    /// updated enrollment and whether the certificate was created by this call.
    #[tracing::instrument(skip(mm, enrollment), fields(enrollment_id = %enrollment.id()))]
    pub async fn issue(
        mm: &ModelManager,
        enrollment: &Enrollment,
    ) -> DatabaseResult<(Self, Enrollment, bool)> {
        let (user_id, course_id) = (enrollment.user_id(), enrollment.course_id());
        let mut tx = mm.executor().begin().await?;

        let mut issued = None;
        for _ in 0..ISSUE_RETRIES {
            let id = Uuid::new_v4();
            // no conflict target: a taken code and an existing certificate both yield no row
            let created: Option<Self> = sqlx::query_as(
                r#"
                INSERT INTO certificates (id, user_id, course_id, certificate_code)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT DO NOTHING
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(course_id)
            .bind(certificate_code(Utc::now(), id))
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(cert) = created {
                issued = Some((cert, true));
                break;
            }

            let existing: Option<Self> =
                sqlx::query_as("SELECT * FROM certificates WHERE user_id = $1 AND course_id = $2")
                    .bind(user_id)
                    .bind(course_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if let Some(cert) = existing {
                issued = Some((cert, false));
                break;
            }
            tracing::warn!("certificate code collision, retrying");
        }

        let Some((certificate, created)) = issued else {
            return Err(DatabaseError::Conflict("certificates_certificate_code_key".into()));
        };

        let enrollment: Enrollment = sqlx::query_as(
            r#"
            UPDATE enrollments
            SET status = 'completed', completed_at = COALESCE(completed_at, now())
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(enrollment.id())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((certificate, enrollment, created))
    }

    pub async fn find(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM certificates WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }

    pub async fn find_row(mm: &ModelManager, id: Uuid) -> DatabaseResult<Option<CertificateRow>> {
        let row = sqlx::query_as(&format!("{ROW_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(row)
    }

    pub async fn mine(mm: &ModelManager, user_id: Uuid) -> DatabaseResult<Vec<CertificateRow>> {
        let rows = sqlx::query_as(&format!(
            "{ROW_SELECT} WHERE c.user_id = $1 ORDER BY c.issued_at DESC"
        ))
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    pub async fn page(
        mm: &ModelManager,
        course_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<CertificateRow>> {
        let items = sqlx::query_as(&format!(
            "{ROW_SELECT} WHERE ($1::uuid IS NULL OR c.course_id = $1) ORDER BY c.issued_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(course_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM certificates WHERE ($1::uuid IS NULL OR course_id = $1)",
        )
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;

        Ok(Page::new(items, total, limit, offset))
    }
}

#[async_trait]
impl HasOwner for Certificate {
    type OwnerId = Uuid;

    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Self::OwnerId> {
        Ok(self.user_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn code_carries_date_and_id_prefix() {
        let id = Uuid::parse_str("a1b2c3d4-e5f6-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(certificate_code(at, id), "CERT-20250309-A1B2C3D4E5F6");
    }

    #[test]
    fn ids_sharing_a_short_prefix_get_distinct_codes() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let a = Uuid::parse_str("a1b2c3d4-0001-4000-8000-000000000000").unwrap();
        let b = Uuid::parse_str("a1b2c3d4-0002-4000-8000-000000000000").unwrap();
        assert_ne!(certificate_code(at, a), certificate_code(at, b));
    }
}
