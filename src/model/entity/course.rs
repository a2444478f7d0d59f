use crate::impl_paginatable_for;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, Page, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// How an enrollment came to be: assigned by staff or taken by the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnrollType {
    Mandatory,
    Optional,
}

impl EnrollType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mandatory => "mandatory",
            Self::Optional => "optional",
        }
    }
}

impl From<&str> for EnrollType {
    fn from(value: &str) -> Self {
        match value {
            "mandatory" => Self::Mandatory,
            _ => Self::Optional,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl From<&str> for CourseStatus {
    fn from(value: &str) -> Self {
        match value {
            "published" => Self::Published,
            "archived" => Self::Archived,
            _ => Self::Draft,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Course {
    id: Uuid,
    code: String,
    title: String,
    description: String,
    category_id: Option<Uuid>,
    enroll_type: String,
    status: String,
    registration_deadline: Option<DateTime<Utc>>,
    thumbnail_url: String,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CourseCreate {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<Uuid>,
    pub enroll_type: EnrollType,
    pub status: Option<CourseStatus>,
    pub registration_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub thumbnail_url: String,
    /// Target audience; replaced wholesale on update.
    #[serde(default)]
    pub department_ids: Vec<Uuid>,
    #[serde(default)]
    pub employee_level_ids: Vec<Uuid>,
}

impl ResourceTyped for Course {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Course
    }
}

impl Course {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category_id(&self) -> Option<Uuid> {
        self.category_id
    }

    pub fn enroll_type(&self) -> EnrollType {
        EnrollType::from(self.enroll_type.as_str())
    }

    pub fn status(&self) -> CourseStatus {
        CourseStatus::from(self.status.as_str())
    }

    pub fn is_published(&self) -> bool {
        self.status() == CourseStatus::Published
    }

    pub fn registration_deadline(&self) -> Option<DateTime<Utc>> {
        self.registration_deadline
    }

    /// `true` once the registration deadline lies in the past.
    pub fn registration_closed(&self, now: DateTime<Utc>) -> bool {
        self.registration_deadline.is_some_and(|deadline| deadline < now)
    }

    pub fn created_by(&self) -> Option<Uuid> {
        self.created_by
    }
}

#[async_trait::async_trait]
impl CrudRepository<Course, CourseCreate, Uuid> for Course {
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.executor().begin().await?;

        let course: Course = sqlx::query_as(
            r#"
            INSERT INTO courses
                (id, code, title, description, category_id, enroll_type, status,
                 registration_deadline, thumbnail_url, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.code.trim())
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.category_id)
        .bind(data.enroll_type.as_str())
        .bind(data.status.unwrap_or(CourseStatus::Draft).as_str())
        .bind(data.registration_deadline)
        .bind(&data.thumbnail_url)
        .bind(actor.user_ref())
        .fetch_one(&mut *tx)
        .await?;

        replace_targets(&mut tx, course.id, &data.department_ids, &data.employee_level_ids).await?;
        tx.commit().await?;

        Ok(course)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.executor().begin().await?;

        let course: Course = sqlx::query_as(
            r#"
            UPDATE courses
            SET code = $1, title = $2, description = $3, category_id = $4, enroll_type = $5,
                status = $6, registration_deadline = $7, thumbnail_url = $8, updated_at = now()
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(data.code.trim())
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.category_id)
        .bind(data.enroll_type.as_str())
        .bind(data.status.unwrap_or(self.status()).as_str())
        .bind(data.registration_deadline)
        .bind(&data.thumbnail_url)
        .bind(self.id)
        .fetch_one(&mut *tx)
        .await?;

        replace_targets(&mut tx, course.id, &data.department_ids, &data.employee_level_ids).await?;
        tx.commit().await?;

        Ok(course)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        // lessons, tests, files, enrollments, feedback and certificates cascade
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let page = Self::search(mm, actor, &CourseFilter::default(), limit, offset).await?;
        Ok(page.items)
    }

    async fn count(mm: &ModelManager, actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM courses WHERE ($1 OR status = 'published')",
        )
        .bind(actor.is_staff())
        .fetch_one(mm.executor())
        .await?;

        Ok(result)
    }
}

impl_paginatable_for!(Course, CourseCreate, Uuid);

async fn replace_targets(
    tx: &mut sqlx::PgConnection,
    course_id: Uuid,
    department_ids: &[Uuid],
    employee_level_ids: &[Uuid],
) -> DatabaseResult<()> {
    sqlx::query("DELETE FROM course_departments WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM course_employee_levels WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO course_departments (course_id, department_id)
        SELECT $1, d FROM UNNEST($2::uuid[]) AS d
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(course_id)
    .bind(department_ids)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO course_employee_levels (course_id, employee_level_id)
        SELECT $1, l FROM UNNEST($2::uuid[]) AS l
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(course_id)
    .bind(employee_level_ids)
    .execute(&mut *tx)
    .await?;

    Ok(())
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CourseFilter {
    pub category_id: Option<Uuid>,
    pub status: Option<CourseStatus>,
    pub search: Option<String>,
}

/// Target audience of a course.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CourseTargets {
    pub department_ids: Vec<Uuid>,
    pub employee_level_ids: Vec<Uuid>,
}

impl Course {
    /// Students only ever see published courses, whatever the filter says.
    pub async fn search(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        filter: &CourseFilter,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Page<Self>> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let status = if actor.is_staff() {
            filter.status.map(|s| s.as_str())
        } else {
            Some(CourseStatus::Published.as_str())
        };

        let where_clause = r#"
            WHERE ($1::uuid IS NULL OR category_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR title ILIKE $3 OR code ILIKE $3)
        "#;

        let items = sqlx::query_as(&format!(
            "SELECT * FROM courses {where_clause} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(filter.category_id)
        .bind(status)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM courses {where_clause}"))
            .bind(filter.category_id)
            .bind(status)
            .bind(&pattern)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, limit, offset))
    }

    pub async fn targets(&self, mm: &ModelManager) -> DatabaseResult<CourseTargets> {
        let (department_ids, employee_level_ids) = tokio::try_join!(
            sqlx::query_scalar::<_, Uuid>(
                "SELECT department_id FROM course_departments WHERE course_id = $1"
            )
            .bind(self.id)
            .fetch_all(mm.executor()),
            sqlx::query_scalar::<_, Uuid>(
                "SELECT employee_level_id FROM course_employee_levels WHERE course_id = $1"
            )
            .bind(self.id)
            .fetch_all(mm.executor()),
        )?;

        Ok(CourseTargets {
            department_ids,
            employee_level_ids,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn course(deadline: Option<DateTime<Utc>>) -> Course {
        Course {
            id: Uuid::new_v4(),
            code: "SAFE-101".into(),
            title: "Safety basics".into(),
            description: String::new(),
            category_id: None,
            enroll_type: "optional".into(),
            status: "published".into(),
            registration_deadline: deadline,
            thumbnail_url: String::new(),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn registration_window() {
        let now = Utc::now();
        assert!(!course(None).registration_closed(now));
        assert!(!course(Some(now + chrono::Duration::days(1))).registration_closed(now));
        assert!(course(Some(now - chrono::Duration::minutes(1))).registration_closed(now));
    }

    #[test]
    fn stored_strings_map_to_enums() {
        let c = course(None);
        assert_eq!(c.enroll_type(), EnrollType::Optional);
        assert!(c.is_published());
        assert_eq!(EnrollType::from("mandatory"), EnrollType::Mandatory);
        assert_eq!(CourseStatus::from("bogus"), CourseStatus::Draft);
    }

    #[test]
    fn create_payload_defaults() {
        let data: CourseCreate = serde_json::from_value(serde_json::json!({
            "code": "C1",
            "title": "Course",
            "enroll_type": "mandatory",
        }))
        .unwrap();
        assert_eq!(data.enroll_type, EnrollType::Mandatory);
        assert!(data.status.is_none());
        assert!(data.department_ids.is_empty());
    }
}
