use clap::{Parser, Subcommand};
use lms::model::entity::{
    Course, CourseCategory, CourseCreate, CourseStatus, Department, EmployeeLevel, EnrollType,
    LookupCreate, NamedLookup, TypeDocument, UserEntity, UserEntityCreateUpdate,
};
use lms::model::{CrudRepository, DatabaseError, DbConnection, ModelManager};
use lms::web::{AuthenticatedUser, UserRole};

#[derive(Parser, Debug)]
#[command(about = "CLI tool for seeding the learning DB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage lookup tables
    Lookup {
        #[command(subcommand)]
        action: LookupCommands,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        full_name: String,
        #[arg(long, default_value = "")]
        email: String,
        /// admin, hr or student
        #[arg(long, default_value = "student")]
        role: String,
        /// Department name
        #[arg(long)]
        department: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LookupCommands {
    Department {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Level {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Category {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    DocumentType {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    Add {
        #[arg(long)]
        code: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Category name
        #[arg(long)]
        category: Option<String>,
        /// mandatory or optional
        #[arg(long, default_value = "optional")]
        enroll_type: String,
        #[arg(long, default_value_t = false)]
        publish: bool,
    },
}

async fn id_by_name(
    mm: &ModelManager,
    table: &'static str,
    name: &str,
) -> Result<uuid::Uuid, DatabaseError> {
    let sql = format!("SELECT id FROM {table} WHERE name = $1");
    sqlx::query_scalar(&sql)
        .bind(name)
        .fetch_one(mm.executor())
        .await
        .map_err(DatabaseError::from)
}

#[tokio::main]
async fn main() -> lms::error::AppResult<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => lms::Config::get_or_init(true)
            .await
            .app()
            .database_uri()
            .to_string(),
    };
    let db_con = DbConnection::connect(&database_url)?;
    db_con.migrate().await?;
    let mm = ModelManager::new(db_con);
    let actor = AuthenticatedUser::admin();

    match args.command {
        Commands::User { action } => match action {
            UserCommands::Add { username, password, full_name, email, role, department } => {
                let department_id = match department {
                    Some(name) => Some(
                        Department::find_by_name(&mm, &name)
                            .await?
                            .ok_or_else(|| DatabaseError::InvalidReference(name.clone()))?
                            .id(),
                    ),
                    None => None,
                };
                let user = UserEntity::create(
                    &mm,
                    &actor,
                    UserEntityCreateUpdate {
                        username,
                        full_name,
                        email,
                        password_hash: lms::auth::hash_password(&password)?,
                        role: UserRole::from(role.as_str()),
                        department_id,
                        employee_level_id: None,
                        is_active: true,
                    },
                )
                .await?;
                println!("User created: {:?}", user);
            }
        },

        Commands::Lookup { action } => match action {
            LookupCommands::Department { name, description } => {
                let row = Department::create(&mm, &actor, LookupCreate::new(name, description)).await?;
                println!("Department created: {:?}", row);
            }
            LookupCommands::Level { name, description } => {
                let row =
                    EmployeeLevel::create(&mm, &actor, LookupCreate::new(name, description)).await?;
                println!("Employee level created: {:?}", row);
            }
            LookupCommands::Category { name, description } => {
                let row =
                    CourseCategory::create(&mm, &actor, LookupCreate::new(name, description)).await?;
                println!("Category created: {:?}", row);
            }
            LookupCommands::DocumentType { name, description } => {
                let row =
                    TypeDocument::create(&mm, &actor, LookupCreate::new(name, description)).await?;
                println!("Document type created: {:?}", row);
            }
        },

        Commands::Course { action } => match action {
            CourseCommands::Add { code, title, description, category, enroll_type, publish } => {
                let category_id = match category {
                    Some(name) => Some(id_by_name(&mm, "course_categories", &name).await?),
                    None => None,
                };
                let course = Course::create(
                    &mm,
                    &actor,
                    CourseCreate {
                        code,
                        title,
                        description,
                        category_id,
                        enroll_type: EnrollType::from(enroll_type.as_str()),
                        status: Some(if publish {
                            CourseStatus::Published
                        } else {
                            CourseStatus::Draft
                        }),
                        registration_deadline: None,
                        thumbnail_url: String::new(),
                        department_ids: vec![],
                        employee_level_ids: vec![],
                    },
                )
                .await?;
                println!("Course created: {:?}", course);
            }
        },
    }

    Ok(())
}
