mod user;
pub use user::{UserEntity, UserEntityCreateUpdate, UserFilter};

mod lookup;
pub use lookup::{
    CourseCategory, Department, EmployeeLevel, LookupCreate, NamedLookup, TypeDocument,
};

mod course;
pub use course::{Course, CourseCreate, CourseFilter, CourseStatus, CourseTargets, EnrollType};

mod enrollment;
pub use enrollment::{
    CourseCompletion, Enrollment, EnrollmentStatus, MyCourseRow, progress_percent,
};

mod lesson;
pub use lesson::{Lesson, LessonCreate, LessonType, LessonWithProgressRow};

mod lesson_progress;
pub use lesson_progress::{LessonProgress, ProgressTarget, ProgressUpdate};

mod quiz;
pub use quiz::{Test, TestCreate};

mod question;
pub use question::{Question, QuestionCreate, QuestionType};

mod test_result;
pub use test_result::{ATTEMPTS_EXHAUSTED, TestResult, UserAnswer};

mod attached_file;
pub use attached_file::{AttachedFile, AttachedFileCreate};

mod feedback;
pub use feedback::{Feedback, FeedbackCreate, FeedbackRow};

mod certificate;
pub use certificate::{Certificate, CertificateRow, certificate_code};

mod audit_log;
pub use audit_log::{AuditAction, AuditLog, AuditLogFilter};

pub mod report;
