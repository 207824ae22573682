//! SeaORM entity models

mod assignment;
mod attendance;
mod division;
mod enrollment;
mod grade;
mod profile;
mod subject;

pub use profile::{
    Entity as ProfileEntity,
    Model as Profile,
    ActiveModel as ProfileActiveModel,
    Column as ProfileColumn,
};

pub use division::{
    Entity as DivisionEntity,
    Model as Division,
    ActiveModel as DivisionActiveModel,
    Column as DivisionColumn,
};

pub use enrollment::{
    Entity as EnrollmentEntity,
    Model as Enrollment,
    ActiveModel as EnrollmentActiveModel,
    Column as EnrollmentColumn,
};

pub use subject::{
    Entity as SubjectEntity,
    Model as Subject,
    ActiveModel as SubjectActiveModel,
    Column as SubjectColumn,
};

pub use assignment::{
    Entity as AssignmentEntity,
    Model as Assignment,
    ActiveModel as AssignmentActiveModel,
    Column as AssignmentColumn,
};

pub use grade::{
    Entity as GradeEntity,
    Model as Grade,
    ActiveModel as GradeActiveModel,
    Column as GradeColumn,
};

pub use attendance::{
    Entity as AttendanceEntity,
    Model as AttendanceRecord,
    ActiveModel as AttendanceActiveModel,
    Column as AttendanceColumn,
};
