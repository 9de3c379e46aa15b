pub mod assignments;
pub mod courses;
pub mod enrollments;
pub mod materials;
pub mod sea_orm_active_enums;
pub mod submissions;
pub mod users;

pub use sea_orm_active_enums::{CourseLevel, MaterialType, Role};
