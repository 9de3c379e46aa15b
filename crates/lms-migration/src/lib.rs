use sea_orm_migration::prelude::*;

mod m0001_create_users;
mod m0002_create_courses;
mod m0003_create_enrollments;
mod m0004_create_materials;
mod m0005_create_assignments;
mod m0006_create_submissions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_users::Migration),
            Box::new(m0002_create_courses::Migration),
            Box::new(m0003_create_enrollments::Migration),
            Box::new(m0004_create_materials::Migration),
            Box::new(m0005_create_assignments::Migration),
            Box::new(m0006_create_submissions::Migration),
        ]
    }
}
