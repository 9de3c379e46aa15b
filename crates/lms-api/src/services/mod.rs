//! Data access and domain rules over the relational store. Handlers call these after
//! the guard has resolved who is asking.

pub mod assignments;
pub mod courses;
pub mod enrollments;
pub mod materials;
pub mod submissions;
pub mod users;
