//! Query side: turning stored intervals into totals and project rollups.

pub mod aggregate;
pub mod projects;
