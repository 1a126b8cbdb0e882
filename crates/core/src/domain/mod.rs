pub mod submission;
pub mod tenant;
