pub mod classroom;
pub mod school;
pub mod student;
pub mod token;
