pub mod attendance;
pub mod audit_log;
pub mod college;
pub mod department;
pub mod faculty;
pub mod marks;
pub mod role;
pub mod student;
