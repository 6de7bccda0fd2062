pub mod absence;
pub mod assignment;
pub mod auth;
pub mod classe;
pub mod major;
pub mod module;
pub mod notification;
pub mod professor;
pub mod stats;
pub mod student;
pub mod threshold;
pub mod user;
