pub mod classe;
pub mod major;
pub mod major_module;
pub mod module;
pub mod notification_log;
pub mod professor_absence;
pub mod professor_profile;
pub mod staff_profile;
pub mod student_absence;
pub mod student_profile;
pub mod teaching_assignment;
pub mod threshold_setting;
pub mod user;
