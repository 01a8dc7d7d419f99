pub mod alert;
pub mod config;
pub mod template_data;

pub use alert::{Alert, AlertStatus};
pub use template_data::{AlertData, TemplateData};
