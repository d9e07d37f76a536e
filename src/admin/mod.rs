pub mod dto;
pub mod services;

pub use dto::{AdminUserRow, AdminUserUpdate, Analytics, SettingsView};
pub use services::AdminService;
