pub mod services;

pub use services::SavingsService;
