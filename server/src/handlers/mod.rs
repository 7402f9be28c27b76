pub mod ai;
pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod followups;
pub mod health_data;
pub mod patients;
pub mod prescriptions;
