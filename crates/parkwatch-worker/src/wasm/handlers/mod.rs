pub mod accounts;
pub mod admin;
pub mod admin_auth;
pub mod devices;
pub mod guard;
pub mod migrations;
pub mod tracker;
