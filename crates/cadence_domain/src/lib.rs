pub mod activity;
pub mod category;
pub mod notifications;
pub mod occurrence;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use crate::service::{ActivityService, ActivityServiceBuilder};
