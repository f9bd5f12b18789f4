//! YouthBridge - youth employment and education marketplace
//!
//! Companies post jobs, institutions publish courses, and young people
//! build a profile, apply, enroll, message and showcase their startups.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod storage;
