//! MedStudy - study platform backend for medical students
//!
//! Learning content, flashcards, question banks and an error notebook,
//! all scheduled through a single FSRS review queue, plus simulated
//! exams, mentorships and a study planner.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
