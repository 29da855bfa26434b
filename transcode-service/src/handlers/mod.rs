//! HTTP handlers for the transcode pipeline: uploads, job management,
//! playback, progress events, and health.

pub mod events;
pub mod health;
pub mod jobs;
pub mod playback;
pub mod uploads;
