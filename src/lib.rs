pub mod config;
pub mod gmail;
pub mod http;
pub mod model;
pub mod realtime;
pub mod relay;
pub mod render;
pub mod supabase;
