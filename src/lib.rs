pub mod configuration;
pub mod datagen;
pub mod filter;
pub mod kafka;
pub mod local_state;
pub mod pipeline;
pub mod record;
pub mod shutdown;
pub mod sink;
pub mod telemetry;
