pub mod cross_encoder;
pub mod json;
pub mod provider;
