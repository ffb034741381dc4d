//! Built-in agent implementations.

pub mod function;
pub mod provider;

pub use function::FnAgent;
pub use provider::ProviderAgent;
