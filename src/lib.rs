mod error;
pub mod gateway;

pub use error::{Error, Result};
pub use gateway::{
    FireworksPath, GatewayError, Provider, ProviderTable, RelayConfig, RelayHttpState, router,
};
