mod gateway;
mod subscription;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use gateway::{ChainGateway, GatewayConfig};
pub use subscription::{MessageSubscription, SubscriptionHandle};
pub use transport::{BoxedProvider, CallRequest, ContractTransport, LogStream, RpcTransport, TxOutcome};
