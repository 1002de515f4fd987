//! Kiwoom Adapters
//!
//! Clients for the Kiwoom Securities REST and realtime APIs:
//!
//! - **REST**: token login, continuation-key pagination, and per-transaction
//!   payload normalization (`http_client`, `transactions`, `normalize`,
//!   `tr_client`)
//! - **Realtime**: the WebSocket tick receiver feeding the price board
//!   (`messages`, `codec`, `stream`, `reconnect`)

pub mod api_types;
pub mod auth;
pub mod codec;
pub mod error;
pub mod http_client;
pub mod messages;
pub mod normalize;
pub mod reconnect;
pub mod stream;
pub mod tr_client;
pub mod transactions;

pub use api_types::TradeValueRankingRequest;
pub use auth::AccessToken;
pub use codec::{CodecError, JsonCodec, StreamFrame};
pub use error::KiwoomError;
pub use http_client::{Continuation, KiwoomHttpClient, Page};
pub use normalize::{LabeledRecord, NestedRecord, NormalizeError, Table, TableRules};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use stream::{
    StreamError, StreamEvent, StreamState, TickReceiver, TickReceiverConfig, TickReceiverHandle,
};
pub use tr_client::{AccountReport, Normalized, TrClient, normalize_payload};
pub use transactions::{PayloadShape, TransactionId};
