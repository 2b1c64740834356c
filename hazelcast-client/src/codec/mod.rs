//! Encoders and decoders for the client protocol messages this crate sends itself.

mod authentication;
mod cluster_view;
mod ping;

pub use authentication::{
    AuthenticationRequest, AuthenticationResponse, AuthenticationStatus, ClientAuthenticationCodec,
};
pub use cluster_view::{ClientAddClusterViewListenerCodec, ClusterViewEvent};
pub use ping::ClientPingCodec;
