/// Layers usable by both servers and clients.
#[cfg(feature = "_common")]
pub mod layer;
/// Common code to work with transports.
pub mod transport;
