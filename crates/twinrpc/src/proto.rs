/// A single metadata key / value pair.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct MetadataEntry {
    /// Lowercase key of this entry.
    #[prost(string, tag = "1")]
    pub key: String,
    /// Value of this entry.
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Payload of the terminal frame of a binary protocol response.
///
/// The status of the call and its trailer metadata always travel together
/// in this message.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Trailers {
    /// Numeric status code, see [`crate::Code`].
    #[prost(int32, tag = "1")]
    pub code: i32,
    /// Human readable status message.
    #[prost(string, tag = "2")]
    pub message: String,
    /// Trailer metadata, in insertion order.
    #[prost(message, repeated, tag = "3")]
    pub metadata: Vec<MetadataEntry>,
}

/// A message with no fields.
#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct Empty {}

/// Request of the reflection `ListServices` method.
#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct ListServicesRequest {}

/// Response of the reflection `ListServices` method.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ListServicesResponse {
    /// Fully-qualified names of the services served, sorted.
    #[prost(string, repeated, tag = "1")]
    pub services: Vec<String>,
}
