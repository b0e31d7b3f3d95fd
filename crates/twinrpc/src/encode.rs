use bytes::{Bytes, BytesMut};

/// Encodes a protobuf message into the given `BytesMut` buffer, replacing its contents.
pub fn encode_protobuf_message_to<Msg: prost::Message>(buf: &mut BytesMut, msg: &Msg) {
    buf.clear();
    buf.reserve(msg.encoded_len());
    // encoding into a buffer that was just reserved to fit can't fail
    let _ = msg.encode(buf);
}

/// Encodes a protobuf message into a new [`Bytes`].
pub fn encode_protobuf_message<Msg: prost::Message>(msg: &Msg) -> Bytes {
    let mut buf = BytesMut::new();
    encode_protobuf_message_to(&mut buf, msg);
    buf.freeze()
}
