//! # Dynamic Message Codec
//!
//! Implements `tonic::codec::Codec` so `tonic` can move schema-less data over the wire.
//!
//! 1. **Encoder**: takes a `DynamicMessage` that has already been validated against its schema
//!    and writes its Protobuf bytes.
//! 2. **Decoder**: reads Protobuf bytes into a `DynamicMessage` of the configured descriptor and
//!    turns it into a `serde_json::Value`.
//!
//! Decoded values keep the Protobuf field names (`user_id`, not `userId`) and render 64-bit
//! integers as JSON numbers, so they can be sorted and projected by the names users type.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, SerializeOptions};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A codec encoding `DynamicMessage` values and decoding into JSON values.
#[derive(Debug, Clone)]
pub struct DynamicCodec {
    /// Schema of the messages read from the wire.
    decode_desc: MessageDescriptor,
}

impl DynamicCodec {
    /// Creates a codec decoding messages of type `decode_desc`.
    ///
    /// A client passes the method output type, a server the method input type.
    pub fn new(decode_desc: MessageDescriptor) -> Self {
        Self { decode_desc }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = serde_json::Value;

    type Encoder = DynamicEncoder;
    type Decoder = JsonDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder(self.decode_desc.clone())
    }
}

/// Writes the Protobuf bytes of a dynamic message.
#[derive(Debug)]
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode_raw(dst);
        Ok(())
    }
}

/// Decodes Protobuf bytes into a JSON value.
#[derive(Debug)]
pub struct JsonDecoder(MessageDescriptor);

impl Decoder for JsonDecoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src)
            .map_err(|e| Status::internal(format!("Failed to decode Protobuf bytes: {e}")))?;

        to_json(&msg)
            .map(Some)
            .map_err(|e| Status::internal(format!("Failed to map response to JSON: {e}")))
    }
}

/// Converts a dynamic message into JSON using proto field names and numeric 64-bit integers.
pub fn to_json(msg: &DynamicMessage) -> Result<serde_json::Value, serde_json::Error> {
    let options = SerializeOptions::new()
        .use_proto_field_name(true)
        .stringify_64_bit_integers(false);

    msg.serialize_with_options(serde_json::value::Serializer, &options)
}
