use bytes::{Buf, BufMut};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use tonic::{
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
    Status,
};

/// Encodes messages as JSON documents within gRPC frames.
#[derive(Debug)]
pub struct JsonCodec<E, D>(PhantomData<fn() -> (E, D)>);

#[derive(Debug)]
pub struct JsonEncoder<T>(PhantomData<fn() -> T>);

#[derive(Debug)]
pub struct JsonDecoder<T>(PhantomData<fn() -> T>);

// === impl JsonCodec ===

impl<E, D> Default for JsonCodec<E, D> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<E, D> Codec for JsonCodec<E, D>
where
    E: Serialize + Send + 'static,
    D: DeserializeOwned + Send + 'static,
{
    type Encode = E;
    type Decode = D;
    type Encoder = JsonEncoder<E>;
    type Decoder = JsonDecoder<D>;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder(PhantomData)
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder(PhantomData)
    }
}

// === impl JsonEncoder ===

impl<T: Serialize> Encoder for JsonEncoder<T> {
    type Item = T;
    type Error = Status;

    fn encode(&mut self, item: T, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        serde_json::to_writer(dst.writer(), &item)
            .map_err(|error| Status::internal(format!("failed to encode message: {error}")))
    }
}

// === impl JsonDecoder ===

impl<T: DeserializeOwned> Decoder for JsonDecoder<T> {
    type Item = T;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<T>, Status> {
        serde_json::from_reader(src.reader())
            .map(Some)
            .map_err(|error| Status::internal(format!("failed to decode message: {error}")))
    }
}
