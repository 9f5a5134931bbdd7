use enum_primitive_derive::Primitive;
use num_traits::{FromPrimitive, ToPrimitive};
use strum_macros::{Display, EnumIter, EnumString};

use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};

use crate::{Error, ErrorKind, Invocation, InvocationResult, Result, TypeRegistry};

/// Content type marking an encoded invocation or result on the wire.
pub const CONTENT_TYPE_SERIALIZED_INVOCATION: &str = "application/x-remote-invocation";

const MAGIC_NUMBER: u8 = 0x1d;
const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 8;

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString, Primitive)]
pub enum MessageType {
    Invocation = 0,
    Result = 1,
}

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString, Primitive)]
pub enum CompressType {
    CompressNone = 0,
    Gzip = 1,
}

#[derive(Debug, Copy, Clone, Display, PartialEq, EnumIter, EnumString, Primitive)]
pub enum SerializeType {
    SerializeNone = 0,
    JSON = 1,
    MsgPack = 3,
}

/// The fixed-size envelope header in front of every payload.
///
/// ```text
/// [0] magic  [1] version  [2] type:1 _:2 compress:3 _:2  [3] serialize:4 _:4  [4..8] payload len
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Header([u8; HEADER_LEN]);

impl Header {
    pub fn new() -> Self {
        let mut h = Header::default();
        h.0[0] = MAGIC_NUMBER;
        h.0[1] = VERSION;
        h
    }

    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        let mut h = Header::default();
        h.0.copy_from_slice(&data[..HEADER_LEN]);
        Some(h)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn check_magic_number(&self) -> bool {
        self.0[0] == MAGIC_NUMBER
    }
    pub fn get_version(&self) -> u8 {
        self.0[1]
    }
    pub fn get_message_type(&self) -> Option<MessageType> {
        MessageType::from_u8((self.0[2] & 0x80) >> 7)
    }
    pub fn set_message_type(&mut self, mt: MessageType) {
        let bit = mt.to_u8().unwrap_or(0) << 7;
        self.0[2] = (self.0[2] & !0x80) | bit;
    }
    pub fn get_compress_type(&self) -> Option<CompressType> {
        CompressType::from_u8((self.0[2] & 0x1C) >> 2)
    }
    pub fn set_compress_type(&mut self, ct: CompressType) {
        let bits = (ct.to_u8().unwrap_or(0) << 2) & 0x1C;
        self.0[2] = (self.0[2] & !0x1C) | bits;
    }
    pub fn get_serialize_type(&self) -> Option<SerializeType> {
        SerializeType::from_u8((self.0[3] & 0xF0) >> 4)
    }
    pub fn set_serialize_type(&mut self, st: SerializeType) {
        let bits = st.to_u8().unwrap_or(0) << 4;
        self.0[3] = (self.0[3] & !0xF0) | bits;
    }
    pub fn get_payload_len(&self) -> u32 {
        BigEndian::read_u32(&self.0[4..])
    }
    pub fn set_payload_len(&mut self, len: u32) {
        BigEndian::write_u32(&mut self.0[4..], len);
    }
}

/// Symmetric encoder/decoder for invocations and results.
///
/// The serialize and compress types only matter when encoding; decoding
/// reads them from the header, so both sides need not share a configuration.
#[derive(Debug, Clone)]
pub struct Codec {
    pub serialize_type: SerializeType,
    pub compress_type: CompressType,
    /// Upper bound for a gzip payload once inflated.
    pub max_decompressed_size: usize,
    registry: Option<Arc<TypeRegistry>>,
}

pub const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

impl Default for Codec {
    fn default() -> Self {
        Codec::new(SerializeType::MsgPack, CompressType::CompressNone)
    }
}

impl Codec {
    pub fn new(serialize_type: SerializeType, compress_type: CompressType) -> Self {
        Codec {
            serialize_type,
            compress_type,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            registry: None,
        }
    }

    pub fn with_max_decompressed_size(mut self, limit: usize) -> Self {
        self.max_decompressed_size = limit;
        self
    }

    /// Restricts decoded invocations to parameter types known by `registry`.
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub fn registry(&self) -> Option<&TypeRegistry> {
        self.registry.as_deref()
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE_SERIALIZED_INVOCATION
    }

    pub fn encode_invocation(&self, invocation: &Invocation) -> Result<Vec<u8>> {
        self.encode(MessageType::Invocation, invocation)
    }

    pub fn decode_invocation(&self, data: &[u8]) -> Result<Invocation> {
        let invocation: Invocation = self.decode(MessageType::Invocation, data)?;
        if !invocation.is_well_formed() {
            return Err(Error::new(
                ErrorKind::Serialization,
                format!(
                    "corrupt invocation of '{}': argument count differs from parameter types",
                    invocation.method_name()
                ),
            ));
        }
        if let Some(ref registry) = self.registry {
            for descriptor in invocation.parameter_types() {
                registry.check(descriptor, invocation.codebase())?;
            }
        }
        Ok(invocation)
    }

    pub fn encode_result(&self, result: &InvocationResult) -> Result<Vec<u8>> {
        self.encode(MessageType::Result, result)
    }

    pub fn decode_result(&self, data: &[u8]) -> Result<InvocationResult> {
        self.decode(MessageType::Result, data)
    }

    fn encode<T: Serialize>(&self, mt: MessageType, value: &T) -> Result<Vec<u8>> {
        let payload = match self.serialize_type {
            SerializeType::JSON => serde_json::to_vec(value)?,
            SerializeType::MsgPack => rmp_serde::to_vec_named(value)?,
            SerializeType::SerializeNone => {
                return Err(Error::new(
                    ErrorKind::Serialization,
                    "no serialize type configured",
                ))
            }
        };
        let payload = match self.compress_type {
            CompressType::CompressNone => payload,
            CompressType::Gzip => gzip(&payload)?,
        };
        if payload.len() > u32::MAX as usize {
            return Err(Error::new(ErrorKind::Serialization, "payload too large"));
        }

        let mut header = Header::new();
        header.set_message_type(mt);
        header.set_compress_type(self.compress_type);
        header.set_serialize_type(self.serialize_type);
        header.set_payload_len(payload.len() as u32);

        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
        buf.put_slice(header.as_bytes());
        buf.put_slice(&payload);
        Ok(buf.to_vec())
    }

    fn decode<T: DeserializeOwned>(&self, expected: MessageType, data: &[u8]) -> Result<T> {
        let header = Header::from_slice(data).ok_or_else(|| {
            Error::new(
                ErrorKind::Serialization,
                format!("truncated message: {} bytes", data.len()),
            )
        })?;
        if !header.check_magic_number() {
            return Err(Error::new(ErrorKind::Serialization, "bad magic number"));
        }
        if header.get_version() != VERSION {
            return Err(Error::new(
                ErrorKind::Serialization,
                format!("unsupported version {}", header.get_version()),
            ));
        }
        if header.get_message_type() != Some(expected) {
            return Err(Error::new(
                ErrorKind::Serialization,
                format!("expected a message of type {}", expected),
            ));
        }

        let payload = &data[HEADER_LEN..];
        let len = header.get_payload_len() as usize;
        if payload.len() != len {
            return Err(Error::new(
                ErrorKind::Serialization,
                format!(
                    "payload length mismatch: header says {}, got {}",
                    len,
                    payload.len()
                ),
            ));
        }

        let payload = match header.get_compress_type() {
            Some(CompressType::CompressNone) => payload.to_vec(),
            Some(CompressType::Gzip) => gunzip(payload, self.max_decompressed_size)?,
            None => {
                return Err(Error::new(
                    ErrorKind::Serialization,
                    "unknown compress type",
                ))
            }
        };

        match header.get_serialize_type() {
            Some(SerializeType::JSON) => Ok(serde_json::from_slice(&payload)?),
            Some(SerializeType::MsgPack) => Ok(rmp_serde::from_slice(&payload)?),
            _ => Err(Error::new(
                ErrorKind::Serialization,
                "unknown serialize type",
            )),
        }
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|err| Error::new(ErrorKind::Serialization, err))?;
    encoder
        .finish()
        .map_err(|err| Error::new(ErrorKind::Serialization, err))
}

fn gunzip(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|err| Error::new(ErrorKind::Serialization, err))?;
    if out.len() > limit {
        return Err(Error::new(
            ErrorKind::Serialization,
            format!("compressed payload inflates beyond {} bytes", limit),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RemoteFailure;
    use serde_json::json;

    fn invocation() -> Invocation {
        let mut invocation = Invocation::new(
            "setName",
            vec!["String".to_owned(), "Option<u32>".to_owned()],
            vec![json!("myname"), json!(null)],
        )
        .unwrap();
        invocation
            .add_attribute("principal", json!({"user": "juergen", "roles": ["admin"]}))
            .unwrap();
        invocation
    }

    #[test]
    fn header_bits() {
        let mut header = Header::new();
        header.set_message_type(MessageType::Result);
        header.set_compress_type(CompressType::Gzip);
        header.set_serialize_type(SerializeType::JSON);
        header.set_payload_len(1234567);

        assert!(header.check_magic_number());
        assert_eq!(VERSION, header.get_version());
        assert_eq!(Some(MessageType::Result), header.get_message_type());
        assert_eq!(Some(CompressType::Gzip), header.get_compress_type());
        assert_eq!(Some(SerializeType::JSON), header.get_serialize_type());
        assert_eq!(1234567, header.get_payload_len());

        header.set_message_type(MessageType::Invocation);
        assert_eq!(Some(MessageType::Invocation), header.get_message_type());
        assert_eq!(Some(CompressType::Gzip), header.get_compress_type());
    }

    #[test]
    fn invocation_survives_every_codec_setting() {
        let original = invocation();
        for &st in &[SerializeType::MsgPack, SerializeType::JSON] {
            for &ct in &[CompressType::CompressNone, CompressType::Gzip] {
                let encoded = Codec::new(st, ct).encode_invocation(&original).unwrap();
                // the receiver reads the settings from the header
                let decoded = Codec::default().decode_invocation(&encoded).unwrap();
                assert_eq!(original, decoded, "{} / {}", st, ct);
            }
        }
    }

    #[test]
    fn results_survive_encoding() {
        let codec = Codec::default();
        let failure = RemoteFailure::new("IllegalAccess", "denied")
            .with_cause(RemoteFailure::new("cause", "no session"));
        for result in vec![
            InvocationResult::Value(json!([1, 2.5, "x", {"k": false}])),
            InvocationResult::Value(json!(null)),
            InvocationResult::Failure(failure),
        ] {
            let encoded = codec.encode_result(&result).unwrap();
            assert_eq!(result, codec.decode_result(&encoded).unwrap());
        }
    }

    #[test]
    fn rejects_truncated_and_corrupt_input() {
        let codec = Codec::default();
        let encoded = codec.encode_invocation(&invocation()).unwrap();

        let err = codec.decode_invocation(&encoded[..4]).unwrap_err();
        assert_eq!(ErrorKind::Serialization, err.kind());

        let err = codec
            .decode_invocation(&encoded[..encoded.len() - 1])
            .unwrap_err();
        assert_eq!(ErrorKind::Serialization, err.kind());

        let mut corrupt = encoded.clone();
        corrupt[0] = 0x08;
        assert!(codec.decode_invocation(&corrupt).is_err());

        let mut corrupt = encoded.clone();
        for b in corrupt[HEADER_LEN..].iter_mut() {
            *b = 0xc1;
        }
        assert_eq!(
            ErrorKind::Serialization,
            codec.decode_invocation(&corrupt).unwrap_err().kind()
        );

        // an invocation is not a result
        assert!(codec.decode_result(&encoded).is_err());
    }

    #[test]
    fn inflated_payload_is_bounded() {
        let bulky = Invocation::new(
            "store",
            vec!["String".to_owned()],
            vec![json!("0".repeat(100_000))],
        )
        .unwrap();
        let encoded = Codec::new(SerializeType::MsgPack, CompressType::Gzip)
            .encode_invocation(&bulky)
            .unwrap();
        assert!(encoded.len() < 10_000);

        let err = Codec::default()
            .with_max_decompressed_size(10_000)
            .decode_invocation(&encoded)
            .unwrap_err();
        assert_eq!(ErrorKind::Serialization, err.kind());
        assert!(err.to_string().contains("10000"), "{}", err);

        let decoded = Codec::default().decode_invocation(&encoded).unwrap();
        assert_eq!(bulky, decoded);
    }

    #[test]
    fn registry_rejects_unknown_parameter_types() {
        let mut registry = TypeRegistry::new();
        registry.register("String");
        let codec = Codec::default().with_registry(registry);

        let encoded = codec.encode_invocation(&invocation()).unwrap();
        let err = codec.decode_invocation(&encoded).unwrap_err();
        assert_eq!(ErrorKind::Serialization, err.kind());
        assert!(err.to_string().contains("Option<u32>"));
    }
}
