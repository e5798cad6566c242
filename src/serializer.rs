//! Laptop file formats: protobuf binary and pretty JSON.
//!
//! JSON uses the proto field names; `updated_at` is written as an RFC 3339 string.

use std::fs;
use std::io::Write;
use std::path::Path;

use prost::Message;
use tempfile::NamedTempFile;

use crate::pb::Laptop;
use crate::Result;

/// Writes the laptop in protobuf wire format.
pub fn write_binary_file<P: AsRef<Path>>(laptop: &Laptop, path: P) -> Result<()> {
    write_atomic(path.as_ref(), &laptop.encode_to_vec())
}

pub fn read_binary_file<P: AsRef<Path>>(path: P) -> Result<Laptop> {
    let bytes = fs::read(path)?;
    Ok(Laptop::decode(bytes.as_slice())?)
}

pub fn laptop_to_json(laptop: &Laptop) -> Result<String> {
    Ok(serde_json::to_string_pretty(laptop)?)
}

pub fn write_json_file<P: AsRef<Path>>(laptop: &Laptop, path: P) -> Result<()> {
    write_atomic(path.as_ref(), laptop_to_json(laptop)?.as_bytes())
}

pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<Laptop> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

// Temp file in the destination directory, renamed over `path` once complete.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serde adapter for `Option<prost_types::Timestamp>` as an RFC 3339 string.
pub mod timestamp {
    use prost_types::Timestamp;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Timestamp>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_some(&ts.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Timestamp>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| s.parse::<Timestamp>().map_err(D::Error::custom)).transpose()
    }
}

/// Serde adapter for an `i32` enum field, written as the proto value name.
///
/// Values outside the enum are written as numbers; both forms are read back.
pub mod enum_name {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::pb::ProtoEnum;

    pub fn serialize<E: ProtoEnum, S: Serializer>(value: &i32, serializer: S) -> Result<S::Ok, S::Error> {
        match E::try_from(*value) {
            Ok(known) => serializer.serialize_str(known.as_str_name()),
            Err(_) => serializer.serialize_i32(*value),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Name(String),
        Number(i32),
    }

    pub fn deserialize<'de, E: ProtoEnum, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(value),
            Raw::Name(name) => E::from_str_name(&name)
                .map(Into::into)
                .ok_or_else(|| D::Error::custom(format!("unknown enum value {:?}", name))),
        }
    }
}
