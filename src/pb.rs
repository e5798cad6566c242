//! Wire types for the `pcbook.LaptopService` gRPC API.
//!
//! Messages are declared directly with prost derives (standard protobuf wire
//! format, no `.proto` compilation step). The service trait, server and client
//! are generated by `build.rs` and included at the bottom of this module.
//!
//! The catalog types (`Laptop` and its parts, `Filter`) also derive serde so the
//! [`serializer`](crate::serializer) can render them as JSON with proto field
//! names, enum value names and the weight oneof written as a plain field.

use serde::{Deserialize, Serialize};

/// Proto enum value names, as written in JSON.
pub trait ProtoEnum: Sized + Copy + TryFrom<i32> + Into<i32> {
    fn as_str_name(&self) -> &'static str;
    fn from_str_name(name: &str) -> Option<Self>;
}

macro_rules! proto_enum_names {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl ProtoEnum for $ty {
            fn as_str_name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            fn from_str_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Catalog model
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Cpu {
    #[prost(string, tag = "1")]
    pub brand: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(uint32, tag = "3")]
    pub number_cores: u32,
    #[prost(uint32, tag = "4")]
    pub number_threads: u32,
    #[prost(double, tag = "5")]
    pub min_ghz: f64,
    #[prost(double, tag = "6")]
    pub max_ghz: f64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Memory {
    #[prost(uint64, tag = "1")]
    pub value: u64,
    #[prost(enumeration = "memory::Unit", tag = "2")]
    #[serde(
        serialize_with = "crate::serializer::enum_name::serialize::<memory::Unit, _>",
        deserialize_with = "crate::serializer::enum_name::deserialize::<memory::Unit, _>"
    )]
    pub unit: i32,
}

pub mod memory {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Unit {
        Unknown = 0,
        Bit = 1,
        Byte = 2,
        Kilobyte = 3,
        Megabyte = 4,
        Gigabyte = 5,
        Terabyte = 6,
    }
}

impl Memory {
    pub fn new(value: u64, unit: memory::Unit) -> Self {
        Self {
            value,
            unit: unit as i32,
        }
    }

    /// Size of this memory in bits.
    ///
    /// Each unit is a fixed left shift of the value (`BYTE` is 3, `KILOBYTE` 13,
    /// up to `TERABYTE` at 43). An unknown unit yields 0 and results that do not
    /// fit in a `u64` saturate.
    pub fn to_bits(&self) -> u64 {
        let shift = match self.unit() {
            memory::Unit::Bit => 0,
            memory::Unit::Byte => 3,
            memory::Unit::Kilobyte => 13,
            memory::Unit::Megabyte => 23,
            memory::Unit::Gigabyte => 33,
            memory::Unit::Terabyte => 43,
            memory::Unit::Unknown => return 0,
        };
        self.value.checked_mul(1u64 << shift).unwrap_or(u64::MAX)
    }
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Gpu {
    #[prost(string, tag = "1")]
    pub brand: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(double, tag = "3")]
    pub min_ghz: f64,
    #[prost(double, tag = "4")]
    pub max_ghz: f64,
    #[prost(message, optional, tag = "5")]
    pub memory: Option<Memory>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Storage {
    #[prost(enumeration = "storage::Driver", tag = "1")]
    #[serde(
        serialize_with = "crate::serializer::enum_name::serialize::<storage::Driver, _>",
        deserialize_with = "crate::serializer::enum_name::deserialize::<storage::Driver, _>"
    )]
    pub driver: i32,
    #[prost(message, optional, tag = "2")]
    pub memory: Option<Memory>,
}

pub mod storage {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Driver {
        Unknown = 0,
        Hdd = 1,
        Ssd = 2,
    }
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Screen {
    #[prost(float, tag = "1")]
    pub size_inch: f32,
    #[prost(message, optional, tag = "2")]
    pub resolution: Option<screen::Resolution>,
    #[prost(enumeration = "screen::Panel", tag = "3")]
    #[serde(
        serialize_with = "crate::serializer::enum_name::serialize::<screen::Panel, _>",
        deserialize_with = "crate::serializer::enum_name::deserialize::<screen::Panel, _>"
    )]
    pub panel: i32,
    #[prost(bool, tag = "4")]
    pub multitouch: bool,
}

pub mod screen {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    pub struct Resolution {
        #[prost(uint32, tag = "1")]
        pub width: u32,
        #[prost(uint32, tag = "2")]
        pub height: u32,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Panel {
        Unknown = 0,
        Ips = 1,
        Oled = 2,
    }
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Keyboard {
    #[prost(enumeration = "keyboard::Layout", tag = "1")]
    #[serde(
        serialize_with = "crate::serializer::enum_name::serialize::<keyboard::Layout, _>",
        deserialize_with = "crate::serializer::enum_name::deserialize::<keyboard::Layout, _>"
    )]
    pub layout: i32,
    #[prost(bool, tag = "2")]
    pub backlit: bool,
}

pub mod keyboard {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Layout {
        Unknown = 0,
        Qwerty = 1,
        Qwertz = 2,
        Azerty = 3,
    }
}

proto_enum_names!(memory::Unit {
    Unknown => "UNKNOWN",
    Bit => "BIT",
    Byte => "BYTE",
    Kilobyte => "KILOBYTE",
    Megabyte => "MEGABYTE",
    Gigabyte => "GIGABYTE",
    Terabyte => "TERABYTE",
});
proto_enum_names!(storage::Driver {
    Unknown => "UNKNOWN",
    Hdd => "HDD",
    Ssd => "SSD",
});
proto_enum_names!(screen::Panel {
    Unknown => "UNKNOWN",
    Ips => "IPS",
    Oled => "OLED",
});
proto_enum_names!(keyboard::Layout {
    Unknown => "UNKNOWN",
    Qwerty => "QWERTY",
    Qwertz => "QWERTZ",
    Azerty => "AZERTY",
});

/// A catalog entry. Records are immutable once stored.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Laptop {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub brand: String,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(message, optional, tag = "4")]
    pub cpu: Option<Cpu>,
    #[prost(message, optional, tag = "5")]
    pub ram: Option<Memory>,
    #[prost(message, repeated, tag = "6")]
    pub gpus: Vec<Gpu>,
    #[prost(message, repeated, tag = "7")]
    pub storages: Vec<Storage>,
    #[prost(message, optional, tag = "8")]
    pub screen: Option<Screen>,
    #[prost(message, optional, tag = "9")]
    pub keyboard: Option<Keyboard>,
    #[prost(oneof = "laptop::Weight", tags = "10, 11")]
    #[serde(flatten)]
    pub weight: Option<laptop::Weight>,
    #[prost(double, tag = "12")]
    pub price_usd: f64,
    #[prost(uint32, tag = "13")]
    pub release_year: u32,
    #[prost(message, optional, tag = "14")]
    #[serde(default, with = "crate::serializer::timestamp")]
    pub updated_at: Option<prost_types::Timestamp>,
}

pub mod laptop {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, prost::Oneof, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Weight {
        #[prost(double, tag = "10")]
        WeightKg(f64),
        #[prost(double, tag = "11")]
        WeightLb(f64),
    }
}

/// Search constraints. All clauses are conjunctive; an unset clause does not
/// constrain the result.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Filter {
    #[prost(double, optional, tag = "1")]
    pub max_price_usd: Option<f64>,
    #[prost(uint32, tag = "2")]
    pub min_cpu_cores: u32,
    #[prost(double, tag = "3")]
    pub min_cpu_ghz: f64,
    #[prost(message, optional, tag = "4")]
    pub min_ram: Option<Memory>,
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateLaptopRequest {
    #[prost(message, optional, tag = "1")]
    pub laptop: Option<Laptop>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateLaptopResponse {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SearchLaptopRequest {
    #[prost(message, optional, tag = "1")]
    pub filter: Option<Filter>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SearchLaptopResponse {
    #[prost(message, optional, tag = "1")]
    pub laptop: Option<Laptop>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ImageInfo {
    #[prost(string, tag = "1")]
    pub laptop_id: String,
    #[prost(string, tag = "2")]
    pub image_type: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UploadImageRequest {
    #[prost(oneof = "upload_image_request::Data", tags = "1, 2")]
    pub data: Option<upload_image_request::Data>,
}

pub mod upload_image_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Data {
        #[prost(message, tag = "1")]
        Info(super::ImageInfo),
        #[prost(bytes = "vec", tag = "2")]
        ChunkData(Vec<u8>),
    }
}

impl UploadImageRequest {
    pub fn info(laptop_id: impl Into<String>, image_type: impl Into<String>) -> Self {
        Self {
            data: Some(upload_image_request::Data::Info(ImageInfo {
                laptop_id: laptop_id.into(),
                image_type: image_type.into(),
            })),
        }
    }

    pub fn chunk(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(upload_image_request::Data::ChunkData(bytes.into())),
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UploadImageResponse {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(uint32, tag = "2")]
    pub size: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RateLaptopRequest {
    #[prost(string, tag = "1")]
    pub laptop_id: String,
    #[prost(double, tag = "2")]
    pub score: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RateLaptopResponse {
    #[prost(string, tag = "1")]
    pub laptop_id: String,
    #[prost(uint32, tag = "2")]
    pub rated_count: u32,
    #[prost(double, tag = "3")]
    pub average_score: f64,
}

// ---------------------------------------------------------------------------
// Generated service trait + server/client
// ---------------------------------------------------------------------------

include!(concat!(env!("OUT_DIR"), "/pcbook.LaptopService.rs"));

pub use laptop_service_client::LaptopServiceClient;
pub use laptop_service_server::LaptopServiceServer;

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_memory_to_bits() {
        assert_eq!(Memory::new(1, memory::Unit::Bit).to_bits(), 1);
        assert_eq!(Memory::new(1, memory::Unit::Byte).to_bits(), 8);
        assert_eq!(Memory::new(2, memory::Unit::Kilobyte).to_bits(), 2 * 8 * 1024);
        assert_eq!(Memory::new(4096, memory::Unit::Megabyte).to_bits(), Memory::new(4, memory::Unit::Gigabyte).to_bits());
        assert_eq!(Memory::new(1, memory::Unit::Terabyte).to_bits(), 1u64 << 43);
        assert_eq!(Memory::new(64, memory::Unit::Unknown).to_bits(), 0);
    }

    #[test]
    fn test_memory_to_bits_saturates() {
        assert_eq!(Memory::new(u64::MAX, memory::Unit::Gigabyte).to_bits(), u64::MAX);
    }

    #[test]
    fn test_unknown_unit_value_reads_as_unknown() {
        let mem = Memory { value: 8, unit: 42 };
        assert_eq!(mem.unit(), memory::Unit::Unknown);
        assert_eq!(mem.to_bits(), 0);
    }

    #[test]
    fn test_unset_max_price_is_distinct_from_zero() {
        let unset = Filter::default();
        let zero = Filter { max_price_usd: Some(0.0), ..Default::default() };

        let decoded = Filter::decode(unset.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.max_price_usd, None);
        let decoded = Filter::decode(zero.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.max_price_usd, Some(0.0));
    }
}
