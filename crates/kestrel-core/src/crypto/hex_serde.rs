//! Fixed-width byte newtypes are hex strings in JSON and raw arrays in bincode.
//! Hex keeps them usable as JSON map keys in snapshot checkpoints.

macro_rules! impl_hex_serde {
    ($name:ident, $len:expr) => {
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&hex::encode(self.0))
                } else {
                    serde::Serialize::serialize(&self.0, serializer)
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                    let bytes = hex::decode(s.trim_start_matches("0x"))
                        .map_err(serde::de::Error::custom)?;
                    $name::from_slice(&bytes).ok_or_else(|| {
                        serde::de::Error::invalid_length(bytes.len(), &stringify!($len))
                    })
                } else {
                    let bytes = <[u8; $len] as serde::Deserialize>::deserialize(deserializer)?;
                    Ok($name(bytes))
                }
            }
        }
    };
}

pub(crate) use impl_hex_serde;
