use crate::{DimensionId, RegionCoords};

const SIGN_BIT: u32 = 1 << 31;

/// Location of one tile inside an atlas tree.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TileDbKey {
    pub dimension: DimensionId,
    pub coords: RegionCoords,
}

impl TileDbKey {
    pub const fn new(dimension: DimensionId, coords: RegionCoords) -> Self {
        Self { dimension, coords }
    }

    /// We implement this manually (without rkyv) so we have control over the [`Ord`] as interpreted by [`sled`].
    ///
    /// 12 bytes total per key: dimension, x, z, each big-endian with the sign bit flipped so negative values sort first.
    pub fn into_sled_key(&self) -> [u8; 12] {
        let mut bytes = [0; 12];
        bytes[0..4].copy_from_slice(&encode_i32(self.dimension.0));
        bytes[4..8].copy_from_slice(&encode_i32(self.coords.x));
        bytes[8..12].copy_from_slice(&encode_i32(self.coords.z));
        bytes
    }

    /// `None` unless `bytes` is exactly 12 bytes long.
    pub fn from_sled_key(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 12 {
            return None;
        }
        let field = |i: usize| {
            let mut b = [0; 4];
            b.copy_from_slice(&bytes[i..i + 4]);
            decode_i32(b)
        };
        Some(Self::new(
            DimensionId(field(0)),
            RegionCoords::new(field(4), field(8)),
        ))
    }
}

fn encode_i32(v: i32) -> [u8; 4] {
    ((v as u32) ^ SIGN_BIT).to_be_bytes()
}

fn decode_i32(b: [u8; 4]) -> i32 {
    (u32::from_be_bytes(b) ^ SIGN_BIT) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sled_order_matches_key_order() {
        let values = [i32::MIN, -70_000, -1, 0, 1, 300, i32::MAX];
        let mut keys = Vec::new();
        for &d in &[-1, 0, 1] {
            for &x in &values {
                for &z in &values {
                    keys.push(TileDbKey::new(DimensionId(d), RegionCoords::new(x, z)));
                }
            }
        }
        let mut by_bytes = keys.clone();
        by_bytes.sort_by_key(|k| k.into_sled_key());
        keys.sort();
        assert_eq!(by_bytes, keys);

        for key in keys {
            assert_eq!(TileDbKey::from_sled_key(&key.into_sled_key()), Some(key));
        }
        assert_eq!(TileDbKey::from_sled_key(&[0; 11]), None);
    }
}
