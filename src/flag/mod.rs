//! Decomposition of the per-parcel `flag` word.
//!
//! The codec stores `flag` untouched. Bits, low to high:
//! 0..4 source instrument, 4 model source, 5 launch time style,
//! 6 vertical coordinate, 7..13 source region.

const SAT_MASK: i32 = 0xF;
const MODEL_MASK: i32 = 0x10;
const TIME_STYLE_MASK: i32 = 0x20;
const VERT_COORD_MASK: i32 = 0x40;
const SOURCE_REGION_MASK: i32 = 0x1F80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlagFields {
    pub sat: u8,
    pub model: bool,
    pub time_style: bool,
    pub vert_coord: bool,
    pub source_region: u8,
}

impl FlagFields {
    /// Bits outside the known fields are dropped.
    pub fn decode(flag: i32) -> Self {
        Self {
            sat: (flag & SAT_MASK) as u8,
            model: flag & MODEL_MASK != 0,
            time_style: flag & TIME_STYLE_MASK != 0,
            vert_coord: flag & VERT_COORD_MASK != 0,
            source_region: ((flag & SOURCE_REGION_MASK) >> 7) as u8,
        }
    }

    /// Fields wider than their bit range are truncated.
    pub fn encode(&self) -> i32 {
        (self.sat as i32 & SAT_MASK)
            | (self.model as i32) << 4
            | (self.time_style as i32) << 5
            | (self.vert_coord as i32) << 6
            | ((self.source_region as i32) << 7 & SOURCE_REGION_MASK)
    }
}

impl From<i32> for FlagFields {
    fn from(value: i32) -> Self {
        Self::decode(value)
    }
}
