use log::warn;
use serde::Deserialize;

/// A deterministic partition of `[0, slot_size)` into slots, each pointing at a variation (or,
/// for a container bucket, a container group).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: i64,
    pub seed: i32,
    pub slot_size: i32,
    pub slots: Vec<Slot>,
}

/// A half-open range of slot numbers.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start_inclusive: i32,
    pub end_exclusive: i32,
    /// Variation id, or container group id for container buckets.
    pub variation_id: i64,
}

impl Slot {
    pub fn contains(&self, slot_number: i32) -> bool {
        self.start_inclusive <= slot_number && slot_number < self.end_exclusive
    }
}

impl Bucket {
    pub fn slot(&self, slot_number: i32) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.contains(slot_number))
    }

    /// Map an identifier to the slot it falls in. None when the slot number lands in a range no
    /// slot covers.
    pub fn bucketing(&self, identifier: &str) -> Option<&Slot> {
        let slot_number = slot_number(self.seed, self.slot_size, identifier)?;
        self.slot(slot_number)
    }
}

/// The slot number of `identifier` for a bucket with the given seed and size.
///
/// This must agree with every other Hackle SDK: MurmurHash3 (x86, 32-bit) of the UTF-8 bytes with
/// the seed's bit pattern, read as a signed 32-bit integer, then `abs(hash) % slot_size` with
/// 32-bit signed arithmetic. `abs(i32::MIN)` stays negative there, so such identifiers get a
/// negative slot number that no slot contains.
pub fn slot_number(seed: i32, slot_size: i32, identifier: &str) -> Option<i32> {
    if slot_size <= 0 {
        warn!("bucket slot size must be positive, got {}", slot_size);
        return None;
    }
    let hash = match murmur3::murmur3_32(&mut identifier.as_bytes(), seed as u32) {
        Ok(hash) => hash as i32,
        Err(e) => {
            warn!("failed to hash identifier for bucketing: {}", e);
            return None;
        }
    };
    Some(hash.wrapping_abs() % slot_size)
}
