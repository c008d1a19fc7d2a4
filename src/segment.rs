use serde::Deserialize;

use crate::target::Target;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentType {
    UserId,
    UserProperty,
}

/// A named, reusable set of targets. A user is in the segment when any target matches.
///
/// Segment targets may only use user conditions; segments never nest.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: i64,
    pub key: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    pub targets: Vec<Target>,
}
