//! Part planning: split an object of known size into contiguous part
//! descriptors honoring the provider's size and count limits.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Provider lower bound on the size of a non-final part.
pub const MIN_PART_SIZE: u64 = 1024 * 1024;
/// Provider upper bound on a single part.
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;
/// Provider limit on parts per upload.
pub const MAX_PART_COUNT: u64 = 10_000;

/// One contiguous byte range of the source object. Part numbers are 1-based
/// and strictly increasing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDescriptor {
    pub part_number: u32,
    pub offset: u64,
    pub length: u64,
}

/// Split `object_size` bytes into parts of `part_size`, the final part
/// holding the remainder. An object smaller than one part still yields a
/// single-part plan, so callers can route small objects through the same
/// multipart path.
pub fn plan_parts(object_size: u64, part_size: u64) -> Result<Vec<PartDescriptor>> {
    if object_size == 0 {
        return Err(ClientError::InvalidPlan(
            "object size must be greater than zero".to_string(),
        ));
    }
    if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&part_size) {
        return Err(ClientError::InvalidPlan(format!(
            "part size {} outside [{}, {}]",
            part_size, MIN_PART_SIZE, MAX_PART_SIZE
        )));
    }

    let count = object_size.div_ceil(part_size);
    if count > MAX_PART_COUNT {
        return Err(ClientError::InvalidPlan(format!(
            "{} parts exceed the {} part limit, choose a larger part size",
            count, MAX_PART_COUNT
        )));
    }

    let mut parts = Vec::with_capacity(count as usize);
    let mut offset = 0u64;
    for number in 1..=count {
        let length = part_size.min(object_size - offset);
        parts.push(PartDescriptor {
            part_number: number as u32,
            offset,
            length,
        });
        offset += length;
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(parts: &[PartDescriptor], object_size: u64) {
        let mut expected_offset = 0u64;
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.part_number, i as u32 + 1);
            assert_eq!(part.offset, expected_offset);
            expected_offset += part.length;
        }
        assert_eq!(expected_offset, object_size);
    }

    #[test]
    fn test_three_exact_parts() {
        // 15 MiB split by 5 MiB: three parts of exactly 5 MiB.
        let parts = plan_parts(15_728_640, 5_242_880).unwrap();
        assert_eq!(parts.len(), 3);
        for part in &parts {
            assert_eq!(part.length, 5_242_880);
        }
        assert_contiguous(&parts, 15_728_640);
    }

    #[test]
    fn test_final_part_holds_remainder() {
        let parts = plan_parts(10 * MIN_PART_SIZE + 17, MIN_PART_SIZE).unwrap();
        assert_eq!(parts.len(), 11);
        for part in &parts[..10] {
            assert_eq!(part.length, MIN_PART_SIZE);
        }
        assert_eq!(parts[10].length, 17);
        assert_contiguous(&parts, 10 * MIN_PART_SIZE + 17);
    }

    #[test]
    fn test_small_object_plans_single_part() {
        let parts = plan_parts(100, MIN_PART_SIZE).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].part_number, 1);
        assert_eq!(parts[0].length, 100);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            plan_parts(0, MIN_PART_SIZE),
            Err(ClientError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_part_size_bounds_enforced() {
        assert!(matches!(
            plan_parts(100, MIN_PART_SIZE - 1),
            Err(ClientError::InvalidPlan(_))
        ));
        assert!(matches!(
            plan_parts(100, MAX_PART_SIZE + 1),
            Err(ClientError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_part_count_limit() {
        let object_size = (MAX_PART_COUNT + 1) * MIN_PART_SIZE;
        let err = plan_parts(object_size, MIN_PART_SIZE).unwrap_err();
        match err {
            ClientError::InvalidPlan(msg) => assert!(msg.contains("larger part size")),
            other => panic!("expected InvalidPlan, got {other:?}"),
        }
    }
}
