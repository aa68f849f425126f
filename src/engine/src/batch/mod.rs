//! Concurrent batch dispatch of image copies.
//!
//! The worker partitions the mirror plan into fixed-size batches, runs
//! each batch's copies in parallel, and awaits the whole batch before
//! starting the next. Failures recorded in batch *k* steer the skip
//! decisions of batch *k+1*, which is what makes the operator bundle
//! cascade correct without locking.

mod classify;
mod error;
mod journal;
mod skip;
mod worker;

pub use classify::{classify, Classification};
pub use error::WorkerError;
pub use journal::{skipping_message, FailureJournal};
pub use skip::{should_skip, SkipReason};
pub use worker::ConcurrentWorker;

use crate::schema::CollectorSchema;

/// A slice of the mirror plan carrying at most the batch size of images.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSchema {
    pub images: CollectorSchema,
}

/// Partition the plan into batches, preserving input order.
///
/// An empty plan yields no batches. The last batch may be smaller than
/// `batch_size`. No deduplication is performed.
pub fn split_images_to_batches(
    images: &CollectorSchema,
    batch_size: usize,
) -> Vec<BatchSchema> {
    images
        .all_images
        .chunks(batch_size.max(1))
        .map(|chunk| BatchSchema {
            images: CollectorSchema {
                all_images: chunk.to_vec(),
                ..Default::default()
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CopyImageSchema;

    fn plan(count: usize) -> CollectorSchema {
        let all_images = (0..count)
            .map(|i| CopyImageSchema {
                source: format!("docker://registry.example.com/ns/image-{i}:1"),
                destination: format!("docker://dest.example.com/ns/image-{i}:1"),
                origin: format!("docker://registry.example.com/ns/image-{i}:1"),
                ..Default::default()
            })
            .collect();
        CollectorSchema {
            all_images,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_plan_yields_no_batches() {
        assert!(split_images_to_batches(&plan(0), 8).is_empty());
    }

    #[test]
    fn test_three_images_one_batch() {
        let batches = split_images_to_batches(&plan(3), 8);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].images.all_images.len(), 3);
    }

    #[test]
    fn test_eight_images_one_full_batch() {
        let batches = split_images_to_batches(&plan(8), 8);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].images.all_images.len(), 8);
    }

    #[test]
    fn test_nine_images_two_batches() {
        let batches = split_images_to_batches(&plan(9), 8);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].images.all_images.len(), 8);
        assert_eq!(batches[1].images.all_images.len(), 1);
    }

    #[test]
    fn test_sixteen_images_two_full_batches() {
        let batches = split_images_to_batches(&plan(16), 8);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.images.all_images.len() == 8));
    }

    #[test]
    fn test_partition_preserves_order() {
        let input = plan(11);
        let batches = split_images_to_batches(&input, 4);
        let flattened: Vec<_> = batches
            .iter()
            .flat_map(|b| b.images.all_images.clone())
            .collect();
        assert_eq!(flattened, input.all_images);
    }
}
