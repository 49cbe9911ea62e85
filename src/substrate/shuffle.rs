//! Group-by-key shuffle.

use std::hash::BuildHasher;

use hashbrown::{DefaultHashBuilder, HashMap};
use crate::model::{Message, NodeId, Record};

/// One hash partition: each node's complete inbox for the round.
pub type Partition = HashMap<NodeId, Vec<Message>>;

/// Route every record to its key's inbox, spreading keys over
/// `partitions` buckets. A key always lands in exactly one bucket, so each
/// bucket can run its node transitions without seeing the others.
pub fn group_by_key(records: Vec<Record>, partitions: usize) -> Vec<Partition> {
    let partitions = partitions.max(1);
    let hasher = DefaultHashBuilder::default();
    let mut buckets: Vec<Partition> = (0..partitions).map(|_| Partition::new()).collect();

    for Record { key, message } in records {
        let bucket = (hasher.hash_one(&key) % partitions as u64) as usize;
        buckets[bucket].entry(key).or_default().push(message);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HopMessage;

    fn hop(to: &str, origin: &str) -> Record {
        Record::hop(to.into(), HopMessage { origin: origin.into(), distance: 0 })
    }

    #[test]
    fn test_every_message_reaches_its_inbox() {
        let records = vec![hop("B", "A"), hop("B", "C"), hop("D", "A")];
        let partitions = group_by_key(records, 3);
        assert_eq!(partitions.len(), 3);

        let inbox_b: Vec<_> = partitions.iter().filter_map(|p| p.get("B")).collect();
        assert_eq!(inbox_b.len(), 1, "a key must live in exactly one partition");
        assert_eq!(inbox_b[0].len(), 2);

        let total: usize = partitions.iter().flat_map(|p| p.values()).map(Vec::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_zero_partitions_means_one() {
        let partitions = group_by_key(vec![hop("B", "A")], 0);
        assert_eq!(partitions.len(), 1);
        assert!(partitions[0].contains_key("B"));
    }
}
