use super::*;
use rstest::rstest;

fn deltas(queue: &DeltaQueue<u32, &'static str>) -> Vec<i64> {
  queue.iter().map(|entry| entry.remaining).collect()
}

fn keys(queue: &DeltaQueue<u32, &'static str>) -> Vec<u32> {
  queue.iter().map(|entry| *entry.key).collect()
}

fn assert_deadlines_match_intervals(queue: &DeltaQueue<u32, &'static str>, elapsed: i64) {
  for entry in queue.iter() {
    assert_eq!(
      entry.deadline,
      entry.interval as i64 - elapsed,
      "cumulative delta of key {} does not match its deadline",
      entry.key
    );
  }
}

#[test]
fn test_new_queue_is_empty() {
  let queue = DeltaQueue::<u32, &'static str>::new();
  assert!(queue.is_empty());
  assert_eq!(queue.len(), 0);
  assert_eq!(queue.head_remaining(), None);
  assert!(queue.peek().is_none());
}

#[test]
fn test_insert_sample_intervals() {
  let mut queue = DeltaQueue::new();
  assert_eq!(queue.insert(1, 100, "first"), 0);
  assert_eq!(queue.insert(2, 200, "second"), 1);
  assert_eq!(queue.insert(3, 50, "third"), 0);
  assert_eq!(queue.insert(4, 135, "fourth"), 2);

  assert_eq!(keys(&queue), vec![3, 1, 4, 2]);
  assert_eq!(deltas(&queue), vec![50, 50, 35, 65]);
  assert_eq!(
    queue.iter().map(|entry| entry.deadline).collect::<Vec<_>>(),
    vec![50, 100, 135, 200]
  );
  assert_deadlines_match_intervals(&queue, 0);
  assert_eq!(queue.len(), 4);
}

#[test]
fn test_equal_deadlines_keep_insertion_order() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 30, "a");
  queue.insert(2, 30, "b");
  queue.insert(3, 10, "c");
  queue.insert(4, 30, "d");

  assert_eq!(keys(&queue), vec![3, 1, 2, 4]);
  assert_eq!(deltas(&queue), vec![10, 20, 0, 0]);
}

#[test]
fn test_advance_only_touches_head() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 10, "a");
  queue.insert(2, 25, "b");

  queue.advance(4);

  assert_eq!(deltas(&queue), vec![6, 15]);
  assert_deadlines_match_intervals(&queue, 4);
}

#[test]
fn test_advance_on_empty_queue_is_discarded() {
  let mut queue = DeltaQueue::new();
  queue.advance(42);
  queue.insert(1, 5, "a");
  assert_eq!(queue.head_remaining(), Some(5));
}

#[test]
fn test_insert_after_advance_measures_from_now() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 100, "a");
  queue.advance(60);
  queue.insert(2, 50, "b");
  queue.insert(3, 30, "c");

  assert_eq!(keys(&queue), vec![3, 1, 2]);
  assert_eq!(deltas(&queue), vec![30, 10, 10]);
}

#[test]
fn test_remove_middle_folds_delta_into_successor() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 100, "first");
  queue.insert(2, 200, "second");
  queue.insert(3, 50, "third");
  queue.insert(4, 135, "fourth");

  assert_eq!(queue.remove(&1), Some("first"));

  assert_eq!(keys(&queue), vec![3, 4, 2]);
  assert_eq!(deltas(&queue), vec![50, 85, 65]);
  assert_deadlines_match_intervals(&queue, 0);
}

#[test]
fn test_remove_head_and_tail() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 10, "a");
  queue.insert(2, 20, "b");
  queue.insert(3, 30, "c");

  assert_eq!(queue.remove(&1), Some("a"));
  assert_eq!(deltas(&queue), vec![20, 10]);

  assert_eq!(queue.remove(&3), Some("c"));
  assert_eq!(deltas(&queue), vec![20]);
  assert_eq!(queue.len(), 1);
}

#[test]
fn test_remove_missing_key() {
  let mut queue = DeltaQueue::<u32, &'static str>::new();
  assert_eq!(queue.remove(&7), None);

  queue.insert(1, 10, "a");
  assert_eq!(queue.remove(&7), None);
  assert!(queue.contains(&1));
  assert_eq!(queue.remove(&1), Some("a"));
  assert_eq!(queue.remove(&1), None);
}

#[test]
fn test_pop_expired_only_when_due() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 3, "a");
  queue.insert(2, 5, "b");

  queue.advance(2);
  assert_eq!(queue.pop_expired(), None);

  queue.advance(1);
  assert_eq!(queue.pop_expired(), Some((1, "a")));
  assert_eq!(queue.pop_expired(), None);
  assert_eq!(queue.head_remaining(), Some(2));
}

#[test]
fn test_pop_expired_carries_overshoot() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 3, "a");
  queue.insert(2, 5, "b");
  queue.insert(3, 9, "c");

  queue.advance(6);

  assert_eq!(queue.pop_expired(), Some((1, "a")));
  assert_eq!(queue.head_remaining(), Some(-1));
  assert_eq!(queue.pop_expired(), Some((2, "b")));
  assert_eq!(queue.head_remaining(), Some(3));
  assert_eq!(queue.pop_expired(), None);
}

#[test]
fn test_insert_behind_overdue_head() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 2, "a");
  queue.advance(5);
  queue.insert(2, 4, "b");

  assert_eq!(keys(&queue), vec![1, 2]);
  assert_eq!(
    queue.iter().map(|entry| entry.deadline).collect::<Vec<_>>(),
    vec![-3, 4]
  );
}

#[test]
fn test_drain_returns_entries_in_order() {
  let mut queue = DeltaQueue::new();
  queue.insert(1, 40, "a");
  queue.insert(2, 10, "b");
  queue.insert(3, 20, "c");

  let drained = queue.drain();

  assert_eq!(drained, vec![(2, "b"), (3, "c"), (1, "a")]);
  assert!(queue.is_empty());
  assert_eq!(queue.len(), 0);
}

#[test]
fn test_drop_long_chain() {
  let mut queue = DeltaQueue::new();
  for key in 0..200_000u32 {
    queue.insert(key, u64::from(200_000 - key), "x");
  }
  assert_eq!(queue.len(), 200_000);
  drop(queue);
}

#[rstest]
#[case(vec![5, 3, 9, 1, 7])]
#[case(vec![1, 1, 1, 2, 2])]
#[case(vec![100, 200, 50, 135])]
#[case(vec![8, 4, 2, 16, 4, 8])]
fn test_pop_order_is_non_decreasing_in_deadline(#[case] intervals: Vec<u64>) {
  let mut queue = DeltaQueue::new();
  for (key, interval) in intervals.iter().enumerate() {
    queue.insert(key as u32, *interval, "x");
  }

  let mut fired = Vec::new();
  for tick in 1..=*intervals.iter().max().unwrap_or(&0) {
    queue.advance(1);
    while let Some((key, _)) = queue.pop_expired() {
      fired.push((tick, key));
    }
  }

  assert_eq!(fired.len(), intervals.len());
  for (tick, key) in &fired {
    assert_eq!(*tick, intervals[*key as usize]);
  }
  assert!(fired.windows(2).all(|pair| pair[0].0 <= pair[1].0));
}
