use std::fmt::{Debug, Formatter};

#[cfg(test)]
mod tests;

type Link<K, V> = Option<Box<DeltaNode<K, V>>>;

struct DeltaNode<K, V> {
  key: K,
  interval: u64,
  remaining: i64,
  value: V,
  next: Link<K, V>,
}

/// A read-only view of one entry of a [`DeltaQueue`].<br/>
/// [`DeltaQueue`] の要素の読み取り専用ビュー。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaEntry<'a, K, V> {
  /// The key the entry was inserted with.<br/>
  /// 挿入時に指定したキー。
  pub key: &'a K,
  /// The interval requested at insertion, in ticks.<br/>
  /// 挿入時に要求された間隔（tick 単位）。
  pub interval: u64,
  /// Ticks between the previous entry's expiry and this entry's expiry.<br/>
  /// 直前の要素の期限からこの要素の期限までの tick 数。
  pub remaining: i64,
  /// Ticks from now until this entry expires (sum of `remaining` up to and including this entry).<br/>
  /// 現在からこの要素が期限切れになるまでの tick 数（先頭からの `remaining` の累積）。
  pub deadline: i64,
  /// The payload.<br/>
  /// ペイロード。
  pub value: &'a V,
}

/// An expiry-ordered singly linked queue using delta encoding.<br/>
/// 差分（デルタ）表現を用いた、期限順の単方向連結キュー。
///
/// Every node stores the ticks between the expiry of its predecessor and its own expiry,
/// so only the head has to be touched when time advances. The sum of `remaining` from the
/// head up to a node is that node's ticks-to-expiry, and nodes with the same deadline keep
/// their insertion order.<br/>
/// 各ノードは直前のノードの期限から自身の期限までの tick 数を保持するため、時間の経過時には先頭のみを更新すればよい。
/// 先頭からあるノードまでの `remaining` の合計がそのノードの残り tick 数となり、同じ期限のノードは挿入順を保つ。
///
/// The queue is not synchronized; callers guard it with their own lock.<br/>
/// このキュー自体は同期されないため、呼び出し側でロックにより保護すること。
pub struct DeltaQueue<K, V> {
  head: Link<K, V>,
  len: usize,
}

impl<K, V> DeltaQueue<K, V> {
  /// Creates an empty queue.<br/>
  /// 空のキューを生成します。
  pub fn new() -> Self {
    Self { head: None, len: 0 }
  }

  /// Returns the number of entries.<br/>
  /// 要素数を返します。
  pub fn len(&self) -> usize {
    self.len
  }

  /// Returns whether the queue is empty.<br/>
  /// キューが空かどうかを返します。
  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  /// Returns the delta of the head entry, if any.<br/>
  /// 先頭要素の差分値を返します。
  ///
  /// # Return Value / 戻り値
  /// - `Some(remaining)` - Ticks until the head expires; zero or negative once it is due. / 先頭が期限切れになるまでの tick 数。期限到来後は 0 以下。
  /// - `None` - If the queue is empty. / キューが空の場合。
  pub fn head_remaining(&self) -> Option<i64> {
    self.head.as_ref().map(|node| node.remaining)
  }

  /// Returns the head entry without removing it.<br/>
  /// 先頭要素を削除せずに返します。
  pub fn peek(&self) -> Option<DeltaEntry<'_, K, V>> {
    self.iter().next()
  }

  /// Folds `ticks` elapsed ticks into the head entry.<br/>
  /// 経過した `ticks` を先頭要素に反映します。
  ///
  /// The head may become zero or negative, meaning it is due (or overdue by that many ticks).
  /// Ticks observed while the queue is empty are discarded since no entry is waiting on them.<br/>
  /// 先頭の値は 0 以下になり得る（期限到来、または超過した tick 数）。キューが空の場合、経過 tick は破棄される。
  pub fn advance(&mut self, ticks: u64) {
    if ticks == 0 {
      return;
    }
    if let Some(head) = self.head.as_mut() {
      head.remaining = head.remaining.saturating_sub(saturating_ticks(ticks));
    }
  }

  /// Inserts `value` so that it expires `interval` ticks from now.<br/>
  /// `value` を現在から `interval` tick 後に期限切れとなるよう挿入します。
  ///
  /// The new entry is placed behind every entry whose deadline is less than or equal to
  /// `interval`, and its successor's delta is reduced by the new entry's delta.<br/>
  /// 新しい要素は期限が `interval` 以下のすべての要素の後ろに配置され、後続要素の差分は新しい要素の差分だけ減らされる。
  ///
  /// # Arguments / 引数
  /// - `key` - The key used to remove the entry later. / 後で削除する際に使用するキー。
  /// - `interval` - Ticks until expiry; must be greater than zero. / 期限までの tick 数。0 より大きいこと。
  /// - `value` - The payload. / ペイロード。
  ///
  /// # Return Value / 戻り値
  /// The zero-based position the entry was inserted at; `0` means it became the head.<br/>
  /// 挿入された位置（0 始まり）。`0` は先頭になったことを示す。
  pub fn insert(&mut self, key: K, interval: u64, value: V) -> usize {
    debug_assert!(interval > 0, "DeltaQueue::insert requires a positive interval");
    let target = saturating_ticks(interval);
    let (position, preceding) = self.locate(target);
    let remaining = target.saturating_sub(preceding);
    let link = self.link_at(position);
    let mut next = link.take();
    if let Some(successor) = next.as_mut() {
      successor.remaining -= remaining;
    }
    *link = Some(Box::new(DeltaNode {
      key,
      interval,
      remaining,
      value,
      next,
    }));
    self.len += 1;
    position
  }

  /// Removes the head entry if it is due.<br/>
  /// 先頭要素の期限が到来していれば削除して返します。
  ///
  /// Any overshoot (a negative delta) is carried into the new head so that no tick is lost.<br/>
  /// 超過分（負の差分）は新しい先頭に引き継がれるため、tick が失われることはない。
  pub fn pop_expired(&mut self) -> Option<(K, V)> {
    let due = self.head.as_ref().is_some_and(|head| head.remaining <= 0);
    if due {
      self.unlink(0)
    } else {
      None
    }
  }

  /// Removes every entry in head-to-tail order without treating them as expired.<br/>
  /// すべての要素を先頭から順に取り出します（期限切れとしては扱わない）。
  pub fn drain(&mut self) -> Vec<(K, V)> {
    let mut drained = Vec::with_capacity(self.len);
    let mut link = self.head.take();
    while let Some(mut node) = link {
      link = node.next.take();
      drained.push((node.key, node.value));
    }
    self.len = 0;
    drained
  }

  /// Removes every entry.<br/>
  /// すべての要素を削除します。
  pub fn clear(&mut self) {
    let mut link = self.head.take();
    while let Some(mut node) = link {
      link = node.next.take();
    }
    self.len = 0;
  }

  /// Returns an iterator over the entries in expiry order.<br/>
  /// 期限順に要素を走査するイテレータを返します。
  pub fn iter(&self) -> Iter<'_, K, V> {
    Iter {
      next: self.head.as_deref(),
      deadline: 0,
    }
  }

  // Position of the first node whose inclusive running total exceeds `target`,
  // and the running total before that node.
  fn locate(&self, target: i64) -> (usize, i64) {
    let mut position = 0;
    let mut running = 0i64;
    let mut current = self.head.as_deref();
    while let Some(node) = current {
      let inclusive = running.saturating_add(node.remaining);
      if inclusive > target {
        break;
      }
      running = inclusive;
      position += 1;
      current = node.next.as_deref();
    }
    (position, running)
  }

  fn link_at(&mut self, position: usize) -> &mut Link<K, V> {
    let mut link = &mut self.head;
    for _ in 0..position {
      match link {
        Some(node) => link = &mut node.next,
        None => break,
      }
    }
    link
  }

  fn unlink(&mut self, position: usize) -> Option<(K, V)> {
    let link = self.link_at(position);
    let mut node = link.take()?;
    let mut next = node.next.take();
    if let Some(successor) = next.as_mut() {
      successor.remaining = successor.remaining.saturating_add(node.remaining);
    }
    *link = next;
    self.len -= 1;
    Some((node.key, node.value))
  }
}

impl<K: PartialEq, V> DeltaQueue<K, V> {
  /// Returns whether an entry with `key` is queued.<br/>
  /// `key` の要素がキューに存在するかどうかを返します。
  pub fn contains(&self, key: &K) -> bool {
    self.position_of(key).is_some()
  }

  /// Removes the entry with `key`, folding its delta into its successor.<br/>
  /// `key` の要素を削除し、その差分を後続要素に加算します。
  ///
  /// Removing the head is O(1); any other entry requires a scan for its predecessor.<br/>
  /// 先頭の削除は O(1)、それ以外は直前の要素を探索するため O(n)。
  ///
  /// # Return Value / 戻り値
  /// - `Some(value)` - The removed payload. / 削除されたペイロード。
  /// - `None` - If no entry has `key`. / `key` の要素が存在しない場合。
  pub fn remove(&mut self, key: &K) -> Option<V> {
    let position = self.position_of(key)?;
    self.unlink(position).map(|(_, value)| value)
  }

  fn position_of(&self, key: &K) -> Option<usize> {
    self.iter().position(|entry| entry.key == key)
  }
}

impl<K, V> Default for DeltaQueue<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> Drop for DeltaQueue<K, V> {
  fn drop(&mut self) {
    self.clear();
  }
}

impl<K: Debug, V> Debug for DeltaQueue<K, V> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_list()
      .entries(self.iter().map(|entry| (entry.key, entry.interval, entry.remaining)))
      .finish()
  }
}

/// Iterator returned by [`DeltaQueue::iter`].
pub struct Iter<'a, K, V> {
  next: Option<&'a DeltaNode<K, V>>,
  deadline: i64,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
  type Item = DeltaEntry<'a, K, V>;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.next?;
    self.next = node.next.as_deref();
    self.deadline = self.deadline.saturating_add(node.remaining);
    Some(DeltaEntry {
      key: &node.key,
      interval: node.interval,
      remaining: node.remaining,
      deadline: self.deadline,
      value: &node.value,
    })
  }
}

fn saturating_ticks(ticks: u64) -> i64 {
  i64::try_from(ticks).unwrap_or(i64::MAX)
}
