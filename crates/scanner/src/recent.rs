use std::collections::VecDeque;

/// Fixed-size window of the most recently entered distinct rooms.
///
/// When full, recording a new room evicts the oldest one. Iteration order is
/// oldest → newest. A capacity of zero remembers nothing.
#[derive(Debug, Clone)]
pub struct RecentRooms {
    buf: VecDeque<String>,
    capacity: usize,
}

impl RecentRooms {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records `room`. Returns `false` if it was already in the window; a
    /// revisit does not refresh its position.
    pub fn observe(&mut self, room: &str) -> bool {
        if self.contains(room) {
            return false;
        }
        if self.capacity == 0 {
            return true;
        }
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(room.to_string());
        true
    }

    pub fn contains(&self, room: &str) -> bool {
        self.buf.iter().any(|r| r == room)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.buf.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_visit_then_revisit() {
        let mut recent = RecentRooms::new(5);
        assert!(recent.observe("Atrium"));
        assert!(!recent.observe("Atrium"));
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn oldest_room_is_evicted() {
        let mut recent = RecentRooms::new(3);
        for room in ["a", "b", "c", "d"] {
            assert!(recent.observe(room));
        }
        assert_eq!(recent.iter().collect::<Vec<_>>(), vec!["b", "c", "d"]);
        assert!(recent.observe("a"));
        assert!(!recent.contains("b"));
    }

    #[test]
    fn revisit_keeps_position() {
        let mut recent = RecentRooms::new(2);
        recent.observe("a");
        recent.observe("b");
        assert!(!recent.observe("a"));
        recent.observe("c");
        assert_eq!(recent.iter().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn zero_capacity_never_remembers() {
        let mut recent = RecentRooms::new(0);
        assert!(recent.observe("a"));
        assert!(recent.observe("a"));
        assert!(recent.is_empty());
    }

    #[test]
    fn clear_forgets_everything() {
        let mut recent = RecentRooms::new(5);
        recent.observe("a");
        recent.clear();
        assert!(recent.is_empty());
        assert!(recent.observe("a"));
    }
}
