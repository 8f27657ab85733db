use crate::collections::ref_store::RefMap;
use crate::num::Weight;
use crate::theory::atoms::{EdgeId, Vert};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// An element of the queue: a vertex and the reduced distance from the origin
/// to it. The ordering is reversed so that a max-heap returns the element
/// with the smallest reduced distance first.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
struct QueueElem<W> {
    dist: W,
    node: Vert,
}

impl<W: Weight> PartialOrd for QueueElem<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<W: Weight> Ord for QueueElem<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        Reverse(self.dist).cmp(&Reverse(other.dist)).then_with(|| self.node.cmp(&other.node))
    }
}

/// Mutable state of a Dijkstra run, reusable across runs.
///
/// A vertex may appear several times in the queue; only the entry matching
/// the recorded distance is expanded, the others are skipped on extraction.
#[derive(Clone)]
pub(crate) struct DijkstraState<W> {
    /// Distance of each reached vertex, with the last edge of the shortest
    /// path to it (`None` for the origin).
    distances: RefMap<Vert, (W, Option<EdgeId>)>,
    queue: BinaryHeap<QueueElem<W>>,
}

impl<W: Weight> Default for DijkstraState<W> {
    fn default() -> Self {
        DijkstraState {
            distances: Default::default(),
            queue: Default::default(),
        }
    }
}

impl<W: Weight> DijkstraState<W> {
    pub fn clear(&mut self) {
        self.distances.clear();
        self.queue.clear();
    }

    pub fn enqueue(&mut self, node: Vert, dist: W, incoming: Option<EdgeId>) {
        let improved = match self.distances.get(node) {
            None => true,
            Some(&(prev, _)) => dist < prev,
        };
        if improved {
            self.distances.insert(node, (dist, incoming));
            self.queue.push(QueueElem { dist, node });
        }
    }

    /// Extracts the next vertex by increasing distance; each vertex is
    /// returned at most once.
    pub fn dequeue(&mut self) -> Option<(Vert, W)> {
        while let Some(e) = self.queue.pop() {
            if self.distances[e.node].0 == e.dist {
                return Some((e.node, e.dist));
            }
            // stale entry, a better distance was already extracted
        }
        None
    }

    /// The last edge on the shortest path from the origin to `node`, or
    /// `None` if `node` is the origin itself.
    ///
    /// **Panics** if the vertex was not reached.
    pub fn predecessor(&self, node: Vert) -> Option<EdgeId> {
        self.distances[node].1
    }
}
