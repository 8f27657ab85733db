use crate::num::{Step, Weight};
use crate::DlError;

/// External name of a difference-logic variable, chosen by the caller.
/// Labels may be sparse; they are mapped to dense vertex ids on first mention.
pub type VarLabel = u32;

/// A dense vertex identifier. Vertex 0 is the origin against which unary
/// constraints (`x <= c`, `c <= x`) are expressed.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Vert(u32);

impl Vert {
    pub(crate) const ORIGIN: Vert = Vert(0);

    pub fn to_u32(self) -> u32 {
        self.0
    }
}

impl From<usize> for Vert {
    fn from(i: usize) -> Self {
        Vert(i as u32)
    }
}
impl From<Vert> for usize {
    fn from(v: Vert) -> Self {
        v.0 as usize
    }
}

/// A signed handle on a declared atom.
/// An atom and its negation share the same `base_id` but differ by the
/// `is_negated` property; `!` moves between the two.
///
/// For instance, valid atom ids:
///  -  `a - b <= 10`
///    - base_id: 3
///    - negated: false
///  - `a - b > 10`       # negation of the previous one
///    - base_id: 3       # same
///    - negated: true    # inverse
///  - `a - b <= 20`      # unrelated
///    - base_id: 4
///    - negated: false
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct AtomId(u32);

impl AtomId {
    #[inline]
    pub fn new(base_id: u32, negated: bool) -> AtomId {
        if negated {
            AtomId((base_id << 1) + 1)
        } else {
            AtomId(base_id << 1)
        }
    }

    #[inline]
    pub fn base_id(self) -> u32 {
        self.0 >> 1
    }

    #[inline]
    pub fn is_negated(self) -> bool {
        self.0 & 0x1 == 1
    }
}

impl std::ops::Not for AtomId {
    type Output = Self;

    #[inline]
    fn not(self) -> Self::Output {
        AtomId(self.0 ^ 0x1)
    }
}

impl From<EdgeId> for AtomId {
    fn from(e: EdgeId) -> Self {
        AtomId(e.0)
    }
}

/// One of the two directed edges derived from an atom pair. The numbering
/// mirrors [AtomId]: the edge of base pair `k` encoding the canonical
/// constraint has id `2k`, the edge encoding its negation has id `2k + 1`.
/// Asserting a signed atom activates the edge with the same raw id.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct EdgeId(u32);

impl EdgeId {
    #[inline]
    pub fn new(base_id: u32, negation: bool) -> EdgeId {
        if negation {
            EdgeId((base_id << 1) + 1)
        } else {
            EdgeId(base_id << 1)
        }
    }

    #[inline]
    pub fn base_id(self) -> u32 {
        self.0 >> 1
    }

    /// True if this edge encodes the negation of the pair's canonical constraint.
    #[inline]
    pub fn is_negation(self) -> bool {
        self.0 & 0x1 == 1
    }
}

impl std::ops::Not for EdgeId {
    type Output = Self;

    #[inline]
    fn not(self) -> Self::Output {
        EdgeId(self.0 ^ 0x1)
    }
}

impl From<AtomId> for EdgeId {
    fn from(a: AtomId) -> Self {
        EdgeId(a.0)
    }
}
impl From<usize> for EdgeId {
    fn from(i: usize) -> Self {
        EdgeId(i as u32)
    }
}
impl From<EdgeId> for usize {
    fn from(e: EdgeId) -> Self {
        e.0 as usize
    }
}

/// A directed edge of the constraint graph, representing `tgt - src <= weight`.
#[derive(Copy, Clone, Debug, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct DiffEdge<W> {
    pub src: Vert,
    pub tgt: Vert,
    pub weight: W,
}

impl<W: Weight> DiffEdge<W> {
    pub fn new(src: Vert, tgt: Vert, weight: W) -> DiffEdge<W> {
        DiffEdge { src, tgt, weight }
    }

    /// The canonical member of a complementary pair is the one with the
    /// smaller source, so that an atom and its negation always map to the
    /// same pair in the store.
    pub fn is_canonical(&self) -> bool {
        self.src < self.tgt || (self.src == self.tgt && self.weight >= W::zero())
    }

    // not(b - a <= c)
    //   = b - a > c
    //   = a - b < -c
    //   = a - b <= -c - step
    pub fn negated(&self) -> Self {
        DiffEdge {
            src: self.tgt,
            tgt: self.src,
            weight: -self.weight - W::step(),
        }
    }
}

/// One side of a canonicalized `lhs <= rhs` atom.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operand<W> {
    Var(VarLabel),
    Const(W),
    /// A negated numeric constant, kept separate so that callers can hand
    /// over the operand tree exactly as their term store represents it.
    NegConst(W),
    /// The difference `a - b` of two variables.
    Diff(VarLabel, VarLabel),
}

impl<W: Weight> Operand<W> {
    fn constant(&self) -> Option<W> {
        match *self {
            Operand::Const(c) => Some(c),
            Operand::NegConst(c) => Some(-c),
            _ => None,
        }
    }
}

/// A difference-logic atom `lhs <= rhs` in one of the four canonical shapes:
/// var-var, var-const, const-var and diff-const.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LeqAtom<W> {
    pub lhs: Operand<W>,
    pub rhs: Operand<W>,
}

impl<W: Weight> LeqAtom<W> {
    pub fn new(lhs: Operand<W>, rhs: Operand<W>) -> LeqAtom<W> {
        LeqAtom { lhs, rhs }
    }

    /// `x <= y`
    pub fn var_leq_var(x: VarLabel, y: VarLabel) -> LeqAtom<W> {
        LeqAtom::new(Operand::Var(x), Operand::Var(y))
    }

    /// `x <= c`
    pub fn var_leq_const(x: VarLabel, c: W) -> LeqAtom<W> {
        LeqAtom::new(Operand::Var(x), Operand::Const(c))
    }

    /// `c <= x`
    pub fn const_leq_var(c: W, x: VarLabel) -> LeqAtom<W> {
        LeqAtom::new(Operand::Const(c), Operand::Var(x))
    }

    /// `a - b <= c`
    pub fn diff_leq_const(a: VarLabel, b: VarLabel, c: W) -> LeqAtom<W> {
        LeqAtom::new(Operand::Diff(a, b), Operand::Const(c))
    }
}

/// The graph-level reading of an atom before labels are mapped to vertices:
/// `tgt - src <= weight`, where `None` stands for the origin vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct RawEdge<W> {
    pub src: Option<VarLabel>,
    pub tgt: Option<VarLabel>,
    pub weight: W,
}

/// Turns a canonicalized atom into its graph-level reading, by symbolic case
/// analysis on the kinds of the two sides. Unary constraints are expressed
/// against the origin vertex. `scale` is the rescale factor of rational
/// problems (the weight is multiplied by it when present).
pub(crate) fn normalize<W: Weight>(atom: &LeqAtom<W>, scale: Option<W>) -> Result<RawEdge<W>, DlError> {
    let raw = match (&atom.lhs, &atom.rhs) {
        // x <= y   <=>   x - y <= 0
        (Operand::Var(x), Operand::Var(y)) => RawEdge {
            src: Some(*y),
            tgt: Some(*x),
            weight: W::zero(),
        },
        // x <= c   <=>   x - origin <= c
        (Operand::Var(x), rhs) if rhs.constant().is_some() => RawEdge {
            src: None,
            tgt: Some(*x),
            weight: rhs.constant().unwrap(),
        },
        // c <= x   <=>   origin - x <= -c
        (lhs, Operand::Var(x)) if lhs.constant().is_some() => RawEdge {
            src: Some(*x),
            tgt: None,
            weight: -lhs.constant().unwrap(),
        },
        // a - b <= c
        (Operand::Diff(a, b), rhs) if rhs.constant().is_some() => RawEdge {
            src: Some(*b),
            tgt: Some(*a),
            weight: rhs.constant().unwrap(),
        },
        // c <= a - b   <=>   b - a <= -c
        (lhs, Operand::Diff(a, b)) if lhs.constant().is_some() => RawEdge {
            src: Some(*a),
            tgt: Some(*b),
            weight: -lhs.constant().unwrap(),
        },
        _ => return Err(DlError::MalformedAtom),
    };
    Ok(match scale {
        Some(k) => RawEdge {
            weight: raw.weight * k,
            ..raw
        },
        None => raw,
    })
}
