use crate::num::Weight;
use crate::theory::atoms::EdgeId;
use crate::theory::graph::GraphStore;
use crate::theory::sssp::SsspEngine;

/// Enumerates the inactive edges entailed by the active graph after the
/// activation of `e`, using the two shortest-path trees grown by the SSSP
/// engine.
///
/// An inactive edge `a -> b` of weight `w` is *heavy* when the active graph
/// already contains a path from `a` to `b` (through `e`) of true length at
/// most `w`: asserting it cannot constrain anything further, so its atom is
/// entailed at the polarity the edge encodes. Ties count as entailed.
///
/// Only pairs of a backward-relevant `a` and a forward-relevant `b` can
/// produce a path through `e`; the scan iterates the side whose summed
/// inactive degree is smaller and filters with the opposite side's
/// relevance bits.
pub(crate) fn find_heavy_edges<W: Weight>(
    graph: &GraphStore<W>,
    sssp: &mut SsspEngine<W>,
    e: EdgeId,
    out: &mut Vec<EdgeId>,
) {
    let rwt_e = sssp.reduced_weight(graph, e);
    let (fwd, bwd) = (&sssp.fwd, &sssp.bwd);

    // dist_bwd[a] ends with `e` and dist_fwd[b] starts with it, so their sum
    // counts rwt(e) twice
    let path_of = |a_dist: W, b_dist: W| a_dist + b_dist - rwt_e;

    if bwd.degree_sum < fwd.degree_sum {
        for &a in &bwd.settled_relevant {
            for &cand in graph.inactive_out(a) {
                if !graph.is_unassigned(cand.base_id()) {
                    continue;
                }
                let d = graph.edge(cand);
                debug_assert_eq!(d.src, a);
                if fwd.relevant.get(d.tgt) != Some(true) {
                    continue;
                }
                let path = path_of(bwd.dist.get(a).unwrap(), fwd.dist.get(d.tgt).unwrap());
                let true_len = path + graph.pi(d.src) - graph.pi(d.tgt);
                if true_len <= d.weight {
                    out.push(cand);
                }
            }
        }
    } else {
        for &b in &fwd.settled_relevant {
            for &cand in graph.inactive_in(b) {
                if !graph.is_unassigned(cand.base_id()) {
                    continue;
                }
                let d = graph.edge(cand);
                debug_assert_eq!(d.tgt, b);
                if bwd.relevant.get(d.src) != Some(true) {
                    continue;
                }
                let path = path_of(bwd.dist.get(d.src).unwrap(), fwd.dist.get(b).unwrap());
                let true_len = path + graph.pi(d.src) - graph.pi(d.tgt);
                if true_len <= d.weight {
                    out.push(cand);
                }
            }
        }
    }
}
