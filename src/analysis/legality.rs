//! Legality of a transform against a dependence set.

use super::dependence::{DataDependence, DependenceKind, DependenceRelation};
use crate::lambda::TransformMatrix;
use crate::utils::matrix::lexicographically_positive;
use log::trace;

/// Whether reindexing with `trans` keeps every dependence pointing forward.
///
/// An `Unknown` relation makes every transform illegal, identity included.
/// Independent pairs and read/read pairs never constrain.
pub fn is_legal(trans: &TransformMatrix, deps: &[DataDependence]) -> bool {
    if deps.iter().any(|d| d.relation == DependenceRelation::Unknown) {
        trace!("unknown dependence, refusing every transform");
        return false;
    }
    for dep in deps {
        if dep.kind == DependenceKind::Input {
            continue;
        }
        let DependenceRelation::Distance(d) = &dep.relation else { continue };
        let Some(mapped) = trans.apply(d) else {
            trace!("distance vector {:?} does not match depth {}", d, trans.depth());
            return false;
        };
        if mapped.iter().any(|&x| x != 0) && !lexicographically_positive(&mapped) {
            trace!("dependence {} -> {} distance {:?} becomes {:?}", dep.source, dep.sink, d, mapped);
            return false;
        }
    }
    true
}
