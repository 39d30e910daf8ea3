//! The linear loop transformation pass.
//!
//! For every outermost loop nest of a region the pass extracts a lambda
//! loop nest, asks a [`DependenceOracle`] for the dependences of its
//! innermost body, picks a transform with the interchange heuristic and,
//! if the transform is legal and not the identity, rewrites the nest.
//!
//! Every nest is worked on as a copy: a nest that fails at any step is
//! left exactly as it was and the reason is recorded as a diagnostic.

use super::interchange::try_interchange_loops;
use crate::analysis::{collect_data_references, is_legal, DependenceOracle};
use crate::chrec::LoopId;
use crate::codegen::materialize;
use crate::context::CompilationContext;
use crate::extract::{check_perfect_nest, extract_loopnest, nestify, ExtractedNest};
use crate::ir::{LoopNode, Node, Region};
use crate::lambda::{loopnest_transform, LoopNest, TransformMatrix};
use crate::utils::{Diagnostic, ExtractErrorKind, LambdaError, LambdaResult, TransformError, TransformErrorKind};
use log::{debug, info};

/// What happened to one nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NestOutcome {
    /// The nest was rewritten
    Transformed,
    /// The nest was left untouched, for the given reason
    Unchanged(String),
}

/// Result of running the pass on one nest.
#[derive(Debug, Clone)]
pub struct NestReport {
    /// Outermost loop of the nest
    pub loop_id: LoopId,
    pub outcome: NestOutcome,
    /// The transform that was applied
    pub matrix: Option<TransformMatrix>,
    /// The extracted nest
    pub original: Option<LoopNest>,
    /// The nest after transformation
    pub transformed: Option<LoopNest>,
    /// Loop split off the nest to make it perfect
    pub split_loop: Option<LoopId>,
}

impl NestReport {
    fn unchanged(loop_id: LoopId, err: &LambdaError) -> Self {
        Self {
            loop_id,
            outcome: NestOutcome::Unchanged(err.to_string()),
            matrix: None,
            original: None,
            transformed: None,
            split_loop: None,
        }
    }

    pub fn is_transformed(&self) -> bool {
        self.outcome == NestOutcome::Transformed
    }
}

/// A rewritten nest, ready to replace the original loop node.
struct Rewritten {
    nodes: Vec<Node>,
    report: NestReport,
}

fn transform_error(kind: TransformErrorKind, message: impl Into<String>) -> LambdaError {
    TransformError::new(kind, message).into()
}

fn dump_nest(ctx: &CompilationContext, what: &str, extracted: &ExtractedNest, nest: &LoopNest) {
    let ivs: Vec<String> = extracted.induction_vars.iter().map(|&s| ctx.name(s)).collect();
    let invariants: Vec<String> = extracted.invariants.iter().map(|&s| ctx.name(s)).collect();
    let text = nest.to_string_with_names(&ivs, &invariants);
    if ctx.config.dump_nests {
        info!("{} nest {}:\n{}", what, extracted.loop_ids[0], text);
    } else {
        debug!("{} nest {}:\n{}", what, extracted.loop_ids[0], text);
    }
}

/// Transform the nest rooted at `root`, with `explicit` or with the
/// transform chosen by the interchange heuristic.
fn rewrite_nest(
    ctx: &mut CompilationContext,
    root: &LoopNode,
    oracle: &dyn DependenceOracle,
    explicit: Option<&TransformMatrix>,
    next_id: LoopId,
) -> LambdaResult<Rewritten> {
    let mut work = root.clone();
    let mut sibling = None;
    match check_perfect_nest(&work) {
        Ok(_) => {}
        Err(e) if e.kind == ExtractErrorKind::ImperfectNest && ctx.config.need_perfect_nest => {
            debug!("loop {} is not a perfect nest, trying to split it", root.id);
            sibling = Some(nestify(ctx, &mut work, next_id)?);
        }
        Err(e) => return Err(e.into()),
    }

    let extracted = extract_loopnest(&work)?;
    dump_nest(ctx, "original", &extracted, &extracted.nest);
    let refs = collect_data_references(&work);
    let deps = oracle.dependences(&extracted, &refs);
    debug!("{} data references, {} dependences", refs.len(), deps.len());

    let depth = extracted.depth();
    let trans = match explicit {
        Some(t) if t.depth() != depth || t.matrix.ncols() != depth => {
            return Err(transform_error(
                TransformErrorKind::DimensionMismatch,
                format!("{}x{} transform for a nest of depth {}", t.depth(), t.matrix.ncols(), depth),
            ));
        }
        Some(t) => t.clone(),
        None => try_interchange_loops(TransformMatrix::identity(depth), &extracted, &deps, &refs),
    };
    if trans.is_identity() {
        return Err(transform_error(TransformErrorKind::Identity, "transform is the identity"));
    }
    if !is_legal(&trans, &deps) {
        return Err(transform_error(TransformErrorKind::Illegal, "transform violates a dependence"));
    }
    debug!("transform for nest {}:\n{}", root.id, trans);

    let target = loopnest_transform(&extracted.nest, &trans)?;
    dump_nest(ctx, "transformed", &extracted, &target);
    let preheader = materialize(ctx, &mut work, &extracted, &target, &trans)?;

    let split_loop = sibling.as_ref().map(|s| s.id);
    let mut nodes: Vec<Node> = preheader.into_iter().map(Node::Stmt).collect();
    nodes.push(Node::Loop(work));
    nodes.extend(sibling.map(Node::Loop));
    Ok(Rewritten {
        nodes,
        report: NestReport {
            loop_id: root.id,
            outcome: NestOutcome::Transformed,
            matrix: Some(trans),
            original: Some(extracted.nest),
            transformed: Some(target),
            split_loop,
        },
    })
}

/// Record why the nest at `loop_id` was left alone.
fn reject(ctx: &mut CompilationContext, loop_id: LoopId, err: &LambdaError) {
    let diagnostic = match err {
        LambdaError::Transform(e) if e.kind == TransformErrorKind::Identity => {
            Diagnostic::note("nest left unchanged").with_note(err.to_string())
        }
        _ => Diagnostic::warning("nest not transformed").with_note(err.to_string()),
    };
    ctx.diagnose(diagnostic.with_loop(loop_id));
}

/// Put a rewritten nest in place of the loop at `index`, or record why
/// the nest stays. Returns the report and the number of nodes now taking
/// the place of the loop.
fn commit(
    ctx: &mut CompilationContext,
    region: &mut Region,
    index: usize,
    loop_id: LoopId,
    result: LambdaResult<Rewritten>,
) -> LambdaResult<(NestReport, usize)> {
    match result {
        Ok(Rewritten { nodes, report }) => {
            let len = nodes.len();
            region.nodes.splice(index..=index, nodes);
            info!("transformed loop nest {}", loop_id);
            Ok((report, len))
        }
        Err(err) => {
            reject(ctx, loop_id, &err);
            Err(err)
        }
    }
}

/// Run the linear loop transformation pass over every outermost loop nest
/// of `region`.
pub fn linear_transform_loops(
    ctx: &mut CompilationContext,
    region: &mut Region,
    oracle: &dyn DependenceOracle,
) -> Vec<NestReport> {
    if !ctx.config.enabled {
        ctx.diagnose(Diagnostic::note("linear loop transforms are disabled"));
        return Vec::new();
    }
    let mut reports = Vec::new();
    let mut k = 0;
    while k < region.nodes.len() {
        let next_id = region.max_loop_id() + 1;
        let Node::Loop(root) = &region.nodes[k] else {
            k += 1;
            continue;
        };
        let loop_id = root.id;
        let result = rewrite_nest(ctx, root, oracle, None, next_id);
        match commit(ctx, region, k, loop_id, result) {
            Ok((report, len)) => {
                reports.push(report);
                k += len;
            }
            Err(err) => {
                reports.push(NestReport::unchanged(loop_id, &err));
                k += 1;
            }
        }
    }
    reports
}

/// Apply `trans` to the outermost nest of `region` whose loop id is
/// `loop_id`, with the same checks as the pass.
pub fn transform_nest_with(
    ctx: &mut CompilationContext,
    region: &mut Region,
    loop_id: LoopId,
    oracle: &dyn DependenceOracle,
    trans: &TransformMatrix,
) -> LambdaResult<NestReport> {
    if !ctx.config.enabled {
        return Err(transform_error(TransformErrorKind::Disabled, "linear loop transforms are disabled"));
    }
    let index = region
        .nodes
        .iter()
        .position(|n| matches!(n, Node::Loop(l) if l.id == loop_id))
        .ok_or_else(|| LambdaError::Internal(format!("no outermost loop {}", loop_id)))?;
    let next_id = region.max_loop_id() + 1;
    let Node::Loop(root) = &region.nodes[index] else {
        return Err(LambdaError::Internal(format!("no outermost loop {}", loop_id)));
    };
    let result = rewrite_nest(ctx, root, oracle, Some(trans), next_id);
    commit(ctx, region, index, loop_id, result).map(|(report, _)| report)
}
