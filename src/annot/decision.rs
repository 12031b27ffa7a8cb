//! The annotation decision engine.
//!
//! For one query and one reference database pass : search, best hit selection, rule matching,
//! then acceptance or rejection of the annotation given the current state of the query.
//!
//! A query not yet annotated accepts any matching rule. An annotated query can only be overwritten if
//! the database allows overwrite and the matched rule is overwrite eligible, and then only by a stronger status
//! or, at equal status, by a similarity higher by at least MinSimDiffOW.

use super::description::{Description, Field};
use super::format::Formats;
use crate::answer::{AnnotResult, QueryState};
use crate::errors::Result;
use crate::matcher::{select_best_hit, BestHit};
use crate::refdb::RefDb;
use crate::search::{Aligner, Searcher};
use crate::utils::idseq::{IdSeq, SeqLookup};
use crate::utils::parameters::{Param, Rule};

/// outcome of the decision step
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Decision {
    /// result left unchanged
    Unchanged,
    /// new annotation accepted, overwrite is true if it replaces a previous annotation
    Accept { overwrite: bool },
}

/// a query is dispatched if not yet annotated, or if the database allows overwrite and its status is low enough.
pub fn is_dispatch_eligible(state : &QueryState, refdb : &RefDb, param : &Param) -> bool {
    !state.finished || (refdb.is_overwrite() && state.result.status <= param.max_status_ow)
}

/// decides if the best hit satisfying rule replaces the current annotation of the query
pub fn decide(state : &QueryState, rule : &Rule, similarity : f64, refdb : &RefDb, param : &Param) -> Decision {
    if !state.finished {
        return Decision::Accept { overwrite: false };
    }
    if !(refdb.is_overwrite() && rule.overwrite) {
        return Decision::Unchanged;
    }
    let current = &state.result;
    if rule.status > current.status {
        Decision::Accept { overwrite: true }
    } else if rule.status == current.status && similarity - current.similarity >= param.min_sim_diff_ow {
        Decision::Accept { overwrite: true }
    } else {
        Decision::Unchanged
    }
} // end of decide

/// prefix of the annotation. A 100% hit in a database containing the queries is the query itself, no prefix.
pub fn resolve_prefix<'a>(rule : &'a Rule, refdb : &RefDb, similarity : f64) -> &'a str {
    if refdb.is_equal() && similarity == 100.0 {
        ""
    } else {
        &rule.prefix
    }
}

// compiled text, or the default if the template gives nothing
fn or_default(compiled : String, default : &str) -> String {
    if compiled.is_empty() {
        default.to_string()
    } else {
        compiled
    }
}

/// Evaluates queries against a reference database.
pub struct Annotator<'a, S: ?Sized, A: ?Sized> {
    param: &'a Param,
    formats: &'a Formats,
    searcher: &'a S,
    aligner: &'a A,
}

impl<'a, S, A> Annotator<'a, S, A>
where
    S: Searcher + ?Sized,
    A: Aligner + ?Sized,
{
    pub fn new(param : &'a Param, formats : &'a Formats, searcher : &'a S, aligner : &'a A) -> Self {
        Annotator { param, formats, searcher, aligner }
    }

    /// builds the annotation transferred from the best hit
    pub fn annotate(&self, best_hit : &BestHit, rule : &Rule, refdb : &RefDb, overwrite : bool) -> Result<AnnotResult> {
        let param = self.param;
        let mut result = AnnotResult::new(param);
        let hit = match best_hit.get_hit() {
            Some(hit) => hit,
            None => return Ok(result),
        };
        let mut desc = Description::new(refdb.get_name(), hit)?;
        desc.set_unreviewed(!refdb.is_reviewed());
        desc.set_prefix(resolve_prefix(rule, refdb, best_hit.get_similarity()));
        //
        result.note = or_default(self.formats.note.compile(&desc), &param.default_note);
        result.product = or_default(self.formats.product.compile(&desc), &param.default_product);
        if rule.copy_gene_name && refdb.is_gene_name() {
            result.gene_name = or_default(self.formats.gene_name.compile(&desc), &param.default_gene_name);
        }
        result.function = or_default(self.formats.function.compile(&desc), &param.default_function);
        result.status = rule.status;
        result.similarity = best_hit.get_similarity();
        result.length_ratio = best_hit.get_length_ratio();
        result.hit_num = best_hit.get_nb_hits();
        result.hit_overwritten = overwrite;
        result.hit_id = hit.get_fasta_id().clone();
        result.hit_locus = desc.get_field(Field::LocusTag).unwrap_or("").to_string();
        result.hit_species = desc.get_field(Field::Species).unwrap_or("").to_string();
        result.db_id = refdb.get_id().clone();
        Ok(result)
    } // end of annotate

    /// Runs search, best hit selection, rule matching and decision for one query.
    /// Returns the new annotation if accepted, None if the query state is left unchanged.
    pub fn evaluate(&self, query : &IdSeq, state : &QueryState, refdb : &RefDb, lookup : &SeqLookup) -> Result<Option<AnnotResult>> {
        let hit_ids = self.searcher.search(query, refdb)?;
        if hit_ids.is_empty() {
            log::debug!("query {} : no hit in {}", query.get_fasta_id(), refdb.get_id());
            return Ok(None);
        }
        let mut best_hit = select_best_hit(query, &hit_ids, lookup, refdb.get_id(), self.aligner, self.param.nb_hit_check)?;
        let rule = match best_hit.match_rules(&self.param.rules) {
            Some(id_rule) => &self.param.rules[id_rule],
            None => {
                log::debug!("query {} : best hit similarity {:.3} length ratio {:.3} match no rule",
                        query.get_fasta_id(), best_hit.get_similarity(), best_hit.get_length_ratio());
                return Ok(None);
            }
        };
        match decide(state, rule, best_hit.get_similarity(), refdb, self.param) {
            Decision::Accept { overwrite } => {
                let result = self.annotate(&best_hit, rule, refdb, overwrite)?;
                log::debug!("query {} : annotated from {} hit {} status {} (overwrite : {})",
                        query.get_fasta_id(), refdb.get_id(), result.hit_id, result.status, overwrite);
                Ok(Some(result))
            }
            Decision::Unchanged => {
                log::debug!("query {} : status {} kept, hit with status {} rejected",
                        query.get_fasta_id(), state.result.status, rule.status);
                Ok(None)
            }
        }
    } // end of evaluate
} // end of impl Annotator

//==========================================================================================

// end of mod tests
