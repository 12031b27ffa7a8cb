//! Best hit selection.
//!
//! The ranked hits returned by the similarity search are re-scored by global alignment.
//! The best hit is the one with the highest similarity among the first hits examined,
//! the length ratio of the hit is carried along but never used to rank hits.

use crate::errors::{FannotError, Result};
use crate::search::Aligner;
use crate::utils::idseq::{IdSeq, SeqLookup};
use crate::utils::parameters::{match_rule, Rule};

/// min(l1,l2) / max(l1,l2), 0 if both lengths are null
pub fn compute_min_length_ratio(l1 : usize, l2 : usize) -> f64 {
    let (min, max) = if l1 < l2 { (l1, l2) } else { (l2, l1) };
    if max == 0 {
        return 0.;
    }
    min as f64 / max as f64
}

/// The best hit of a query in one reference database.
#[derive(Clone, Debug)]
pub struct BestHit<'a> {
    query: &'a IdSeq,
    hit: Option<&'a IdSeq>,
    /// number of hits examined
    nb_hits: usize,
    similarity: f64,
    length_ratio: f64,
    /// rank of the rule satisfied by the best hit
    id_rule: Option<usize>,
}

impl<'a> BestHit<'a> {
    pub fn new(query : &'a IdSeq) -> Self {
        BestHit { query, hit: None, nb_hits: 0, similarity: 0., length_ratio: 0., id_rule: None }
    }

    /// examine a new hit with its similarity to the query. It replaces the current best hit only if its similarity is strictly greater.
    pub fn check_hit(&mut self, hit : &'a IdSeq, similarity : f64) {
        self.nb_hits += 1;
        if similarity > self.similarity {
            self.hit = Some(hit);
            self.similarity = similarity;
            self.length_ratio = compute_min_length_ratio(self.query.get_seq_len(), hit.get_seq_len());
        }
    }

    /// record the first rule satisfied by the best hit, if any
    pub fn match_rules(&mut self, rules : &[Rule]) -> Option<usize> {
        self.id_rule = match self.hit {
            Some(_) => match_rule(rules, self.similarity, self.length_ratio),
            None => None,
        };
        self.id_rule
    }

    pub fn get_query(&self) -> &'a IdSeq {
        self.query
    }

    pub fn get_hit(&self) -> Option<&'a IdSeq> {
        self.hit
    }

    pub fn get_nb_hits(&self) -> usize {
        self.nb_hits
    }

    pub fn get_similarity(&self) -> f64 {
        self.similarity
    }

    pub fn get_length_ratio(&self) -> f64 {
        self.length_ratio
    }

    pub fn get_id_rule(&self) -> Option<usize> {
        self.id_rule
    }
} // end of impl BestHit

/// Scans ranked hit ids, at most nb_hit_check of them, and returns the best hit.
/// A hit id absent from the sequence lookup means the database index and its fasta are out of sync, this is fatal.
pub fn select_best_hit<'a, A: Aligner + ?Sized>(
    query : &'a IdSeq,
    hit_ids : &[String],
    lookup : &'a SeqLookup,
    db_id : &str,
    aligner : &A,
    nb_hit_check : usize,
) -> Result<BestHit<'a>> {
    let mut best_hit = BestHit::new(query);
    for hit_id in hit_ids.iter().take(nb_hit_check) {
        let hit = match lookup.get(hit_id) {
            Some(hit) => hit,
            None => {
                log::error!("hit {} of query {} not found in entries of {}", hit_id, query.get_fasta_id(), db_id);
                return Err(FannotError::MissingHit { hit: hit_id.clone(), db: db_id.to_string() });
            }
        };
        let similarity = aligner.similarity(query, hit)?;
        log::trace!("query {} hit {} similarity {:.3}", query.get_fasta_id(), hit_id, similarity);
        best_hit.check_hit(hit, similarity);
    }
    Ok(best_hit)
} // end of select_best_hit

//==========================================================================================

// end of mod tests
