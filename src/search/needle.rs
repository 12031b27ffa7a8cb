//! Global alignment similarity.
//!
//! Two aligners are provided :
//! - [GlobalAligner], a Needleman-Wunsch alignment with BLOSUM62 and affine gaps computed in process,
//! - [NeedleCommand], which runs the EMBOSS needle program and reads the similarity it reports.
//!
//! In both cases the similarity is the number of alignment columns with identical or positively scored residues
//! divided by the number of columns (gaps included), in percent.

use std::process::Command;

use bio::alignment::pairwise::Aligner as PairwiseAligner;
use bio::alignment::AlignmentOperation;
use bio::scores::blosum62;
use serde::{Deserialize, Serialize};

use super::Aligner;
use crate::errors::{FannotError, Result};
use crate::utils::idseq::IdSeq;

pub const DFT_GAP_OPEN: f64 = 10.0;
pub const DFT_GAP_EXTEND: f64 = 0.5;
pub const DFT_NEEDLE: &str = "needle";

// scores are doubled to keep half gap penalties integral
const SCORE_SCALE: f64 = 2.0;

/// gap penalties, as given to needle : a gap of length k costs gap_open + (k-1) * gap_extend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlignParams {
    pub gap_open: f64,
    pub gap_extend: f64,
}

impl Default for AlignParams {
    fn default() -> Self {
        AlignParams { gap_open: DFT_GAP_OPEN, gap_extend: DFT_GAP_EXTEND }
    }
}

impl AlignParams {
    pub fn validate(&self) -> Result<()> {
        if self.gap_extend < 0. || self.gap_open < self.gap_extend {
            return Err(FannotError::RuleConfig(format!(
                "gap penalties must satisfy 0 <= gap_extend <= gap_open, got open {} extend {}",
                self.gap_open, self.gap_extend
            )));
        }
        Ok(())
    }
}

// residues unknown to the substitution matrix are scored as X
fn sanitize(seq : &[u8]) -> Vec<u8> {
    seq.iter().map(|&c| if c.is_ascii_uppercase() || c == b'*' { c } else { b'X' }).collect()
}

/// in process Needleman-Wunsch aligner
pub struct GlobalAligner {
    params: AlignParams,
}

impl GlobalAligner {
    pub fn new(params : AlignParams) -> Result<Self> {
        params.validate()?;
        Ok(GlobalAligner { params })
    }

    /// percent similarity of the global alignment of x and y
    pub fn align(&self, x : &[u8], y : &[u8]) -> f64 {
        if x.is_empty() || y.is_empty() {
            return 0.;
        }
        let x = sanitize(x);
        let y = sanitize(y);
        // bio charges gap_open + k * gap_extend for a gap of length k
        let gap_open = -((SCORE_SCALE * (self.params.gap_open - self.params.gap_extend)).round() as i32);
        let gap_extend = -((SCORE_SCALE * self.params.gap_extend).round() as i32);
        let score = |a: u8, b: u8| SCORE_SCALE as i32 * blosum62(a, b);
        let mut aligner = PairwiseAligner::with_capacity(x.len(), y.len(), gap_open, gap_extend, score);
        let alignment = aligner.global(&x, &y);
        //
        let (mut i, mut j) = (alignment.xstart, alignment.ystart);
        let mut nb_columns = 0usize;
        let mut nb_similar = 0usize;
        for op in alignment.operations.iter() {
            match op {
                AlignmentOperation::Match => {
                    nb_similar += 1;
                    nb_columns += 1;
                    i += 1;
                    j += 1;
                }
                AlignmentOperation::Subst => {
                    if blosum62(x[i], y[j]) > 0 {
                        nb_similar += 1;
                    }
                    nb_columns += 1;
                    i += 1;
                    j += 1;
                }
                AlignmentOperation::Ins => {
                    nb_columns += 1;
                    i += 1;
                }
                AlignmentOperation::Del => {
                    nb_columns += 1;
                    j += 1;
                }
                AlignmentOperation::Xclip(n) => i += n,
                AlignmentOperation::Yclip(n) => j += n,
            }
        }
        if nb_columns == 0 {
            return 0.;
        }
        100. * nb_similar as f64 / nb_columns as f64
    } // end of align
} // end of impl GlobalAligner

impl Aligner for GlobalAligner {
    fn similarity(&self, query : &IdSeq, hit : &IdSeq) -> Result<f64> {
        let sim = self.align(query.get_sequence(), hit.get_sequence());
        log::trace!("needleman-wunsch {} / {} similarity : {:.3}", query.get_fasta_id(), hit.get_fasta_id(), sim);
        Ok(sim)
    }
}

//==========================================================================================

/// get the percentage of the "# Similarity:   54/61 (88.5%)" line of needle output
pub fn parse_needle_similarity(output : &str) -> Option<f64> {
    let line = output.lines().find(|l| l.starts_with("# Similarity:"))?;
    let start = line.find('(')?;
    let end = line.find('%')?;
    if end <= start {
        return None;
    }
    line[start + 1..end].trim().parse::<f64>().ok()
}

/// runs the EMBOSS needle program
pub struct NeedleCommand {
    binary: String,
    params: AlignParams,
}

impl NeedleCommand {
    pub fn new(binary : &str, params : AlignParams) -> Result<Self> {
        params.validate()?;
        Ok(NeedleCommand { binary: binary.to_string(), params })
    }
}

impl Aligner for NeedleCommand {
    fn similarity(&self, query : &IdSeq, hit : &IdSeq) -> Result<f64> {
        let align_error = |msg: String| FannotError::Align { query: query.get_fasta_id().clone(), hit: hit.get_fasta_id().clone(), msg };
        let output = Command::new(&self.binary)
            .arg("-asequence")
            .arg(format!("asis:{}", String::from_utf8_lossy(query.get_sequence())))
            .arg("-bsequence")
            .arg(format!("asis:{}", String::from_utf8_lossy(hit.get_sequence())))
            .arg("-gapopen")
            .arg(self.params.gap_open.to_string())
            .arg("-gapextend")
            .arg(self.params.gap_extend.to_string())
            .arg("-auto")
            .arg("-stdout")
            .output()
            .map_err(|e| align_error(format!("cannot run {} : {}", self.binary, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(align_error(format!("{} exited with {} : {}", self.binary, output.status, stderr.trim())));
        }
        let sim = parse_needle_similarity(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| align_error("no similarity line in needle output".to_string()))?;
        log::trace!("needle {} / {} similarity : {:.3}", query.get_fasta_id(), hit.get_fasta_id(), sim);
        Ok(sim)
    } // end of similarity
} // end of impl Aligner for NeedleCommand

//==========================================================================================

// end of mod tests
