//! contains the annotation results of queries and their tabular dump.
//!
//! There is one [AnnotResult] per query. It is created with default annotations, replaced each time
//! a reference database pass accepts a new annotation, and completed with InterProScan predictions at the end.

use std::io::Write;

use crate::errors::Result;
use crate::utils::idseq::SeqDict;
use crate::utils::parameters::Param;

/// columns of the annotation table
pub const HEADER: [&str; 16] = [
    "GeneID", "Product", "Note", "Function", "Organism", "RefID", "RefLocus", "RefName", "IPSID", "IPSAnnot", "Status",
    "Similarity", "LengthRatio", "DBID", "HitNum", "OverWritten",
];

/// Annotation of a query
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotResult {
    pub note: String,
    pub product: String,
    pub gene_name: String,
    pub function: String,
    /// status of the rule that produced the annotation, 0 if unannotated
    pub status: u32,
    pub similarity: f64,
    pub length_ratio: f64,
    /// number of hits examined when the annotation was set
    pub hit_num: usize,
    /// the annotation replaced a previous one
    pub hit_overwritten: bool,
    pub hit_id: String,
    pub hit_locus: String,
    pub hit_species: String,
    /// InterPro ids, sorted
    pub ips_id: Vec<String>,
    /// InterPro descriptions, same order as ips_id
    pub ips_annot: Vec<String>,
    /// id of the reference database that produced the annotation
    pub db_id: String,
}

impl AnnotResult {
    /// an unannotated result carrying the default annotations
    pub fn new(param : &Param) -> Self {
        AnnotResult {
            note: param.default_note.clone(),
            product: param.default_product.clone(),
            gene_name: param.default_gene_name.clone(),
            function: param.default_function.clone(),
            ..Default::default()
        }
    }

    /// the record written in the annotation table for gene gid
    pub fn to_record(&self, gid : &str) -> [String; 16] {
        [
            gid.to_string(),
            self.product.clone(),
            self.note.clone(),
            self.function.clone(),
            self.hit_species.clone(),
            self.hit_id.clone(),
            self.hit_locus.clone(),
            self.gene_name.clone(),
            self.ips_id.join(","),
            self.ips_annot.join("; "),
            self.status.to_string(),
            format!("{:.3}", self.similarity),
            format!("{:.3}", self.length_ratio),
            self.db_id.clone(),
            self.hit_num.to_string(),
            self.hit_overwritten.to_string(),
        ]
    } // end of to_record
} // end of impl AnnotResult

//==========================================================================================

/// Annotation state of a query across all database passes.
/// finished is set by the first accepted annotation and never reset.
#[derive(Clone, Debug)]
pub struct QueryState {
    pub result: AnnotResult,
    pub finished: bool,
}

impl QueryState {
    pub fn new(param : &Param) -> Self {
        QueryState { result: AnnotResult::new(param), finished: false }
    }

    /// store an accepted annotation
    pub fn accept(&mut self, result : AnnotResult) {
        self.result = result;
        self.finished = true;
    }
}

//==========================================================================================

/// dump the annotation table (tab separated, with header). Returns the number of rows written.
pub fn dump_results<W: Write>(queries : &SeqDict, states : &[QueryState], out : W) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(out);
    writer.write_record(HEADER)?;
    let mut nb_rows = 0;
    for (query, state) in queries.0.iter().zip(states.iter()) {
        writer.write_record(&state.result.to_record(query.get_fasta_id()))?;
        nb_rows += 1;
    }
    writer.flush()?;
    log::debug!("dumped {} annotation rows", nb_rows);
    Ok(nb_rows)
} // end of dump_results

//==========================================================================================

// end of mod tests
