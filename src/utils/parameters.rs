//! structures related to annotation parameters : acceptance rules, default annotations, templates,
//! and overwrite thresholds.
//!
//! Parameters can be dumped to and reloaded from a json file. Field names of the json are the ones
//! used by historical rule files (`Min_sim`, `Hit_sta`, `NbHitCheck` ...) so existing files can be reused.

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::to_writer_pretty;

use crate::annot::format::Format;
use crate::errors::{FannotError, Result};

// Default thresholds
pub const NB_HIT_CHECK: usize = 3;
pub const DFT_NOTE: &str = "hypothetical protein";
pub const DFT_PRODUCT: &str = "hypothetical protein";
pub const DFT_GENENAME: &str = "";
pub const DFT_FUNCTION: &str = "";
pub const DFT_MAXSTSOW: u32 = 1;
pub const DFT_MINSIDOW: f64 = 5.0;
pub const TPL_NOTE: &str = "{Prefix}||{DbName}|{DbId} ||{Species} ||{LocusTag} ||{GeneName} ||{LongDesc}";
pub const TPL_PRODUCT: &str = "{ShortDesc}::ToLwr::GnPn";
pub const TPL_GENENAME: &str = "{GeneName}";
pub const TPL_FUNCTION: &str = "";

// Default rules
pub const MIN_SIM_HIGH: f64 = 80.0;
pub const MIN_LRA_HIGH: f64 = 0.8;
pub const PRE_ANN_HIGH: &str = "highly similar to ";
pub const HIT_STA_HIGH: u32 = 2;
pub const MIN_SIM_NORM: f64 = 50.0;
pub const MIN_LRA_NORM: f64 = 0.7;
pub const PRE_ANN_NORM: &str = "similar to ";
pub const HIT_STA_NORM: u32 = 1;

/// An acceptance rule. A best hit satisfies the rule if its similarity and its length ratio
/// both reach the rule minima.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// minimal similarity threshold (percent)
    #[serde(rename = "Min_sim")]
    pub min_sim: f64,
    /// minimal length ratio threshold, in [0,1]
    #[serde(rename = "Min_lra")]
    pub min_lra: f64,
    /// annotation prefix
    #[serde(rename = "Pre_ann", default)]
    pub prefix: String,
    /// transfer the gene name of the hit
    #[serde(rename = "Cpy_gen", default)]
    pub copy_gene_name: bool,
    /// a match can overwrite a previous annotation
    #[serde(rename = "Ovr_wrt", default)]
    pub overwrite: bool,
    /// hit status, 0 is reserved for unannotated queries
    #[serde(rename = "Hit_sta")]
    pub status: u32,
}

impl Rule {
    pub fn new(min_sim : f64, min_lra : f64, prefix : &str, copy_gene_name : bool, overwrite : bool, status : u32) -> Self {
        Rule { min_sim, min_lra, prefix: prefix.to_string(), copy_gene_name, overwrite, status }
    }

    /// default rule for highly similar hits
    pub fn highly_similar() -> Self {
        Rule::new(MIN_SIM_HIGH, MIN_LRA_HIGH, PRE_ANN_HIGH, true, true, HIT_STA_HIGH)
    }

    /// default rule for similar hits
    pub fn similar() -> Self {
        Rule::new(MIN_SIM_NORM, MIN_LRA_NORM, PRE_ANN_NORM, false, false, HIT_STA_NORM)
    }

    /// returns true if a hit with similarity s and length ratio l satisfies the rule
    pub fn test(&self, s : f64, l : f64) -> bool {
        s >= self.min_sim && l >= self.min_lra
    }

    // true if every hit accepted by self is accepted by other
    fn is_covered_by(&self, other : &Rule) -> bool {
        self.min_sim >= other.min_sim && self.min_lra >= other.min_lra
    }
} // end of impl Rule

/// returns the rank of the first rule satisfied by (similarity, length_ratio), None if no rule matches.
pub fn match_rule(rules : &[Rule], similarity : f64, length_ratio : f64) -> Option<usize> {
    rules.iter().position(|r| r.test(similarity, length_ratio))
}

//======================================================================================

/// Global annotation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Param {
    pub default_note: String,
    pub default_product: String,
    pub default_gene_name: String,
    pub default_function: String,
    pub template_note: String,
    pub template_product: String,
    pub template_gene_name: String,
    pub template_function: String,
    /// number of ranked hits examined by the best hit selection
    pub nb_hit_check: usize,
    /// rules, from the strictest to the loosest
    pub rules: Vec<Rule>,
    /// an annotated query can be overwritten only if its status is at most this value
    #[serde(rename = "MaxStatusOW")]
    pub max_status_ow: u32,
    /// with equal status, minimal similarity gain required to overwrite
    #[serde(rename = "MinSimDiffOW")]
    pub min_sim_diff_ow: f64,
}

impl Default for Param {
    fn default() -> Self {
        Param {
            default_note: DFT_NOTE.to_string(),
            default_product: DFT_PRODUCT.to_string(),
            default_gene_name: DFT_GENENAME.to_string(),
            default_function: DFT_FUNCTION.to_string(),
            template_note: TPL_NOTE.to_string(),
            template_product: TPL_PRODUCT.to_string(),
            template_gene_name: TPL_GENENAME.to_string(),
            template_function: TPL_FUNCTION.to_string(),
            nb_hit_check: NB_HIT_CHECK,
            rules: vec![Rule::highly_similar(), Rule::similar()],
            max_status_ow: DFT_MAXSTSOW,
            min_sim_diff_ow: DFT_MINSIDOW,
        }
    }
} // end of impl Default for Param

impl Param {
    /// checks values and templates. Errors are fatal, suspicious rule ordering is only logged.
    pub fn validate(&self) -> Result<()> {
        if self.nb_hit_check == 0 {
            return Err(FannotError::RuleConfig("NbHitCheck must be at least 1".to_string()));
        }
        if self.min_sim_diff_ow < 0. {
            return Err(FannotError::RuleConfig(format!("MinSimDiffOW must be positive, got {}", self.min_sim_diff_ow)));
        }
        if self.rules.is_empty() {
            log::warn!("no annotation rule defined, no query will be annotated");
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if !(0. ..=100.).contains(&rule.min_sim) {
                return Err(FannotError::RuleConfig(format!("rule {} : Min_sim must be in [0,100], got {}", i, rule.min_sim)));
            }
            if !(0. ..=1.).contains(&rule.min_lra) {
                return Err(FannotError::RuleConfig(format!("rule {} : Min_lra must be in [0,1], got {}", i, rule.min_lra)));
            }
            if rule.status == 0 {
                return Err(FannotError::RuleConfig(format!("rule {} : Hit_sta 0 is reserved for unannotated queries", i)));
            }
            // rules are tried in order, a rule covered by a previous one is never reached
            for (j, previous) in self.rules[..i].iter().enumerate() {
                if rule.is_covered_by(previous) {
                    log::warn!("rule {} is shadowed by rule {} and will never match", i, j);
                }
                if rule.status > previous.status {
                    log::warn!("rule {} has a higher status ({}) than the preceding rule {} ({})", i, rule.status, j, previous.status);
                    log::warn!("rules should go from strictest to loosest");
                }
            }
        }
        // templates are checked once here, not at each annotation
        for template in [&self.template_note, &self.template_product, &self.template_gene_name, &self.template_function] {
            Format::new(template)?;
        }
        Ok(())
    } // end of validate

    /// dump parameters in a json file
    pub fn dump_json(&self, filepath : &Path) -> Result<()> {
        log::info!("dumping annotation parameters in json file : {:?}", filepath);
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(filepath)?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, &self)?;
        writer.flush()?;
        Ok(())
    } // end of dump_json

    /// reload from a json file. Missing fields get their default value. The result is validated.
    pub fn reload_json(filepath : &Path) -> Result<Self> {
        log::info!("reloading annotation parameters from {:?}", filepath);
        let file = OpenOptions::new().read(true).open(filepath)?;
        let reader = BufReader::new(file);
        let param: Param = serde_json::from_reader(reader)?;
        param.validate()?;
        log::info!("nb rules : {}, nb hits checked : {}", param.rules.len(), param.nb_hit_check);
        Ok(param)
    } // end of reload_json
} // end of impl Param

//======================================================================================

// end of mod tests
