//! InterProScan predictions.
//!
//! Reads the tab separated output of InterProScan and keeps, for each gene, the InterPro entries
//! (id and description) of significant matches. These predictions complete the annotation table
//! once all reference databases have been searched.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use fxhash::FxHashMap;

use crate::errors::{FannotError, Result};

/// default maximal e-value of a retained match
pub const D_MAX_EVALUE: f64 = 1e-10;

// columns of an InterProScan tsv line
const NB_COLUMNS_IPR: usize = 13;
const COL_GENE: usize = 0;
const COL_EVALUE: usize = 8;
const COL_IPR_ID: usize = 11;
const COL_IPR_DESC: usize = 12;

/// lower the first letter of an annotation unless it looks like an acronym
pub fn clean_up_annot(annot : &str) -> String {
    let annot = annot.trim();
    let mut chars = annot.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_ascii_uppercase() && (second.is_ascii_lowercase() || second == ' ') => {
            let mut cleaned = String::with_capacity(annot.len());
            cleaned.push(first.to_ascii_lowercase());
            cleaned.push_str(&annot[1..]);
            cleaned
        }
        _ => annot.to_string(),
    }
} // end of clean_up_annot

/// InterPro entries of one gene, sorted by InterPro id
#[derive(Clone, Debug, Default)]
pub struct IpsEntry(BTreeMap<String, String>);

impl IpsEntry {
    /// iterates (InterPro id, description) in id order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// InterProScan predictions keyed by gene id
pub struct Ips {
    data: FxHashMap<String, IpsEntry>,
    max_evalue: f64,
}

impl Default for Ips {
    fn default() -> Self {
        Ips::new(D_MAX_EVALUE)
    }
}

impl Ips {
    pub fn new(max_evalue : f64) -> Self {
        Ips { data: FxHashMap::default(), max_evalue }
    }

    pub fn get_nb_genes(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, gene_id : &str) -> Option<&IpsEntry> {
        self.data.get(gene_id)
    }

    /// load predictions from an InterProScan tsv file
    pub fn load_file(&mut self, path : &Path) -> Result<usize> {
        log::info!("loading InterProScan predictions from {:?}", path);
        let file = std::fs::File::open(path)?;
        let nb = self.load_reader(file)?;
        log::info!("loaded {} InterPro entries for {} genes", nb, self.data.len());
        Ok(nb)
    }

    /// load predictions from any reader, returns the number of new (gene, InterPro id) entries.
    /// Only lines with an InterPro id (13 columns and more) and an e-value below the threshold are retained.
    pub fn load_reader<R: Read>(&mut self, reader : R) -> Result<usize> {
        let mut tsv = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);
        let mut nb_new = 0;
        for record in tsv.records() {
            let record = record?;
            if record.len() < NB_COLUMNS_IPR {
                continue;
            }
            let ipr_id = &record[COL_IPR_ID];
            if ipr_id.is_empty() || ipr_id == "-" {
                continue;
            }
            // no score reported by some member databases
            if &record[COL_EVALUE] == "-" {
                continue;
            }
            let evalue: f64 = match record[COL_EVALUE].parse() {
                Ok(evalue) => evalue,
                Err(_) => {
                    log::error!("bad e-value {} in InterProScan line of {}", &record[COL_EVALUE], &record[COL_GENE]);
                    return Err(FannotError::Ips(format!("bad e-value {} for gene {}", &record[COL_EVALUE], &record[COL_GENE])));
                }
            };
            if evalue > self.max_evalue {
                continue;
            }
            let entry = self.data.entry(record[COL_GENE].to_string()).or_default();
            if !entry.0.contains_key(ipr_id) {
                entry.0.insert(ipr_id.to_string(), clean_up_annot(&record[COL_IPR_DESC]));
                nb_new += 1;
            }
        }
        Ok(nb_new)
    } // end of load_reader
} // end of impl Ips

//==========================================================================================

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_clean_up_annot() {
        assert_eq!(clean_up_annot(" Lipase, class 3 "), "lipase, class 3");
        assert_eq!(clean_up_annot("ATP synthase"), "ATP synthase");
        assert_eq!(clean_up_annot("P-loop NTPase"), "P-loop NTPase");
        assert_eq!(clean_up_annot("A domain"), "a domain");
        assert_eq!(clean_up_annot(""), "");
    }

    #[test]
    fn test_load_reader() {
        let lines = [
            "g1\tmd5\t300\tPfam\tPF01764\tLipase_3\t10\t150\t1.2E-30\tT\t01-01-2022\tIPR002921\tFungal lipase-like domain",
            "g1\tmd5\t300\tPANTHER\tPTHR1\t-\t10\t150\t3.0E-40\tT\t01-01-2022\tIPR002921\tOther description",
            "g1\tmd5\t300\tGene3D\tG3D\t-\t10\t150\t1.0E-50\tT\t01-01-2022\tIPR029058\tAlpha/Beta hydrolase fold",
            "g2\tmd5\t120\tPfam\tPF00001\tX\t1\t100\t0.5\tT\t01-01-2022\tIPR000001\tWeak match",
            "g3\tmd5\t120\tPfam\tPF00002\tX\t1\t100\t1.0E-20\tT\t01-01-2022",
            "g4\tmd5\t120\tCoils\tCoil\t-\t1\t100\t-\tT\t01-01-2022\t-\t-",
            "g5\tmd5\t120\tProSitePatterns\tPS00001\tX\t1\t100\t-\tT\t01-01-2022\tIPR000002\tPattern match",
        ];
        let data = lines.join("\n");
        let mut ips = Ips::default();
        let nb = ips.load_reader(data.as_bytes()).unwrap();
        assert_eq!(nb, 2);
        assert_eq!(ips.get_nb_genes(), 1);
        let entry = ips.get("g1").unwrap();
        let ids: Vec<&String> = entry.iter().map(|(k, _)| k).collect();
        assert_eq!(ids, vec!["IPR002921", "IPR029058"]);
        // first description kept
        assert_eq!(entry.iter().next().unwrap().1, "fungal lipase-like domain");
        assert!(ips.get("g2").is_none());
        assert!(ips.get("g5").is_none());
        // unparsable e-value
        let bad = "g6\tmd5\t120\tPfam\tPF00002\tX\t1\t100\tnan?\tT\t01-01-2022\tIPR000003\tBad";
        assert!(matches!(Ips::default().load_reader(bad.as_bytes()), Err(FannotError::Ips(_))));
    }
} // end of mod tests
