//! Description of a reference hit, the data available to annotation templates.
//!
//! The header description of a reference database entry is either a plain text or
//! the 5 fields refdb description : `short description::gene name::locus tag::organism::long description`.

use std::str::FromStr;

use crate::errors::{FannotError, Result};
use crate::utils::idseq::IdSeq;

const REFDB_SEPARATOR: &str = "::";
const NB_REFDB_FIELDS: usize = 5;

/// fields that can be referenced in templates as {Field}
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Field {
    DbName,
    DbId,
    ShortDesc,
    LongDesc,
    GeneName,
    ProteinName,
    LocusTag,
    Species,
    Prefix,
    Putative,
    Unreviewed,
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s : &str) -> std::result::Result<Self, Self::Err> {
        let field = match s {
            "DbName" => Field::DbName,
            "DbId" => Field::DbId,
            "ShortDesc" => Field::ShortDesc,
            "LongDesc" => Field::LongDesc,
            "GeneName" => Field::GeneName,
            "ProteinName" => Field::ProteinName,
            "LocusTag" => Field::LocusTag,
            "Species" => Field::Species,
            "Prefix" => Field::Prefix,
            "Putative" => Field::Putative,
            "Unreviewed" => Field::Unreviewed,
            _ => return Err(format!("unknown field {}", s)),
        };
        Ok(field)
    }
} // end of impl FromStr for Field

// Atg15p from ATG15. Words start after any character that is neither alphanumeric nor '_'
fn protein_name(gene_name : &str) -> String {
    let mut name = String::with_capacity(gene_name.len() + 1);
    let mut word_start = true;
    for c in gene_name.chars() {
        if word_start {
            name.extend(c.to_uppercase());
        } else {
            name.extend(c.to_lowercase());
        }
        word_start = !(c.is_alphanumeric() || c == '_');
    }
    name.push('p');
    name
}

// drop strain comments and the final dot
fn clean_species(organism : &str) -> String {
    let species = organism.split(" (").next().unwrap_or(organism);
    species.strip_suffix('.').unwrap_or(species).trim().to_string()
}

fn non_empty(s : &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Annotation data of a hit. Optional fields are unset when the reference gives no value.
#[derive(Clone, Debug)]
pub struct Description {
    db_name: String,
    db_id: String,
    short_desc: String,
    long_desc: String,
    gene_name: Option<String>,
    protein_name: Option<String>,
    locus_tag: Option<String>,
    species: Option<String>,
    prefix: Option<String>,
    putative: bool,
    unreviewed: bool,
}

impl Description {
    /// parse the description of a hit from database db_name
    pub fn new(db_name : &str, hit : &IdSeq) -> Result<Self> {
        let raw = hit.get_desc();
        let values: Vec<&str> = raw.split(REFDB_SEPARATOR).collect();
        let mut desc = Description {
            db_name: db_name.to_string(),
            db_id: hit.get_fasta_id().clone(),
            short_desc: raw.clone(),
            long_desc: raw.clone(),
            gene_name: None,
            protein_name: None,
            locus_tag: None,
            species: None,
            prefix: None,
            putative: false,
            unreviewed: false,
        };
        match values.len() {
            1 => {}
            NB_REFDB_FIELDS => {
                desc.short_desc = values[0].to_string();
                desc.gene_name = non_empty(values[1]);
                desc.protein_name = desc.gene_name.as_deref().map(protein_name);
                desc.locus_tag = non_empty(values[2]);
                desc.species = non_empty(values[3]).map(|o| clean_species(&o)).filter(|s| !s.is_empty());
                desc.long_desc = if values[4].is_empty() { values[0].to_string() } else { values[4].to_string() };
            }
            nb => {
                return Err(FannotError::Description { id: hit.get_fasta_id().clone(), nb });
            }
        }
        Ok(desc)
    } // end of new

    /// set the annotation prefix, an empty prefix unsets the field
    pub fn set_prefix(&mut self, prefix : &str) {
        self.prefix = non_empty(prefix);
    }

    /// annotations from an unreviewed database are flagged unreviewed and putative
    pub fn set_unreviewed(&mut self, unreviewed : bool) {
        self.unreviewed = unreviewed;
        if unreviewed {
            self.putative = true;
        }
    }

    /// value of a field, None if unset
    pub fn get_field(&self, field : Field) -> Option<&str> {
        match field {
            Field::DbName => Some(&self.db_name),
            Field::DbId => Some(&self.db_id),
            Field::ShortDesc => Some(&self.short_desc),
            Field::LongDesc => Some(&self.long_desc),
            Field::GeneName => self.gene_name.as_deref(),
            Field::ProteinName => self.protein_name.as_deref(),
            Field::LocusTag => self.locus_tag.as_deref(),
            Field::Species => self.species.as_deref(),
            Field::Prefix => self.prefix.as_deref(),
            Field::Putative => self.putative.then_some("putative"),
            Field::Unreviewed => self.unreviewed.then_some("unreviewed"),
        }
    }

    pub fn is_set(&self, field : Field) -> bool {
        self.get_field(field).is_some()
    }
} // end of impl Description

//==========================================================================================

// end of mod tests
