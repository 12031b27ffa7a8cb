//! Annotation templates.
//!
//! A template is a list of segments separated by `||`. Each segment is literal text containing `{Field}` placeholders.
//! A segment is written only if all the fields it references are set in the description, so a template
//! degrades gracefully when the reference entry lacks a gene name or an organism.
//!
//! Modifiers can follow the segments : `::ToLwr`, `::ToUpr` change the case of the whole text,
//! `::GnPn` replaces the gene name by the protein name (ATG15 by Atg15p). They are applied in order.
//!
//! Example : `{Prefix}||{DbName}|{DbId} ||{Species}` gives `UNIPROT|P25641 Saccharomyces cerevisiae` when Prefix is unset.

use super::description::{Description, Field};
use crate::errors::{FannotError, Result};
use crate::utils::parameters::Param;

const SEGMENT_SEPARATOR: &str = "||";
const MODIFIER_SEPARATOR: &str = "::";

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Text(String),
    Field(Field),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Modifier {
    ToLwr,
    ToUpr,
    GnPn,
}

impl std::str::FromStr for Modifier {
    type Err = String;

    fn from_str(s : &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ToLwr" => Ok(Modifier::ToLwr),
            "ToUpr" => Ok(Modifier::ToUpr),
            "GnPn" => Ok(Modifier::GnPn),
            _ => Err(format!("unknown modifier {}", s)),
        }
    }
}

// case insensitive replacement of all occurrences of pattern
fn replace_ignore_case(text : &str, pattern : &str, by : &str) -> String {
    if pattern.is_empty() {
        return text.to_string();
    }
    // ascii lowering keeps byte offsets
    let lower_text = text.to_ascii_lowercase();
    let lower_pattern = pattern.to_ascii_lowercase();
    let mut replaced = String::with_capacity(text.len());
    let mut last = 0;
    for (pos, _) in lower_text.match_indices(&lower_pattern) {
        replaced.push_str(&text[last..pos]);
        replaced.push_str(by);
        last = pos + pattern.len();
    }
    replaced.push_str(&text[last..]);
    replaced
}

/// A compiled template
#[derive(Clone, Debug)]
pub struct Format {
    template: String,
    segments: Vec<Vec<Token>>,
    modifiers: Vec<Modifier>,
}

impl Format {
    /// parses a template, unknown fields, unknown modifiers and unbalanced braces are errors
    pub fn new(template : &str) -> Result<Self> {
        let template_error = |msg: String| FannotError::Template { template: template.to_string(), msg };
        let mut parts = template.split(MODIFIER_SEPARATOR);
        let body = parts.next().unwrap_or("");
        let modifiers = parts
            .map(|m| m.trim().parse::<Modifier>())
            .collect::<std::result::Result<Vec<Modifier>, String>>()
            .map_err(template_error)?;
        //
        let mut segments = Vec::<Vec<Token>>::new();
        if !body.is_empty() {
            for segment in body.split(SEGMENT_SEPARATOR) {
                let mut tokens = Vec::<Token>::new();
                let mut rest = segment;
                while let Some(open) = rest.find('{') {
                    if open > 0 {
                        tokens.push(Token::Text(rest[..open].to_string()));
                    }
                    let close = rest[open..].find('}').ok_or_else(|| template_error("unclosed {".to_string()))? + open;
                    let field = rest[open + 1..close].parse::<Field>().map_err(template_error)?;
                    tokens.push(Token::Field(field));
                    rest = &rest[close + 1..];
                }
                if rest.contains('}') {
                    return Err(template_error("unexpected }".to_string()));
                }
                if !rest.is_empty() {
                    tokens.push(Token::Text(rest.to_string()));
                }
                segments.push(tokens);
            }
        }
        Ok(Format { template: template.to_string(), segments, modifiers })
    } // end of new

    pub fn get_template(&self) -> &str {
        &self.template
    }

    /// true for the empty template, which always compiles to an empty string
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// fills the template with a description
    pub fn compile(&self, desc : &Description) -> String {
        let mut out = String::new();
        'segment: for tokens in self.segments.iter() {
            let mut text = String::new();
            for token in tokens {
                match token {
                    Token::Text(s) => text.push_str(s),
                    Token::Field(f) => match desc.get_field(*f) {
                        Some(value) => text.push_str(value),
                        None => continue 'segment,
                    },
                }
            }
            out.push_str(&text);
        }
        for modifier in self.modifiers.iter() {
            out = match modifier {
                Modifier::ToLwr => out.to_lowercase(),
                Modifier::ToUpr => out.to_uppercase(),
                Modifier::GnPn => match (desc.get_field(Field::GeneName), desc.get_field(Field::ProteinName)) {
                    (Some(gene), Some(protein)) => replace_ignore_case(&out, gene, protein),
                    _ => out,
                },
            };
        }
        out.trim().to_string()
    } // end of compile
} // end of impl Format

//==========================================================================================

/// The four templates used to fill annotation results
#[derive(Clone, Debug)]
pub struct Formats {
    pub note: Format,
    pub product: Format,
    pub gene_name: Format,
    pub function: Format,
}

impl Formats {
    pub fn from_param(param : &Param) -> Result<Self> {
        Ok(Formats {
            note: Format::new(&param.template_note)?,
            product: Format::new(&param.template_product)?,
            gene_name: Format::new(&param.template_gene_name)?,
            function: Format::new(&param.template_function)?,
        })
    }
}

//==========================================================================================

#[cfg(test)]
mod tests {

    use super::*;
    use crate::utils::idseq::IdSeq;
    use crate::utils::parameters::{TPL_NOTE, TPL_PRODUCT};

    fn atg15() -> Description {
        let s = IdSeq::new(
            "P25641".to_string(),
            "lipase ATG15::ATG15::YCR068W::Saccharomyces cerevisiae (strain ATCC 204508 / S288c) (Baker's yeast).::lipase which is essential for lysis of subvacuolar cytoplasm".to_string(),
            b"MLHKSPSRKRFASPLHLGCILTLTVLCLIAYYFALPDYLSVGKSSSRGAMDQKSDGTFRL".to_vec(),
        );
        Description::new("UNIPROT", &s).unwrap()
    }

    #[test]
    fn test_format_empty() {
        let f = Format::new("").unwrap();
        assert!(f.is_empty());
        assert_eq!(f.compile(&atg15()), "");
    }

    #[test]
    fn test_format_gene_description() {
        let f = Format::new("{Prefix} ||{DbName}|{DbId} ||{Species}").unwrap();
        assert_eq!(f.compile(&atg15()), "UNIPROT|P25641 Saccharomyces cerevisiae");
        let mut d = atg15();
        d.set_prefix("similar to ");
        assert_eq!(f.compile(&d), "similar to  UNIPROT|P25641 Saccharomyces cerevisiae");
    }

    #[test]
    fn test_format_trans_gene_name() {
        let f = Format::new("putative {ShortDesc}::GnPn").unwrap();
        assert_eq!(f.compile(&atg15()), "putative lipase Atg15p");
    }

    #[test]
    fn test_format_modifiers() {
        let f = Format::new("{ShortDesc}::ToUpr").unwrap();
        assert_eq!(f.compile(&atg15()), "LIPASE ATG15");
        // lowering first, gene name still replaced
        let f = Format::new(TPL_PRODUCT).unwrap();
        assert_eq!(f.compile(&atg15()), "lipase Atg15p");
        // no gene name, nothing replaced
        let s = IdSeq::new("X1".to_string(), "Lipase ATG15".to_string(), b"MA".to_vec());
        let d = Description::new("UNIPROT", &s).unwrap();
        assert_eq!(f.compile(&d), "lipase atg15");
    }

    #[test]
    fn test_format_default_note() {
        let f = Format::new(TPL_NOTE).unwrap();
        let mut d = atg15();
        d.set_prefix("highly similar to ");
        assert_eq!(
            f.compile(&d),
            "highly similar to UNIPROT|P25641 Saccharomyces cerevisiae YCR068W ATG15 lipase which is essential for lysis of subvacuolar cytoplasm"
        );
    }

    #[test]
    fn test_format_bad_field() {
        assert!(matches!(Format::new("putative {BadField}"), Err(FannotError::Template { .. })));
        assert!(Format::new("{ShortDesc}::Upper").is_err());
        assert!(Format::new("{ShortDesc").is_err());
        assert!(Format::new("ShortDesc}").is_err());
    }

    #[test]
    fn test_replace_ignore_case() {
        assert_eq!(replace_ignore_case("atg15 and ATG15", "ATG15", "Atg15p"), "Atg15p and Atg15p");
        assert_eq!(replace_ignore_case("lipase", "", "x"), "lipase");
    }

    #[test]
    fn test_formats_from_param() {
        let formats = Formats::from_param(&Param::default()).unwrap();
        assert!(formats.function.is_empty());
        assert_eq!(formats.gene_name.compile(&atg15()), "ATG15");
    }
} // end of mod tests
