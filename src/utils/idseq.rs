//! The module gathers structures used to identify sequences : queries to annotate and
//! entries of a reference database.

use fxhash::FxHashMap;

/// A protein sequence with its fasta id and the description found after the id in the header line.
/// For a reference database entry the description carries the annotation to transfer.
#[derive(Clone, Debug)]
pub struct IdSeq {
    /// id of sequence as read in head of fasta record.
    id: String,
    /// rest of the header line, possibly empty
    desc: String,
    /// residues, upper case
    seq: Vec<u8>,
} // end of IdSeq

impl IdSeq {
    ///
    pub fn new(id : String, desc : String, seq : Vec<u8>) -> Self {
        IdSeq { id, desc, seq }
    }

    /// get fasta id
    pub fn get_fasta_id(&self) -> &String {
        &self.id
    }

    /// get the header description (without the id)
    pub fn get_desc(&self) -> &String {
        &self.desc
    }

    pub fn get_sequence(&self) -> &[u8] {
        &self.seq
    }

    pub fn get_seq_len(&self) -> usize {
        self.seq.len()
    }

    /// format the sequence as a fasta record, residues on a single line
    pub fn to_fasta(&self) -> String {
        let mut fasta = String::with_capacity(self.id.len() + self.desc.len() + self.seq.len() + 4);
        fasta.push('>');
        fasta.push_str(&self.id);
        if !self.desc.is_empty() {
            fasta.push(' ');
            fasta.push_str(&self.desc);
        }
        fasta.push('\n');
        fasta.push_str(&String::from_utf8_lossy(&self.seq));
        fasta.push('\n');
        fasta
    }
} // end of impl IdSeq

//=========================================================================================

/// Query sequences in reading order.
/// The rank of a query in the vector is the handle used by all processing, it is never re-sorted.
pub struct SeqDict(pub Vec<IdSeq>);

impl SeqDict {
    pub fn new(size : usize) -> Self {
        SeqDict(Vec::with_capacity(size))
    }

    pub fn get_nb_seq(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, rank : usize) -> Option<&IdSeq> {
        self.0.get(rank)
    }

    /// total number of residues
    pub fn get_total_length(&self) -> usize {
        self.0.iter().fold(0, |acc, s| acc + s.get_seq_len())
    }
} // end of impl SeqDict

//=========================================================================================

/// Entries of one reference database keyed by fasta id.
/// It is built when a database pass starts and only read by workers during the pass.
pub struct SeqLookup(FxHashMap<String, IdSeq>);

impl SeqLookup {
    pub fn new() -> Self {
        SeqLookup(FxHashMap::default())
    }

    /// insert an entry, returns false if the id was already present (the new entry replaces the old one)
    pub fn insert(&mut self, idseq : IdSeq) -> bool {
        self.0.insert(idseq.get_fasta_id().clone(), idseq).is_none()
    }

    pub fn get(&self, id : &str) -> Option<&IdSeq> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
} // end of impl SeqLookup

impl Default for SeqLookup {
    fn default() -> Self {
        SeqLookup::new()
    }
}

impl FromIterator<IdSeq> for SeqLookup {
    fn from_iter<I: IntoIterator<Item = IdSeq>>(iter : I) -> Self {
        let mut lookup = SeqLookup::new();
        for idseq in iter {
            lookup.insert(idseq);
        }
        lookup
    }
}

//=========================================================================================

// end of mod tests
